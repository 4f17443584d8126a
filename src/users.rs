use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse};
use tracing::info;

use crate::auth::{authenticate, viewer};
use crate::core::errors::{try_api, ApiError};
use crate::core::helpers::{
    hash_password, json_response, new_id, ok_json, parse_body, sanitize_text, str_field,
};
use crate::core::validation::{is_valid_accountname, is_valid_email, is_valid_password};
use crate::follow::is_following;
use crate::models::models::{ProfileView, User, UserPatch, UserView};
use crate::state::AppState;

const ACCOUNTNAME_CHARSET_MESSAGE: &str =
    "Only letters, numbers, underscores and periods are allowed";
const ACCOUNTNAME_TAKEN_MESSAGE: &str = "This account ID is already in use";

pub fn create_user(state: &AppState, body: &[u8]) -> anyhow::Result<HttpResponse> {
    let value = try_api!(parse_body(body));
    let new_user = &value["user"];

    let (Some(username), Some(email), Some(password), Some(accountname)) = (
        str_field(new_user, "username"),
        str_field(new_user, "email"),
        str_field(new_user, "password"),
        str_field(new_user, "accountname"),
    ) else {
        return Ok(ApiError::bad_request("Please fill in all required fields").into());
    };

    if !is_valid_password(password) {
        return Ok(ApiError::bad_request("Password must be at least 6 characters").into());
    }
    if !is_valid_email(email) {
        return Ok(ApiError::bad_request("Invalid email format").into());
    }
    if !is_valid_accountname(accountname) {
        return Ok(ApiError::bad_request(ACCOUNTNAME_CHARSET_MESSAGE).into());
    }

    if state.store.find_by_email(email)?.is_some() {
        return Ok(ApiError::conflict("This email is already registered").into());
    }
    if state.store.find_by_accountname(accountname)?.is_some() {
        return Ok(ApiError::conflict(ACCOUNTNAME_TAKEN_MESSAGE).into());
    }

    let user = User {
        id: new_id(),
        username: username.to_string(),
        email: email.to_string(),
        accountname: accountname.to_string(),
        intro: str_field(new_user, "intro").map(sanitize_text).unwrap_or_default(),
        image: str_field(new_user, "image").unwrap_or_default().to_string(),
        password: hash_password(password)?,
        following: Vec::new(),
        follower: Vec::new(),
    };
    state.store.insert(user.clone())?;
    info!("Registered {} ({})", user.accountname, user.id);

    json_response(
        StatusCode::CREATED,
        &serde_json::json!({
            "message": "Signup successful",
            "user": UserView::from(&user),
        }),
    )
}

pub fn get_my_info(state: &AppState, req: &HttpRequest) -> anyhow::Result<HttpResponse> {
    let claims = try_api!(authenticate(state, req));

    let Some(user) = state.store.find_by_id(&claims.id)? else {
        return Ok(ApiError::not_found("User not found").into());
    };

    // Nobody follows themselves.
    let view = ProfileView::of(&user, false).without_intro();
    ok_json(&serde_json::json!({ "user": view }))
}

pub fn update_profile(
    state: &AppState,
    req: &HttpRequest,
    body: &[u8],
) -> anyhow::Result<HttpResponse> {
    let claims = try_api!(authenticate(state, req));
    let value = try_api!(parse_body(body));

    let changes = &value["user"];
    if !changes.is_object() {
        return Ok(ApiError::bad_request("Invalid request").into());
    }

    let Some(current) = state.store.find_by_id(&claims.id)? else {
        return Ok(ApiError::not_found("User not found").into());
    };

    let field = |key: &str| changes.get(key).and_then(|v| v.as_str()).map(str::to_string);
    let patch = UserPatch {
        username: field("username"),
        accountname: field("accountname"),
        intro: field("intro").map(|s| sanitize_text(&s)),
        image: field("image"),
        ..UserPatch::default()
    };

    if let Some(accountname) = patch.accountname.as_deref() {
        if accountname != current.accountname {
            if !is_valid_accountname(accountname) {
                return Ok(ApiError::bad_request(ACCOUNTNAME_CHARSET_MESSAGE).into());
            }
            if state.store.find_by_accountname(accountname)?.is_some() {
                return Ok(ApiError::conflict(ACCOUNTNAME_TAKEN_MESSAGE).into());
            }
        }
    }

    let Some(updated) = state.store.update(&current.id, patch)? else {
        return Ok(ApiError::not_found("User not found").into());
    };
    info!("Updated profile of {}", updated.accountname);

    let view = ProfileView::of(&updated, false).without_isfollow();
    ok_json(&serde_json::json!({ "user": view }))
}

pub fn check_email(state: &AppState, body: &[u8]) -> anyhow::Result<HttpResponse> {
    let value = try_api!(parse_body(body));
    let Some(email) = str_field(&value["user"], "email").filter(|e| is_valid_email(e)) else {
        return Ok(ApiError::bad_request("Invalid request").into());
    };

    let message = if state.store.find_by_email(email)?.is_some() {
        "This email is already registered."
    } else {
        "This email is available."
    };
    ok_json(&serde_json::json!({ "message": message }))
}

pub fn check_accountname(state: &AppState, body: &[u8]) -> anyhow::Result<HttpResponse> {
    let value = try_api!(parse_body(body));
    let Some(accountname) =
        str_field(&value["user"], "accountname").filter(|a| is_valid_accountname(a))
    else {
        return Ok(ApiError::bad_request("Invalid request").into());
    };

    let message = if state.store.find_by_accountname(accountname)?.is_some() {
        "This account ID is already in use."
    } else {
        "This account ID is available."
    };
    ok_json(&serde_json::json!({ "message": message }))
}

pub fn get_profile(
    state: &AppState,
    req: &HttpRequest,
    accountname: &str,
) -> anyhow::Result<HttpResponse> {
    let Some(target) = state.store.find_by_accountname(accountname)? else {
        return Ok(ApiError::not_found("This account does not exist").into());
    };

    let viewer = viewer(state, req)?;
    let view = ProfileView::of(&target, is_following(viewer.as_ref(), &target.id));
    ok_json(&serde_json::json!({ "profile": view }))
}
