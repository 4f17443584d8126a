use actix_web::{HttpRequest, HttpResponse};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::{authenticate, viewer};
use crate::core::db::{StoreError, UserStore};
use crate::core::errors::{try_api, ApiError};
use crate::core::helpers::ok_json;
use crate::core::query_params::{parse_query_params, Page};
use crate::models::models::{ProfileView, User, UserPatch};
use crate::state::AppState;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cannot follow yourself")]
    SelfFollow,

    #[error("user {0} disappeared during a follow-graph update")]
    Missing(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum FollowOutcome {
    /// New edge recorded; carries the updated target.
    Followed(User),
    /// Edge already present; nothing was written.
    AlreadyFollowing(User),
}

impl FollowOutcome {
    pub fn into_target(self) -> User {
        match self {
            FollowOutcome::Followed(u) | FollowOutcome::AlreadyFollowing(u) => u,
        }
    }
}

/// Whether `viewer` follows `id`. Anonymous viewers follow nobody.
pub fn is_following(viewer: Option<&User>, id: &str) -> bool {
    viewer.is_some_and(|v| v.following.iter().any(|f| f == id))
}

pub fn follow_user(
    store: &dyn UserStore,
    current: &User,
    target: &User,
) -> Result<FollowOutcome, GraphError> {
    if current.id == target.id {
        return Err(GraphError::SelfFollow);
    }
    if current.following.contains(&target.id) {
        return Ok(FollowOutcome::AlreadyFollowing(target.clone()));
    }

    let mut following = current.following.clone();
    following.push(target.id.clone());
    let mut follower = target.follower.clone();
    if !follower.contains(&current.id) {
        follower.push(current.id.clone());
    }

    write_edge(store, current, following, target, follower).map(FollowOutcome::Followed)
}

/// Removes the edge in both directions. Not following is a no-op success.
pub fn unfollow_user(
    store: &dyn UserStore,
    current: &User,
    target: &User,
) -> Result<User, GraphError> {
    let mut following = current.following.clone();
    following.retain(|id| id != &target.id);
    let mut follower = target.follower.clone();
    follower.retain(|id| id != &current.id);

    write_edge(store, current, following, target, follower)
}

// Two independent writes: the follower's `following`, then the followee's
// `follower`. If the second one fails the first is reverted.
fn write_edge(
    store: &dyn UserStore,
    current: &User,
    following: Vec<String>,
    target: &User,
    follower: Vec<String>,
) -> Result<User, GraphError> {
    store
        .update(&current.id, UserPatch::following(following))?
        .ok_or_else(|| GraphError::Missing(current.id.clone()))?;

    let err = match store.update(&target.id, UserPatch::follower(follower)) {
        Ok(Some(updated)) => return Ok(updated),
        Ok(None) => GraphError::Missing(target.id.clone()),
        Err(e) => GraphError::Store(e),
    };

    match store.update(&current.id, UserPatch::following(current.following.clone())) {
        Ok(_) => warn!("Reverted following list of {} after: {}", current.id, err),
        Err(e) => error!(
            "Follow graph left asymmetric between {} and {}: {} (revert failed: {})",
            current.id, target.id, err, e
        ),
    }
    Err(err)
}

pub fn list_following(
    store: &dyn UserStore,
    user: &User,
    page: Page,
    viewer: Option<&User>,
) -> Result<Vec<ProfileView>, StoreError> {
    resolve_page(store, &user.following, page, viewer)
}

pub fn list_followers(
    store: &dyn UserStore,
    user: &User,
    page: Page,
    viewer: Option<&User>,
) -> Result<Vec<ProfileView>, StoreError> {
    resolve_page(store, &user.follower, page, viewer)
}

// Ids that no longer resolve are dropped, so a page may be short.
fn resolve_page(
    store: &dyn UserStore,
    ids: &[String],
    page: Page,
    viewer: Option<&User>,
) -> Result<Vec<ProfileView>, StoreError> {
    let mut out = Vec::new();
    for id in page.slice(ids) {
        if let Some(user) = store.find_by_id(id)? {
            out.push(ProfileView::of(&user, is_following(viewer, &user.id)));
        }
    }
    Ok(out)
}

// === HTTP Handlers ===

fn target_not_found() -> HttpResponse {
    ApiError::not_found("This account does not exist").into()
}

fn current_not_found() -> HttpResponse {
    ApiError::not_found("User not found").into()
}

pub fn handle_follow(
    state: &AppState,
    req: &HttpRequest,
    accountname: &str,
) -> anyhow::Result<HttpResponse> {
    let claims = try_api!(authenticate(state, req));

    let Some(target) = state.store.find_by_accountname(accountname)? else {
        return Ok(target_not_found());
    };
    let Some(current) = state.store.find_by_id(&claims.id)? else {
        return Ok(current_not_found());
    };

    let outcome = match follow_user(state.store.as_ref(), &current, &target) {
        Ok(o) => o,
        Err(GraphError::SelfFollow) => {
            return Ok(ApiError::bad_request("You cannot follow yourself").into())
        }
        Err(e) => return Err(e.into()),
    };
    if let FollowOutcome::Followed(_) = outcome {
        info!("{} followed {}", current.accountname, target.accountname);
    }

    let target = outcome.into_target();
    ok_json(&serde_json::json!({ "profile": ProfileView::of(&target, true) }))
}

pub fn handle_unfollow(
    state: &AppState,
    req: &HttpRequest,
    accountname: &str,
) -> anyhow::Result<HttpResponse> {
    let claims = try_api!(authenticate(state, req));

    let Some(target) = state.store.find_by_accountname(accountname)? else {
        return Ok(target_not_found());
    };
    let Some(current) = state.store.find_by_id(&claims.id)? else {
        return Ok(current_not_found());
    };

    let target = unfollow_user(state.store.as_ref(), &current, &target)?;
    info!("{} unfollowed {}", current.accountname, target.accountname);

    ok_json(&serde_json::json!({ "profile": ProfileView::of(&target, false) }))
}

pub fn get_followings_list(
    state: &AppState,
    req: &HttpRequest,
    accountname: &str,
) -> anyhow::Result<HttpResponse> {
    list_handler(state, req, accountname, list_following)
}

pub fn get_followers_list(
    state: &AppState,
    req: &HttpRequest,
    accountname: &str,
) -> anyhow::Result<HttpResponse> {
    list_handler(state, req, accountname, list_followers)
}

type Lister = fn(&dyn UserStore, &User, Page, Option<&User>) -> Result<Vec<ProfileView>, StoreError>;

fn list_handler(
    state: &AppState,
    req: &HttpRequest,
    accountname: &str,
    lister: Lister,
) -> anyhow::Result<HttpResponse> {
    let Some(target) = state.store.find_by_accountname(accountname)? else {
        return Ok(target_not_found());
    };

    let page = Page::from_params(&parse_query_params(&req.uri().to_string()));
    let viewer = viewer(state, req)?;
    let profiles = lister(state.store.as_ref(), &target, page, viewer.as_ref())?;

    ok_json(&profiles)
}
