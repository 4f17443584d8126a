use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use ammonia::Builder;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use rand::rngs::OsRng;
use serde::Serialize;
use uuid::Uuid;

use crate::core::errors::ApiError;

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
}

/// False for a wrong password and for anything that is not a PHC hash string.
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Strips all markup, leaving plain text. Ammonia emits escaped HTML, so the
/// entities are decoded again before the text is stored.
pub fn sanitize_text(text: &str) -> String {
    let cleaned = Builder::default()
        .tags(std::collections::HashSet::new())
        .clean(text)
        .to_string();
    html_escape::decode_html_entities(&cleaned).into_owned()
}

/// Parses a request body as JSON. An empty body reads as `null`.
pub fn parse_body(body: &[u8]) -> Result<serde_json::Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid request body"))
}

/// A field counts as present only when it is a non-empty string.
pub fn str_field<'a>(value: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> anyhow::Result<HttpResponse> {
    Ok(HttpResponse::build(status)
        .content_type("application/json")
        .body(serde_json::to_vec(body)?))
}

pub fn ok_json<T: Serialize>(body: &T) -> anyhow::Result<HttpResponse> {
    json_response(StatusCode::OK, body)
}
