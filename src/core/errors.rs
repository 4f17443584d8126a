use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use thiserror::Error;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or malformed input.
    #[error("Bad Request: {0}")]
    BadRequest(String),
    /// Email or accountname already taken. Reported as 400, not 409.
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Internal Error: {0}")]
    InternalError(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Conflict(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidCredentials(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ApiError> for HttpResponse {
    fn from(err: ApiError) -> Self {
        let status = err.status();
        let body = match err {
            ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg) => serde_json::json!({ "message": msg }),
            ApiError::InvalidCredentials(msg) => serde_json::json!({
                "message": msg,
                "status": status.as_u16(),
            }),
            // Details stay in the log.
            ApiError::InternalError(_) => serde_json::json!({ "message": INTERNAL_ERROR_MESSAGE }),
        };
        HttpResponse::build(status).json(body)
    }
}

/// Unwraps a `Result<T, ApiError>` inside a handler, returning the error as
/// the handler's response.
macro_rules! try_api {
    ($expr:expr) => {
        match $expr {
            Ok(v) => v,
            Err(e) => return Ok(actix_web::HttpResponse::from(e)),
        }
    };
}
pub(crate) use try_api;
