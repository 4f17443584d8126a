use actix_web::HttpRequest;
use actix_web::HttpResponse;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info};

use crate::config::{ACCESS_TOKEN_TTL_SECS, REFRESH_TOKEN_TTL_SECS};
use crate::core::errors::{try_api, ApiError};
use crate::core::helpers::{ok_json, parse_body, str_field, verify_password};
use crate::models::models::{AccessClaims, RefreshClaims, SigninView, User};
use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Issues and checks HS256 JWTs. Access and refresh tokens are signed with
/// separate secrets; only access tokens are accepted by [`TokenService::verify`].
pub struct TokenService {
    access_secret: Vec<u8>,
    refresh_secret: Vec<u8>,
}

impl TokenService {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self {
            access_secret: access_secret.as_bytes().to_vec(),
            refresh_secret: refresh_secret.as_bytes().to_vec(),
        }
    }

    pub fn issue(&self, user: &User, kind: TokenKind) -> anyhow::Result<String> {
        self.issue_at(user, kind, chrono::Utc::now().timestamp())
    }

    /// Issues a token as if the current time were `now` (unix seconds).
    pub fn issue_at(&self, user: &User, kind: TokenKind, now: i64) -> anyhow::Result<String> {
        match kind {
            TokenKind::Access => encode(
                &AccessClaims {
                    id: user.id.clone(),
                    email: user.email.clone(),
                    accountname: user.accountname.clone(),
                    iat: now,
                    exp: now + ACCESS_TOKEN_TTL_SECS,
                },
                &self.access_secret,
            ),
            TokenKind::Refresh => encode(
                &RefreshClaims {
                    id: user.id.clone(),
                    email: user.email.clone(),
                    iat: now,
                    exp: now + REFRESH_TOKEN_TTL_SECS,
                },
                &self.refresh_secret,
            ),
        }
    }

    /// Decoded access claims, or `None` for a malformed, tampered, foreign or
    /// expired token.
    pub fn verify(&self, token: &str) -> Option<AccessClaims> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }

    fn verify_at(&self, token: &str, now: i64) -> Option<AccessClaims> {
        let claims: AccessClaims = decode(token, &self.access_secret)?;
        if claims.exp <= now {
            debug!("Rejected expired token for {}", claims.id);
            return None;
        }
        Some(claims)
    }
}

fn encode<T: Serialize>(claims: &T, secret: &[u8]) -> anyhow::Result<String> {
    let header = Header {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };
    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?),
        URL_SAFE_NO_PAD.encode(serde_json::to_vec(claims)?)
    );
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| anyhow::anyhow!("Invalid signing key: {}", e))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    Ok(format!("{}.{}", signing_input, signature))
}

fn decode<T: DeserializeOwned>(token: &str, secret: &[u8]) -> Option<T> {
    let mut parts = token.split('.');
    let (header_b64, claims_b64, signature_b64) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let header: Header = serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64).ok()?).ok()?;
    if header.alg != "HS256" {
        return None;
    }

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(header_b64.as_bytes());
    mac.update(b".");
    mac.update(claims_b64.as_bytes());
    mac.verify_slice(&signature).ok()?;

    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(claims_b64).ok()?).ok()
}

// === Request authentication ===

pub fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Required authentication.
pub fn authenticate(state: &AppState, req: &HttpRequest) -> Result<AccessClaims, ApiError> {
    let token = bearer_token(req)
        .ok_or_else(|| ApiError::unauthorized("Authentication token is required"))?;
    state
        .tokens
        .verify(token)
        .ok_or_else(|| ApiError::unauthorized("Invalid token"))
}

/// Optional authentication: the requesting user when a valid token names an
/// existing account, otherwise anonymous.
pub fn viewer(state: &AppState, req: &HttpRequest) -> anyhow::Result<Option<User>> {
    let Some(claims) = bearer_token(req).and_then(|t| state.tokens.verify(t)) else {
        return Ok(None);
    };
    Ok(state.store.find_by_id(&claims.id)?)
}

// === Handlers ===

pub fn login_user(state: &AppState, body: &[u8]) -> anyhow::Result<HttpResponse> {
    let value = try_api!(parse_body(body));
    let creds = &value["user"];
    let email = str_field(creds, "email");
    let password = str_field(creds, "password");

    let (email, password) = match (email, password) {
        (Some(e), Some(p)) => (e, p),
        (None, None) => {
            return Ok(ApiError::bad_request("Please enter your email or password").into())
        }
        (None, _) => return Ok(ApiError::bad_request("Please enter your email").into()),
        (_, None) => return Ok(ApiError::bad_request("Please enter your password").into()),
    };

    let user = match state.store.find_by_email(email)? {
        Some(u) if verify_password(password, &u.password) => u,
        _ => {
            return Ok(ApiError::InvalidCredentials(
                "Email or password does not match".to_string(),
            )
            .into())
        }
    };

    let access_token = state.tokens.issue(&user, TokenKind::Access)?;
    let refresh_token = state.tokens.issue(&user, TokenKind::Refresh)?;
    info!("User {} signed in", user.accountname);

    let view = SigninView {
        id: &user.id,
        username: &user.username,
        email: &user.email,
        accountname: &user.accountname,
        image: &user.image,
        access_token,
        refresh_token,
    };
    ok_json(&serde_json::json!({ "user": view }))
}
