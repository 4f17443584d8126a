pub mod auth;
pub mod config;
pub mod core;
pub mod follow;
pub mod models;
pub mod state;
pub mod users;

use std::net::TcpListener;
use std::sync::Arc;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::{middleware, web, App, HttpRequest, HttpResponse, HttpServer};
use tracing::error;

use crate::core::errors::ApiError;
use crate::state::AppState;

/// Routes a request to its handler by method and path. Everything lives
/// under `/api`; unknown routes get a JSON 404.
pub fn dispatch(state: &AppState, req: &HttpRequest, body: &[u8]) -> anyhow::Result<HttpResponse> {
    let segments: Vec<&str> = req.path().split('/').filter(|s| !s.is_empty()).collect();

    match (req.method().as_str(), segments.as_slice()) {
        ("POST", ["api", "user"]) => users::create_user(state, body),
        ("PUT", ["api", "user"]) => users::update_profile(state, req, body),
        ("POST", ["api", "user", "signin"]) => auth::login_user(state, body),
        ("GET", ["api", "user", "myinfo"]) => users::get_my_info(state, req),
        ("POST", ["api", "user", "emailvalid"]) => users::check_email(state, body),
        ("POST", ["api", "user", "accountnamevalid"]) => users::check_accountname(state, body),
        ("GET", ["api", "profile", name]) => users::get_profile(state, req, &decode_segment(name)),
        ("POST", ["api", "profile", name, "follow"]) => {
            follow::handle_follow(state, req, &decode_segment(name))
        }
        ("DELETE", ["api", "profile", name, "unfollow"]) => {
            follow::handle_unfollow(state, req, &decode_segment(name))
        }
        ("GET", ["api", "profile", name, "following"]) => {
            follow::get_followings_list(state, req, &decode_segment(name))
        }
        ("GET", ["api", "profile", name, "follower"]) => {
            follow::get_followers_list(state, req, &decode_segment(name))
        }
        _ => Ok(ApiError::not_found("Not found").into()),
    }
}

fn decode_segment(segment: &str) -> String {
    urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string())
}

async fn handle_all(state: web::Data<AppState>, req: HttpRequest, body: web::Bytes) -> HttpResponse {
    match dispatch(&state, &req, &body) {
        Ok(resp) => resp,
        Err(e) => {
            error!("{} {} failed: {:#}", req.method(), req.path(), e);
            ApiError::InternalError(e.to_string()).into()
        }
    }
}

/// Builds the HTTP server on an already-bound listener. The returned future
/// must be awaited (or spawned) to serve requests. Any origin may call the
/// API from a browser.
pub fn run(listener: TcpListener, state: Arc<AppState>) -> std::io::Result<Server> {
    let data = web::Data::from(state);
    let server = HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .wrap(middleware::Logger::default())
            .app_data(data.clone())
            .default_service(web::route().to(handle_all))
    })
    .listen(listener)?
    .run();
    Ok(server)
}
