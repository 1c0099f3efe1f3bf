use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod cookies;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod password;
pub mod session;

pub use extractors::AuthUser;

pub fn router(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new().merge(handlers::auth_routes(upload_limit_bytes))
}
