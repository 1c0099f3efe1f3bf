use crate::state::AppState;
use axum::Router;

pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod repo;
pub mod repo_types;

pub fn router(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new().merge(handlers::user_routes(upload_limit_bytes))
}
