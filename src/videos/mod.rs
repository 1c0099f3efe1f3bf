mod handlers;
pub mod repo;
pub mod repo_types;

use crate::state::AppState;
use axum::Router;

pub fn router(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new().merge(handlers::video_routes(upload_limit_bytes))
}
