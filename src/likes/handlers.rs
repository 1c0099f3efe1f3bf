use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::repo::{self, Like, LikeTarget};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::Path,
    response::ApiResponse,
    state::AppState,
    videos::repo_types::Video,
};

pub fn like_routes() -> Router<AppState> {
    Router::new()
        .route("/likes/toggle/v/:video_id", post(toggle_video_like))
        .route("/likes/toggle/c/:comment_id", post(toggle_comment_like))
        .route("/likes/toggle/t/:tweet_id", post(toggle_tweet_like))
        .route("/likes/videos", get(liked_videos))
}

async fn toggle_like(
    state: &AppState,
    target: LikeTarget,
    target_id: Uuid,
    user_id: Uuid,
) -> ApiResult<ApiResponse<Option<Like>>> {
    if !repo::target_exists(&state.db, target, target_id).await? {
        return Err(ApiError::not_found(format!("{} not found", target.label())));
    }
    let like = repo::toggle(&state.db, target, target_id, user_id).await?;
    debug!(?target, %target_id, liked = like.is_some(), "like toggled");
    let message = if like.is_some() {
        format!("{} liked successfully", target.label())
    } else {
        format!("{} unliked successfully", target.label())
    };
    Ok(ApiResponse::ok(like, message))
}

#[instrument(skip(state, user))]
pub async fn toggle_video_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Option<Like>>> {
    toggle_like(&state, LikeTarget::Video, video_id, user.id).await
}

#[instrument(skip(state, user))]
pub async fn toggle_comment_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Option<Like>>> {
    toggle_like(&state, LikeTarget::Comment, comment_id, user.id).await
}

#[instrument(skip(state, user))]
pub async fn toggle_tweet_like(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tweet_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Option<Like>>> {
    toggle_like(&state, LikeTarget::Tweet, tweet_id, user.id).await
}

#[instrument(skip(state, user))]
pub async fn liked_videos(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> ApiResult<ApiResponse<Vec<Video>>> {
    let videos = repo::liked_videos(&state.db, user.id).await?;
    Ok(ApiResponse::ok(videos, "Liked videos retrieved"))
}
