use axum::{
    extract::State,
    routing::{get, patch},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, Comment};
use crate::{
    auth::AuthUser,
    authz::ensure_owner,
    error::{ApiError, ApiResult},
    extract::{Json, Path, Query},
    pagination::PageQuery,
    response::ApiResponse,
    state::AppState,
    videos,
};

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    #[serde(alias = "text")]
    pub content: Option<String>,
}

pub fn comment_routes() -> Router<AppState> {
    Router::new()
        .route("/comments/:video_id", get(list_comments).post(add_comment))
        .route(
            "/comments/c/:comment_id",
            patch(update_comment).delete(delete_comment),
        )
}

fn comment_text(body: CommentBody) -> ApiResult<String> {
    body.content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Comment should not be empty"))
}

async fn owned_comment(state: &AppState, id: Uuid, actor: Uuid, action: &str) -> ApiResult<Comment> {
    let comment = repo::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    ensure_owner(comment.owner_id, actor, action)?;
    Ok(comment)
}

#[instrument(skip(state, _user))]
pub async fn list_comments(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(video_id): Path<Uuid>,
    Query(page): Query<PageQuery>,
) -> ApiResult<ApiResponse<Vec<Comment>>> {
    let comments = repo::list_by_video(&state.db, video_id, page.limit(), page.offset()).await?;
    Ok(ApiResponse::ok(comments, "Comments retrieved successfully"))
}

#[instrument(skip(state, user, body))]
pub async fn add_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<Uuid>,
    Json(body): Json<CommentBody>,
) -> ApiResult<ApiResponse<Comment>> {
    let content = comment_text(body)?;
    if !videos::repo::exists(&state.db, video_id).await? {
        return Err(ApiError::not_found("Video not found"));
    }
    let comment = repo::create(&state.db, video_id, user.id, &content).await?;
    info!(comment_id = %comment.id, %video_id, "comment added");
    Ok(ApiResponse::created(comment, "Comment added successfully"))
}

#[instrument(skip(state, user, body))]
pub async fn update_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(comment_id): Path<Uuid>,
    Json(body): Json<CommentBody>,
) -> ApiResult<ApiResponse<Comment>> {
    let content = comment_text(body)?;
    owned_comment(&state, comment_id, user.id, "update this comment").await?;
    let comment = repo::update_content(&state.db, comment_id, &content)
        .await?
        .ok_or_else(|| ApiError::not_found("Comment not found"))?;
    Ok(ApiResponse::ok(comment, "Comment updated successfully"))
}

#[instrument(skip(state, user))]
pub async fn delete_comment(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(comment_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Value>> {
    owned_comment(&state, comment_id, user.id, "delete this comment").await?;
    if !repo::delete(&state.db, comment_id).await? {
        return Err(ApiError::not_found("Comment not found"));
    }
    Ok(ApiResponse::ok(Value::Null, "Comment deleted successfully"))
}
