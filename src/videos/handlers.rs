use std::path::Path as FsPath;

use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    repo,
    repo_types::{NewVideo, SortBy, SortType, Video},
};
use crate::{
    auth::AuthUser,
    authz::ensure_owner,
    error::{ApiError, ApiResult},
    extract::{Multipart, Path, Query},
    pagination::PageQuery,
    response::ApiResponse,
    state::AppState,
    uploads::{delete_asset_quietly, roll_back_uploads, upload_staged, MultipartForm},
    users,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListVideosQuery {
    pub user_id: Option<Uuid>,
    pub query: Option<String>,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_type: SortType,
    #[serde(default = "first_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn first_page() -> i64 {
    PageQuery::default().page
}

fn default_limit() -> i64 {
    PageQuery::default().limit
}

impl ListVideosQuery {
    fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

pub fn video_routes(upload_limit_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/videos/all-videos", get(list_videos))
        .route(
            "/videos/publish-video",
            post(publish_video).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
        .route("/videos/:video_id", get(get_video))
        .route(
            "/videos/update-video/:video_id",
            patch(update_video).layer(DefaultBodyLimit::max(upload_limit_bytes)),
        )
        .route("/videos/delete-video/:video_id", delete(delete_video))
        .route("/videos/toggle-status/:video_id", patch(toggle_publish_status))
}

/// Loads a video and checks that `actor` owns it.
async fn owned_video(state: &AppState, video_id: Uuid, actor: Uuid, action: &str) -> ApiResult<Video> {
    let video = repo::find_by_id(&state.db, video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    ensure_owner(video.owner_id, actor, action)?;
    Ok(video)
}

#[instrument(skip(state, _user))]
pub async fn list_videos(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Query(q): Query<ListVideosQuery>,
) -> ApiResult<ApiResponse<Vec<Video>>> {
    let owner_id = q
        .user_id
        .ok_or_else(|| ApiError::bad_request("userId is required"))?;
    let search = q.query.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let videos = repo::list_published_by_owner(
        &state.db,
        owner_id,
        search,
        q.sort_by,
        q.sort_type,
        q.paging().limit(),
        q.paging().offset(),
    )
    .await?;
    Ok(ApiResponse::ok(videos, "Videos fetched successfully"))
}

/// POST /videos/publish-video (multipart: title, description, video, thumbnail)
#[instrument(skip(state, user, mp))]
pub async fn publish_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Multipart,
) -> ApiResult<ApiResponse<Video>> {
    let dir = FsPath::new(&state.config.upload_dir);
    let mut form = MultipartForm::read(mp, dir, &["video", "thumbnail"]).await?;

    let (Some(title), Some(description)) = (form.text("title"), form.text("description")) else {
        return Err(ApiError::bad_request("Title and description are required"));
    };
    let video_file = form
        .take_file("video")
        .ok_or_else(|| ApiError::bad_request("Video is required"))?;
    let thumbnail_file = form
        .take_file("thumbnail")
        .ok_or_else(|| ApiError::bad_request("Thumbnail is required"))?;

    let video_asset = upload_staged(state.storage.as_ref(), video_file, "videos").await?;
    let thumbnail_asset = match upload_staged(state.storage.as_ref(), thumbnail_file, "thumbnails").await {
        Ok(asset) => asset,
        Err(e) => {
            delete_asset_quietly(state.storage.as_ref(), Some(&video_asset.public_id)).await;
            return Err(e.into());
        }
    };

    let new_video = NewVideo {
        owner_id: user.id,
        title,
        description,
        video_file: video_asset.url.clone(),
        video_public_id: video_asset.public_id.clone(),
        thumbnail: thumbnail_asset.url.clone(),
        thumbnail_public_id: thumbnail_asset.public_id.clone(),
        duration: video_asset.duration.unwrap_or(0.0),
    };
    let video = match repo::create(&state.db, &new_video).await {
        Ok(video) => video,
        Err(e) => {
            roll_back_uploads(state.storage.as_ref(), &[&video_asset, &thumbnail_asset]).await;
            return Err(e);
        }
    };
    info!(video_id = %video.id, owner_id = %user.id, "video published");
    Ok(ApiResponse::created(video, "Video uploaded successfully"))
}

/// Counts a view and records it in the caller's watch history.
#[instrument(skip(state, user))]
pub async fn get_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Video>> {
    let mut video = repo::find_by_id(&state.db, video_id)
        .await?
        .filter(|v| v.is_published || v.owner_id == user.id)
        .ok_or_else(|| ApiError::not_found("Video not found"))?;

    repo::increment_views(&state.db, video_id).await?;
    video.views += 1;
    users::repo::record_watch(&state.db, user.id, video_id).await?;

    Ok(ApiResponse::ok(video, "Video fetched successfully"))
}

/// PATCH /videos/update-video/:video_id (multipart: title, description, thumbnail?)
#[instrument(skip(state, user, mp))]
pub async fn update_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<Uuid>,
    mp: Multipart,
) -> ApiResult<ApiResponse<Video>> {
    let dir = FsPath::new(&state.config.upload_dir);
    let mut form = MultipartForm::read(mp, dir, &["thumbnail"]).await?;
    let (Some(title), Some(description)) = (form.text("title"), form.text("description")) else {
        return Err(ApiError::bad_request("Title and description are required"));
    };

    let existing = owned_video(&state, video_id, user.id, "update this video").await?;

    let new_thumbnail = match form.take_file("thumbnail") {
        Some(file) => Some(upload_staged(state.storage.as_ref(), file, "thumbnails").await?),
        None => None,
    };

    let updated = repo::update_details(
        &state.db,
        video_id,
        &title,
        &description,
        new_thumbnail
            .as_ref()
            .map(|a| (a.url.as_str(), a.public_id.as_str())),
    )
    .await
    .and_then(|v| v.ok_or_else(|| ApiError::not_found("Video not found")));
    let updated = match updated {
        Ok(video) => video,
        Err(e) => {
            if let Some(asset) = &new_thumbnail {
                roll_back_uploads(state.storage.as_ref(), &[asset]).await;
            }
            return Err(e);
        }
    };

    if new_thumbnail.is_some() {
        delete_asset_quietly(state.storage.as_ref(), existing.thumbnail_public_id.as_deref()).await;
    }
    Ok(ApiResponse::ok(updated, "Video details updated successfully"))
}

#[instrument(skip(state, user))]
pub async fn delete_video(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Value>> {
    let video = owned_video(&state, video_id, user.id, "delete this video").await?;
    if !repo::delete(&state.db, video_id).await? {
        warn!(%video_id, "video vanished before delete");
        return Err(ApiError::not_found("Video not found"));
    }
    delete_asset_quietly(state.storage.as_ref(), video.video_public_id.as_deref()).await;
    delete_asset_quietly(state.storage.as_ref(), video.thumbnail_public_id.as_deref()).await;
    info!(%video_id, "video deleted");
    Ok(ApiResponse::ok(Value::Null, "Video deleted successfully"))
}

#[instrument(skip(state, user))]
pub async fn toggle_publish_status(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(video_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Video>> {
    owned_video(&state, video_id, user.id, "change this video").await?;
    let video = repo::toggle_published(&state.db, video_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Video not found"))?;
    Ok(ApiResponse::ok(video, "Status updated successfully"))
}
