use axum::{
    extract::State,
    routing::get,
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, Subscription, UserBrief};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    extract::Path,
    response::ApiResponse,
    state::AppState,
};

pub fn subscription_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/subscriptions/c/:channel_id",
            get(channel_subscribers).post(toggle_subscription),
        )
        .route("/subscriptions/u/:subscriber_id", get(subscribed_channels))
}

fn ensure_not_self(subscriber_id: Uuid, channel_id: Uuid) -> ApiResult<()> {
    if subscriber_id == channel_id {
        return Err(ApiError::bad_request("You cannot subscribe to your own channel"));
    }
    Ok(())
}

#[instrument(skip(state, user))]
pub async fn toggle_subscription(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(channel_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Option<Subscription>>> {
    ensure_not_self(user.id, channel_id)?;
    if !repo::user_exists(&state.db, channel_id).await? {
        return Err(ApiError::not_found("Channel not found"));
    }
    let sub = repo::toggle(&state.db, user.id, channel_id).await?;
    info!(subscriber_id = %user.id, %channel_id, subscribed = sub.is_some(), "subscription toggled");
    let message = if sub.is_some() {
        "Subscribed successfully"
    } else {
        "Channel unsubscribed successfully"
    };
    Ok(ApiResponse::ok(sub, message))
}

#[instrument(skip(state, _user))]
pub async fn channel_subscribers(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(channel_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Vec<UserBrief>>> {
    let subscribers = repo::subscribers_of(&state.db, channel_id).await?;
    Ok(ApiResponse::ok(subscribers, "Subscribers retrieved"))
}

#[instrument(skip(state, _user))]
pub async fn subscribed_channels(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(subscriber_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Vec<UserBrief>>> {
    let channels = repo::channels_of(&state.db, subscriber_id).await?;
    Ok(ApiResponse::ok(channels, "Subscribed channels retrieved"))
}
