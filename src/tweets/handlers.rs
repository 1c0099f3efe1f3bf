use axum::{
    extract::State,
    routing::{get, patch, post},
    Router,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};
use uuid::Uuid;

use super::repo::{self, Tweet};
use crate::{
    auth::AuthUser,
    authz::ensure_owner,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    response::ApiResponse,
    state::AppState,
};

pub const MAX_TWEET_LEN: usize = 280;

#[derive(Debug, Deserialize)]
pub struct TweetBody {
    pub content: Option<String>,
}

pub fn tweet_routes() -> Router<AppState> {
    Router::new()
        .route("/tweets", post(create_tweet))
        .route("/tweets/user/:user_id", get(user_tweets))
        .route("/tweets/:tweet_id", patch(update_tweet).delete(delete_tweet))
}

fn tweet_text(body: TweetBody) -> ApiResult<String> {
    let content = body
        .content
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::bad_request("Content is required"))?;
    if content.chars().count() > MAX_TWEET_LEN {
        return Err(ApiError::bad_request(format!(
            "Tweet must be at most {MAX_TWEET_LEN} characters"
        )));
    }
    Ok(content)
}

#[instrument(skip(state, user, body))]
pub async fn create_tweet(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<TweetBody>,
) -> ApiResult<ApiResponse<Tweet>> {
    let content = tweet_text(body)?;
    let tweet = repo::create(&state.db, user.id, &content).await?;
    info!(tweet_id = %tweet.id, owner_id = %user.id, "tweet created");
    Ok(ApiResponse::created(tweet, "Tweet created successfully"))
}

#[instrument(skip(state, _user))]
pub async fn user_tweets(
    State(state): State<AppState>,
    AuthUser(_user): AuthUser,
    Path(user_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Vec<Tweet>>> {
    let tweets = repo::list_by_owner(&state.db, user_id).await?;
    Ok(ApiResponse::ok(tweets, "Tweets retrieved successfully"))
}

#[instrument(skip(state, user, body))]
pub async fn update_tweet(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tweet_id): Path<Uuid>,
    Json(body): Json<TweetBody>,
) -> ApiResult<ApiResponse<Tweet>> {
    let content = tweet_text(body)?;
    let existing = repo::find_by_id(&state.db, tweet_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;
    ensure_owner(existing.owner_id, user.id, "update this tweet")?;
    if existing.content == content {
        return Err(ApiError::conflict("Tweet content is unchanged"));
    }
    let tweet = repo::update_content(&state.db, tweet_id, &content)
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;
    Ok(ApiResponse::ok(tweet, "Tweet updated successfully"))
}

#[instrument(skip(state, user))]
pub async fn delete_tweet(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(tweet_id): Path<Uuid>,
) -> ApiResult<ApiResponse<Value>> {
    let existing = repo::find_by_id(&state.db, tweet_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Tweet not found"))?;
    ensure_owner(existing.owner_id, user.id, "delete this tweet")?;
    if !repo::delete(&state.db, tweet_id).await? {
        return Err(ApiError::not_found("Tweet not found"));
    }
    info!(%tweet_id, "tweet deleted");
    Ok(ApiResponse::ok(Value::Null, "Tweet deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(s: &str) -> TweetBody {
        TweetBody {
            content: Some(s.to_string()),
        }
    }

    #[test]
    fn tweet_length_bounds() {
        assert_eq!(tweet_text(body(" hello ")).unwrap(), "hello");
        assert!(tweet_text(body(&"a".repeat(MAX_TWEET_LEN))).is_ok());
        assert!(matches!(
            tweet_text(body(&"a".repeat(MAX_TWEET_LEN + 1))),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn empty_tweet_rejected() {
        assert!(matches!(tweet_text(body("  ")), Err(ApiError::BadRequest(_))));
        assert!(matches!(
            tweet_text(TweetBody { content: None }),
            Err(ApiError::BadRequest(_))
        ));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        assert!(tweet_text(body(&"é".repeat(MAX_TWEET_LEN))).is_ok());
    }
}
