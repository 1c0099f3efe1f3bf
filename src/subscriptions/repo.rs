use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: Uuid,
    pub subscriber_id: Uuid,
    pub channel_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// User projection used in subscriber/channel lists.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserBrief {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub avatar: String,
    #[serde(with = "time::serde::rfc3339")]
    pub subscribed_at: OffsetDateTime,
}

pub async fn user_exists(db: &PgPool, id: Uuid) -> ApiResult<bool> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(found)
}

/// Unsubscribes when a subscription exists, subscribes otherwise.
pub async fn toggle(
    db: &PgPool,
    subscriber_id: Uuid,
    channel_id: Uuid,
) -> ApiResult<Option<Subscription>> {
    let removed = sqlx::query("DELETE FROM subscriptions WHERE subscriber_id = $1 AND channel_id = $2")
        .bind(subscriber_id)
        .bind(channel_id)
        .execute(db)
        .await?;
    if removed.rows_affected() > 0 {
        return Ok(None);
    }
    let sub = sqlx::query_as::<_, Subscription>(
        r#"
        INSERT INTO subscriptions (subscriber_id, channel_id)
        VALUES ($1, $2)
        RETURNING id, subscriber_id, channel_id, created_at
        "#,
    )
    .bind(subscriber_id)
    .bind(channel_id)
    .fetch_one(db)
    .await?;
    Ok(Some(sub))
}

pub async fn subscribers_of(db: &PgPool, channel_id: Uuid) -> ApiResult<Vec<UserBrief>> {
    let rows = sqlx::query_as::<_, UserBrief>(
        r#"
        SELECT u.id, u.username, u.email, u.avatar, s.created_at AS subscribed_at
        FROM subscriptions s
        JOIN users u ON u.id = s.subscriber_id
        WHERE s.channel_id = $1
        ORDER BY s.created_at DESC
        "#,
    )
    .bind(channel_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn channels_of(db: &PgPool, subscriber_id: Uuid) -> ApiResult<Vec<UserBrief>> {
    let rows = sqlx::query_as::<_, UserBrief>(
        r#"
        SELECT u.id, u.username, u.email, u.avatar, s.created_at AS subscribed_at
        FROM subscriptions s
        JOIN users u ON u.id = s.channel_id
        WHERE s.subscriber_id = $1
        ORDER BY s.created_at DESC
        "#,
    )
    .bind(subscriber_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
