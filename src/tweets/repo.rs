use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;

const TWEET_COLUMNS: &str = "id, content, owner_id, created_at, updated_at";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Tweet {
    pub id: Uuid,
    pub content: String,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

pub async fn create(db: &PgPool, owner_id: Uuid, content: &str) -> ApiResult<Tweet> {
    let sql = format!("INSERT INTO tweets (content, owner_id) VALUES ($1, $2) RETURNING {TWEET_COLUMNS}");
    let row = sqlx::query_as::<_, Tweet>(&sql)
        .bind(content)
        .bind(owner_id)
        .fetch_one(db)
        .await?;
    Ok(row)
}

/// Tweets of one user, newest first.
pub async fn list_by_owner(db: &PgPool, owner_id: Uuid) -> ApiResult<Vec<Tweet>> {
    let sql = format!(
        "SELECT {TWEET_COLUMNS} FROM tweets WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
    );
    let rows = sqlx::query_as::<_, Tweet>(&sql)
        .bind(owner_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> ApiResult<Option<Tweet>> {
    let sql = format!("SELECT {TWEET_COLUMNS} FROM tweets WHERE id = $1");
    let row = sqlx::query_as::<_, Tweet>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn update_content(db: &PgPool, id: Uuid, content: &str) -> ApiResult<Option<Tweet>> {
    let sql = format!(
        "UPDATE tweets SET content = $2, updated_at = now() WHERE id = $1 RETURNING {TWEET_COLUMNS}"
    );
    let row = sqlx::query_as::<_, Tweet>(&sql)
        .bind(id)
        .bind(content)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

pub async fn delete(db: &PgPool, id: Uuid) -> ApiResult<bool> {
    let res = sqlx::query("DELETE FROM tweets WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
