use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::ApiResult;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub content: String,
    pub video_id: Uuid,
    pub owner_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Comments of a video, newest first.
pub async fn list_by_video(
    db: &PgPool,
    video_id: Uuid,
    limit: i64,
    offset: i64,
) -> ApiResult<Vec<Comment>> {
    let rows = sqlx::query_as::<_, Comment>(
        r#"
        SELECT id, content, video_id, owner_id, created_at, updated_at
        FROM comments
        WHERE video_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(video_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> ApiResult<Option<Comment>> {
    let row = sqlx::query_as::<_, Comment>(
        "SELECT id, content, video_id, owner_id, created_at, updated_at FROM comments WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn create(db: &PgPool, video_id: Uuid, owner_id: Uuid, content: &str) -> ApiResult<Comment> {
    let row = sqlx::query_as::<_, Comment>(
        r#"
        INSERT INTO comments (content, video_id, owner_id)
        VALUES ($1, $2, $3)
        RETURNING id, content, video_id, owner_id, created_at, updated_at
        "#,
    )
    .bind(content)
    .bind(video_id)
    .bind(owner_id)
    .fetch_one(db)
    .await?;
    Ok(row)
}

pub async fn update_content(db: &PgPool, id: Uuid, content: &str) -> ApiResult<Option<Comment>> {
    let row = sqlx::query_as::<_, Comment>(
        r#"
        UPDATE comments SET content = $2, updated_at = now()
        WHERE id = $1
        RETURNING id, content, video_id, owner_id, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(content)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn delete(db: &PgPool, id: Uuid) -> ApiResult<bool> {
    let res = sqlx::query("DELETE FROM comments WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}
