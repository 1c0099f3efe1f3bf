use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    error::ApiResult,
    videos::{repo::VISIBLE_TO_VIEWER, repo_types::Video},
};

/// What a like points at; each maps to one nullable FK column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeTarget {
    Video,
    Comment,
    Tweet,
}

impl LikeTarget {
    pub fn column(self) -> &'static str {
        match self {
            LikeTarget::Video => "video_id",
            LikeTarget::Comment => "comment_id",
            LikeTarget::Tweet => "tweet_id",
        }
    }

    pub fn table(self) -> &'static str {
        match self {
            LikeTarget::Video => "videos",
            LikeTarget::Comment => "comments",
            LikeTarget::Tweet => "tweets",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LikeTarget::Video => "Video",
            LikeTarget::Comment => "Comment",
            LikeTarget::Tweet => "Tweet",
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    pub id: Uuid,
    pub liked_by: Uuid,
    pub video_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
    pub tweet_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn target_exists(db: &PgPool, target: LikeTarget, id: Uuid) -> ApiResult<bool> {
    let found: bool = sqlx::query_scalar(&format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE id = $1)",
        target.table()
    ))
    .bind(id)
    .fetch_one(db)
    .await?;
    Ok(found)
}

/// Removes the caller's like if present, otherwise creates it. Returns the new like, if any.
pub async fn toggle(
    db: &PgPool,
    target: LikeTarget,
    target_id: Uuid,
    user_id: Uuid,
) -> ApiResult<Option<Like>> {
    let removed = sqlx::query(&format!(
        "DELETE FROM likes WHERE {} = $1 AND liked_by = $2",
        target.column()
    ))
    .bind(target_id)
    .bind(user_id)
    .execute(db)
    .await?;
    if removed.rows_affected() > 0 {
        return Ok(None);
    }

    let like = sqlx::query_as::<_, Like>(&format!(
        r#"
        INSERT INTO likes ({}, liked_by)
        VALUES ($1, $2)
        RETURNING id, liked_by, video_id, comment_id, tweet_id, created_at
        "#,
        target.column()
    ))
    .bind(target_id)
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(Some(like))
}

fn liked_videos_sql() -> String {
    format!(
        r#"
        SELECT v.id, v.owner_id, v.title, v.description, v.video_file, v.video_public_id,
               v.thumbnail, v.thumbnail_public_id, v.duration, v.views, v.is_published,
               v.created_at, v.updated_at
        FROM likes l
        JOIN videos v ON v.id = l.video_id
        WHERE l.liked_by = $1 AND l.video_id IS NOT NULL AND {VISIBLE_TO_VIEWER}
        ORDER BY l.created_at DESC
        "#
    )
}

/// Videos the user liked and may still see, most recent like first.
pub async fn liked_videos(db: &PgPool, user_id: Uuid) -> ApiResult<Vec<Video>> {
    let rows = sqlx::query_as::<_, Video>(&liked_videos_sql())
        .bind(user_id)
        .fetch_all(db)
        .await?;
    Ok(rows)
}
