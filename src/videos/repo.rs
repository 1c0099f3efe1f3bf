use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{NewVideo, SortBy, SortType, Video};
use crate::error::ApiResult;

const VIDEO_COLUMNS: &str = "id, owner_id, title, description, video_file, video_public_id, \
     thumbnail, thumbnail_public_id, duration, views, is_published, created_at, updated_at";

/// Row filter for joins aliasing videos as `v`, with the viewer bound as `$1`.
pub(crate) const VISIBLE_TO_VIEWER: &str = "(v.is_published OR v.owner_id = $1)";

/// ORDER BY clause from whitelisted values only; ties broken by id for stable paging.
fn order_clause(sort_by: SortBy, sort_type: SortType) -> String {
    format!("{} {}, id {}", sort_by.column(), sort_type.keyword(), sort_type.keyword())
}

/// Published videos of `owner_id`, optionally filtered by a title/description search.
pub async fn list_published_by_owner(
    db: &PgPool,
    owner_id: Uuid,
    search: Option<&str>,
    sort_by: SortBy,
    sort_type: SortType,
    limit: i64,
    offset: i64,
) -> ApiResult<Vec<Video>> {
    let pattern = search.map(|q| format!("%{}%", q));
    let rows = sqlx::query_as::<_, Video>(&format!(
        r#"
        SELECT {VIDEO_COLUMNS}
        FROM videos
        WHERE owner_id = $1
          AND is_published
          AND ($2::text IS NULL OR title ILIKE $2 OR description ILIKE $2)
        ORDER BY {}
        LIMIT $3 OFFSET $4
        "#,
        order_clause(sort_by, sort_type)
    ))
    .bind(owner_id)
    .bind(pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> ApiResult<Option<Video>> {
    let video = sqlx::query_as::<_, Video>(&format!(
        "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(video)
}

pub async fn exists(db: &PgPool, id: Uuid) -> ApiResult<bool> {
    let found: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM videos WHERE id = $1)")
        .bind(id)
        .fetch_one(db)
        .await?;
    Ok(found)
}

pub async fn create(db: &PgPool, v: &NewVideo) -> ApiResult<Video> {
    let video = sqlx::query_as::<_, Video>(&format!(
        r#"
        INSERT INTO videos (owner_id, title, description, video_file, video_public_id,
                            thumbnail, thumbnail_public_id, duration)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(v.owner_id)
    .bind(&v.title)
    .bind(&v.description)
    .bind(&v.video_file)
    .bind(&v.video_public_id)
    .bind(&v.thumbnail)
    .bind(&v.thumbnail_public_id)
    .bind(v.duration)
    .fetch_one(db)
    .await?;
    Ok(video)
}

/// Updates title/description and, when given, the thumbnail.
pub async fn update_details(
    db: &PgPool,
    id: Uuid,
    title: &str,
    description: &str,
    thumbnail: Option<(&str, &str)>,
) -> ApiResult<Option<Video>> {
    let (thumb_url, thumb_id) = thumbnail.unzip();
    let video = sqlx::query_as::<_, Video>(&format!(
        r#"
        UPDATE videos
        SET title = $2,
            description = $3,
            thumbnail = COALESCE($4, thumbnail),
            thumbnail_public_id = COALESCE($5, thumbnail_public_id),
            updated_at = now()
        WHERE id = $1
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(thumb_url)
    .bind(thumb_id)
    .fetch_optional(db)
    .await?;
    Ok(video)
}

pub async fn delete(db: &PgPool, id: Uuid) -> ApiResult<bool> {
    let res = sqlx::query("DELETE FROM videos WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(res.rows_affected() > 0)
}

pub async fn toggle_published(db: &PgPool, id: Uuid) -> ApiResult<Option<Video>> {
    let video = sqlx::query_as::<_, Video>(&format!(
        r#"
        UPDATE videos SET is_published = NOT is_published, updated_at = now()
        WHERE id = $1
        RETURNING {VIDEO_COLUMNS}
        "#
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(video)
}

pub async fn increment_views(db: &PgPool, id: Uuid) -> ApiResult<()> {
    sqlx::query("UPDATE videos SET views = views + 1 WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}
