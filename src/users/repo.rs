use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{ChannelProfile, HistoryEntry, HistoryRow, NewUser, User};
use crate::{error::ApiResult, videos::repo::VISIBLE_TO_VIEWER};

const USER_COLUMNS: &str = "id, username, email, full_name, password_hash, avatar, \
     avatar_public_id, cover_image, cover_image_public_id, refresh_token, created_at, updated_at";

/// Persistence of user records and their current refresh token.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<User>>;

    /// Matches a user whose username equals `username` or whose email equals `email`.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> ApiResult<Option<User>>;

    async fn create(&self, new_user: NewUser) -> ApiResult<User>;

    /// Overwrites the stored refresh token; `None` clears it.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> ApiResult<()>;

    async fn update_password(&self, id: Uuid, password_hash: &str) -> ApiResult<()>;

    async fn update_account(&self, id: Uuid, full_name: &str, email: &str)
        -> ApiResult<Option<User>>;

    async fn update_avatar(
        &self,
        id: Uuid,
        url: &str,
        public_id: &str,
    ) -> ApiResult<Option<User>>;

    async fn update_cover_image(
        &self,
        id: Uuid,
        url: &str,
        public_id: &str,
    ) -> ApiResult<Option<User>>;
}

#[derive(Clone)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE ($1::text IS NOT NULL AND username = $1)
               OR ($2::text IS NOT NULL AND email = $2)
            LIMIT 1
            "#
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, u: NewUser) -> ApiResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, full_name, password_hash, avatar,
                               avatar_public_id, cover_image, cover_image_public_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&u.username)
        .bind(&u.email)
        .bind(&u.full_name)
        .bind(&u.password_hash)
        .bind(&u.avatar)
        .bind(&u.avatar_public_id)
        .bind(&u.cover_image)
        .bind(&u.cover_image_public_id)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> ApiResult<()> {
        sqlx::query("UPDATE users SET refresh_token = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> ApiResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = now() WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET full_name = $2, email = $3, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(full_name)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_avatar(
        &self,
        id: Uuid,
        url: &str,
        public_id: &str,
    ) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET avatar = $2, avatar_public_id = $3, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(url)
        .bind(public_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn update_cover_image(
        &self,
        id: Uuid,
        url: &str,
        public_id: &str,
    ) -> ApiResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET cover_image = $2, cover_image_public_id = $3, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(url)
        .bind(public_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

/// Channel profile with subscriber counters and whether `viewer_id` follows it.
pub async fn channel_profile(
    db: &PgPool,
    username: &str,
    viewer_id: Uuid,
) -> ApiResult<Option<ChannelProfile>> {
    let profile = sqlx::query_as::<_, ChannelProfile>(
        r#"
        SELECT u.id, u.username, u.email, u.full_name, u.avatar, u.cover_image,
               (SELECT COUNT(*) FROM subscriptions s WHERE s.channel_id = u.id)    AS subscribers_count,
               (SELECT COUNT(*) FROM subscriptions s WHERE s.subscriber_id = u.id) AS channels_subscribed_to_count,
               EXISTS (
                   SELECT 1 FROM subscriptions s
                   WHERE s.channel_id = u.id AND s.subscriber_id = $2
               ) AS is_subscribed
        FROM users u
        WHERE u.username = $1
        "#,
    )
    .bind(username)
    .bind(viewer_id)
    .fetch_optional(db)
    .await?;
    Ok(profile)
}

fn watch_history_sql() -> String {
    format!(
        r#"
        SELECT v.id, v.title, v.description, v.thumbnail, v.video_file, v.duration, v.views,
               v.created_at, h.watched_at,
               o.full_name AS owner_full_name,
               o.username  AS owner_username,
               o.avatar    AS owner_avatar
        FROM watch_history h
        JOIN videos v ON v.id = h.video_id
        JOIN users  o ON o.id = v.owner_id
        WHERE h.user_id = $1 AND {VISIBLE_TO_VIEWER}
        ORDER BY h.watched_at DESC
        "#
    )
}

/// Watch history of a user, most recently watched first, with each video's owner.
/// Videos unpublished since they were watched drop out unless the user owns them.
pub async fn watch_history(db: &PgPool, user_id: Uuid) -> ApiResult<Vec<HistoryEntry>> {
    let rows = sqlx::query_as::<_, HistoryRow>(&watch_history_sql())
        .bind(user_id)
        .fetch_all(db)
        .await?;
    Ok(rows.into_iter().map(HistoryEntry::from).collect())
}

/// Appends a video to the user's history, moving it to the front if already present.
pub async fn record_watch(db: &PgPool, user_id: Uuid, video_id: Uuid) -> ApiResult<()> {
    sqlx::query(
        r#"
        INSERT INTO watch_history (user_id, video_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, video_id) DO UPDATE SET watched_at = now()
        "#,
    )
    .bind(user_id)
    .bind(video_id)
    .execute(db)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_skips_unpublished_videos_of_others() {
        let sql = watch_history_sql();
        assert!(sql.contains("h.user_id = $1 AND (v.is_published OR v.owner_id = $1)"));
    }
}
