use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    repo::UserStore,
    repo_types::{NewUser, User},
};
use crate::error::{ApiError, ApiResult};

/// In-memory `UserStore` for tests.
#[derive(Default)]
pub struct MemoryUserStore {
    pub users: Mutex<Vec<User>>,
    /// When set, `create` and the image updates fail like a lost database.
    pub fail_profile_writes: AtomicBool,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.users.lock().unwrap().len()
    }

    pub fn stored_refresh_token(&self, id: Uuid) -> Option<String> {
        self.users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .and_then(|u| u.refresh_token.clone())
    }

    fn check_writable(&self) -> ApiResult<()> {
        if self.fail_profile_writes.load(Ordering::SeqCst) {
            return Err(ApiError::Internal(anyhow::anyhow!("user store unavailable")));
        }
        Ok(())
    }

    fn update<F: FnOnce(&mut User)>(&self, id: Uuid, f: F) -> Option<User> {
        let mut users = self.users.lock().unwrap();
        let user = users.iter_mut().find(|u| u.id == id)?;
        f(user);
        user.updated_at = OffsetDateTime::now_utc();
        Some(user.clone())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: Uuid) -> ApiResult<Option<User>> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> ApiResult<Option<User>> {
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .find(|u| {
                username.is_some_and(|n| u.username == n) || email.is_some_and(|e| u.email == e)
            })
            .cloned())
    }

    async fn create(&self, n: NewUser) -> ApiResult<User> {
        self.check_writable()?;
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| u.username == n.username || u.email == n.email)
        {
            return Err(ApiError::conflict("Resource already exists"));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: n.username,
            email: n.email,
            full_name: n.full_name,
            password_hash: n.password_hash,
            avatar: n.avatar,
            avatar_public_id: n.avatar_public_id,
            cover_image: n.cover_image,
            cover_image_public_id: n.cover_image_public_id,
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> ApiResult<()> {
        self.update(id, |u| u.refresh_token = token.map(str::to_string));
        Ok(())
    }

    async fn update_password(&self, id: Uuid, password_hash: &str) -> ApiResult<()> {
        self.update(id, |u| u.password_hash = password_hash.to_string());
        Ok(())
    }

    async fn update_account(
        &self,
        id: Uuid,
        full_name: &str,
        email: &str,
    ) -> ApiResult<Option<User>> {
        Ok(self.update(id, |u| {
            u.full_name = full_name.to_string();
            u.email = email.to_string();
        }))
    }

    async fn update_avatar(
        &self,
        id: Uuid,
        url: &str,
        public_id: &str,
    ) -> ApiResult<Option<User>> {
        self.check_writable()?;
        Ok(self.update(id, |u| {
            u.avatar = url.to_string();
            u.avatar_public_id = Some(public_id.to_string());
        }))
    }

    async fn update_cover_image(
        &self,
        id: Uuid,
        url: &str,
        public_id: &str,
    ) -> ApiResult<Option<User>> {
        self.check_writable()?;
        Ok(self.update(id, |u| {
            u.cover_image = Some(url.to_string());
            u.cover_image_public_id = Some(public_id.to_string());
        }))
    }
}
