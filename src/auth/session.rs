//! Session lifecycle: registration, login, refresh-token rotation, logout and
//! password change.
//!
//! Exactly one refresh token is valid per user. It is mirrored into the user
//! record; issuing a new one overwrites the old, so a replayed token fails the
//! equality check in [`SessionManager::refresh`] even while its signature and
//! expiry are still valid.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    jwt::{TokenError, TokenPair, TokenService},
    password::{hash_password, verify_password, DEFAULT_MIN_PASSWORD_LEN},
};
use crate::{
    config::AppConfig,
    error::{ApiError, ApiResult},
    storage::UploadedAsset,
    users::{
        repo::UserStore,
        repo_types::{NewUser, PublicUser, User},
    },
};

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Usernames and emails are stored trimmed and lower-cased.
pub(crate) fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Tunables of the session lifecycle, taken from `AppConfig`.
#[derive(Debug, Clone, Copy)]
pub struct SessionPolicy {
    pub min_password_len: usize,
    pub revoke_on_password_change: bool,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            min_password_len: DEFAULT_MIN_PASSWORD_LEN,
            revoke_on_password_change: false,
        }
    }
}

impl SessionPolicy {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            min_password_len: cfg.min_password_len,
            revoke_on_password_change: cfg.revoke_sessions_on_password_change,
        }
    }

    fn ensure_password_strength(&self, password: &str) -> ApiResult<()> {
        if password.chars().count() < self.min_password_len {
            return Err(ApiError::bad_request(format!(
                "Password must be at least {} characters",
                self.min_password_len
            )));
        }
        Ok(())
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Signing(inner) => ApiError::Internal(anyhow::Error::new(inner)),
            TokenError::Expired => ApiError::unauthorized("Token expired"),
            TokenError::Invalid | TokenError::WrongKind => ApiError::unauthorized("Invalid token"),
        }
    }
}

/// Validated registration fields, normalized.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: String,
    pub email: String,
    pub full_name: String,
    pub password: String,
}

impl Registration {
    pub fn parse(
        username: Option<String>,
        email: Option<String>,
        full_name: Option<String>,
        password: Option<String>,
    ) -> ApiResult<Self> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (Some(username), Some(email), Some(full_name), Some(password)) = (
            present(username),
            present(email),
            present(full_name),
            present(password),
        ) else {
            return Err(ApiError::bad_request("All fields are required"));
        };

        let email = normalize(&email);
        if !is_valid_email(&email) {
            return Err(ApiError::bad_request("Invalid email"));
        }

        Ok(Self {
            username: normalize(&username),
            email,
            full_name: full_name.trim().to_string(),
            password,
        })
    }
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: PublicUser,
    pub tokens: TokenPair,
}

pub struct SessionManager {
    users: Arc<dyn UserStore>,
    tokens: Arc<TokenService>,
    policy: SessionPolicy,
}

impl SessionManager {
    pub fn new(users: Arc<dyn UserStore>, tokens: Arc<TokenService>, policy: SessionPolicy) -> Self {
        Self {
            users,
            tokens,
            policy,
        }
    }

    /// Password rule first, then `Conflict` when the username or email is taken.
    pub async fn check_registration(&self, reg: &Registration) -> ApiResult<()> {
        self.policy.ensure_password_strength(&reg.password)?;
        let existing = self
            .users
            .find_by_username_or_email(Some(&reg.username), Some(&reg.email))
            .await?;
        if existing.is_some() {
            warn!(username = %reg.username, email = %reg.email, "registration collides");
            return Err(ApiError::conflict("User with email or username already exists"));
        }
        Ok(())
    }

    #[instrument(skip_all, fields(username = %reg.username))]
    pub async fn register(
        &self,
        reg: Registration,
        avatar: UploadedAsset,
        cover: Option<UploadedAsset>,
    ) -> ApiResult<PublicUser> {
        self.check_registration(&reg).await?;
        let password_hash = hash_password(&reg.password)?;
        let (cover_image, cover_image_public_id) = match cover {
            Some(c) => (Some(c.url), Some(c.public_id)),
            None => (None, None),
        };
        let user = self
            .users
            .create(NewUser {
                username: reg.username,
                email: reg.email,
                full_name: reg.full_name,
                password_hash,
                avatar: avatar.url,
                avatar_public_id: Some(avatar.public_id),
                cover_image,
                cover_image_public_id,
            })
            .await?;
        info!(user_id = %user.id, "user registered");
        Ok(user.into())
    }

    /// Issues a fresh pair and persists its refresh token, replacing any previous one.
    async fn open_session(&self, user: &User) -> ApiResult<TokenPair> {
        let pair = self.tokens.issue_pair(user)?;
        self.users
            .set_refresh_token(user.id, Some(&pair.refresh_token))
            .await?;
        Ok(pair)
    }

    #[instrument(skip_all)]
    pub async fn login(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        password: &str,
    ) -> ApiResult<LoginOutcome> {
        let username = username.map(normalize).filter(|s| !s.is_empty());
        let email = email.map(normalize).filter(|s| !s.is_empty());
        if username.is_none() && email.is_none() {
            return Err(ApiError::bad_request("Username or email is required"));
        }

        let user = self
            .users
            .find_by_username_or_email(username.as_deref(), email.as_deref())
            .await?
            .ok_or_else(|| ApiError::not_found("User does not exist"))?;

        if !verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "login invalid password");
            return Err(ApiError::unauthorized("Invalid user credentials"));
        }

        let tokens = self.open_session(&user).await?;
        info!(user_id = %user.id, "user logged in");
        Ok(LoginOutcome {
            user: user.into(),
            tokens,
        })
    }

    #[instrument(skip_all)]
    pub async fn refresh(&self, presented: Option<&str>) -> ApiResult<TokenPair> {
        let presented = presented
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ApiError::unauthorized("Unauthorized request"))?;

        let claims = self.tokens.verify_refresh(presented).map_err(|e| {
            warn!(error = %e, "refresh token rejected");
            ApiError::unauthorized("Invalid refresh token")
        })?;

        let user = self
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid refresh token"))?;

        if user.refresh_token.as_deref() != Some(presented) {
            warn!(user_id = %user.id, "stale refresh token presented");
            return Err(ApiError::unauthorized("Refresh token is expired or used"));
        }

        let pair = self.open_session(&user).await?;
        info!(user_id = %user.id, "tokens refreshed");
        Ok(pair)
    }

    #[instrument(skip(self))]
    pub async fn logout(&self, user_id: Uuid) -> ApiResult<()> {
        self.users.set_refresh_token(user_id, None).await?;
        info!(user_id = %user_id, "user logged out");
        Ok(())
    }

    #[instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        user_id: Uuid,
        old_password: &str,
        new_password: &str,
    ) -> ApiResult<()> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| ApiError::not_found("User does not exist"))?;

        if !verify_password(old_password, &user.password_hash)? {
            return Err(ApiError::bad_request("Invalid old password"));
        }
        self.policy.ensure_password_strength(new_password)?;

        let hash = hash_password(new_password)?;
        self.users.update_password(user_id, &hash).await?;
        if self.policy.revoke_on_password_change {
            self.users.set_refresh_token(user_id, None).await?;
        }
        info!(user_id = %user_id, "password changed");
        Ok(())
    }
}
