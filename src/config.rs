use anyhow::Context;
use serde::Deserialize;

use crate::auth::password::DEFAULT_MIN_PASSWORD_LEN;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base used to build asset URLs; falls back to `{endpoint}/{bucket}`.
    pub public_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub cors_origin: Option<String>,
    pub upload_dir: String,
    pub upload_limit_mb: usize,
    pub revoke_sessions_on_password_change: bool,
    pub min_password_len: usize,
    pub app_host: String,
    pub app_port: u16,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| var(key).with_context(|| format!("{} is not set", key));

        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            access_secret: required("ACCESS_TOKEN_SECRET")?,
            refresh_secret: required("REFRESH_TOKEN_SECRET")?,
            issuer: var("JWT_ISSUER").unwrap_or_else(|| "vidhub".into()),
            audience: var("JWT_AUDIENCE").unwrap_or_else(|| "vidhub-users".into()),
            access_ttl_minutes: parsed(&var, "ACCESS_TOKEN_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: parsed(&var, "REFRESH_TOKEN_TTL_MINUTES").unwrap_or(60 * 24 * 10),
        };
        if jwt.access_secret == jwt.refresh_secret {
            tracing::warn!("access and refresh tokens share a signing secret");
        }
        let storage = StorageConfig {
            endpoint: required("S3_ENDPOINT")?,
            bucket: required("S3_BUCKET")?,
            access_key: required("S3_ACCESS_KEY")?,
            secret_key: required("S3_SECRET_KEY")?,
            region: var("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            public_url: var("S3_PUBLIC_URL"),
        };
        Ok(Self {
            database_url,
            jwt,
            storage,
            cors_origin: var("CORS_ORIGIN").filter(|v| !v.is_empty()),
            upload_dir: var("UPLOAD_DIR").unwrap_or_else(|| "./public/temp".into()),
            upload_limit_mb: parsed(&var, "UPLOAD_LIMIT_MB").unwrap_or(100),
            revoke_sessions_on_password_change: parsed(&var, "REVOKE_SESSIONS_ON_PASSWORD_CHANGE")
                .unwrap_or(false),
            min_password_len: parsed(&var, "PASSWORD_MIN_LENGTH").unwrap_or(DEFAULT_MIN_PASSWORD_LEN),
            app_host: var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            app_port: parsed(&var, "APP_PORT").unwrap_or(8000),
        })
    }
}

fn parsed<T: std::str::FromStr>(var: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    var(key).and_then(|v| v.parse::<T>().ok())
}
