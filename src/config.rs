use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Which `Store` implementation backs the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres { database_url: String },
    Local { dir: PathBuf },
}

#[derive(Debug, Clone, Deserialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OAuthConfig {
    pub google: Option<OAuthClient>,
    pub linkedin: Option<OAuthClient>,
    pub apple_mock: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub store: StoreBackend,
    pub jwt: JwtConfig,
    pub public_url: String,
    pub reset_token_ttl_minutes: i64,
    pub oauth: OAuthConfig,
    pub pomodoro_advance_delay_ms: u64,
    /// An idle timer task with no commands for this long shuts down.
    pub pomodoro_idle_timeout_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let store = match env_or("STORE_BACKEND", "postgres").as_str() {
            "postgres" => StoreBackend::Postgres {
                database_url: std::env::var("DATABASE_URL")
                    .context("DATABASE_URL is required for the postgres store")?,
            },
            "local" => StoreBackend::Local {
                dir: PathBuf::from(env_or("LOCAL_STORE_DIR", "./data")),
            },
            other => anyhow::bail!("unknown STORE_BACKEND {other:?} (expected postgres or local)"),
        };

        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is required")?,
            issuer: env_or("JWT_ISSUER", "worksync"),
            audience: env_or("JWT_AUDIENCE", "worksync-users"),
            ttl_minutes: env_parse("JWT_TTL_MINUTES", 60),
            refresh_ttl_minutes: env_parse("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 14),
        };

        let oauth = OAuthConfig {
            google: oauth_client("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
            linkedin: oauth_client("LINKEDIN_CLIENT_ID", "LINKEDIN_CLIENT_SECRET"),
            apple_mock: env_parse("APPLE_MOCK_ENABLED", false),
        };

        Ok(Self {
            store,
            jwt,
            public_url: env_or("PUBLIC_URL", "http://localhost:3000")
                .trim_end_matches('/')
                .to_string(),
            reset_token_ttl_minutes: env_parse("RESET_TOKEN_TTL_MINUTES", 60),
            oauth,
            pomodoro_advance_delay_ms: env_parse("POMODORO_ADVANCE_DELAY_MS", 2000),
            pomodoro_idle_timeout_secs: env_parse("POMODORO_IDLE_TIMEOUT_SECS", 30 * 60),
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn oauth_client(id_key: &str, secret_key: &str) -> Option<OAuthClient> {
    let client_id = std::env::var(id_key).ok()?;
    let client_secret = std::env::var(secret_key).ok()?;
    configured_client(client_id, client_secret)
}

/// Credentials left empty or still holding the `.env.example` placeholders
/// leave the provider disabled.
pub(crate) fn configured_client(client_id: String, client_secret: String) -> Option<OAuthClient> {
    let placeholder = |v: &str| v.trim().is_empty() || v.starts_with("your-");
    if placeholder(&client_id) || placeholder(&client_secret) {
        return None;
    }
    Some(OAuthClient {
        client_id,
        client_secret,
    })
}
