use anyhow::{Result, anyhow};
use platform_db::DatabaseSettings;

pub const DEFAULT_ACTOR_ID_HEADER: &str = "x-actor-id";
pub const DEFAULT_ACTOR_ROLE_HEADER: &str = "x-actor-role";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub cors_allowed_origins: Vec<String>,
    /// Headers the upstream authentication proxy uses to pass the actor.
    pub actor_id_header: String,
    pub actor_role_header: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseSettings::default(),
            cors_allowed_origins: vec!["http://localhost:3000".into()],
            actor_id_header: DEFAULT_ACTOR_ID_HEADER.into(),
            actor_role_header: DEFAULT_ACTOR_ROLE_HEADER.into(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let defaults = Self::default();

        let database = std::env::var("DATABASE_URL_ENV")
            .map(DatabaseSettings::new)
            .unwrap_or_default();

        let cors_allowed_origins = match std::env::var("CORS_ALLOWED_ORIGINS") {
            Ok(raw) => split_list(&raw),
            Err(_) => defaults.cors_allowed_origins,
        };

        let actor_id_header = header_name("ACTOR_ID_HEADER", defaults.actor_id_header)?;
        let actor_role_header = header_name("ACTOR_ROLE_HEADER", defaults.actor_role_header)?;

        Ok(Self {
            database,
            cors_allowed_origins,
            actor_id_header,
            actor_role_header,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}

fn header_name(key: &str, default: String) -> Result<String> {
    let value = std::env::var(key).unwrap_or(default).to_ascii_lowercase();
    axum::http::HeaderName::from_bytes(value.as_bytes())
        .map_err(|_| anyhow!("{key} is not a valid header name: {value}"))?;
    Ok(value)
}
