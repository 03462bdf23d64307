//! Service settings read from the environment (and an optional `.env` file)

use crate::{CoreError, CoreResult};
use graphmail_auth::{microsoft, OAuth2Config};
use graphmail_graph::GraphEndpoints;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const DEFAULT_RETRIEVAL_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Everything the composition root needs to wire the service together
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// SQLite database file holding retrieved emails
    pub database_path: PathBuf,
    pub oauth: OAuth2Config,
    pub graph: GraphEndpoints,
    /// How often recent mail is pulled from the provider
    pub retrieval_interval: Duration,
    /// Treat tokens as expired this many seconds early
    pub token_expiry_margin_secs: u64,
}

impl Settings {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> CoreResult<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => return Err(CoreError::ConfigError(format!(".env: {}", e))),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| CoreError::ConfigError(format!("{} is not set", key)))
        };

        let authority = match (get("MS_AUTHORITY"), get("MS_TENANT_ID")) {
            (Some(authority), _) => authority,
            (None, Some(tenant)) => microsoft::authority(&tenant),
            (None, None) => {
                return Err(CoreError::ConfigError(
                    "MS_AUTHORITY or MS_TENANT_ID must be set".to_string(),
                ))
            }
        };

        let scopes = match get("MS_SCOPE") {
            Some(scope) => scope
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            None => microsoft::MAIL_SCOPES.iter().map(|s| s.to_string()).collect(),
        };

        let defaults = GraphEndpoints::default();
        let graph = GraphEndpoints {
            send_mail_url: get("SEND_EMAIL_URL").unwrap_or(defaults.send_mail_url),
            messages_url: get("RETRIEVE_EMAIL_URL").unwrap_or(defaults.messages_url),
        };

        let interval_secs: u64 = parse_or(
            get("EMAIL_RETRIEVAL_INTERVAL"),
            "EMAIL_RETRIEVAL_INTERVAL",
            DEFAULT_RETRIEVAL_INTERVAL_SECS,
        )?;
        if interval_secs == 0 {
            return Err(CoreError::ConfigError(
                "EMAIL_RETRIEVAL_INTERVAL must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            host: get("HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port: parse_or(get("PORT"), "PORT", 8000)?,
            database_path: PathBuf::from(
                get("DATABASE_PATH").unwrap_or_else(|| "graphmail.db".to_string()),
            ),
            oauth: OAuth2Config {
                client_id: require("MS_CLIENT_ID")?,
                client_secret: require("MS_CLIENT_SECRET")?,
                authority,
                scopes,
                redirect_uri: require("REDIRECT_URI")?,
            },
            graph,
            retrieval_interval: Duration::from_secs(interval_secs),
            token_expiry_margin_secs: parse_or(
                get("TOKEN_EXPIRY_MARGIN_SECS"),
                "TOKEN_EXPIRY_MARGIN_SECS",
                0,
            )?,
        })
    }

    /// Socket address string for the HTTP listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> CoreResult<T>
where
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| CoreError::ConfigError(format!("{}={:?}: {}", key, raw, e))),
        None => Ok(default),
    }
}
