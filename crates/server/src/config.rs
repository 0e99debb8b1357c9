use std::env;
use std::net::IpAddr;

use thiserror::Error;
use tracing::{info, warn};
use url::Url;

pub const DEFAULT_PORT: u16 = 8789;
pub const DEFAULT_DB_URL: &str = "sqlite://quiz-sync.sqlite3";
pub const DEFAULT_ALLOWED_ORIGINS: [&str; 2] =
    ["https://cscs-quiz-html.pages.dev", "http://localhost:8789"];

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: IpAddr,
    pub port: u16,
    pub db_url: String,
    /// Serialized origins (`scheme://host[:port]`) browsers may call from.
    pub allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            db_url: DEFAULT_DB_URL.to_owned(),
            allowed_origins: DEFAULT_ALLOWED_ORIGINS.iter().map(|o| (*o).to_owned()).collect(),
        }
    }
}

impl Config {
    /// Read the `QUIZ_SYNC_*` environment variables, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a variable is set but unusable.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` when a variable is set but unusable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let var = |key: &'static str| {
            let value = lookup(key).filter(|v| !v.trim().is_empty());
            if value.is_none() {
                info!("{key} not set, using default");
            }
            value.map(|v| v.trim().to_owned())
        };

        if let Some(raw) = var("QUIZ_SYNC_BIND") {
            config.bind = raw.parse().map_err(|e: std::net::AddrParseError| {
                invalid("QUIZ_SYNC_BIND", &raw, e.to_string())
            })?;
        }
        if let Some(raw) = var("QUIZ_SYNC_PORT") {
            config.port = raw.parse().map_err(|e: std::num::ParseIntError| {
                invalid("QUIZ_SYNC_PORT", &raw, e.to_string())
            })?;
        }
        if let Some(raw) = var("QUIZ_SYNC_DB_URL") {
            config.db_url = raw;
        }
        if let Some(raw) = var("QUIZ_SYNC_ALLOWED_ORIGINS") {
            config.allowed_origins = raw
                .split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .map(parse_origin)
                .collect::<Result<_, _>>()?;
            if config.allowed_origins.is_empty() {
                warn!("QUIZ_SYNC_ALLOWED_ORIGINS lists no origins, browser calls will be refused");
            }
        }
        Ok(config)
    }

    #[must_use]
    pub fn allows_origin(&self, origin: &str) -> bool {
        self.allowed_origins.iter().any(|allowed| allowed == origin)
    }
}

fn invalid(key: &'static str, value: &str, reason: String) -> ConfigError {
    warn!("Invalid {key} value: {reason}");
    ConfigError::Invalid {
        key,
        value: value.to_owned(),
        reason,
    }
}

fn parse_origin(raw: &str) -> Result<String, ConfigError> {
    let key = "QUIZ_SYNC_ALLOWED_ORIGINS";
    let url = Url::parse(raw).map_err(|e| invalid(key, raw, e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(key, raw, "origin must be http or https".into()));
    }
    if url.path() != "/" || url.query().is_some() {
        return Err(invalid(key, raw, "origin must not carry a path".into()));
    }
    Ok(url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.port, 8789);
        assert!(config.allows_origin("http://localhost:8789"));
    }

    #[test]
    fn origins_are_normalized() {
        let config = load(&[(
            "QUIZ_SYNC_ALLOWED_ORIGINS",
            "https://quiz.example.com/ , http://127.0.0.1:3000",
        )])
        .unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://quiz.example.com", "http://127.0.0.1:3000"]
        );
        assert!(!config.allows_origin("http://localhost:8789"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(load(&[("QUIZ_SYNC_PORT", "eighty")]).is_err());
        assert!(load(&[("QUIZ_SYNC_BIND", "localhost")]).is_err());
        assert!(load(&[("QUIZ_SYNC_ALLOWED_ORIGINS", "https://quiz.example.com/app")]).is_err());
        assert!(load(&[("QUIZ_SYNC_ALLOWED_ORIGINS", "ftp://quiz.example.com")]).is_err());
    }
}
