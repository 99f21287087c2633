//! Process configuration resolved from the environment.
//!
//! # Invariants
//! - Blank variables behave as unset.
//! - Invalid values fall back to defaults; resolution never fails.

use log::warn;
use std::path::PathBuf;
use std::time::Duration;

pub const DB_PATH_ENV: &str = "COMPANION_DB_PATH";
pub const RATE_LIMITS_URL_ENV: &str = "COMPANION_RATE_LIMITS_URL";
pub const HTTP_TIMEOUT_ENV: &str = "COMPANION_HTTP_TIMEOUT_SECS";

const DEFAULT_DB_FILE_NAME: &str = "companion_settings.sqlite3";
const DEFAULT_RATE_LIMITS_URL: &str = "https://mobile-apps.home-assistant.io/api/checkRateLimits";
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub rate_limits_url: String,
    pub http_timeout: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            rate_limits_url: DEFAULT_RATE_LIMITS_URL.to_string(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl CoreConfig {
    /// Resolves configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolves configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let http_timeout = match read(HTTP_TIMEOUT_ENV) {
            None => defaults.http_timeout,
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    warn!(
                        "event=config_resolve module=config status=fallback key={} reason=invalid_value",
                        HTTP_TIMEOUT_ENV
                    );
                    defaults.http_timeout
                }
            },
        };

        Self {
            db_path: read(DB_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            rate_limits_url: read(RATE_LIMITS_URL_ENV).unwrap_or(defaults.rate_limits_url),
            http_timeout,
        }
    }
}
