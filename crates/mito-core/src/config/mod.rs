//! Deployment-tier configuration for client apps.
//!
//! Provides a unified `AppConfig` used by the CLI (and any other shell) to
//! discover the backend base URL, request timeout and retry budget, plus the
//! realtime and notification tuning knobs.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

const ENV_TIER: &str = "MITO_ENV";
const ENV_API_URL: &str = "MITO_API_URL";
const ENV_TIMEOUT_MS: &str = "MITO_TIMEOUT_MS";
const ENV_RETRY_ATTEMPTS: &str = "MITO_RETRY_ATTEMPTS";

const DEVELOPMENT_API_URL: &str = "http://localhost:3000/api";
const PRODUCTION_API_URL: &str = "https://backend-ticketing-system.up.railway.app/api";
const TESTING_API_URL: &str = "http://localhost:3000/api";

/// Deployment tier the client was started in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    Development,
    #[default]
    Production,
    Testing,
}

impl Environment {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Testing => "testing",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "testing" | "test" => Ok(Self::Testing),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown environment '{other}' (expected development, production or testing)"
            ))),
        }
    }
}

/// Per-tier HTTP settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub environment: Environment,
    /// Backend base URL including the `/api` prefix, without trailing slash.
    pub api_base_url: String,
    /// Per-request timeout applied by the request executor.
    pub timeout: Duration,
    /// Retry budget for network-level failures.
    pub retry_attempts: u32,
}

impl AppConfig {
    /// Built-in defaults for a tier.
    pub fn for_environment(environment: Environment) -> Self {
        let (api_base_url, timeout_ms, retry_attempts) = match environment {
            Environment::Development => (DEVELOPMENT_API_URL, 10_000, 3),
            Environment::Production => (PRODUCTION_API_URL, 15_000, 2),
            Environment::Testing => (TESTING_API_URL, 5_000, 1),
        };
        Self {
            environment,
            api_base_url: api_base_url.to_string(),
            timeout: Duration::from_millis(timeout_ms),
            retry_attempts,
        }
    }

    /// Resolve configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve configuration from an arbitrary variable lookup.
    ///
    /// `MITO_ENV` selects the tier (production when unset); `MITO_API_URL`,
    /// `MITO_TIMEOUT_MS` and `MITO_RETRY_ATTEMPTS` override individual values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let environment = match normalize_text_option(lookup(ENV_TIER)) {
            Some(raw) => raw.parse()?,
            None => Environment::default(),
        };
        let mut config = Self::for_environment(environment);

        if let Some(url) = normalize_text_option(lookup(ENV_API_URL)) {
            config.api_base_url = normalize_base_url(&url)?;
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_TIMEOUT_MS)) {
            let millis = raw.parse::<u64>().map_err(|_| {
                Error::InvalidConfiguration(format!("{ENV_TIMEOUT_MS} must be an integer, got '{raw}'"))
            })?;
            if millis == 0 {
                return Err(Error::InvalidConfiguration(format!(
                    "{ENV_TIMEOUT_MS} must be greater than zero"
                )));
            }
            config.timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = normalize_text_option(lookup(ENV_RETRY_ATTEMPTS)) {
            config.retry_attempts = raw.parse::<u32>().map_err(|_| {
                Error::InvalidConfiguration(format!(
                    "{ENV_RETRY_ATTEMPTS} must be an integer, got '{raw}'"
                ))
            })?;
        }

        Ok(config)
    }

    /// Override the base URL (e.g. for tests or a CLI flag).
    pub fn with_api_base_url(mut self, url: &str) -> Result<Self> {
        self.api_base_url = normalize_base_url(url)?;
        Ok(self)
    }

    /// Absolute URL for an API path such as `/tasks`.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    /// Push endpoint derived from the API base URL.
    pub fn realtime_url(&self) -> Result<String> {
        realtime_url_from_base(&self.api_base_url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::for_environment(Environment::default())
    }
}

/// Realtime channel tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
            connect_timeout: Duration::from_secs(5),
        }
    }
}

/// Notification window tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationConfig {
    /// Entries older than this are dropped by the sweep.
    pub max_age: Duration,
    /// How often the sweep runs.
    pub sweep_interval: Duration,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_age: Duration::from_secs(24 * 60 * 60),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Validate and normalize an HTTP base URL (no trailing slash).
pub fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidConfiguration(
            "API base URL must not be empty".to_string(),
        ));
    }
    if !is_http_url(trimmed) {
        return Err(Error::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}

/// Derive the Socket.IO websocket endpoint from an API base URL.
///
/// Strips a trailing `/api`, swaps the scheme to `ws`/`wss` and appends the
/// Engine.IO v4 websocket path.
pub fn realtime_url_from_base(api_base_url: &str) -> Result<String> {
    let base = normalize_base_url(api_base_url)?;
    let base = base.strip_suffix("/api").unwrap_or(&base);
    let socket_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        return Err(Error::InvalidConfiguration(
            "API base URL must include http:// or https://".to_string(),
        ));
    };
    Ok(format!("{socket_base}/socket.io/?EIO=4&transport=websocket"))
}
