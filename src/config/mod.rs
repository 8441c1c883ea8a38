//! Client configuration (layered: code > env > `.env` file).

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use bon::Builder;
use strum::{Display, EnumString};

use crate::error::{Result, SessionError};

pub const DEFAULT_TENANT: &str = "default";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Host runtime the client is embedded in; decides where the session lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Platform {
    /// Browser host: the session is kept in memory only.
    #[default]
    Web,
    /// Mobile/desktop host: the session is kept in owner-only storage.
    Native,
}

/// Connection and storage settings for one LMS tenant.
///
/// # Example
/// ```
/// use lms_session::config::{ClientConfig, Platform};
///
/// let config = ClientConfig::builder()
///     .api_base_url("https://lms.example.com/api")
///     .tenant("acme-academy")
///     .platform(Platform::Native)
///     .build();
/// assert_eq!(config.tenant, "acme-academy");
/// ```
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    #[builder(into)]
    pub api_base_url: String,
    #[builder(into, default = String::from(DEFAULT_TENANT))]
    pub tenant: String,
    #[builder(default)]
    pub platform: Platform,
    #[builder(default = default_token_dir())]
    pub token_dir: PathBuf,
    #[builder(default = Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))]
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Load from environment variables, reading `.env` first if present.
    ///
    /// `LMS_API_BASE_URL` is required; `LMS_TENANT`, `LMS_PLATFORM`,
    /// `LMS_TOKEN_DIR` and `LMS_REQUEST_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ClientConfig::from_env`] over an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_base_url = lookup("LMS_API_BASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| SessionError::Configuration("LMS_API_BASE_URL is not set".into()))?;

        let mut config = Self::builder().api_base_url(api_base_url).build();

        if let Some(tenant) = lookup("LMS_TENANT").filter(|v| !v.trim().is_empty()) {
            config.tenant = tenant;
        }
        if let Some(platform) = lookup("LMS_PLATFORM") {
            config.platform = Platform::from_str(platform.trim()).map_err(|_| {
                SessionError::Configuration(format!(
                    "LMS_PLATFORM must be `web` or `native`, got `{platform}`"
                ))
            })?;
        }
        if let Some(dir) = lookup("LMS_TOKEN_DIR") {
            config.token_dir = PathBuf::from(dir);
        }
        if let Some(secs) = lookup("LMS_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                SessionError::Configuration(format!(
                    "LMS_REQUEST_TIMEOUT_SECS must be a number of seconds, got `{secs}`"
                ))
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Absolute URL of an API path such as `/auth/refresh`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// HTTP client with the configured request timeout.
    pub fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| SessionError::Configuration(format!("failed to build HTTP client: {e}")))
    }
}

fn default_token_dir() -> PathBuf {
    directories::UserDirs::new()
        .map(|dirs| dirs.home_dir().join(".lms-session"))
        .unwrap_or_else(|| PathBuf::from(".lms-session"))
}
