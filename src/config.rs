/// Session configuration
use crate::error::{Result, SessionError};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Settings for the API client and its identity provider
///
/// Every tunable has a default; only the three URLs are required.
///
/// ```
/// use ausweis::config::SessionConfig;
///
/// let config = SessionConfig::from_json_str(r#"{
///     "api_base_url": "https://api.example.com",
///     "refresh_url": "https://api.example.com/auth/refresh",
///     "revoke_url": "https://api.example.com/auth/logout"
/// }"#).unwrap();
/// assert_eq!(config.renewal_threshold_minutes, 2);
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub api_base_url: Url,
    pub refresh_url: Url,
    pub revoke_url: Url,

    /// Renew pre-emptively once this close to expiry
    #[serde(default = "default_threshold_minutes")]
    pub renewal_threshold_minutes: u64,

    /// Background loop period
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Response header carrying an out-of-band replacement access token
    #[serde(default = "default_replacement_header")]
    pub replacement_token_header: String,

    /// Paths whose 401 responses never trigger a renewal
    #[serde(default = "default_auth_paths")]
    pub auth_paths: Vec<String>,
}

/// Longest accepted renewal threshold, one day
const MAX_THRESHOLD_MINUTES: u64 = 24 * 60;

/// Longest accepted background check period, one day
const MAX_CHECK_INTERVAL_SECS: u64 = 24 * 60 * 60;

fn default_threshold_minutes() -> u64 {
    2
}

fn default_check_interval_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_replacement_header() -> String {
    "x-access-token".to_string()
}

fn default_auth_paths() -> Vec<String> {
    vec!["/auth/login".to_string(), "/auth/refresh".to_string()]
}

impl SessionConfig {
    /// Configuration with default tunables for the given endpoints
    pub fn new(api_base_url: Url, refresh_url: Url, revoke_url: Url) -> Self {
        Self {
            api_base_url,
            refresh_url,
            revoke_url,
            renewal_threshold_minutes: default_threshold_minutes(),
            check_interval_secs: default_check_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            replacement_token_header: default_replacement_header(),
            auth_paths: default_auth_paths(),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.renewal_threshold_minutes > MAX_THRESHOLD_MINUTES {
            return Err(SessionError::Config(format!(
                "renewal_threshold_minutes must be at most {}",
                MAX_THRESHOLD_MINUTES
            )));
        }
        if self.check_interval_secs == 0 || self.check_interval_secs > MAX_CHECK_INTERVAL_SECS {
            return Err(SessionError::Config(format!(
                "check_interval_secs must be between 1 and {}",
                MAX_CHECK_INTERVAL_SECS
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(SessionError::Config(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if reqwest::header::HeaderName::from_bytes(self.replacement_token_header.as_bytes())
            .is_err()
        {
            return Err(SessionError::Config(format!(
                "invalid header name: {}",
                self.replacement_token_header
            )));
        }
        for url in [&self.api_base_url, &self.refresh_url, &self.revoke_url] {
            if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
                return Err(SessionError::Config(format!("not an http(s) URL: {}", url)));
            }
        }
        Ok(())
    }

    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether `path` is a login or refresh endpoint
    pub fn is_auth_path(&self, path: &str) -> bool {
        path_in(&self.auth_paths, path)
    }
}

/// Whether `path` names one of `paths`, ignoring query and trailing slash
pub(crate) fn path_in(paths: &[String], path: &str) -> bool {
    let path = path.split('?').next().unwrap_or(path).trim_end_matches('/');
    paths.iter().any(|p| p.trim_end_matches('/') == path)
}
