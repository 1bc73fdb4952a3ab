/// Identity provider refresh and revoke exchanges
use crate::config::SessionConfig;
use crate::error::{RenewalError, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

/// Response of a refresh exchange
///
/// A missing `refresh_token` means the provider does not rotate refresh
/// tokens and the current one stays valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RefreshGrant {
    #[serde(rename = "accessToken", alias = "access_token")]
    pub access_token: String,

    #[serde(rename = "refreshToken", alias = "refresh_token", default)]
    pub refresh_token: Option<String>,

    #[serde(
        rename = "expiresInSeconds",
        alias = "expires_in",
        alias = "expiresIn"
    )]
    pub expires_in: u64,
}

/// The token endpoints of the identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Trade a refresh token for a new access token
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<RefreshGrant, RenewalError>;

    /// Invalidate a refresh token server-side
    async fn revoke(&self, refresh_token: &str) -> std::result::Result<(), RenewalError>;
}

#[derive(Serialize)]
struct RefreshTokenBody<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

/// [`IdentityProvider`] speaking JSON over HTTP
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    refresh_url: Url,
    revoke_url: Url,
}

impl HttpIdentityProvider {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            http,
            refresh_url: config.refresh_url.clone(),
            revoke_url: config.revoke_url.clone(),
        })
    }

    async fn post(&self, url: &Url, refresh_token: &str) -> std::result::Result<reqwest::Response, RenewalError> {
        let response = self
            .http
            .post(url.clone())
            .json(&RefreshTokenBody { refresh_token })
            .send()
            .await
            .map_err(|e| RenewalError::Network(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(status, body))
    }
}

/// Map a non-success status to a renewal error
///
/// Client errors mean the refresh token itself was refused; anything else
/// is treated as a transport problem.
fn classify_failure(status: StatusCode, body: String) -> RenewalError {
    let detail = if body.is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body)
    };

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            RenewalError::Rejected(detail)
        }
        _ => RenewalError::Network(detail),
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<RefreshGrant, RenewalError> {
        let response = self.post(&self.refresh_url, refresh_token).await?;
        response
            .json::<RefreshGrant>()
            .await
            .map_err(|e| RenewalError::Network(format!("invalid refresh response: {}", e)))
    }

    async fn revoke(&self, refresh_token: &str) -> std::result::Result<(), RenewalError> {
        self.post(&self.revoke_url, refresh_token).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_without_rotation() {
        let grant: RefreshGrant =
            serde_json::from_str(r#"{"accessToken":"a2","expiresInSeconds":3600}"#).unwrap();
        assert_eq!(grant.access_token, "a2");
        assert_eq!(grant.refresh_token, None);
        assert_eq!(grant.expires_in, 3600);
    }

    #[test]
    fn test_grant_accepts_snake_case() {
        let grant: RefreshGrant = serde_json::from_str(
            r#"{"access_token":"a2","refresh_token":"r2","expires_in":60}"#,
        )
        .unwrap();
        assert_eq!(grant.refresh_token.as_deref(), Some("r2"));
        assert_eq!(grant.expires_in, 60);
    }

    #[test]
    fn test_grant_requires_lifetime() {
        assert!(serde_json::from_str::<RefreshGrant>(r#"{"accessToken":"a2"}"#).is_err());
    }

    #[test]
    fn test_classify_failure() {
        assert!(matches!(
            classify_failure(StatusCode::UNAUTHORIZED, "revoked".into()),
            RenewalError::Rejected(msg) if msg.contains("revoked")
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, String::new()),
            RenewalError::Rejected(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::BAD_GATEWAY, String::new()),
            RenewalError::Network(_)
        ));
    }

    #[test]
    fn test_http_provider_builds_from_config() {
        let config = SessionConfig::new(
            "https://api.example.com".parse().unwrap(),
            "https://api.example.com/auth/refresh".parse().unwrap(),
            "https://api.example.com/auth/logout".parse().unwrap(),
        );
        let provider = HttpIdentityProvider::new(&config).unwrap();
        assert_eq!(provider.refresh_url.path(), "/auth/refresh");
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_network_error() {
        let mut config = SessionConfig::new(
            "http://127.0.0.1:9".parse().unwrap(),
            "http://127.0.0.1:9/auth/refresh".parse().unwrap(),
            "http://127.0.0.1:9/auth/logout".parse().unwrap(),
        );
        config.request_timeout_secs = 2;
        let provider = HttpIdentityProvider::new(&config).unwrap();

        assert!(matches!(
            provider.refresh("r").await,
            Err(RenewalError::Network(_))
        ));
    }
}
