/// Authenticated API client tying the session components together
use crate::background::{BackgroundRenewalLoop, RenewalLoopHandle};
use crate::clock::{Clock, SystemClock};
use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::expiry::ExpiryPolicy;
use crate::gate::RequestGate;
use crate::governor::ResponseGovernor;
use crate::provider::{HttpIdentityProvider, IdentityProvider};
use crate::renewal::RenewalCoordinator;
use crate::store::{StorageBackend, TokenStore};
use crate::teardown::{SessionEnded, SessionTeardown};
use crate::token::{fingerprint, CredentialPair};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use reqwest::header::HeaderName;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Snapshot of the session for display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionStatus {
    pub authenticated: bool,
    pub minutes_remaining: Option<f64>,
}

/// API client that keeps itself authenticated
///
/// Every call goes through the [`RequestGate`], the transport, and the
/// [`ResponseGovernor`]. All components share one [`TokenStore`] and one
/// [`RenewalCoordinator`], so at most one renewal exchange is ever running.
///
/// # Example
///
/// ```no_run
/// use ausweis::prelude::*;
/// use std::sync::Arc;
///
/// # async fn run() -> ausweis::error::Result<()> {
/// let config = SessionConfig::from_file(std::path::Path::new("session.json"))?;
/// let backend = Arc::new(FileBackend::new("backoffice")?);
/// let client = SessionClient::connect(config, backend)?;
///
/// // Hand over the pair issued by the login endpoint
/// client.establish("access", "refresh", 3600);
/// let _renewals = client.spawn_background_renewal();
///
/// let response = client.send(ApiRequest::get("/institutions")).await?;
/// println!("{}", response.status);
/// # Ok(())
/// # }
/// ```
pub struct SessionClient {
    config: SessionConfig,
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    policy: ExpiryPolicy,
    coordinator: RenewalCoordinator,
    gate: RequestGate,
    governor: ResponseGovernor,
    teardown: SessionTeardown,
    transport: Arc<dyn Transport>,
}

impl SessionClient {
    /// Client talking HTTP to the configured API and identity provider
    pub fn connect(config: SessionConfig, backend: Arc<dyn StorageBackend>) -> Result<Self> {
        config.validate()?;
        let provider = Arc::new(HttpIdentityProvider::new(&config)?);
        let transport = Arc::new(HttpTransport::new(&config)?);
        Self::with_parts(config, backend, provider, transport, Arc::new(SystemClock))
    }

    /// Client over explicit collaborators
    pub fn with_parts(
        config: SessionConfig,
        backend: Arc<dyn StorageBackend>,
        provider: Arc<dyn IdentityProvider>,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let replacement_header = HeaderName::from_bytes(config.replacement_token_header.as_bytes())
            .map_err(|e| SessionError::Config(format!("invalid header name: {}", e)))?;

        let store = Arc::new(TokenStore::open(backend));
        let policy = ExpiryPolicy::new(store.clone(), clock.clone());
        let coordinator = RenewalCoordinator::new(store.clone(), provider.clone(), clock.clone());
        let teardown = SessionTeardown::new(store.clone(), provider);
        let gate = RequestGate::new(
            store.clone(),
            policy.clone(),
            coordinator.clone(),
            config.renewal_threshold_minutes,
        );
        let governor = ResponseGovernor::new(
            store.clone(),
            clock.clone(),
            coordinator.clone(),
            teardown.clone(),
            transport.clone(),
            replacement_header,
            config.auth_paths.clone(),
        );

        Ok(Self {
            config,
            store,
            clock,
            policy,
            coordinator,
            gate,
            governor,
            teardown,
            transport,
        })
    }

    /// Adopt the pair issued by a successful login
    pub fn establish(
        &self,
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        ttl_seconds: u64,
    ) {
        let pair = CredentialPair::issue(access_token, refresh_token, ttl_seconds, self.clock.now());
        tracing::info!(
            token = %fingerprint(&pair.access_token),
            expires_in = ttl_seconds,
            "session established"
        );
        self.store.save(pair);
    }

    /// Send a domain API call
    ///
    /// Non-authentication errors come back as ordinary responses. A call that
    /// cannot be authenticated fails with [`SessionError::Unauthenticated`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let bearer = self.gate.admit().await;
        let response = self.transport.execute(&request, bearer.as_deref()).await?;
        self.governor
            .settle(&request, bearer.as_deref(), response)
            .await
    }

    /// Revoke the refresh token and forget the session
    pub async fn logout(&self) {
        self.teardown.logout().await;
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            authenticated: self.store.has_valid_pair(),
            minutes_remaining: self.policy.minutes_remaining(),
        }
    }

    /// Receiver for the session-ended signal
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEnded> {
        self.teardown.subscribe()
    }

    /// Start the periodic renewal check on the current runtime
    pub fn spawn_background_renewal(&self) -> RenewalLoopHandle {
        BackgroundRenewalLoop::new(
            self.store.clone(),
            self.policy.clone(),
            self.coordinator.clone(),
            self.config.renewal_threshold_minutes,
            self.config.check_interval(),
        )
        .spawn(self.teardown.subscribe())
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &RenewalCoordinator {
        &self.coordinator
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::store::MemoryBackend;
    use crate::teardown::EndReason;
    use crate::testing::{FakeProvider, FakeTransport};
    use reqwest::StatusCode;

    fn config() -> SessionConfig {
        SessionConfig::new(
            "https://api.example.com".parse().unwrap(),
            "https://api.example.com/auth/refresh".parse().unwrap(),
            "https://api.example.com/auth/logout".parse().unwrap(),
        )
    }

    fn client(
        transport: FakeTransport,
    ) -> (SessionClient, Arc<ManualClock>, Arc<FakeProvider>, Arc<FakeTransport>) {
        let clock = Arc::new(ManualClock::new(1_700_000_000));
        let provider = Arc::new(FakeProvider::new());
        let transport = Arc::new(transport);
        let client = SessionClient::with_parts(
            config(),
            Arc::new(MemoryBackend::new()),
            provider.clone(),
            transport.clone(),
            clock.clone(),
        )
        .unwrap();
        (client, clock, provider, transport)
    }

    #[tokio::test]
    async fn test_status_reflects_session() {
        let (client, clock, _provider, _transport) = client(FakeTransport::accepting("a"));
        assert_eq!(
            client.status(),
            SessionStatus {
                authenticated: false,
                minutes_remaining: None
            }
        );

        client.establish("a", "r", 600);
        clock.advance(300);
        assert_eq!(
            client.status(),
            SessionStatus {
                authenticated: true,
                minutes_remaining: Some(5.0)
            }
        );
    }

    #[tokio::test]
    async fn test_unauthenticated_call_has_no_bearer() {
        let (client, _clock, provider, transport) = client(FakeTransport::new(|_, _| {
            ApiResponse::new(StatusCode::OK)
        }));

        client
            .send(ApiRequest::post("/auth/login", serde_json::json!({"user": "admin"})))
            .await
            .unwrap();

        assert_eq!(transport.calls(), vec![("/auth/login".to_string(), None)]);
        assert_eq!(provider.refreshes(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_renewed_before_send() {
        let (client, clock, provider, transport) = client(FakeTransport::accepting("access-1"));
        client.establish("a", "r", 3600);
        clock.advance(3590);

        let response = client.send(ApiRequest::get("/institutions")).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(provider.refreshes(), 1);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_call_recovers_without_visible_error() {
        // Server revoked the access token early
        let (client, _clock, provider, transport) = client(FakeTransport::accepting("access-1"));
        client.establish("a", "r", 3600);

        let response = client.send(ApiRequest::get("/events")).await.unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(provider.refreshes(), 1);
        assert_eq!(
            transport.calls(),
            vec![
                ("/events".to_string(), Some("a".to_string())),
                ("/events".to_string(), Some("access-1".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn test_dead_refresh_token_ends_session() {
        let (client, _clock, provider, _transport) = client(FakeTransport::accepting("never"));
        let mut ended = client.subscribe();
        provider.push(Err(crate::error::RenewalError::Rejected("revoked".into())));
        client.establish("a", "r", 3600);

        let result = client.send(ApiRequest::get("/notifications")).await;

        assert!(matches!(result, Err(SessionError::Unauthenticated)));
        assert!(!client.status().authenticated);
        assert_eq!(ended.recv().await.unwrap().reason, EndReason::RenewalFailed);
    }

    #[tokio::test]
    async fn test_logout_twice() {
        let (client, _clock, provider, _transport) = client(FakeTransport::accepting("a"));
        client.establish("a", "r", 3600);

        client.logout().await;
        client.logout().await;

        assert!(!client.status().authenticated);
        assert_eq!(provider.revokes(), 1);
    }

    #[test]
    fn test_invalid_replacement_header_rejected() {
        let mut config = config();
        config.replacement_token_header = "bad header".into();

        let result = SessionClient::with_parts(
            config,
            Arc::new(MemoryBackend::new()),
            Arc::new(FakeProvider::new()),
            Arc::new(FakeTransport::accepting("a")),
            Arc::new(ManualClock::new(0)),
        );
        assert!(matches!(result, Err(SessionError::Config(_))));
    }
}
