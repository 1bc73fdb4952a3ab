/// Session teardown and the session-ended signal
use crate::provider::IdentityProvider;
use crate::store::TokenStore;
use crate::token::fingerprint;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// The user logged out
    Logout,
    /// The access token could not be renewed during a user action
    RenewalFailed,
}

/// Broadcast to the navigation layer whenever a session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionEnded {
    pub reason: EndReason,
}

/// Revokes and forgets the current credentials
#[derive(Clone)]
pub struct SessionTeardown {
    store: Arc<TokenStore>,
    provider: Arc<dyn IdentityProvider>,
    ended: broadcast::Sender<SessionEnded>,
}

impl SessionTeardown {
    pub fn new(store: Arc<TokenStore>, provider: Arc<dyn IdentityProvider>) -> Self {
        let (ended, _) = broadcast::channel(16);
        Self {
            store,
            provider,
            ended,
        }
    }

    /// Receiver for [`SessionEnded`] signals
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEnded> {
        self.ended.subscribe()
    }

    /// End the session at the user's request
    pub async fn logout(&self) {
        self.end(EndReason::Logout).await;
    }

    /// End the session
    ///
    /// Revocation is best-effort; local state is always cleared and the
    /// signal always fires, even when there was no session to end.
    pub async fn end(&self, reason: EndReason) {
        if let Some(refresh_token) = self.store.refresh_token() {
            if let Err(e) = self.provider.revoke(&refresh_token).await {
                tracing::warn!(
                    refresh = %fingerprint(&refresh_token),
                    err = %e,
                    "refresh token revocation failed"
                );
            }
        }

        self.store.clear();
        tracing::info!(?reason, "session ended");

        // No subscribers is fine
        let _ = self.ended.send(SessionEnded { reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RenewalError;
    use crate::testing::FakeProvider;
    use crate::token::CredentialPair;

    fn teardown() -> (Arc<TokenStore>, Arc<FakeProvider>, SessionTeardown) {
        let store = Arc::new(TokenStore::in_memory());
        let provider = Arc::new(FakeProvider::new());
        let teardown = SessionTeardown::new(store.clone(), provider.clone());
        (store, provider, teardown)
    }

    #[tokio::test]
    async fn test_logout_revokes_and_clears() {
        let (store, provider, teardown) = teardown();
        let mut ended = teardown.subscribe();
        store.save(CredentialPair::issue("a", "r", 60, 0));

        teardown.logout().await;

        assert_eq!(provider.revokes(), 1);
        assert!(!store.has_valid_pair());
        assert_eq!(
            ended.recv().await.unwrap(),
            SessionEnded {
                reason: EndReason::Logout
            }
        );
    }

    #[tokio::test]
    async fn test_logout_is_idempotent() {
        let (store, provider, teardown) = teardown();
        let mut ended = teardown.subscribe();
        store.save(CredentialPair::issue("a", "r", 60, 0));

        teardown.logout().await;
        teardown.logout().await;

        // Nothing left to revoke the second time
        assert_eq!(provider.revokes(), 1);
        assert!(!store.has_valid_pair());
        assert!(ended.recv().await.is_ok());
        assert!(ended.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_failed_revocation_still_clears() {
        let (store, provider, teardown) = teardown();
        provider.fail_revoke(RenewalError::Network("connection reset".into()));
        store.save(CredentialPair::issue("a", "r", 60, 0));

        teardown.end(EndReason::RenewalFailed).await;

        assert_eq!(provider.revokes(), 1);
        assert!(!store.has_valid_pair());
    }
}
