/// Pre-flight credential check for outbound calls
use crate::expiry::ExpiryPolicy;
use crate::renewal::RenewalCoordinator;
use crate::store::TokenStore;
use crate::token::fingerprint;
use std::sync::Arc;

/// Runs before every outbound API call
///
/// Renews the access token when it is close to expiry and hands back the
/// bearer credential to attach. A failed renewal never fails the call here;
/// the call goes out with whatever is stored and the response path deals
/// with any rejection.
#[derive(Clone)]
pub struct RequestGate {
    store: Arc<TokenStore>,
    policy: ExpiryPolicy,
    coordinator: RenewalCoordinator,
    threshold_minutes: u64,
}

impl RequestGate {
    pub fn new(
        store: Arc<TokenStore>,
        policy: ExpiryPolicy,
        coordinator: RenewalCoordinator,
        threshold_minutes: u64,
    ) -> Self {
        Self {
            store,
            policy,
            coordinator,
            threshold_minutes,
        }
    }

    /// Bearer token for the next call, or `None` for an unauthenticated call
    pub async fn admit(&self) -> Option<String> {
        if !self.store.has_valid_pair() {
            return None;
        }

        if self.policy.is_expiring_soon(self.threshold_minutes) {
            match self.coordinator.renew().await {
                Ok(token) => {
                    tracing::debug!(token = %fingerprint(&token), "renewed before request");
                }
                Err(e) => {
                    tracing::debug!(err = %e, "pre-flight renewal failed, sending with stored token");
                }
            }
        }

        // Re-read: a renewal finished by anyone must be visible here
        self.store.access_token()
    }
}
