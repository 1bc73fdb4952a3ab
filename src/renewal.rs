/// Single-flight access token renewal
use crate::clock::Clock;
use crate::error::RenewalError;
use crate::provider::IdentityProvider;
use crate::store::TokenStore;
use crate::token::{fingerprint, CredentialPair};
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type RenewalOutcome = Result<String, RenewalError>;
type InFlight = Shared<BoxFuture<'static, RenewalOutcome>>;

/// Renews the access token, never running two exchanges at once
///
/// The first caller starts the exchange and parks a shared handle to it;
/// every caller arriving while it runs awaits that same handle and receives
/// the same outcome. The handle is removed before the outcome is delivered,
/// so the next renewal always starts a fresh exchange with the latest
/// refresh token.
///
/// The exchange is driven by whichever attached caller polls it, so a caller
/// dropping out midway does not strand the others.
///
/// The outcome only lands in the store if the store still holds the refresh
/// token that was presented. A logout or a fresh login during the round trip
/// turns a successful exchange into [`RenewalError::Superseded`].
#[derive(Clone)]
pub struct RenewalCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<TokenStore>,
    provider: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    in_flight: Mutex<Option<InFlight>>,
    exchanges: AtomicU64,
}

impl RenewalCoordinator {
    pub fn new(
        store: Arc<TokenStore>,
        provider: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                provider,
                clock,
                in_flight: Mutex::new(None),
                exchanges: AtomicU64::new(0),
            }),
        }
    }

    /// Obtain a new access token
    ///
    /// Joins the running exchange if there is one. Fails with
    /// [`RenewalError::NoCredential`] when no refresh token is stored.
    /// Failures are not retried; the caller decides whether the session ends.
    pub async fn renew(&self) -> RenewalOutcome {
        let flight = {
            let mut slot = self.inner.in_flight.lock();
            match slot.as_ref() {
                Some(flight) => {
                    tracing::debug!("joining in-flight renewal");
                    flight.clone()
                }
                None => {
                    let refresh_token = self
                        .inner
                        .store
                        .refresh_token()
                        .ok_or(RenewalError::NoCredential)?;

                    let inner = Arc::clone(&self.inner);
                    let flight = async move { inner.exchange(refresh_token).await }
                        .boxed()
                        .shared();
                    *slot = Some(flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    /// Whether an exchange is currently running
    pub fn in_flight(&self) -> bool {
        self.inner.in_flight.lock().is_some()
    }

    /// Number of network exchanges started so far
    pub fn exchange_count(&self) -> u64 {
        self.inner.exchanges.load(Ordering::SeqCst)
    }
}

impl Inner {
    async fn exchange(&self, refresh_token: String) -> RenewalOutcome {
        self.exchanges.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(refresh = %fingerprint(&refresh_token), "starting renewal exchange");

        let result = self.provider.refresh(&refresh_token).await;
        let outcome = match result {
            Ok(grant) => {
                let rotated = grant.refresh_token.is_some();
                let pair = CredentialPair::issue(
                    grant.access_token,
                    grant.refresh_token.unwrap_or_else(|| refresh_token.clone()),
                    grant.expires_in,
                    self.clock.now(),
                );
                let access_token = pair.access_token.clone();
                let expires_in = pair.ttl_seconds;

                // Logout or a new login during the round trip wins
                if self.store.replace_if(&refresh_token, pair) {
                    tracing::info!(
                        token = %fingerprint(&access_token),
                        expires_in,
                        rotated,
                        "access token renewed"
                    );
                    Ok(access_token)
                } else {
                    tracing::info!("session changed during renewal, discarding grant");
                    Err(RenewalError::Superseded)
                }
            }
            Err(e) => {
                tracing::info!(err = %e, "renewal failed");
                // A dead refresh token only takes down the session it belonged to
                if e.is_terminal_credential() && !self.store.clear_if(&refresh_token) {
                    tracing::debug!("session changed during renewal, keeping it");
                }
                Err(e)
            }
        };

        self.in_flight.lock().take();
        outcome
    }
}
