/// Periodic pre-emptive renewal, independent of request traffic
use crate::error::RenewalError;
use crate::expiry::ExpiryPolicy;
use crate::renewal::RenewalCoordinator;
use crate::store::TokenStore;
use crate::teardown::SessionEnded;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Result of one loop iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No credential pair stored
    Idle,
    /// Token not yet within the renewal threshold
    Fresh,
    Renewed,
    Failed(RenewalError),
}

/// Keeps idle sessions renewed
///
/// Every tick checks the stored expiry and renews through the shared
/// [`RenewalCoordinator`] when due. Failures are only logged; the next real
/// API call takes care of ending the session.
#[derive(Clone)]
pub struct BackgroundRenewalLoop {
    store: Arc<TokenStore>,
    policy: ExpiryPolicy,
    coordinator: RenewalCoordinator,
    threshold_minutes: u64,
    interval: Duration,
}

impl BackgroundRenewalLoop {
    pub fn new(
        store: Arc<TokenStore>,
        policy: ExpiryPolicy,
        coordinator: RenewalCoordinator,
        threshold_minutes: u64,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            policy,
            coordinator,
            threshold_minutes,
            interval,
        }
    }

    /// Run a single check
    pub async fn tick(&self) -> TickOutcome {
        if !self.store.has_valid_pair() {
            return TickOutcome::Idle;
        }

        if !self.policy.is_expiring_soon(self.threshold_minutes) {
            tracing::debug!(
                seconds_remaining = ?self.policy.seconds_remaining(),
                "access token still fresh"
            );
            return TickOutcome::Fresh;
        }

        match self.coordinator.renew().await {
            Ok(_) => {
                tracing::info!("background renewal succeeded");
                TickOutcome::Renewed
            }
            Err(e) => {
                tracing::warn!(err = %e, "background renewal failed");
                TickOutcome::Failed(e)
            }
        }
    }

    /// Start ticking on the current runtime
    ///
    /// The first check happens one interval from now. The loop stops when
    /// the handle is stopped or dropped, or when `ended` reports the session
    /// is over.
    pub fn spawn(self, mut ended: broadcast::Receiver<SessionEnded>) -> RenewalLoopHandle {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        tracing::debug!("renewal loop cancelled");
                        break;
                    }
                    _ = ended.recv() => {
                        tracing::debug!("session ended, renewal loop stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        self.tick().await;
                    }
                }
            }
        });

        RenewalLoopHandle { cancel, task }
    }
}

/// Handle to a spawned [`BackgroundRenewalLoop`]
pub struct RenewalLoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RenewalLoopHandle {
    /// Cancel the loop and wait for it to exit
    pub async fn stop(self) {
        self.cancel.cancel();
        self.finished().await;
    }

    /// Wait for the loop to exit on its own
    pub async fn finished(mut self) {
        if let Err(e) = (&mut self.task).await {
            tracing::warn!(err = %e, "renewal loop task failed");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for RenewalLoopHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
