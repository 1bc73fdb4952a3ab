/// Expiry checks against the stored credential pair
use crate::clock::Clock;
use crate::store::TokenStore;
use crate::token::seconds_until;
use std::sync::Arc;

/// Answers "is the access token about to expire?"
///
/// Pure function of the stored expiry instant and the clock.
#[derive(Clone)]
pub struct ExpiryPolicy {
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
}

impl ExpiryPolicy {
    pub fn new(store: Arc<TokenStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Whether the access token expires within `threshold_minutes`
    ///
    /// With no recorded expiry the token is treated as expiring. The boundary
    /// is inclusive: exactly `threshold_minutes * 60` seconds left counts.
    pub fn is_expiring_soon(&self, threshold_minutes: u64) -> bool {
        let threshold = i64::try_from(threshold_minutes.saturating_mul(60)).unwrap_or(i64::MAX);
        match self.seconds_remaining() {
            Some(remaining) => remaining <= threshold,
            None => true,
        }
    }

    /// Seconds until expiry, negative once expired
    pub fn seconds_remaining(&self) -> Option<i64> {
        let expires_at = self.store.expires_at()?;
        Some(seconds_until(expires_at, self.clock.now()))
    }

    /// Minutes until expiry, negative once expired
    pub fn minutes_remaining(&self) -> Option<f64> {
        self.seconds_remaining().map(|secs| secs as f64 / 60.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::token::CredentialPair;

    fn policy_at(now: u64) -> (Arc<TokenStore>, Arc<ManualClock>, ExpiryPolicy) {
        let store = Arc::new(TokenStore::in_memory());
        let clock = Arc::new(ManualClock::new(now));
        let policy = ExpiryPolicy::new(store.clone(), clock.clone());
        (store, clock, policy)
    }

    #[test]
    fn test_missing_expiry_is_expiring() {
        let (_store, _clock, policy) = policy_at(0);
        assert!(policy.is_expiring_soon(2));
        assert!(policy.minutes_remaining().is_none());
    }

    #[test]
    fn test_threshold_boundary() {
        let (store, clock, policy) = policy_at(10_000);
        store.save(CredentialPair::issue("a", "r", 3600, 10_000));

        clock.set(store.expires_at().unwrap() - 121);
        assert!(!policy.is_expiring_soon(2));

        clock.set(store.expires_at().unwrap() - 120);
        assert!(policy.is_expiring_soon(2));

        clock.set(store.expires_at().unwrap() - 119);
        assert!(policy.is_expiring_soon(2));
    }

    #[test]
    fn test_extreme_values_saturate() {
        let (store, _clock, policy) = policy_at(1_700_000_000);
        store.save(CredentialPair::issue("a", "r", 3600, 1_700_000_000));

        // Any threshold longer than the lifetime means "renew now"
        assert!(policy.is_expiring_soon(u64::MAX));

        // A provider promising an absurd lifetime is simply not expiring
        store.save(CredentialPair::issue("a", "r", u64::MAX, 1_700_000_000));
        assert!(!policy.is_expiring_soon(2));
        assert!(policy.minutes_remaining().unwrap() > 0.0);
    }

    #[test]
    fn test_minutes_remaining_goes_negative() {
        let (store, clock, policy) = policy_at(0);
        store.save(CredentialPair::issue("a", "r", 600, 0));

        assert_eq!(policy.minutes_remaining(), Some(10.0));

        clock.advance(900);
        assert_eq!(policy.minutes_remaining(), Some(-5.0));
        assert!(policy.is_expiring_soon(0));
    }
}
