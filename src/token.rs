/// Credential pair data and helpers
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Well-known key of the persisted access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";
/// Well-known key of the persisted refresh token
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
/// Well-known key of the persisted token lifetime
pub const TTL_SECONDS_KEY: &str = "ttl_seconds";
/// Well-known key of the persisted absolute expiry
pub const EXPIRES_AT_KEY: &str = "expires_at";

/// The current access/refresh credential pair
///
/// `expires_at` is computed once, when the pair is received, as
/// `issued_at + ttl_seconds`. It is never recomputed afterwards; a renewal
/// produces a whole new pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
    pub ttl_seconds: u64,
    pub expires_at: u64,
}

impl CredentialPair {
    /// Build a pair received at `issued_at` (unix seconds)
    pub fn issue(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        ttl_seconds: u64,
        issued_at: u64,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            ttl_seconds,
            expires_at: issued_at.saturating_add(ttl_seconds),
        }
    }

    /// Replace the access token, keeping the refresh token
    ///
    /// Used when a replacement access token arrives without a lifetime of
    /// its own; the last known lifetime applies from `issued_at`.
    pub fn with_access_token(&self, access_token: impl Into<String>, issued_at: u64) -> Self {
        Self::issue(
            access_token,
            self.refresh_token.clone(),
            self.ttl_seconds,
            issued_at,
        )
    }

    /// Seconds left until expiry; negative once expired
    pub fn seconds_remaining(&self, now: u64) -> i64 {
        seconds_until(self.expires_at, now)
    }
}

/// Signed distance from `now` to `instant`, saturating at the i64 range
pub(crate) fn seconds_until(instant: u64, now: u64) -> i64 {
    let instant = i64::try_from(instant).unwrap_or(i64::MAX);
    let now = i64::try_from(now).unwrap_or(i64::MAX);
    instant.saturating_sub(now)
}

/// Short, stable identifier for a token, safe to put in logs
pub fn fingerprint(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest[..4].iter().map(|b| format!("{:02x}", b)).collect()
}
