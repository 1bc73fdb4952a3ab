//! Ausweis - Access/refresh token lifecycle for API clients
//!
//! This library keeps a client authenticated against a remote API: it holds
//! the current access/refresh token pair, renews the access token before and
//! after it expires, and tears the session down safely.
//!
//! # Features
//!
//! - Single-flight renewal: concurrent callers share one refresh exchange
//! - Pre-emptive renewal before outbound calls and on a background timer
//! - One transparent renew-and-retry on 401 responses
//! - Pluggable durable storage (memory, XDG file, OS keyring)
//!
//! Runnable programs live in `demos/` and are registered as cargo examples,
//! e.g. `cargo run --example session_lifecycle`.
//!
//! # Example
//!
//! ```
//! use ausweis::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(TokenStore::in_memory());
//! let clock = Arc::new(ManualClock::new(1_000));
//! store.save(CredentialPair::issue("access", "refresh", 3600, clock.now()));
//!
//! let policy = ExpiryPolicy::new(store.clone(), clock.clone());
//! assert!(!policy.is_expiring_soon(2));
//!
//! clock.advance(3500);
//! assert!(policy.is_expiring_soon(2));
//! ```

pub mod background;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod gate;
pub mod governor;
pub mod lock;
pub mod provider;
pub mod renewal;
pub mod store;
pub mod teardown;
pub mod token;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::background::{BackgroundRenewalLoop, RenewalLoopHandle, TickOutcome};
    pub use crate::client::{SessionClient, SessionStatus};
    pub use crate::clock::{Clock, ManualClock, SystemClock};
    pub use crate::config::SessionConfig;
    pub use crate::error::{RenewalError, SessionError};
    pub use crate::expiry::ExpiryPolicy;
    pub use crate::gate::RequestGate;
    pub use crate::governor::ResponseGovernor;
    pub use crate::provider::{HttpIdentityProvider, IdentityProvider, RefreshGrant};
    pub use crate::renewal::RenewalCoordinator;
    pub use crate::store::{FileBackend, KeyringBackend, MemoryBackend, StorageBackend, TokenStore};
    pub use crate::teardown::{EndReason, SessionEnded, SessionTeardown};
    pub use crate::token::CredentialPair;
    pub use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
}
