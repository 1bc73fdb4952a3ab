/// Scripted collaborators shared by unit tests
use crate::error::{RenewalError, Result};
use crate::provider::{IdentityProvider, RefreshGrant};
use crate::transport::{ApiRequest, ApiResponse, Transport};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Identity provider that answers from a script
///
/// When the script runs dry it issues `access-<n>` tokens without rotating
/// the refresh token.
#[derive(Default)]
pub struct FakeProvider {
    script: Mutex<VecDeque<std::result::Result<RefreshGrant, RenewalError>>>,
    revoke_outcome: Mutex<Option<RenewalError>>,
    delay: Mutex<Duration>,
    refreshes: AtomicUsize,
    revokes: AtomicUsize,
    presented: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock() = delay;
        self
    }

    pub fn push(&self, outcome: std::result::Result<RefreshGrant, RenewalError>) {
        self.script.lock().push_back(outcome);
    }

    pub fn fail_revoke(&self, error: RenewalError) {
        *self.revoke_outcome.lock() = Some(error);
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    pub fn revokes(&self) -> usize {
        self.revokes.load(Ordering::SeqCst)
    }

    /// Refresh tokens presented to the provider, in order
    pub fn presented(&self) -> Vec<String> {
        self.presented.lock().clone()
    }
}

pub fn grant(access: &str, refresh: Option<&str>, expires_in: u64) -> RefreshGrant {
    RefreshGrant {
        access_token: access.to_string(),
        refresh_token: refresh.map(str::to_string),
        expires_in,
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn refresh(&self, refresh_token: &str) -> std::result::Result<RefreshGrant, RenewalError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        self.presented.lock().push(refresh_token.to_string());

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| Ok(grant(&format!("access-{}", n), None, 3600)))
    }

    async fn revoke(&self, _refresh_token: &str) -> std::result::Result<(), RenewalError> {
        self.revokes.fetch_add(1, Ordering::SeqCst);
        match self.revoke_outcome.lock().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

type Handler = Box<dyn Fn(&ApiRequest, Option<&str>) -> ApiResponse + Send + Sync>;

/// Transport that answers through a handler and records every call
pub struct FakeTransport {
    handler: Handler,
    calls: Mutex<Vec<(String, Option<String>)>>,
}

impl FakeTransport {
    pub fn new(
        handler: impl Fn(&ApiRequest, Option<&str>) -> ApiResponse + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Accepts exactly one bearer token and rejects everything else
    pub fn accepting(token: &'static str) -> Self {
        Self::new(move |_, bearer| {
            if bearer == Some(token) {
                ApiResponse::new(reqwest::StatusCode::OK).with_body(r#"{"ok":true}"#)
            } else {
                ApiResponse::new(reqwest::StatusCode::UNAUTHORIZED)
            }
        })
    }

    /// (path, bearer) of every executed call
    pub fn calls(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>) -> Result<ApiResponse> {
        self.calls
            .lock()
            .push((request.path.clone(), bearer.map(str::to_string)));
        Ok((self.handler)(request, bearer))
    }
}
