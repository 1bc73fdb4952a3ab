/// Response handling: replacement tokens and one-shot reactive renewal
use crate::clock::Clock;
use crate::config::path_in;
use crate::error::{RenewalError, Result, SessionError};
use crate::renewal::RenewalCoordinator;
use crate::store::TokenStore;
use crate::teardown::{EndReason, SessionTeardown};
use crate::token::fingerprint;
use crate::transport::{ApiRequest, ApiResponse, Transport};
use reqwest::header::HeaderName;
use std::sync::Arc;

/// Runs on every API response
///
/// - Successful responses carrying a replacement access token update the
///   store.
/// - A 401 on an ordinary call triggers one renewal and one retry with the
///   token that renewal produced. A second 401 is final.
/// - Login and refresh endpoints are never retried; their 401 is returned
///   as-is so a bad login is not mistaken for an expired session.
#[derive(Clone)]
pub struct ResponseGovernor {
    store: Arc<TokenStore>,
    clock: Arc<dyn Clock>,
    coordinator: RenewalCoordinator,
    teardown: SessionTeardown,
    transport: Arc<dyn Transport>,
    replacement_header: HeaderName,
    auth_paths: Vec<String>,
}

impl ResponseGovernor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<TokenStore>,
        clock: Arc<dyn Clock>,
        coordinator: RenewalCoordinator,
        teardown: SessionTeardown,
        transport: Arc<dyn Transport>,
        replacement_header: HeaderName,
        auth_paths: Vec<String>,
    ) -> Self {
        Self {
            store,
            clock,
            coordinator,
            teardown,
            transport,
            replacement_header,
            auth_paths,
        }
    }

    /// Settle `response`, which answered `request` sent with `sent_with`
    pub async fn settle(
        &self,
        request: &ApiRequest,
        sent_with: Option<&str>,
        response: ApiResponse,
    ) -> Result<ApiResponse> {
        if !response.is_rejection() {
            return Ok(self.absorb(response));
        }

        if path_in(&self.auth_paths, &request.path) {
            return Ok(response);
        }

        if request.retried() {
            return Err(SessionError::Unauthenticated);
        }

        let mut retry = request.clone();
        retry.mark_retried();

        let token = match self.store.access_token() {
            // Someone else renewed while this call was in flight
            Some(current) if sent_with.is_some_and(|sent| sent != current) => {
                tracing::debug!(token = %fingerprint(&current), "retrying with newer stored token");
                current
            }
            _ => match self.coordinator.renew().await {
                Ok(token) => token,
                // Logout or a new login landed meanwhile; that session decides
                Err(RenewalError::Superseded) => match self.store.access_token() {
                    Some(current) => current,
                    None => return Err(SessionError::Unauthenticated),
                },
                Err(e) => {
                    tracing::info!(path = %request.path, err = %e, "reactive renewal failed");
                    self.teardown.end(EndReason::RenewalFailed).await;
                    return Err(SessionError::Unauthenticated);
                }
            },
        };

        let response = self.transport.execute(&retry, Some(&token)).await?;
        if response.is_rejection() {
            tracing::info!(path = %request.path, "request rejected after renewal");
            return Err(SessionError::Unauthenticated);
        }

        Ok(self.absorb(response))
    }

    fn absorb(&self, response: ApiResponse) -> ApiResponse {
        if !response.status.is_success() {
            return response;
        }

        if let Some(token) = response.replacement_token(&self.replacement_header) {
            if let Some(pair) = self.store.snapshot() {
                if pair.access_token != token {
                    tracing::debug!(token = %fingerprint(token), "applying replacement access token");
                    let replaced = pair.with_access_token(token, self.clock.now());
                    if !self.store.replace_if(&pair.refresh_token, replaced) {
                        tracing::debug!("session changed, replacement token dropped");
                    }
                }
            }
        }

        response
    }
}
