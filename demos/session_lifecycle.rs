/// Example: Session Lifecycle
///
/// Walks a session from login through pre-emptive renewal, a server-side
/// rejection with transparent retry, and logout. Both the identity provider
/// and the API are simulated in-process.
///
/// Run:
/// RUST_LOG=ausweis=debug cargo run --example session_lifecycle
use async_trait::async_trait;
use ausweis::prelude::*;
use reqwest::StatusCode;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Provider issuing numbered tokens and rotating the refresh token
#[derive(Default)]
struct DemoProvider {
    issued: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for DemoProvider {
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshGrant, RenewalError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        println!("  [idp] refresh exchange #{} with {}", n, refresh_token);
        Ok(RefreshGrant {
            access_token: format!("access-{}", n),
            refresh_token: Some(format!("refresh-{}", n)),
            expires_in: 3600,
        })
    }

    async fn revoke(&self, refresh_token: &str) -> Result<(), RenewalError> {
        println!("  [idp] revoked {}", refresh_token);
        Ok(())
    }
}

/// API that only honours the most recently issued token
struct DemoApi {
    provider: Arc<DemoProvider>,
}

#[async_trait]
impl Transport for DemoApi {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> ausweis::error::Result<ApiResponse> {
        let current = format!("access-{}", self.provider.issued.load(Ordering::SeqCst));
        let status = if bearer == Some(current.as_str()) {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        };
        println!("  [api] {} {} -> {}", request.method, request.path, status);
        Ok(ApiResponse::new(status).with_body(r#"{"items":[]}"#))
    }
}

#[tokio::main]
async fn main() -> ausweis::error::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== Session Lifecycle Example ===\n");

    let provider = Arc::new(DemoProvider::default());
    let api = Arc::new(DemoApi {
        provider: provider.clone(),
    });
    let clock = Arc::new(ManualClock::new(1_700_000_000));
    let config = SessionConfig::from_json_str(
        r#"{
            "api_base_url": "https://api.example.com",
            "refresh_url": "https://api.example.com/auth/refresh",
            "revoke_url": "https://api.example.com/auth/logout"
        }"#,
    )?;

    let client = SessionClient::with_parts(
        config,
        Arc::new(MemoryBackend::new()),
        provider.clone(),
        api,
        clock.clone(),
    )?;
    let mut ended = client.subscribe();

    // The login endpoint is outside this library; pretend it issued access-0
    client.establish("access-0", "refresh-0", 3600);
    println!("Logged in: {:?}\n", client.status());

    println!("Token about to expire, calling the API:");
    clock.advance(3590);
    client.send(ApiRequest::get("/institutions")).await?;
    println!("Status: {:?}\n", client.status());

    println!("Server-side rotation invalidates our token, calling again:");
    provider.issued.fetch_add(1, Ordering::SeqCst);
    let response = client.send(ApiRequest::get("/events")).await?;
    println!("Caller saw {} with no error\n", response.status);

    println!("Logging out:");
    client.logout().await;
    if let Ok(signal) = ended.recv().await {
        println!("Session ended: {:?}", signal.reason);
    }
    println!("Status: {:?}", client.status());

    Ok(())
}
