/// Example: Concurrent Renewal
///
/// Fires many renewal requests at once while the identity provider is slow,
/// and shows that only one exchange reaches the provider.
///
/// Run:
/// cargo run --example concurrent_renewal
use async_trait::async_trait;
use ausweis::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct SlowProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for SlowProvider {
    async fn refresh(&self, _refresh_token: &str) -> Result<RefreshGrant, RenewalError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(250)).await;
        Ok(RefreshGrant {
            access_token: "renewed".to_string(),
            refresh_token: None,
            expires_in: 3600,
        })
    }

    async fn revoke(&self, _refresh_token: &str) -> Result<(), RenewalError> {
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    println!("=== Concurrent Renewal Example ===\n");

    let store = Arc::new(TokenStore::in_memory());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    store.save(CredentialPair::issue("expiring", "refresh", 30, clock.now()));

    let provider = Arc::new(SlowProvider::default());
    let coordinator = RenewalCoordinator::new(store.clone(), provider.clone(), clock);

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.renew().await })
        })
        .collect();

    let mut renewed = 0;
    for task in tasks {
        if let Ok(Ok(token)) = task.await {
            assert_eq!(token, "renewed");
            renewed += 1;
        }
    }

    println!("{} callers received the new token", renewed);
    println!(
        "{} exchange(s) reached the identity provider",
        provider.calls.load(Ordering::SeqCst)
    );
}
