use std::sync::Arc;

use tokio::sync::broadcast;
use uuid::Uuid;

use halador_account::{AccountService, ReviewLedger, SubscriptionGate};
use halador_booking::RequestLedger;
use halador_catalog::TripCatalog;
use halador_core::events::{ChangeEvent, Notification};
use halador_core::identity::IdentityProvider;
use halador_core::repository::RateLimiter;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub identity: Arc<dyn IdentityProvider>,
    pub accounts: Arc<AccountService>,
    pub gate: Arc<SubscriptionGate>,
    pub catalog: Arc<TripCatalog>,
    pub ledger: Arc<RequestLedger>,
    pub reviews: Arc<ReviewLedger>,
    pub limiter: Arc<dyn RateLimiter>,
    pub notify_tx: broadcast::Sender<Notification>,
    pub auth: AuthConfig,
    pub rate_limit_per_minute: i64,
}

impl AppState {
    /// Fan a change event out to one user's open sessions. Nobody listening
    /// is fine; the relay is best-effort by design.
    pub fn notify(&self, recipient: Uuid, event: ChangeEvent) {
        let _ = self.notify_tx.send(Notification { recipient, event });
    }
}
