use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::info;
use uuid::Uuid;

use halador_core::auth::AuthContext;
use halador_core::profile::{Profile, Role, SubscriptionStatus};
use halador_core::repository::ProfileRepository;
use halador_core::{CoreError, CoreResult};

/// The admin-mediated state machine controlling a driver's right to
/// publish. Payments happen off-platform (Yape/Plin transfer); reporting
/// one is purely a claim, and only an admin can turn that claim into an
/// active subscription. Expiry is enforced lazily at publish time, there
/// is no background job.
pub struct SubscriptionGate {
    profiles: Arc<dyn ProfileRepository>,
    period_days: i64,
}

impl SubscriptionGate {
    pub fn new(profiles: Arc<dyn ProfileRepository>, period_days: i64) -> Self {
        Self {
            profiles,
            period_days,
        }
    }

    /// Driver action: "I transferred the money". Inactive -> Pending.
    pub async fn report_payment(&self, auth: &AuthContext) -> CoreResult<Profile> {
        auth.require_role(Role::Driver)?;
        let profile = self
            .profiles
            .transition_subscription(
                auth.user_id,
                &[SubscriptionStatus::Inactive],
                SubscriptionStatus::Pending,
                None,
            )
            .await?;
        info!(driver = %auth.user_id, "payment reported, awaiting admin review");
        Ok(profile)
    }

    /// Admin action: the transfer checked out. Pending -> Active with an
    /// end date one period out from the approval moment.
    pub async fn approve_payment(&self, auth: &AuthContext, user_id: Uuid) -> CoreResult<Profile> {
        auth.require_admin()?;
        let end_date = Utc::now() + Duration::days(self.period_days);
        let profile = self
            .profiles
            .transition_subscription(
                user_id,
                &[SubscriptionStatus::Pending],
                SubscriptionStatus::Active,
                Some(end_date),
            )
            .await?;
        info!(driver = %user_id, until = %end_date, "subscription activated");
        Ok(profile)
    }

    /// Admin action: the transfer did not check out. Pending -> Inactive.
    pub async fn reject_payment(&self, auth: &AuthContext, user_id: Uuid) -> CoreResult<Profile> {
        auth.require_admin()?;
        let profile = self
            .profiles
            .transition_subscription(
                user_id,
                &[SubscriptionStatus::Pending],
                SubscriptionStatus::Inactive,
                None,
            )
            .await?;
        info!(driver = %user_id, "payment rejected");
        Ok(profile)
    }

    /// Admin console listing of claims waiting for review.
    pub async fn pending_subscriptions(&self, auth: &AuthContext) -> CoreResult<Vec<Profile>> {
        auth.require_admin()?;
        self.profiles.list_pending_subscriptions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use halador_core::memory::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        gate: SubscriptionGate,
        admin: AuthContext,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let admin_id = Uuid::new_v4();
        store
            .insert(&Profile::new(admin_id, "Admin", Role::Admin))
            .await
            .unwrap();
        Fixture {
            gate: SubscriptionGate::new(store.clone(), 30),
            store,
            admin: AuthContext::new(admin_id, Role::Admin),
        }
    }

    async fn seed_driver(store: &Arc<MemoryStore>) -> AuthContext {
        let id = Uuid::new_v4();
        store
            .insert(&Profile::new(id, "Diego", Role::Driver))
            .await
            .unwrap();
        AuthContext::new(id, Role::Driver)
    }

    #[tokio::test]
    async fn full_approval_cycle() {
        let f = fixture().await;
        let driver = seed_driver(&f.store).await;

        let profile = f.gate.report_payment(&driver).await.unwrap();
        assert_eq!(profile.subscription_status, SubscriptionStatus::Pending);

        let before = Utc::now();
        let profile = f.gate.approve_payment(&f.admin, driver.user_id).await.unwrap();
        assert_eq!(profile.subscription_status, SubscriptionStatus::Active);

        // End date lands 30 days out, to day resolution.
        let end = profile.subscription_end_date.unwrap();
        let days = (end - before).num_days();
        assert!((29..=30).contains(&days), "got {} days", days);
    }

    #[tokio::test]
    async fn rejection_clears_end_date() {
        let f = fixture().await;
        let driver = seed_driver(&f.store).await;

        f.gate.report_payment(&driver).await.unwrap();
        let profile = f.gate.reject_payment(&f.admin, driver.user_id).await.unwrap();
        assert_eq!(profile.subscription_status, SubscriptionStatus::Inactive);
        assert!(profile.subscription_end_date.is_none());
    }

    #[tokio::test]
    async fn report_is_inactive_only() {
        let f = fixture().await;
        let driver = seed_driver(&f.store).await;

        f.gate.report_payment(&driver).await.unwrap();
        // Reporting twice while pending is an invalid transition.
        let err = f.gate.report_payment(&driver).await.unwrap_err();
        assert!(matches!(err, CoreError::StateError(_)));
    }

    #[tokio::test]
    async fn approval_requires_pending_claim() {
        let f = fixture().await;
        let driver = seed_driver(&f.store).await;

        // No reported payment: nothing to approve.
        let err = f
            .gate
            .approve_payment(&f.admin, driver.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::StateError(_)));
    }

    #[tokio::test]
    async fn only_admins_operate_the_gate() {
        let f = fixture().await;
        let driver = seed_driver(&f.store).await;
        f.gate.report_payment(&driver).await.unwrap();

        // A driver cannot approve their own claim, on any path.
        let err = f
            .gate
            .approve_payment(&driver, driver.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AuthorizationError(_)));

        let err = f.gate.pending_subscriptions(&driver).await.unwrap_err();
        assert!(matches!(err, CoreError::AuthorizationError(_)));
    }

    #[tokio::test]
    async fn pending_listing_shows_waiting_claims() {
        let f = fixture().await;
        let d1 = seed_driver(&f.store).await;
        let d2 = seed_driver(&f.store).await;

        f.gate.report_payment(&d1).await.unwrap();
        f.gate.report_payment(&d2).await.unwrap();
        f.gate.approve_payment(&f.admin, d1.user_id).await.unwrap();

        let pending = f.gate.pending_subscriptions(&f.admin).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, d2.user_id);
    }
}
