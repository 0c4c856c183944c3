use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use halador_core::auth::AuthContext;
use halador_core::profile::{Role, SubscriptionStatus};
use halador_core::repository::{
    ListingCache, ProfileRepository, TripRepository, TripRequestRepository,
};
use halador_core::request::{RequestStatus, TripRequest};
use halador_core::trip::{Trip, TripStatus};
use halador_core::{CoreError, CoreResult};

use crate::cities;

/// Tunables wired in from configuration.
#[derive(Debug, Clone)]
pub struct CatalogRules {
    /// Bound on how long a publish may wait on the store before the caller
    /// is told the outcome is unknown.
    pub publish_timeout_seconds: u64,
    /// TTL for the open-trips listing cache.
    pub listing_cache_seconds: u64,
}

impl Default for CatalogRules {
    fn default() -> Self {
        Self {
            publish_timeout_seconds: 10,
            listing_cache_seconds: 5,
        }
    }
}

/// Input for a trip publish. `trip_id` is the client-generated idempotency
/// key: a retry after an indeterminate timeout reuses the same id and the
/// insert collapses into the earlier one.
#[derive(Debug, Clone, Deserialize)]
pub struct PublishTrip {
    pub trip_id: Option<Uuid>,
    pub from: String,
    pub to: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub price: f64,
    pub seats: i32,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Publish, list, and retire trip offers.
pub struct TripCatalog {
    trips: Arc<dyn TripRepository>,
    requests: Arc<dyn TripRequestRepository>,
    profiles: Arc<dyn ProfileRepository>,
    cache: Arc<dyn ListingCache>,
    rules: CatalogRules,
}

impl TripCatalog {
    pub fn new(
        trips: Arc<dyn TripRepository>,
        requests: Arc<dyn TripRequestRepository>,
        profiles: Arc<dyn ProfileRepository>,
        cache: Arc<dyn ListingCache>,
        rules: CatalogRules,
    ) -> Self {
        Self {
            trips,
            requests,
            profiles,
            cache,
            rules,
        }
    }

    /// Publish a new trip offer.
    ///
    /// Input validation runs before the subscription gate so that a bad
    /// price is reported as a bad price no matter what the driver's
    /// subscription looks like. The gate re-validates the end date: an
    /// Active profile whose period has lapsed is downgraded to Inactive
    /// here and the publish fails — there is no background expiry job.
    pub async fn publish(&self, auth: &AuthContext, input: PublishTrip) -> CoreResult<Trip> {
        let from = input.from.trim().to_string();
        let to = input.to.trim().to_string();

        if from.is_empty() || to.is_empty() {
            return Err(CoreError::ValidationError(
                "origin and destination are required".into(),
            ));
        }
        if from.eq_ignore_ascii_case(&to) {
            return Err(CoreError::ValidationError(
                "origin and destination must differ".into(),
            ));
        }
        if !(input.price > 0.0) {
            return Err(CoreError::ValidationError(
                "price must be greater than zero".into(),
            ));
        }
        if input.seats < 1 {
            return Err(CoreError::ValidationError(
                "a trip needs at least one seat".into(),
            ));
        }

        auth.require_role(Role::Driver)?;

        let profile = self
            .profiles
            .get(auth.user_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("profile {}", auth.user_id)))?;

        let now = Utc::now();
        match profile.subscription_status {
            SubscriptionStatus::Active if profile.subscription_in_force(now) => {}
            SubscriptionStatus::Active => {
                // Lazy expiry: the period ran out since the admin approved it.
                self.profiles
                    .transition_subscription(
                        auth.user_id,
                        &[SubscriptionStatus::Active],
                        SubscriptionStatus::Inactive,
                        None,
                    )
                    .await?;
                warn!(driver = %auth.user_id, "subscription lapsed, downgraded at publish time");
                return Err(CoreError::GateError(
                    "subscription expired, renew to publish trips".into(),
                ));
            }
            _ => {
                return Err(CoreError::GateError(
                    "an active subscription is required to publish trips".into(),
                ));
            }
        }

        let origin = cities::find(&from);
        let trip = Trip {
            id: input.trip_id.unwrap_or_else(Uuid::new_v4),
            driver_id: auth.user_id,
            from_loc: from,
            to_loc: to,
            date: input.date,
            time: input.time,
            price: input.price,
            seats_total: input.seats,
            seats_available: input.seats,
            status: TripStatus::Open,
            features: input.features,
            driver_lat: origin.map(|c| c.lat),
            driver_lng: origin.map(|c| c.lng),
            created_at: now,
        };

        let timeout = Duration::from_secs(self.rules.publish_timeout_seconds);
        match tokio::time::timeout(timeout, self.trips.insert(&trip)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(CoreError::TimeoutError(format!(
                    "publish did not complete within {}s; the outcome is unknown — \
                     retry with the same trip id if needed",
                    self.rules.publish_timeout_seconds
                )));
            }
        }

        self.invalidate_listing().await;
        info!(trip = %trip.id, driver = %trip.driver_id, "trip published");
        Ok(trip)
    }

    /// Open trips with a date of today or later, optionally filtered by
    /// origin city, soonest first. Served from a short-TTL cache; mutations
    /// invalidate it, so staleness is bounded by the TTL either way.
    pub async fn list_open(&self, from_city: Option<&str>) -> CoreResult<Vec<Trip>> {
        let key = format!("open:{}", from_city.unwrap_or("*"));
        if let Ok(Some(cached)) = self.cache.get(&key).await {
            return Ok(cached);
        }

        let today = Utc::now().date_naive();
        let trips = self.trips.list_open(from_city, today).await?;
        if let Err(e) = self
            .cache
            .put(&key, &trips, self.rules.listing_cache_seconds)
            .await
        {
            warn!("listing cache write failed: {}", e);
        }
        Ok(trips)
    }

    /// The driver's own trips, newest first.
    pub async fn driver_trips(&self, auth: &AuthContext) -> CoreResult<Vec<Trip>> {
        self.trips.list_by_driver(auth.user_id).await
    }

    /// The driver's completed trips, most recent departure first.
    pub async fn driver_history(&self, auth: &AuthContext) -> CoreResult<Vec<Trip>> {
        let mut trips: Vec<Trip> = self
            .trips
            .list_by_driver(auth.user_id)
            .await?
            .into_iter()
            .filter(|t| t.status == TripStatus::Completed)
            .collect();
        trips.sort_by(|a, b| (b.date, b.time).cmp(&(a.date, a.time)));
        Ok(trips)
    }

    /// Owner-only hard delete. Deletion is refused while an accepted
    /// passenger is on board; outstanding pending requests are rejected
    /// first and returned so the caller can notify those passengers.
    pub async fn delete(&self, auth: &AuthContext, trip_id: Uuid) -> CoreResult<Vec<TripRequest>> {
        let trip = self
            .trips
            .get(trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("trip {}", trip_id)))?;

        if trip.driver_id != auth.user_id {
            return Err(CoreError::AuthorizationError(
                "only the owning driver can delete a trip".into(),
            ));
        }

        let requests = self.requests.list_for_trip(trip_id).await?;
        if requests.iter().any(|r| r.status == RequestStatus::Accepted) {
            return Err(CoreError::StateError(
                "trip has accepted passengers; complete it instead of deleting".into(),
            ));
        }

        let rejected = self.requests.reject_pending_for_trip(trip_id).await?;
        self.trips.delete(trip_id).await?;
        self.invalidate_listing().await;
        info!(trip = %trip_id, cascaded = rejected.len(), "trip deleted");
        Ok(rejected)
    }

    /// Owner-only Open|Full -> Completed. Completing is what opens the trip
    /// up for reviews and counts toward the driver's completed-trips tally.
    pub async fn complete(&self, auth: &AuthContext, trip_id: Uuid) -> CoreResult<Trip> {
        let trip = self
            .trips
            .get(trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("trip {}", trip_id)))?;

        if trip.driver_id != auth.user_id {
            return Err(CoreError::AuthorizationError(
                "only the owning driver can complete a trip".into(),
            ));
        }

        let updated = self
            .trips
            .set_status(
                trip_id,
                &[TripStatus::Open, TripStatus::Full],
                TripStatus::Completed,
            )
            .await?;
        self.profiles.increment_trips_completed(auth.user_id).await?;
        self.invalidate_listing().await;
        Ok(updated)
    }

    async fn invalidate_listing(&self) {
        if let Err(e) = self.cache.invalidate().await {
            warn!("listing cache invalidation failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use halador_core::memory::{MemoryListingCache, MemoryStore};
    use halador_core::profile::Profile;

    struct Fixture {
        store: Arc<MemoryStore>,
        catalog: TripCatalog,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let catalog = TripCatalog::new(
            store.clone(),
            store.clone(),
            store.clone(),
            Arc::new(MemoryListingCache::new()),
            CatalogRules::default(),
        );
        Fixture { store, catalog }
    }

    async fn seed_driver(store: &Arc<MemoryStore>, status: SubscriptionStatus) -> AuthContext {
        let id = Uuid::new_v4();
        let mut profile = Profile::new(id, "Test Driver", Role::Driver);
        profile.subscription_status = status;
        if status == SubscriptionStatus::Active {
            profile.subscription_end_date = Some(Utc::now() + chrono::Duration::days(30));
        }
        ProfileRepository::insert(store.as_ref(), &profile).await.unwrap();
        AuthContext::new(id, Role::Driver)
    }

    fn publish_input(from: &str, to: &str, days_ahead: u64) -> PublishTrip {
        PublishTrip {
            trip_id: None,
            from: from.into(),
            to: to.into(),
            date: Utc::now().date_naive() + Days::new(days_ahead),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            price: 30.0,
            seats: 3,
            features: vec!["ac".into()],
        }
    }

    #[tokio::test]
    async fn publish_validates_inputs_before_gate() {
        let f = fixture();
        // Inactive subscription on purpose: a bad price must surface as
        // validation, not as the gate.
        let auth = seed_driver(&f.store, SubscriptionStatus::Inactive).await;

        let mut input = publish_input("Lima", "Arequipa", 7);
        input.price = 0.0;
        let err = f.catalog.publish(&auth, input).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let mut input = publish_input("Lima", "Arequipa", 7);
        input.seats = 0;
        let err = f.catalog.publish(&auth, input).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let input = publish_input("Lima", "Lima", 7);
        let err = f.catalog.publish(&auth, input).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn publish_requires_active_subscription() {
        let f = fixture();
        for status in [SubscriptionStatus::Inactive, SubscriptionStatus::Pending] {
            let auth = seed_driver(&f.store, status).await;
            let err = f
                .catalog
                .publish(&auth, publish_input("Lima", "Cusco", 7))
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::GateError(_)));
        }
    }

    #[tokio::test]
    async fn publish_downgrades_lapsed_subscription() {
        let f = fixture();
        let auth = seed_driver(&f.store, SubscriptionStatus::Active).await;
        // Push the end date into the past.
        f.store
            .transition_subscription(
                auth.user_id,
                &[SubscriptionStatus::Active],
                SubscriptionStatus::Active,
                Some(Utc::now() - chrono::Duration::days(1)),
            )
            .await
            .unwrap();

        let err = f
            .catalog
            .publish(&auth, publish_input("Lima", "Cusco", 7))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::GateError(_)));

        let profile = ProfileRepository::get(f.store.as_ref(), auth.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.subscription_status, SubscriptionStatus::Inactive);
        assert!(profile.subscription_end_date.is_none());
    }

    #[tokio::test]
    async fn publish_sets_open_status_and_coordinates() {
        let f = fixture();
        let auth = seed_driver(&f.store, SubscriptionStatus::Active).await;

        let trip = f
            .catalog
            .publish(&auth, publish_input("Lima", "Arequipa", 7))
            .await
            .unwrap();

        assert_eq!(trip.status, TripStatus::Open);
        assert_eq!(trip.seats_available, trip.seats_total);
        assert!(trip.driver_lat.is_some());
        assert!(trip.driver_lng.is_some());
    }

    #[tokio::test]
    async fn list_open_filters_city_and_past_dates() {
        let f = fixture();
        let auth = seed_driver(&f.store, SubscriptionStatus::Active).await;

        f.catalog
            .publish(&auth, publish_input("Lima", "Arequipa", 3))
            .await
            .unwrap();
        f.catalog
            .publish(&auth, publish_input("Cusco", "Lima", 1))
            .await
            .unwrap();

        // A trip whose date already passed, inserted behind the service.
        let mut stale = publish_input("Lima", "Ica", 1);
        stale.date = Utc::now().date_naive() - Days::new(2);
        let stale_trip = Trip {
            id: Uuid::new_v4(),
            driver_id: auth.user_id,
            from_loc: stale.from,
            to_loc: stale.to,
            date: stale.date,
            time: stale.time,
            price: stale.price,
            seats_total: stale.seats,
            seats_available: stale.seats,
            status: TripStatus::Open,
            features: vec![],
            driver_lat: None,
            driver_lng: None,
            created_at: Utc::now(),
        };
        TripRepository::insert(f.store.as_ref(), &stale_trip).await.unwrap();

        let all = f.catalog.list_open(None).await.unwrap();
        assert_eq!(all.len(), 2);
        // Soonest first.
        assert_eq!(all[0].from_loc, "Cusco");

        let lima_only = f.catalog.list_open(Some("Lima")).await.unwrap();
        assert_eq!(lima_only.len(), 1);
        assert_eq!(lima_only[0].to_loc, "Arequipa");
    }

    #[tokio::test]
    async fn publish_invalidates_listing_cache() {
        let f = fixture();
        let auth = seed_driver(&f.store, SubscriptionStatus::Active).await;

        f.catalog
            .publish(&auth, publish_input("Lima", "Arequipa", 3))
            .await
            .unwrap();
        assert_eq!(f.catalog.list_open(None).await.unwrap().len(), 1);

        f.catalog
            .publish(&auth, publish_input("Lima", "Cusco", 4))
            .await
            .unwrap();
        // The second publish must be visible immediately, not after the TTL.
        assert_eq!(f.catalog.list_open(None).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn delete_requires_ownership_and_rejects_pending() {
        let f = fixture();
        let auth = seed_driver(&f.store, SubscriptionStatus::Active).await;
        let trip = f
            .catalog
            .publish(&auth, publish_input("Lima", "Arequipa", 7))
            .await
            .unwrap();

        let stranger = AuthContext::new(Uuid::new_v4(), Role::Driver);
        let err = f.catalog.delete(&stranger, trip.id).await.unwrap_err();
        assert!(matches!(err, CoreError::AuthorizationError(_)));

        let passenger_id = Uuid::new_v4();
        let request = TripRequest {
            id: Uuid::new_v4(),
            trip_id: trip.id,
            passenger_id,
            passenger_name: "Ana".into(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        TripRequestRepository::insert(f.store.as_ref(), &request).await.unwrap();

        let rejected = f.catalog.delete(&auth, trip.id).await.unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].status, RequestStatus::Rejected);
        assert!(TripRepository::get(f.store.as_ref(), trip.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn delete_refused_with_accepted_passenger() {
        let f = fixture();
        let auth = seed_driver(&f.store, SubscriptionStatus::Active).await;
        let trip = f
            .catalog
            .publish(&auth, publish_input("Lima", "Arequipa", 7))
            .await
            .unwrap();

        let request = TripRequest {
            id: Uuid::new_v4(),
            trip_id: trip.id,
            passenger_id: Uuid::new_v4(),
            passenger_name: "Ana".into(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        TripRequestRepository::insert(f.store.as_ref(), &request).await.unwrap();
        f.store.accept(request.id).await.unwrap();

        let err = f.catalog.delete(&auth, trip.id).await.unwrap_err();
        assert!(matches!(err, CoreError::StateError(_)));
        assert!(TripRepository::get(f.store.as_ref(), trip.id)
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn complete_marks_trip_and_counts_it() {
        let f = fixture();
        let auth = seed_driver(&f.store, SubscriptionStatus::Active).await;
        let trip = f
            .catalog
            .publish(&auth, publish_input("Lima", "Arequipa", 7))
            .await
            .unwrap();

        let completed = f.catalog.complete(&auth, trip.id).await.unwrap();
        assert_eq!(completed.status, TripStatus::Completed);

        let profile = ProfileRepository::get(f.store.as_ref(), auth.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.trips_completed, 1);

        // Completing twice is an invalid transition.
        let err = f.catalog.complete(&auth, trip.id).await.unwrap_err();
        assert!(matches!(err, CoreError::StateError(_)));
    }
}
