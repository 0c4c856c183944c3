use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use halador_core::auth::AuthContext;
use halador_core::profile::Role;
use halador_core::repository::{
    ProfileRepository, ReviewRepository, TripRepository, TripRequestRepository,
};
use halador_core::request::{AcceptedRequest, RequestStatus, TripRequest};
use halador_core::trip::{Trip, TripStatus};
use halador_core::{CoreError, CoreResult};

/// A request as the owning driver sees it. The passenger's phone is only
/// joined in once the request has been accepted; pending requesters stay
/// reachable through the app alone.
#[derive(Debug, Clone, Serialize)]
pub struct DriverRequestView {
    pub request: TripRequest,
    pub trip: Trip,
    pub passenger_phone: Option<String>,
}

/// A request as the passenger who made it sees it. Same privacy rule in the
/// other direction: the driver's phone appears once the seat is confirmed.
#[derive(Debug, Clone, Serialize)]
pub struct PassengerRequestView {
    pub request: TripRequest,
    pub trip: Trip,
    pub driver_name: String,
    pub driver_phone: Option<String>,
}

/// One completed ride in the passenger's history, with whether they have
/// already left a review for it.
#[derive(Debug, Clone, Serialize)]
pub struct RideHistoryEntry {
    pub trip: Trip,
    pub request_id: Uuid,
    pub driver_name: String,
    pub has_reviewed: bool,
}

/// The passenger-booking lifecycle against a trip's seat inventory.
pub struct RequestLedger {
    requests: Arc<dyn TripRequestRepository>,
    trips: Arc<dyn TripRepository>,
    profiles: Arc<dyn ProfileRepository>,
    reviews: Arc<dyn ReviewRepository>,
}

impl RequestLedger {
    pub fn new(
        requests: Arc<dyn TripRequestRepository>,
        trips: Arc<dyn TripRepository>,
        profiles: Arc<dyn ProfileRepository>,
        reviews: Arc<dyn ReviewRepository>,
    ) -> Self {
        Self {
            requests,
            trips,
            profiles,
            reviews,
        }
    }

    /// Queue a seat request. Availability is deliberately NOT checked here:
    /// several passengers may line up for the same last seat and the driver
    /// picks who gets it at accept time.
    pub async fn create(&self, auth: &AuthContext, trip_id: Uuid) -> CoreResult<(TripRequest, Trip)> {
        if auth.role != Role::Passenger {
            return Err(CoreError::ValidationError(
                "an authenticated passenger is required to request a seat".into(),
            ));
        }

        let trip = self
            .trips
            .get(trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("trip {}", trip_id)))?;

        if trip.driver_id == auth.user_id {
            return Err(CoreError::ValidationError(
                "cannot request a seat on your own trip".into(),
            ));
        }

        let profile = self
            .profiles
            .get(auth.user_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("profile {}", auth.user_id)))?;

        let request = TripRequest {
            id: Uuid::new_v4(),
            trip_id,
            passenger_id: auth.user_id,
            passenger_name: profile.full_name,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        self.requests.insert(&request).await?;
        info!(request = %request.id, trip = %trip_id, "seat requested");
        Ok((request, trip))
    }

    /// Accept a pending request. The ownership check happens here; the
    /// pending check, the capacity check, and the seat decrement happen
    /// inside the repository's single atomic operation, so concurrent
    /// accepts of the last seat cannot both pass.
    pub async fn accept(&self, auth: &AuthContext, request_id: Uuid) -> CoreResult<AcceptedRequest> {
        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("request {}", request_id)))?;

        let trip = self
            .trips
            .get(request.trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("trip {}", request.trip_id)))?;

        if trip.driver_id != auth.user_id {
            return Err(CoreError::AuthorizationError(
                "only the owning driver can accept a request".into(),
            ));
        }

        let accepted = self.requests.accept(request_id).await?;
        info!(
            request = %request_id,
            trip = %accepted.trip.id,
            seats_left = accepted.trip.seats_available,
            "request accepted"
        );
        Ok(accepted)
    }

    /// Reject a pending request. Seat inventory is untouched.
    pub async fn reject(&self, auth: &AuthContext, request_id: Uuid) -> CoreResult<TripRequest> {
        let request = self
            .requests
            .get(request_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("request {}", request_id)))?;

        let trip = self
            .trips
            .get(request.trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("trip {}", request.trip_id)))?;

        if trip.driver_id != auth.user_id {
            return Err(CoreError::AuthorizationError(
                "only the owning driver can reject a request".into(),
            ));
        }

        self.requests.reject(request_id).await
    }

    /// Incoming requests across the driver's trips, newest first.
    pub async fn list_for_driver(&self, auth: &AuthContext) -> CoreResult<Vec<DriverRequestView>> {
        let requests = self.requests.list_for_driver(auth.user_id).await?;
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            // A request whose trip vanished mid-listing is skipped rather
            // than failing the whole view.
            let Some(trip) = self.trips.get(request.trip_id).await? else {
                continue;
            };
            let passenger_phone = if request.status == RequestStatus::Accepted {
                self.profiles
                    .get(request.passenger_id)
                    .await?
                    .and_then(|p| p.phone)
            } else {
                None
            };
            views.push(DriverRequestView {
                request,
                trip,
                passenger_phone,
            });
        }
        Ok(views)
    }

    /// The passenger's own requests, newest first, with trip and driver.
    pub async fn list_for_passenger(
        &self,
        auth: &AuthContext,
    ) -> CoreResult<Vec<PassengerRequestView>> {
        let requests = self.requests.list_for_passenger(auth.user_id).await?;
        let mut views = Vec::with_capacity(requests.len());
        for request in requests {
            let Some(trip) = self.trips.get(request.trip_id).await? else {
                continue;
            };
            let driver = self.profiles.get(trip.driver_id).await?;
            let driver_name = driver
                .as_ref()
                .map(|p| p.full_name.clone())
                .unwrap_or_default();
            let driver_phone = if request.status == RequestStatus::Accepted {
                driver.and_then(|p| p.phone)
            } else {
                None
            };
            views.push(PassengerRequestView {
                request,
                trip,
                driver_name,
                driver_phone,
            });
        }
        Ok(views)
    }

    /// Rides the passenger actually took: accepted requests whose trip has
    /// been completed, flagged with whether a review was already left.
    pub async fn passenger_history(&self, auth: &AuthContext) -> CoreResult<Vec<RideHistoryEntry>> {
        let requests = self.requests.list_for_passenger(auth.user_id).await?;
        let mut entries = Vec::new();
        for request in requests {
            if request.status != RequestStatus::Accepted {
                continue;
            }
            let Some(trip) = self.trips.get(request.trip_id).await? else {
                continue;
            };
            if trip.status != TripStatus::Completed {
                continue;
            }
            let driver_name = self
                .profiles
                .get(trip.driver_id)
                .await?
                .map(|p| p.full_name)
                .unwrap_or_default();
            let has_reviewed = self.reviews.exists(trip.id, auth.user_id).await?;
            entries.push(RideHistoryEntry {
                request_id: request.id,
                trip,
                driver_name,
                has_reviewed,
            });
        }
        entries.sort_by(|a, b| (b.trip.date, b.trip.time).cmp(&(a.trip.date, a.trip.time)));
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveTime};
    use halador_core::memory::MemoryStore;
    use halador_core::profile::Profile;

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: RequestLedger,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let ledger = RequestLedger::new(store.clone(), store.clone(), store.clone(), store.clone());
        Fixture { store, ledger }
    }

    async fn seed_profile(store: &Arc<MemoryStore>, name: &str, role: Role) -> AuthContext {
        let id = Uuid::new_v4();
        let mut profile = Profile::new(id, name, role);
        profile.phone = Some("+51 999 111 222".into());
        ProfileRepository::insert(store.as_ref(), &profile).await.unwrap();
        AuthContext::new(id, role)
    }

    async fn seed_trip(store: &Arc<MemoryStore>, driver: &AuthContext, seats: i32) -> Trip {
        let trip = Trip {
            id: Uuid::new_v4(),
            driver_id: driver.user_id,
            from_loc: "Lima".into(),
            to_loc: "Arequipa".into(),
            date: Utc::now().date_naive() + Days::new(7),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            price: 30.0,
            seats_total: seats,
            seats_available: seats,
            status: TripStatus::Open,
            features: vec![],
            driver_lat: None,
            driver_lng: None,
            created_at: Utc::now(),
        };
        TripRepository::insert(store.as_ref(), &trip).await.unwrap();
        trip
    }

    #[tokio::test]
    async fn create_snapshots_passenger_name() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let passenger = seed_profile(&f.store, "Ana Quispe", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 3).await;

        let (request, _) = f.ledger.create(&passenger, trip.id).await.unwrap();
        assert_eq!(request.passenger_name, "Ana Quispe");
        assert_eq!(request.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn create_refuses_own_trip_and_unknown_trip() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let trip = seed_trip(&f.store, &driver, 3).await;

        let as_passenger = AuthContext::new(driver.user_id, Role::Passenger);
        let err = f.ledger.create(&as_passenger, trip.id).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));

        let passenger = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let err = f.ledger.create(&passenger, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFoundError(_)));
    }

    #[tokio::test]
    async fn accept_decrements_seats_and_flips_request() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let passenger = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 3).await;

        let (request, _) = f.ledger.create(&passenger, trip.id).await.unwrap();
        let accepted = f.ledger.accept(&driver, request.id).await.unwrap();

        assert_eq!(accepted.request.status, RequestStatus::Accepted);
        assert_eq!(accepted.trip.seats_available, 2);
        assert_eq!(accepted.trip.status, TripStatus::Open);
    }

    #[tokio::test]
    async fn accepting_last_seat_marks_trip_full() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let passenger = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 1).await;

        let (request, _) = f.ledger.create(&passenger, trip.id).await.unwrap();
        let accepted = f.ledger.accept(&driver, request.id).await.unwrap();

        assert_eq!(accepted.trip.seats_available, 0);
        assert_eq!(accepted.trip.status, TripStatus::Full);
    }

    #[tokio::test]
    async fn accept_requires_trip_ownership() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let other_driver = seed_profile(&f.store, "Marco", Role::Driver).await;
        let passenger = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 3).await;

        let (request, _) = f.ledger.create(&passenger, trip.id).await.unwrap();
        let err = f.ledger.accept(&other_driver, request.id).await.unwrap_err();
        assert!(matches!(err, CoreError::AuthorizationError(_)));
    }

    #[tokio::test]
    async fn accept_is_pending_only() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let passenger = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 3).await;

        let (request, _) = f.ledger.create(&passenger, trip.id).await.unwrap();
        f.ledger.accept(&driver, request.id).await.unwrap();

        // Accepting again must not burn a second seat.
        let err = f.ledger.accept(&driver, request.id).await.unwrap_err();
        assert!(matches!(err, CoreError::StateError(_)));

        let trip = TripRepository::get(f.store.as_ref(), trip.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trip.seats_available, 2);

        let err = f.ledger.reject(&driver, request.id).await.unwrap_err();
        assert!(matches!(err, CoreError::StateError(_)));
    }

    #[tokio::test]
    async fn accept_fails_when_capacity_exhausted() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let p1 = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let p2 = seed_profile(&f.store, "Luis", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 1).await;

        let (r1, _) = f.ledger.create(&p1, trip.id).await.unwrap();
        let (r2, _) = f.ledger.create(&p2, trip.id).await.unwrap();

        f.ledger.accept(&driver, r1.id).await.unwrap();
        let err = f.ledger.accept(&driver, r2.id).await.unwrap_err();
        assert!(matches!(err, CoreError::CapacityError(_)));

        let trip = TripRepository::get(f.store.as_ref(), trip.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trip.seats_available, 0);
        // The losing request is still pending; the driver may reject it.
        let r2 = TripRequestRepository::get(f.store.as_ref(), r2.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(r2.status, RequestStatus::Pending);
    }

    #[tokio::test]
    async fn concurrent_accepts_of_last_seat_admit_exactly_one() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let p1 = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let p2 = seed_profile(&f.store, "Luis", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 1).await;

        let (r1, _) = f.ledger.create(&p1, trip.id).await.unwrap();
        let (r2, _) = f.ledger.create(&p2, trip.id).await.unwrap();

        // Two driver sessions racing each other, e.g. two open tabs.
        let ledger = Arc::new(f.ledger);
        let a = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.accept(&driver, r1.id).await })
        };
        let b = {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.accept(&driver, r2.id).await })
        };

        let results = [a.await.unwrap(), b.await.unwrap()];
        let wins = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(wins, 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(CoreError::CapacityError(_)))));

        let trip = TripRepository::get(f.store.as_ref(), trip.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trip.seats_available, 0);
        assert!(trip.seats_available <= trip.seats_total && trip.seats_available >= 0);
    }

    #[tokio::test]
    async fn reject_leaves_inventory_alone() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let passenger = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 3).await;

        let (request, _) = f.ledger.create(&passenger, trip.id).await.unwrap();
        let rejected = f.ledger.reject(&driver, request.id).await.unwrap();
        assert_eq!(rejected.status, RequestStatus::Rejected);

        let trip = TripRepository::get(f.store.as_ref(), trip.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(trip.seats_available, 3);
    }

    #[tokio::test]
    async fn driver_listing_hides_pending_phone_numbers() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let p1 = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let p2 = seed_profile(&f.store, "Luis", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 3).await;

        let (r1, _) = f.ledger.create(&p1, trip.id).await.unwrap();
        let (_r2, _) = f.ledger.create(&p2, trip.id).await.unwrap();
        f.ledger.accept(&driver, r1.id).await.unwrap();

        let views = f.ledger.list_for_driver(&driver).await.unwrap();
        assert_eq!(views.len(), 2);
        for view in views {
            match view.request.status {
                RequestStatus::Accepted => assert!(view.passenger_phone.is_some()),
                _ => assert!(view.passenger_phone.is_none()),
            }
        }
    }

    #[tokio::test]
    async fn passenger_history_lists_completed_rides() {
        let f = fixture();
        let driver = seed_profile(&f.store, "Diego", Role::Driver).await;
        let passenger = seed_profile(&f.store, "Ana", Role::Passenger).await;
        let trip = seed_trip(&f.store, &driver, 3).await;

        let (request, _) = f.ledger.create(&passenger, trip.id).await.unwrap();
        f.ledger.accept(&driver, request.id).await.unwrap();

        // Not completed yet: no history.
        assert!(f.ledger.passenger_history(&passenger).await.unwrap().is_empty());

        TripRepository::set_status(
            f.store.as_ref(),
            trip.id,
            &[TripStatus::Open, TripStatus::Full],
            TripStatus::Completed,
        )
        .await
        .unwrap();

        let history = f.ledger.passenger_history(&passenger).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].driver_name, "Diego");
        assert!(!history[0].has_reviewed);
    }
}
