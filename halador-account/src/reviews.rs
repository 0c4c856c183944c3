use std::sync::Arc;

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use halador_core::auth::AuthContext;
use halador_core::repository::{
    ProfileRepository, ReviewRepository, TripRepository, TripRequestRepository,
};
use halador_core::request::RequestStatus;
use halador_core::review::Review;
use halador_core::trip::TripStatus;
use halador_core::{CoreError, CoreResult};

/// Post-trip ratings and the reputation aggregate they feed.
pub struct ReviewLedger {
    reviews: Arc<dyn ReviewRepository>,
    trips: Arc<dyn TripRepository>,
    requests: Arc<dyn TripRequestRepository>,
    profiles: Arc<dyn ProfileRepository>,
}

impl ReviewLedger {
    pub fn new(
        reviews: Arc<dyn ReviewRepository>,
        trips: Arc<dyn TripRepository>,
        requests: Arc<dyn TripRequestRepository>,
        profiles: Arc<dyn ProfileRepository>,
    ) -> Self {
        Self {
            reviews,
            trips,
            requests,
            profiles,
        }
    }

    /// Submit a rating for a completed trip. The reviewee is always the
    /// trip's driver; only a passenger whose request was accepted may
    /// review, and only once per trip. The reviewee's rating aggregate is
    /// updated in the same call — it is not deferred to any batch job.
    pub async fn submit(
        &self,
        auth: &AuthContext,
        trip_id: Uuid,
        rating: i32,
        comment: Option<String>,
    ) -> CoreResult<Review> {
        if !(1..=5).contains(&rating) {
            return Err(CoreError::ValidationError(
                "rating must be between 1 and 5".into(),
            ));
        }

        let trip = self
            .trips
            .get(trip_id)
            .await?
            .ok_or_else(|| CoreError::NotFoundError(format!("trip {}", trip_id)))?;

        if trip.status != TripStatus::Completed {
            return Err(CoreError::ValidationError(
                "reviews open once the trip is completed".into(),
            ));
        }

        let rode = self
            .requests
            .list_for_trip(trip_id)
            .await?
            .iter()
            .any(|r| r.passenger_id == auth.user_id && r.status == RequestStatus::Accepted);
        if !rode {
            return Err(CoreError::AuthorizationError(
                "only accepted passengers of this trip can review it".into(),
            ));
        }

        if self.reviews.exists(trip_id, auth.user_id).await? {
            return Err(CoreError::DuplicateError(
                "you already reviewed this trip".into(),
            ));
        }

        let review = Review {
            id: Uuid::new_v4(),
            trip_id,
            reviewer_id: auth.user_id,
            reviewee_id: trip.driver_id,
            rating,
            comment: comment.filter(|c| !c.trim().is_empty()),
            created_at: Utc::now(),
        };
        // The store enforces (trip, reviewer) uniqueness as well; the check
        // above just gives the friendlier error in the common path.
        self.reviews.insert(&review).await?;
        self.profiles.apply_review_score(trip.driver_id, rating).await?;
        info!(trip = %trip_id, reviewer = %auth.user_id, rating, "review submitted");
        Ok(review)
    }

    /// Reviews received by a profile, newest first.
    pub async fn received_by(&self, profile_id: Uuid) -> CoreResult<Vec<Review>> {
        self.reviews.list_for_reviewee(profile_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Days, NaiveTime};
    use halador_core::memory::MemoryStore;
    use halador_core::profile::{Profile, Role};
    use halador_core::request::TripRequest;
    use halador_core::trip::Trip;

    struct Fixture {
        store: Arc<MemoryStore>,
        ledger: ReviewLedger,
        driver: AuthContext,
        passenger: AuthContext,
        trip_id: Uuid,
    }

    /// Driver + accepted passenger on a completed trip, ready to review.
    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());

        let driver_id = Uuid::new_v4();
        let passenger_id = Uuid::new_v4();
        ProfileRepository::insert(store.as_ref(), &Profile::new(driver_id, "Diego", Role::Driver))
            .await
            .unwrap();
        ProfileRepository::insert(
            store.as_ref(),
            &Profile::new(passenger_id, "Ana", Role::Passenger),
        )
        .await
        .unwrap();

        let trip = Trip {
            id: Uuid::new_v4(),
            driver_id,
            from_loc: "Lima".into(),
            to_loc: "Arequipa".into(),
            date: Utc::now().date_naive() + Days::new(1),
            time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            price: 30.0,
            seats_total: 3,
            seats_available: 3,
            status: TripStatus::Open,
            features: vec![],
            driver_lat: None,
            driver_lng: None,
            created_at: Utc::now(),
        };
        TripRepository::insert(store.as_ref(), &trip).await.unwrap();

        let request = TripRequest {
            id: Uuid::new_v4(),
            trip_id: trip.id,
            passenger_id,
            passenger_name: "Ana".into(),
            status: RequestStatus::Pending,
            created_at: Utc::now(),
        };
        TripRequestRepository::insert(store.as_ref(), &request).await.unwrap();
        store.accept(request.id).await.unwrap();
        TripRepository::set_status(
            store.as_ref(),
            trip.id,
            &[TripStatus::Open, TripStatus::Full],
            TripStatus::Completed,
        )
        .await
        .unwrap();

        Fixture {
            ledger: ReviewLedger::new(store.clone(), store.clone(), store.clone(), store.clone()),
            store,
            driver: AuthContext::new(driver_id, Role::Driver),
            passenger: AuthContext::new(passenger_id, Role::Passenger),
            trip_id: trip.id,
        }
    }

    #[tokio::test]
    async fn review_updates_driver_reputation() {
        let f = fixture().await;

        let review = f
            .ledger
            .submit(&f.passenger, f.trip_id, 5, Some("Buen viaje".into()))
            .await
            .unwrap();
        assert_eq!(review.reviewee_id, f.driver.user_id);

        let profile = ProfileRepository::get(f.store.as_ref(), f.driver.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.rating_count, 1);
        assert!((profile.rating_average - 5.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn rating_is_averaged_over_reviews() {
        let f = fixture().await;
        f.ledger.submit(&f.passenger, f.trip_id, 4, None).await.unwrap();

        // A second passenger on the same completed trip.
        let other_id = Uuid::new_v4();
        ProfileRepository::insert(
            f.store.as_ref(),
            &Profile::new(other_id, "Luis", Role::Passenger),
        )
        .await
        .unwrap();
        let request = TripRequest {
            id: Uuid::new_v4(),
            trip_id: f.trip_id,
            passenger_id: other_id,
            passenger_name: "Luis".into(),
            status: RequestStatus::Accepted,
            created_at: Utc::now(),
        };
        TripRequestRepository::insert(f.store.as_ref(), &request).await.unwrap();

        let other = AuthContext::new(other_id, Role::Passenger);
        f.ledger.submit(&other, f.trip_id, 5, None).await.unwrap();

        let profile = ProfileRepository::get(f.store.as_ref(), f.driver.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.rating_count, 2);
        assert!((profile.rating_average - 4.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn rating_bounds_are_enforced() {
        let f = fixture().await;
        for rating in [0, 6, -1] {
            let err = f
                .ledger
                .submit(&f.passenger, f.trip_id, rating, None)
                .await
                .unwrap_err();
            assert!(matches!(err, CoreError::ValidationError(_)));
        }
    }

    #[tokio::test]
    async fn reviews_require_a_completed_trip() {
        let f = fixture().await;
        // Wind the trip back to open behind the service's back.
        TripRepository::set_status(
            f.store.as_ref(),
            f.trip_id,
            &[TripStatus::Completed],
            TripStatus::Open,
        )
        .await
        .unwrap();

        let err = f
            .ledger
            .submit(&f.passenger, f.trip_id, 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)));
    }

    #[tokio::test]
    async fn only_accepted_passengers_review() {
        let f = fixture().await;
        let bystander = AuthContext::new(Uuid::new_v4(), Role::Passenger);
        let err = f
            .ledger
            .submit(&bystander, f.trip_id, 5, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::AuthorizationError(_)));
    }

    #[tokio::test]
    async fn second_review_is_rejected_and_first_preserved() {
        let f = fixture().await;
        f.ledger
            .submit(&f.passenger, f.trip_id, 5, Some("Excelente".into()))
            .await
            .unwrap();

        let err = f
            .ledger
            .submit(&f.passenger, f.trip_id, 1, None)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateError(_)));

        let reviews = f.ledger.received_by(f.driver.user_id).await.unwrap();
        assert_eq!(reviews.len(), 1);
        assert_eq!(reviews[0].rating, 5);
        assert_eq!(reviews[0].comment.as_deref(), Some("Excelente"));

        // The failed duplicate must not have touched the aggregate.
        let profile = ProfileRepository::get(f.store.as_ref(), f.driver.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.rating_count, 1);
    }
}
