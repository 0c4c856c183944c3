use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::profile::{ContactUpdate, Profile, SubscriptionStatus};
use crate::request::{AcceptedRequest, TripRequest};
use crate::review::Review;
use crate::trip::{Trip, TripStatus};
use crate::CoreResult;

/// Repository trait for profile data access.
#[async_trait]
pub trait ProfileRepository: Send + Sync {
    /// Insert a new profile. Fails with `DuplicateError` if the id exists.
    async fn insert(&self, profile: &Profile) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Profile>>;

    /// Owner edit of phone/vehicle fields. `None` fields are left untouched.
    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> CoreResult<Profile>;

    /// Conditional subscription transition: succeeds only while the current
    /// status is one of `expected`, otherwise fails with `StateError`. This
    /// is the sole write path for subscription fields.
    async fn transition_subscription(
        &self,
        id: Uuid,
        expected: &[SubscriptionStatus],
        new_status: SubscriptionStatus,
        end_date: Option<DateTime<Utc>>,
    ) -> CoreResult<Profile>;

    /// Fold one rating into the reviewee's aggregate, atomically with
    /// respect to other reviews.
    async fn apply_review_score(&self, id: Uuid, rating: i32) -> CoreResult<()>;

    async fn increment_trips_completed(&self, id: Uuid) -> CoreResult<()>;

    async fn list_pending_subscriptions(&self) -> CoreResult<Vec<Profile>>;
}

/// Repository trait for trip data access.
#[async_trait]
pub trait TripRepository: Send + Sync {
    /// Insert a trip. Idempotent on `trip.id`: re-inserting an id that is
    /// already present is a no-op, so a publish retried after an
    /// indeterminate timeout cannot create a duplicate row.
    async fn insert(&self, trip: &Trip) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<Trip>>;

    /// Open trips with `date >= min_date`, optionally restricted to one
    /// origin city, ordered by date then departure time ascending.
    async fn list_open(&self, from_city: Option<&str>, min_date: NaiveDate)
        -> CoreResult<Vec<Trip>>;

    /// All trips owned by a driver, newest first.
    async fn list_by_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Trip>>;

    /// Conditional status change: fails with `StateError` unless the current
    /// status is one of `expected`.
    async fn set_status(
        &self,
        id: Uuid,
        expected: &[TripStatus],
        new_status: TripStatus,
    ) -> CoreResult<Trip>;

    /// Hard delete. The caller is responsible for the cascade policy on
    /// outstanding requests before calling this.
    async fn delete(&self, id: Uuid) -> CoreResult<()>;
}

/// Repository trait for trip-request data access.
#[async_trait]
pub trait TripRequestRepository: Send + Sync {
    async fn insert(&self, request: &TripRequest) -> CoreResult<()>;

    async fn get(&self, id: Uuid) -> CoreResult<Option<TripRequest>>;

    /// The one contended operation in the system. Implementations MUST make
    /// this a single atomic unit at the storage layer: verify the request is
    /// still Pending (`StateError` otherwise), verify `seats_available > 0`
    /// on the parent trip (`CapacityError` otherwise), decrement the seat
    /// count, flip Open -> Full when it reaches zero, and mark the request
    /// Accepted — all or nothing. Two concurrent accepts of the last seat
    /// must leave exactly one accepted request and seats_available = 0.
    ///
    /// Ownership of the parent trip is checked by the caller; it cannot
    /// change concurrently, so it does not need to be inside the atom.
    async fn accept(&self, request_id: Uuid) -> CoreResult<AcceptedRequest>;

    /// Conditional Pending -> Rejected. Seat inventory is untouched.
    async fn reject(&self, request_id: Uuid) -> CoreResult<TripRequest>;

    async fn list_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<TripRequest>>;

    /// Non-rejected requests against trips owned by `driver_id`, newest
    /// first.
    async fn list_for_driver(&self, driver_id: Uuid) -> CoreResult<Vec<TripRequest>>;

    /// The passenger's own requests, newest first.
    async fn list_for_passenger(&self, passenger_id: Uuid) -> CoreResult<Vec<TripRequest>>;

    /// Cascade helper for trip deletion: flip every Pending request on the
    /// trip to Rejected and return the flipped rows so callers can notify.
    async fn reject_pending_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<TripRequest>>;
}

/// Repository trait for review data access.
#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Insert a review. Fails with `DuplicateError` when a review for the
    /// same (trip_id, reviewer_id) pair already exists; the existing row is
    /// preserved unchanged.
    async fn insert(&self, review: &Review) -> CoreResult<()>;

    async fn exists(&self, trip_id: Uuid, reviewer_id: Uuid) -> CoreResult<bool>;

    /// Reviews received by a profile, newest first.
    async fn list_for_reviewee(&self, reviewee_id: Uuid) -> CoreResult<Vec<Review>>;
}

/// Short-TTL cache in front of the open-trips listing. Staleness within the
/// TTL is tolerated; mutating operations call `invalidate`.
#[async_trait]
pub trait ListingCache: Send + Sync {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<Trip>>>;
    async fn put(&self, key: &str, trips: &[Trip], ttl_seconds: u64) -> CoreResult<()>;
    async fn invalidate(&self) -> CoreResult<()>;
}

/// Fixed-window request rate limiter. Returns `true` while the caller is
/// under the limit.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, key: &str, limit: i64, window_seconds: i64) -> CoreResult<bool>;
}
