//! In-memory implementation of the storage collaborators.
//!
//! One mutex over the whole store: every repository call runs as a single
//! critical section, which is what gives `accept` its conditional-update
//! atomicity here. Used by unit tests and local development; the Postgres
//! implementations live in `halador-store`.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::profile::{ContactUpdate, Profile, SubscriptionStatus};
use crate::repository::{
    ListingCache, ProfileRepository, RateLimiter, ReviewRepository, TripRepository,
    TripRequestRepository,
};
use crate::request::{AcceptedRequest, RequestStatus, TripRequest};
use crate::review::Review;
use crate::trip::{Trip, TripStatus};
use crate::{CoreError, CoreResult};

#[derive(Default)]
struct Inner {
    profiles: HashMap<Uuid, Profile>,
    trips: HashMap<Uuid, Trip>,
    requests: HashMap<Uuid, TripRequest>,
    reviews: Vec<Review>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileRepository for MemoryStore {
    async fn insert(&self, profile: &Profile) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.profiles.contains_key(&profile.id) {
            return Err(CoreError::DuplicateError(format!(
                "profile {} already exists",
                profile.id
            )));
        }
        inner.profiles.insert(profile.id, profile.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Profile>> {
        Ok(self.inner.lock().unwrap().profiles.get(&id).cloned())
    }

    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> CoreResult<Profile> {
        let mut inner = self.inner.lock().unwrap();
        let profile = inner
            .profiles
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFoundError(format!("profile {}", id)))?;

        if let Some(phone) = &update.phone {
            profile.phone = Some(phone.clone());
        }
        if let Some(brand) = &update.car_brand {
            profile.car_brand = Some(brand.clone());
        }
        if let Some(model) = &update.car_model {
            profile.car_model = Some(model.clone());
        }
        if let Some(color) = &update.car_color {
            profile.car_color = Some(color.clone());
        }
        if let Some(plate) = &update.car_plate {
            profile.car_plate = Some(plate.clone());
        }
        Ok(profile.clone())
    }

    async fn transition_subscription(
        &self,
        id: Uuid,
        expected: &[SubscriptionStatus],
        new_status: SubscriptionStatus,
        end_date: Option<DateTime<Utc>>,
    ) -> CoreResult<Profile> {
        let mut inner = self.inner.lock().unwrap();
        let profile = inner
            .profiles
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFoundError(format!("profile {}", id)))?;

        if !expected.contains(&profile.subscription_status) {
            return Err(CoreError::StateError(format!(
                "subscription is {}, cannot move to {}",
                profile.subscription_status.as_str(),
                new_status.as_str()
            )));
        }
        profile.subscription_status = new_status;
        profile.subscription_end_date = end_date;
        Ok(profile.clone())
    }

    async fn apply_review_score(&self, id: Uuid, rating: i32) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let profile = inner
            .profiles
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFoundError(format!("profile {}", id)))?;

        let total = profile.rating_average * profile.rating_count as f64 + rating as f64;
        profile.rating_count += 1;
        profile.rating_average = total / profile.rating_count as f64;
        Ok(())
    }

    async fn increment_trips_completed(&self, id: Uuid) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        let profile = inner
            .profiles
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFoundError(format!("profile {}", id)))?;
        profile.trips_completed += 1;
        Ok(())
    }

    async fn list_pending_subscriptions(&self) -> CoreResult<Vec<Profile>> {
        let inner = self.inner.lock().unwrap();
        let mut pending: Vec<Profile> = inner
            .profiles
            .values()
            .filter(|p| p.subscription_status == SubscriptionStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(pending)
    }
}

#[async_trait]
impl TripRepository for MemoryStore {
    async fn insert(&self, trip: &Trip) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        // Idempotent on id: a retried publish after an indeterminate timeout
        // must not create a second row.
        inner.trips.entry(trip.id).or_insert_with(|| trip.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Trip>> {
        Ok(self.inner.lock().unwrap().trips.get(&id).cloned())
    }

    async fn list_open(
        &self,
        from_city: Option<&str>,
        min_date: NaiveDate,
    ) -> CoreResult<Vec<Trip>> {
        let inner = self.inner.lock().unwrap();
        let mut open: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| t.status == TripStatus::Open && t.date >= min_date)
            .filter(|t| from_city.map(|c| t.from_loc.eq_ignore_ascii_case(c)).unwrap_or(true))
            .cloned()
            .collect();
        open.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
        Ok(open)
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Trip>> {
        let inner = self.inner.lock().unwrap();
        let mut trips: Vec<Trip> = inner
            .trips
            .values()
            .filter(|t| t.driver_id == driver_id)
            .cloned()
            .collect();
        trips.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(trips)
    }

    async fn set_status(
        &self,
        id: Uuid,
        expected: &[TripStatus],
        new_status: TripStatus,
    ) -> CoreResult<Trip> {
        let mut inner = self.inner.lock().unwrap();
        let trip = inner
            .trips
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFoundError(format!("trip {}", id)))?;

        if !expected.contains(&trip.status) {
            return Err(CoreError::StateError(format!(
                "trip is {}, cannot move to {}",
                trip.status.as_str(),
                new_status.as_str()
            )));
        }
        trip.status = new_status;
        Ok(trip.clone())
    }

    async fn delete(&self, id: Uuid) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .trips
            .remove(&id)
            .ok_or_else(|| CoreError::NotFoundError(format!("trip {}", id)))?;
        // Mirror the FK cascade: rows referencing the trip go with it.
        inner.requests.retain(|_, r| r.trip_id != id);
        inner.reviews.retain(|r| r.trip_id != id);
        Ok(())
    }
}

#[async_trait]
impl TripRequestRepository for MemoryStore {
    async fn insert(&self, request: &TripRequest) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<TripRequest>> {
        Ok(self.inner.lock().unwrap().requests.get(&id).cloned())
    }

    async fn accept(&self, request_id: Uuid) -> CoreResult<AcceptedRequest> {
        // Single critical section: the pending check, the capacity check,
        // the decrement, and the status flips commit together or not at all.
        let mut inner = self.inner.lock().unwrap();

        let request = inner
            .requests
            .get(&request_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFoundError(format!("request {}", request_id)))?;

        if request.status != RequestStatus::Pending {
            return Err(CoreError::StateError(format!(
                "request is {}, only pending requests can be accepted",
                request.status.as_str()
            )));
        }

        let trip = inner
            .trips
            .get_mut(&request.trip_id)
            .ok_or_else(|| CoreError::NotFoundError(format!("trip {}", request.trip_id)))?;

        if trip.seats_available <= 0 {
            return Err(CoreError::CapacityError(format!(
                "no seats remaining on trip {}",
                trip.id
            )));
        }

        trip.seats_available -= 1;
        if trip.seats_available == 0 && trip.status == TripStatus::Open {
            trip.status = TripStatus::Full;
        }
        let trip = trip.clone();

        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| CoreError::NotFoundError(format!("request {}", request_id)))?;
        request.status = RequestStatus::Accepted;

        Ok(AcceptedRequest {
            request: request.clone(),
            trip,
        })
    }

    async fn reject(&self, request_id: Uuid) -> CoreResult<TripRequest> {
        let mut inner = self.inner.lock().unwrap();
        let request = inner
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| CoreError::NotFoundError(format!("request {}", request_id)))?;

        if request.status != RequestStatus::Pending {
            return Err(CoreError::StateError(format!(
                "request is {}, only pending requests can be rejected",
                request.status.as_str()
            )));
        }
        request.status = RequestStatus::Rejected;
        Ok(request.clone())
    }

    async fn list_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<TripRequest>> {
        let inner = self.inner.lock().unwrap();
        let mut requests: Vec<TripRequest> = inner
            .requests
            .values()
            .filter(|r| r.trip_id == trip_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_for_driver(&self, driver_id: Uuid) -> CoreResult<Vec<TripRequest>> {
        let inner = self.inner.lock().unwrap();
        let owned: Vec<Uuid> = inner
            .trips
            .values()
            .filter(|t| t.driver_id == driver_id)
            .map(|t| t.id)
            .collect();
        let mut requests: Vec<TripRequest> = inner
            .requests
            .values()
            .filter(|r| owned.contains(&r.trip_id) && r.status != RequestStatus::Rejected)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn list_for_passenger(&self, passenger_id: Uuid) -> CoreResult<Vec<TripRequest>> {
        let inner = self.inner.lock().unwrap();
        let mut requests: Vec<TripRequest> = inner
            .requests
            .values()
            .filter(|r| r.passenger_id == passenger_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn reject_pending_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<TripRequest>> {
        let mut inner = self.inner.lock().unwrap();
        let mut rejected = Vec::new();
        for request in inner.requests.values_mut() {
            if request.trip_id == trip_id && request.status == RequestStatus::Pending {
                request.status = RequestStatus::Rejected;
                rejected.push(request.clone());
            }
        }
        Ok(rejected)
    }
}

#[async_trait]
impl ReviewRepository for MemoryStore {
    async fn insert(&self, review: &Review) -> CoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .reviews
            .iter()
            .any(|r| r.trip_id == review.trip_id && r.reviewer_id == review.reviewer_id)
        {
            return Err(CoreError::DuplicateError(format!(
                "trip {} already reviewed by {}",
                review.trip_id, review.reviewer_id
            )));
        }
        inner.reviews.push(review.clone());
        Ok(())
    }

    async fn exists(&self, trip_id: Uuid, reviewer_id: Uuid) -> CoreResult<bool> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .reviews
            .iter()
            .any(|r| r.trip_id == trip_id && r.reviewer_id == reviewer_id))
    }

    async fn list_for_reviewee(&self, reviewee_id: Uuid) -> CoreResult<Vec<Review>> {
        let inner = self.inner.lock().unwrap();
        let mut reviews: Vec<Review> = inner
            .reviews
            .iter()
            .filter(|r| r.reviewee_id == reviewee_id)
            .cloned()
            .collect();
        reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reviews)
    }
}

/// Process-local listing cache with wall-clock TTL.
#[derive(Default)]
pub struct MemoryListingCache {
    entries: Mutex<HashMap<String, (Instant, Vec<Trip>)>>,
}

impl MemoryListingCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ListingCache for MemoryListingCache {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<Trip>>> {
        let entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some((expires, trips)) if *expires > Instant::now() => Ok(Some(trips.clone())),
            _ => Ok(None),
        }
    }

    async fn put(&self, key: &str, trips: &[Trip], ttl_seconds: u64) -> CoreResult<()> {
        let mut entries = self.entries.lock().unwrap();
        entries.insert(
            key.to_string(),
            (Instant::now() + Duration::from_secs(ttl_seconds), trips.to_vec()),
        );
        Ok(())
    }

    async fn invalidate(&self) -> CoreResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

/// Fixed-window counter, same shape as the Redis INCR/EXPIRE limiter.
#[derive(Default)]
pub struct MemoryRateLimiter {
    windows: Mutex<HashMap<String, (Instant, i64)>>,
}

impl MemoryRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimiter for MemoryRateLimiter {
    async fn check(&self, key: &str, limit: i64, window_seconds: i64) -> CoreResult<bool> {
        let mut windows = self.windows.lock().unwrap();
        let now = Instant::now();
        let entry = windows.entry(key.to_string()).or_insert((now, 0));
        if now.duration_since(entry.0).as_secs() >= window_seconds as u64 {
            *entry = (now, 0);
        }
        entry.1 += 1;
        Ok(entry.1 <= limit)
    }
}
