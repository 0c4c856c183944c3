use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use halador_core::repository::TripRequestRepository;
use halador_core::request::{AcceptedRequest, RequestStatus, TripRequest};
use halador_core::trip::Trip;
use halador_core::{CoreError, CoreResult};

use crate::internal;
use crate::trip_repo::{TripRow, TRIP_COLUMNS};

pub struct PgTripRequestRepository {
    pool: PgPool,
}

impl PgTripRequestRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct RequestRow {
    id: Uuid,
    trip_id: Uuid,
    passenger_id: Uuid,
    passenger_name: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<RequestRow> for TripRequest {
    type Error = CoreError;

    fn try_from(row: RequestRow) -> Result<Self, Self::Error> {
        Ok(TripRequest {
            id: row.id,
            trip_id: row.trip_id,
            passenger_id: row.passenger_id,
            passenger_name: row.passenger_name,
            status: RequestStatus::from_str(&row.status)?,
            created_at: row.created_at,
        })
    }
}

const REQUEST_COLUMNS: &str = "id, trip_id, passenger_id, passenger_name, status, created_at";

#[async_trait]
impl TripRequestRepository for PgTripRequestRepository {
    async fn insert(&self, request: &TripRequest) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trip_requests (id, trip_id, passenger_id, passenger_name, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(request.id)
        .bind(request.trip_id)
        .bind(request.passenger_id)
        .bind(&request.passenger_name)
        .bind(request.status.as_str())
        .bind(request.created_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<TripRequest>> {
        let row: Option<RequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM trip_requests WHERE id = $1",
            REQUEST_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.map(TripRequest::try_from).transpose()
    }

    async fn accept(&self, request_id: Uuid) -> CoreResult<AcceptedRequest> {
        let mut tx = self.pool.begin().await.map_err(internal)?;

        // Step 1: conditionally flip the request. Two sessions racing on the
        // SAME request serialize on this row; the loser sees zero rows and
        // never reaches the seat decrement.
        let request_row: Option<RequestRow> = sqlx::query_as(&format!(
            "UPDATE trip_requests SET status = 'accepted' WHERE id = $1 AND status = 'pending' RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(internal)?;

        let Some(request_row) = request_row else {
            tx.rollback().await.map_err(internal)?;
            let request: Option<(String,)> =
                sqlx::query_as("SELECT status FROM trip_requests WHERE id = $1")
                    .bind(request_id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(internal)?;
            return match request {
                None => Err(CoreError::NotFoundError(format!("request {}", request_id))),
                Some((status,)) => Err(CoreError::StateError(format!(
                    "request is {}, only pending requests can be accepted",
                    status
                ))),
            };
        };

        // Step 2: conditional seat decrement. Accepts of DIFFERENT requests
        // on the same trip serialize here; with one seat left, exactly one
        // of them sees seats_available > 0. Zero rows roll back the request
        // flip from step 1 along with everything else.
        let trip_row: Option<TripRow> = sqlx::query_as(&format!(
            r#"
            UPDATE trips
            SET seats_available = seats_available - 1,
                status = CASE WHEN seats_available = 1 AND status = 'open'
                              THEN 'full' ELSE status END
            WHERE id = $1 AND seats_available > 0
            RETURNING {}
            "#,
            TRIP_COLUMNS
        ))
        .bind(request_row.trip_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(internal)?;

        let Some(trip_row) = trip_row else {
            tx.rollback().await.map_err(internal)?;
            let trip_exists: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM trips WHERE id = $1")
                .bind(request_row.trip_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;
            return match trip_exists {
                None => Err(CoreError::NotFoundError(format!(
                    "trip {}",
                    request_row.trip_id
                ))),
                Some(_) => Err(CoreError::CapacityError(
                    "no seats remaining on this trip".into(),
                )),
            };
        };

        tx.commit().await.map_err(internal)?;

        Ok(AcceptedRequest {
            request: request_row.try_into()?,
            trip: Trip::try_from(trip_row)?,
        })
    }

    async fn reject(&self, request_id: Uuid) -> CoreResult<TripRequest> {
        let row: Option<RequestRow> = sqlx::query_as(&format!(
            "UPDATE trip_requests SET status = 'rejected' WHERE id = $1 AND status = 'pending' RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(request_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current: Option<(String,)> =
                    sqlx::query_as("SELECT status FROM trip_requests WHERE id = $1")
                        .bind(request_id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(internal)?;
                match current {
                    None => Err(CoreError::NotFoundError(format!("request {}", request_id))),
                    Some((status,)) => Err(CoreError::StateError(format!(
                        "request is {}, only pending requests can be rejected",
                        status
                    ))),
                }
            }
        }
    }

    async fn list_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<TripRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM trip_requests WHERE trip_id = $1 ORDER BY created_at DESC",
            REQUEST_COLUMNS
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(TripRequest::try_from).collect()
    }

    async fn list_for_driver(&self, driver_id: Uuid) -> CoreResult<Vec<TripRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.trip_id, r.passenger_id, r.passenger_name, r.status, r.created_at
            FROM trip_requests r
            JOIN trips t ON t.id = r.trip_id
            WHERE t.driver_id = $1 AND r.status <> 'rejected'
            ORDER BY r.created_at DESC
            "#,
        )
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(TripRequest::try_from).collect()
    }

    async fn list_for_passenger(&self, passenger_id: Uuid) -> CoreResult<Vec<TripRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "SELECT {} FROM trip_requests WHERE passenger_id = $1 ORDER BY created_at DESC",
            REQUEST_COLUMNS
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(TripRequest::try_from).collect()
    }

    async fn reject_pending_for_trip(&self, trip_id: Uuid) -> CoreResult<Vec<TripRequest>> {
        let rows: Vec<RequestRow> = sqlx::query_as(&format!(
            "UPDATE trip_requests SET status = 'rejected' WHERE trip_id = $1 AND status = 'pending' RETURNING {}",
            REQUEST_COLUMNS
        ))
        .bind(trip_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(TripRequest::try_from).collect()
    }
}
