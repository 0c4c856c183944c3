use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use halador_core::repository::TripRepository;
use halador_core::trip::{Trip, TripStatus};
use halador_core::{CoreError, CoreResult};

use crate::internal;

pub struct PgTripRepository {
    pool: PgPool,
}

impl PgTripRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct TripRow {
    pub(crate) id: Uuid,
    pub(crate) driver_id: Uuid,
    pub(crate) from_loc: String,
    pub(crate) to_loc: String,
    pub(crate) date: NaiveDate,
    pub(crate) time: NaiveTime,
    pub(crate) price: f64,
    pub(crate) seats_total: i32,
    pub(crate) seats_available: i32,
    pub(crate) status: String,
    pub(crate) features: Vec<String>,
    pub(crate) driver_lat: Option<f64>,
    pub(crate) driver_lng: Option<f64>,
    pub(crate) created_at: DateTime<Utc>,
}

impl TryFrom<TripRow> for Trip {
    type Error = CoreError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        Ok(Trip {
            id: row.id,
            driver_id: row.driver_id,
            from_loc: row.from_loc,
            to_loc: row.to_loc,
            date: row.date,
            time: row.time,
            price: row.price,
            seats_total: row.seats_total,
            seats_available: row.seats_available,
            status: TripStatus::from_str(&row.status)?,
            features: row.features,
            driver_lat: row.driver_lat,
            driver_lng: row.driver_lng,
            created_at: row.created_at,
        })
    }
}

pub(crate) const TRIP_COLUMNS: &str = "id, driver_id, from_loc, to_loc, date, time, price, \
     seats_total, seats_available, status, features, driver_lat, driver_lng, created_at";

#[async_trait]
impl TripRepository for PgTripRepository {
    async fn insert(&self, trip: &Trip) -> CoreResult<()> {
        // ON CONFLICT DO NOTHING keeps the publish idempotent on the
        // client-generated id: a retry after an indeterminate timeout
        // collapses into the row the first attempt may have written.
        sqlx::query(
            r#"
            INSERT INTO trips (id, driver_id, from_loc, to_loc, date, time, price,
                seats_total, seats_available, status, features, driver_lat, driver_lng, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(trip.id)
        .bind(trip.driver_id)
        .bind(&trip.from_loc)
        .bind(&trip.to_loc)
        .bind(trip.date)
        .bind(trip.time)
        .bind(trip.price)
        .bind(trip.seats_total)
        .bind(trip.seats_available)
        .bind(trip.status.as_str())
        .bind(&trip.features)
        .bind(trip.driver_lat)
        .bind(trip.driver_lng)
        .bind(trip.created_at)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Trip>> {
        let row: Option<TripRow> =
            sqlx::query_as(&format!("SELECT {} FROM trips WHERE id = $1", TRIP_COLUMNS))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(internal)?;

        row.map(Trip::try_from).transpose()
    }

    async fn list_open(
        &self,
        from_city: Option<&str>,
        min_date: NaiveDate,
    ) -> CoreResult<Vec<Trip>> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM trips
            WHERE status = 'open'
              AND date >= $1
              AND ($2::text IS NULL OR lower(from_loc) = lower($2))
            ORDER BY date ASC, time ASC
            "#,
            TRIP_COLUMNS
        ))
        .bind(min_date)
        .bind(from_city)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn list_by_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Trip>> {
        let rows: Vec<TripRow> = sqlx::query_as(&format!(
            "SELECT {} FROM trips WHERE driver_id = $1 ORDER BY created_at DESC",
            TRIP_COLUMNS
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(Trip::try_from).collect()
    }

    async fn set_status(
        &self,
        id: Uuid,
        expected: &[TripStatus],
        new_status: TripStatus,
    ) -> CoreResult<Trip> {
        let expected_strs: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();

        let row: Option<TripRow> = sqlx::query_as(&format!(
            r#"
            UPDATE trips SET status = $2
            WHERE id = $1 AND status = ANY($3)
            RETURNING {}
            "#,
            TRIP_COLUMNS
        ))
        .bind(id)
        .bind(new_status.as_str())
        .bind(&expected_strs)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                let current: Option<(String,)> =
                    sqlx::query_as("SELECT status FROM trips WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(internal)?;
                match current {
                    None => Err(CoreError::NotFoundError(format!("trip {}", id))),
                    Some((status,)) => Err(CoreError::StateError(format!(
                        "trip is {}, cannot move to {}",
                        status,
                        new_status.as_str()
                    ))),
                }
            }
        }
    }

    async fn delete(&self, id: Uuid) -> CoreResult<()> {
        // Requests and reviews referencing the trip go with it via the FK
        // cascade; the caller has already handled the cascade policy.
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFoundError(format!("trip {}", id)));
        }
        Ok(())
    }
}
