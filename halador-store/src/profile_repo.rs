use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use halador_core::profile::{ContactUpdate, Profile, Role, SubscriptionStatus};
use halador_core::repository::ProfileRepository;
use halador_core::{CoreError, CoreResult};

use crate::{internal, map_unique_violation};

pub struct PgProfileRepository {
    pool: PgPool,
}

impl PgProfileRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Internal struct for type-safe querying
#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    full_name: String,
    role: String,
    phone: Option<String>,
    is_verified: bool,
    subscription_status: String,
    subscription_end_date: Option<DateTime<Utc>>,
    car_brand: Option<String>,
    car_model: Option<String>,
    car_color: Option<String>,
    car_plate: Option<String>,
    rating_average: f64,
    rating_count: i32,
    trips_completed: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for Profile {
    type Error = CoreError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        Ok(Profile {
            id: row.id,
            full_name: row.full_name,
            role: Role::from_str(&row.role)?,
            phone: row.phone,
            is_verified: row.is_verified,
            subscription_status: SubscriptionStatus::from_str(&row.subscription_status)?,
            subscription_end_date: row.subscription_end_date,
            car_brand: row.car_brand,
            car_model: row.car_model,
            car_color: row.car_color,
            car_plate: row.car_plate,
            rating_average: row.rating_average,
            rating_count: row.rating_count,
            trips_completed: row.trips_completed,
            created_at: row.created_at,
        })
    }
}

const PROFILE_COLUMNS: &str = "id, full_name, role, phone, is_verified, subscription_status, \
     subscription_end_date, car_brand, car_model, car_color, car_plate, \
     rating_average, rating_count, trips_completed, created_at";

#[async_trait]
impl ProfileRepository for PgProfileRepository {
    async fn insert(&self, profile: &Profile) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, full_name, role, phone, is_verified, subscription_status,
                subscription_end_date, car_brand, car_model, car_color, car_plate,
                rating_average, rating_count, trips_completed, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(profile.id)
        .bind(&profile.full_name)
        .bind(profile.role.as_str())
        .bind(&profile.phone)
        .bind(profile.is_verified)
        .bind(profile.subscription_status.as_str())
        .bind(profile.subscription_end_date)
        .bind(&profile.car_brand)
        .bind(&profile.car_model)
        .bind(&profile.car_color)
        .bind(&profile.car_plate)
        .bind(profile.rating_average)
        .bind(profile.rating_count)
        .bind(profile.trips_completed)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &format!("profile {} already exists", profile.id)))?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> CoreResult<Option<Profile>> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {} FROM profiles WHERE id = $1",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.map(Profile::try_from).transpose()
    }

    async fn update_contact(&self, id: Uuid, update: &ContactUpdate) -> CoreResult<Profile> {
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            r#"
            UPDATE profiles SET
                phone = COALESCE($2, phone),
                car_brand = COALESCE($3, car_brand),
                car_model = COALESCE($4, car_model),
                car_color = COALESCE($5, car_color),
                car_plate = COALESCE($6, car_plate)
            WHERE id = $1
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(id)
        .bind(&update.phone)
        .bind(&update.car_brand)
        .bind(&update.car_model)
        .bind(&update.car_color)
        .bind(&update.car_plate)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        row.ok_or_else(|| CoreError::NotFoundError(format!("profile {}", id)))?
            .try_into()
    }

    async fn transition_subscription(
        &self,
        id: Uuid,
        expected: &[SubscriptionStatus],
        new_status: SubscriptionStatus,
        end_date: Option<DateTime<Utc>>,
    ) -> CoreResult<Profile> {
        let expected_strs: Vec<String> =
            expected.iter().map(|s| s.as_str().to_string()).collect();

        // Conditional update: the guard and the write are one statement.
        let row: Option<ProfileRow> = sqlx::query_as(&format!(
            r#"
            UPDATE profiles
            SET subscription_status = $2, subscription_end_date = $3
            WHERE id = $1 AND subscription_status = ANY($4)
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(id)
        .bind(new_status.as_str())
        .bind(end_date)
        .bind(&expected_strs)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        match row {
            Some(row) => row.try_into(),
            None => {
                // Classify: missing row vs wrong current status.
                let current: Option<(String,)> =
                    sqlx::query_as("SELECT subscription_status FROM profiles WHERE id = $1")
                        .bind(id)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(internal)?;
                match current {
                    None => Err(CoreError::NotFoundError(format!("profile {}", id))),
                    Some((status,)) => Err(CoreError::StateError(format!(
                        "subscription is {}, cannot move to {}",
                        status,
                        new_status.as_str()
                    ))),
                }
            }
        }
    }

    async fn apply_review_score(&self, id: Uuid, rating: i32) -> CoreResult<()> {
        // Both aggregate columns move in one statement, reading the
        // pre-update values, so concurrent reviews cannot interleave badly.
        let result = sqlx::query(
            r#"
            UPDATE profiles
            SET rating_average = (rating_average * rating_count + $2::float8) / (rating_count + 1),
                rating_count = rating_count + 1
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(rating as f64)
        .execute(&self.pool)
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFoundError(format!("profile {}", id)));
        }
        Ok(())
    }

    async fn increment_trips_completed(&self, id: Uuid) -> CoreResult<()> {
        let result =
            sqlx::query("UPDATE profiles SET trips_completed = trips_completed + 1 WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFoundError(format!("profile {}", id)));
        }
        Ok(())
    }

    async fn list_pending_subscriptions(&self) -> CoreResult<Vec<Profile>> {
        let rows: Vec<ProfileRow> = sqlx::query_as(&format!(
            "SELECT {} FROM profiles WHERE subscription_status = 'pending' ORDER BY created_at DESC",
            PROFILE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        rows.into_iter().map(Profile::try_from).collect()
    }
}
