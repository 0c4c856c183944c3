use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use halador_core::repository::ReviewRepository;
use halador_core::review::Review;
use halador_core::CoreResult;

use crate::{internal, map_unique_violation};

pub struct PgReviewRepository {
    pool: PgPool,
}

impl PgReviewRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    trip_id: Uuid,
    reviewer_id: Uuid,
    reviewee_id: Uuid,
    rating: i32,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Review {
            id: row.id,
            trip_id: row.trip_id,
            reviewer_id: row.reviewer_id,
            reviewee_id: row.reviewee_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl ReviewRepository for PgReviewRepository {
    async fn insert(&self, review: &Review) -> CoreResult<()> {
        // The (trip_id, reviewer_id) unique constraint is the backstop for
        // callers that skipped the exists() check.
        sqlx::query(
            r#"
            INSERT INTO reviews (id, trip_id, reviewer_id, reviewee_id, rating, comment, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(review.id)
        .bind(review.trip_id)
        .bind(review.reviewer_id)
        .bind(review.reviewee_id)
        .bind(review.rating)
        .bind(&review.comment)
        .bind(review.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, "this trip was already reviewed by this user"))?;

        Ok(())
    }

    async fn exists(&self, trip_id: Uuid, reviewer_id: Uuid) -> CoreResult<bool> {
        let row: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM reviews WHERE trip_id = $1 AND reviewer_id = $2",
        )
        .bind(trip_id)
        .bind(reviewer_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(internal)?;

        Ok(row.is_some())
    }

    async fn list_for_reviewee(&self, reviewee_id: Uuid) -> CoreResult<Vec<Review>> {
        let rows: Vec<ReviewRow> = sqlx::query_as(
            r#"
            SELECT id, trip_id, reviewer_id, reviewee_id, rating, comment, created_at
            FROM reviews WHERE reviewee_id = $1 ORDER BY created_at DESC
            "#,
        )
        .bind(reviewee_id)
        .fetch_all(&self.pool)
        .await
        .map_err(internal)?;

        Ok(rows.into_iter().map(Review::from).collect())
    }
}
