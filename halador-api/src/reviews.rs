use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use halador_core::auth::AuthContext;
use halador_core::review::Review;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct SubmitReviewRequest {
    trip_id: Uuid,
    rating: i32,
    comment: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/reviews", post(submit_review))
        .route("/v1/profiles/{id}/reviews", get(profile_reviews))
}

async fn submit_review(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<SubmitReviewRequest>,
) -> Result<Json<Review>, AppError> {
    let review = state
        .reviews
        .submit(&auth, req.trip_id, req.rating, req.comment)
        .await?;
    Ok(Json(review))
}

async fn profile_reviews(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
) -> Result<Json<Vec<Review>>, AppError> {
    let reviews = state.reviews.received_by(profile_id).await?;
    Ok(Json(reviews))
}
