use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use halador_booking::RideHistoryEntry;
use halador_catalog::PublishTrip;
use halador_core::auth::AuthContext;
use halador_core::events::ChangeEvent;
use halador_core::profile::Role;
use halador_core::trip::Trip;
use halador_core::CoreError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct PublishTripRequest {
    /// Client-generated idempotency key; resend the same id when retrying
    /// after a timeout.
    trip_id: Option<Uuid>,
    from: String,
    to: String,
    date: String,
    time: String,
    price: f64,
    seats: i32,
    #[serde(default)]
    features: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ListTripsQuery {
    from: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum HistoryResponse {
    Driver(Vec<Trip>),
    Passenger(Vec<RideHistoryEntry>),
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", get(list_trips).post(publish_trip))
        .route("/v1/trips/mine", get(my_trips))
        .route("/v1/trips/{id}", delete(delete_trip))
        .route("/v1/trips/{id}/complete", post(complete_trip))
        .route("/v1/history", get(history))
}

async fn list_trips(
    State(state): State<AppState>,
    Query(query): Query<ListTripsQuery>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let trips = state.catalog.list_open(query.from.as_deref()).await?;
    Ok(Json(trips))
}

async fn publish_trip(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<PublishTripRequest>,
) -> Result<Json<Trip>, AppError> {
    let date = NaiveDate::parse_from_str(&req.date, "%Y-%m-%d")
        .map_err(|_| CoreError::ValidationError("date must look like 2025-08-20".into()))?;
    let time = NaiveTime::parse_from_str(&req.time, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&req.time, "%H:%M:%S"))
        .map_err(|_| CoreError::ValidationError("time must look like 08:00".into()))?;

    let trip = state
        .catalog
        .publish(
            &auth,
            PublishTrip {
                trip_id: req.trip_id,
                from: req.from,
                to: req.to,
                date,
                time,
                price: req.price,
                seats: req.seats,
                features: req.features,
            },
        )
        .await?;
    Ok(Json(trip))
}

async fn my_trips(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let trips = state.catalog.driver_trips(&auth).await?;
    Ok(Json(trips))
}

async fn delete_trip(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(trip_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let cascaded = state.catalog.delete(&auth, trip_id).await?;

    // Passengers whose pending requests were swept away get told why.
    for request in cascaded {
        state.notify(
            request.passenger_id,
            ChangeEvent::RequestRejected {
                trip_id,
                request_id: request.id,
            },
        );
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn complete_trip(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(trip_id): Path<Uuid>,
) -> Result<Json<Trip>, AppError> {
    let trip = state.catalog.complete(&auth, trip_id).await?;
    Ok(Json(trip))
}

async fn history(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<HistoryResponse>, AppError> {
    let response = if auth.role == Role::Driver {
        HistoryResponse::Driver(state.catalog.driver_history(&auth).await?)
    } else {
        HistoryResponse::Passenger(state.ledger.passenger_history(&auth).await?)
    };
    Ok(Json(response))
}
