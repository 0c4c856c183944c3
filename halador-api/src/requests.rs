use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use halador_booking::{DriverRequestView, PassengerRequestView};
use halador_core::auth::AuthContext;
use halador_core::events::ChangeEvent;
use halador_core::request::{AcceptedRequest, TripRequest};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
struct CreateRequestRequest {
    trip_id: Uuid,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/requests", post(create_request))
        .route("/v1/requests/incoming", get(incoming_requests))
        .route("/v1/requests/mine", get(my_requests))
        .route("/v1/requests/{id}/accept", post(accept_request))
        .route("/v1/requests/{id}/reject", post(reject_request))
}

async fn create_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateRequestRequest>,
) -> Result<Json<TripRequest>, AppError> {
    let (request, trip) = state.ledger.create(&auth, req.trip_id).await?;

    state.notify(
        trip.driver_id,
        ChangeEvent::RequestCreated {
            trip_id: trip.id,
            request_id: request.id,
            passenger_name: request.passenger_name.clone(),
        },
    );
    Ok(Json(request))
}

async fn accept_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<AcceptedRequest>, AppError> {
    let accepted = state.ledger.accept(&auth, request_id).await?;

    state.notify(
        accepted.request.passenger_id,
        ChangeEvent::RequestAccepted {
            trip_id: accepted.trip.id,
            request_id: accepted.request.id,
        },
    );
    Ok(Json(accepted))
}

async fn reject_request(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(request_id): Path<Uuid>,
) -> Result<Json<TripRequest>, AppError> {
    let request = state.ledger.reject(&auth, request_id).await?;

    state.notify(
        request.passenger_id,
        ChangeEvent::RequestRejected {
            trip_id: request.trip_id,
            request_id: request.id,
        },
    );
    Ok(Json(request))
}

async fn incoming_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<DriverRequestView>>, AppError> {
    let views = state.ledger.list_for_driver(&auth).await?;
    Ok(Json(views))
}

async fn my_requests(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<PassengerRequestView>>, AppError> {
    let views = state.ledger.list_for_passenger(&auth).await?;
    Ok(Json(views))
}
