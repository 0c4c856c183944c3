use axum::{
    extract::{Extension, Path, State},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use halador_core::auth::AuthContext;
use halador_core::events::ChangeEvent;
use halador_core::profile::Profile;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/admin/subscriptions/pending", get(pending_subscriptions))
        .route("/v1/admin/subscriptions/{user_id}/approve", post(approve_payment))
        .route("/v1/admin/subscriptions/{user_id}/reject", post(reject_payment))
}

async fn pending_subscriptions(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<Profile>>, AppError> {
    let pending = state.gate.pending_subscriptions(&auth).await?;
    Ok(Json(pending))
}

async fn approve_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.gate.approve_payment(&auth, user_id).await?;

    if let Some(until) = profile.subscription_end_date {
        state.notify(user_id, ChangeEvent::SubscriptionActivated { until });
    }
    Ok(Json(profile))
}

async fn reject_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.gate.reject_payment(&auth, user_id).await?;
    state.notify(user_id, ChangeEvent::SubscriptionRejected);
    Ok(Json(profile))
}
