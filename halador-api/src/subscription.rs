use axum::{
    extract::{Extension, State},
    routing::post,
    Json, Router,
};

use halador_core::auth::AuthContext;
use halador_core::profile::Profile;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/subscription/report", post(report_payment))
}

/// The driver claims the Yape/Plin transfer went out. Nothing is verified
/// here; the claim just lands in the admin's pending queue.
async fn report_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.gate.report_payment(&auth).await?;
    Ok(Json(profile))
}
