use axum::{
    extract::{Extension, State},
    routing::get,
    Json, Router,
};

use halador_core::auth::AuthContext;
use halador_core::profile::{ContactUpdate, Profile};

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/profiles/me", get(me).patch(update_me))
}

async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.accounts.get(auth.user_id).await?;
    Ok(Json(profile))
}

async fn update_me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(update): Json<ContactUpdate>,
) -> Result<Json<Profile>, AppError> {
    let profile = state.accounts.update_contact(&auth, &update).await?;
    Ok(Json(profile))
}
