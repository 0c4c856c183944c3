use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use halador_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("Internal Server Error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, "authentication", msg),
            AppError::Core(err) => {
                let status = match &err {
                    CoreError::ValidationError(_) => StatusCode::BAD_REQUEST,
                    CoreError::AuthorizationError(_) => StatusCode::FORBIDDEN,
                    CoreError::StateError(_) => StatusCode::CONFLICT,
                    CoreError::CapacityError(_) => StatusCode::CONFLICT,
                    CoreError::GateError(_) => StatusCode::PAYMENT_REQUIRED,
                    CoreError::TimeoutError(_) => StatusCode::GATEWAY_TIMEOUT,
                    CoreError::DuplicateError(_) => StatusCode::CONFLICT,
                    CoreError::NotFoundError(_) => StatusCode::NOT_FOUND,
                    CoreError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!("Internal Server Error: {}", err);
                    (status, "internal", "Internal Server Error".to_string())
                } else {
                    (status, err.kind(), err.to_string())
                }
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal",
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}
