pub mod auth;
pub mod events;
pub mod identity;
pub mod memory;
pub mod profile;
pub mod repository;
pub mod request;
pub mod review;
pub mod trip;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not authorized: {0}")]
    AuthorizationError(String),
    #[error("Invalid state: {0}")]
    StateError(String),
    #[error("Capacity exhausted: {0}")]
    CapacityError(String),
    #[error("Subscription gate: {0}")]
    GateError(String),
    #[error("Timed out: {0}")]
    TimeoutError(String),
    #[error("Duplicate: {0}")]
    DuplicateError(String),
    #[error("Not found: {0}")]
    NotFoundError(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl CoreError {
    /// Stable machine-readable tag, used by the API layer so clients can
    /// distinguish conflicts that share an HTTP status.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::ValidationError(_) => "validation",
            CoreError::AuthorizationError(_) => "authorization",
            CoreError::StateError(_) => "state",
            CoreError::CapacityError(_) => "capacity",
            CoreError::GateError(_) => "gate",
            CoreError::TimeoutError(_) => "timeout",
            CoreError::DuplicateError(_) => "duplicate",
            CoreError::NotFoundError(_) => "not_found",
            CoreError::InternalError(_) => "internal",
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
