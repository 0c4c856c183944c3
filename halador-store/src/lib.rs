pub mod app_config;
pub mod database;
pub mod profile_repo;
pub mod redis_repo;
pub mod request_repo;
pub mod review_repo;
pub mod trip_repo;

pub use database::DbClient;
pub use profile_repo::PgProfileRepository;
pub use redis_repo::RedisClient;
pub use request_repo::PgTripRequestRepository;
pub use review_repo::PgReviewRepository;
pub use trip_repo::PgTripRepository;

use halador_core::CoreError;

pub(crate) fn internal(e: sqlx::Error) -> CoreError {
    CoreError::InternalError(e.to_string())
}

pub(crate) fn map_unique_violation(e: sqlx::Error, what: &str) -> CoreError {
    if let sqlx::Error::Database(db) = &e {
        if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) {
            return CoreError::DuplicateError(what.to_string());
        }
    }
    internal(e)
}
