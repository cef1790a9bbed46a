//! Repository implementations for database operations.

mod booking_repo;
mod event_repo;
mod job_repo;
mod queue_repo;
mod status_repo;

pub use booking_repo::{AdmitError, BookingRepository};
pub use event_repo::EventRepository;
pub use job_repo::JobRepository;
pub use queue_repo::QueueRepository;
pub use status_repo::StatusRepository;

use crate::DbError;

/// Map an id decode failure onto a database error.
pub(crate) fn invalid_id(table: &str, raw: &str, err: impl std::fmt::Display) -> DbError {
    DbError::Serialization(format!("Invalid {} id '{}': {}", table, raw, err))
}
