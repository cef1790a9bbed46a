//! Service-level errors.

use actors::QueueError;
use booking_core::{EventId, JobId};
use db::DbError;

/// Errors returned by [`crate::BookingService`].
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested event does not exist; nothing was enqueued.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// Neither the status store nor the queue knows this job.
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Database error: {0}")]
    Db(#[from] DbError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start booking queue: {0}")]
    Startup(String),
}
