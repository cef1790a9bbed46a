//! Booking handler trait and progress reporting.

use std::future::Future;
use std::pin::Pin;

use booking_core::{BookingJob, BookingSummary, JobError, JobId};
use ractor::ActorRef;

use crate::messages::QueueMessage;

/// Result type for booking handlers.
pub type HandlerResult = Result<BookingSummary, JobError>;

/// Future type for async booking handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = HandlerResult> + Send>>;

/// Trait for the code that turns a booking job into a booking.
///
/// A `Terminal` error fails the job at once; a `Retryable` error is retried
/// with backoff while attempts remain.
pub trait BookingHandler: Send + Sync + 'static {
    /// Process a job and return the result.
    fn handle(&self, job: &BookingJob, progress: ProgressReporter) -> HandlerFuture;
}

/// Reports progress milestones of the job being processed to the queue.
#[derive(Clone)]
pub struct ProgressReporter {
    job_id: JobId,
    queue: Option<ActorRef<QueueMessage>>,
}

impl ProgressReporter {
    pub(crate) fn new(job_id: JobId, queue: ActorRef<QueueMessage>) -> Self {
        Self {
            job_id,
            queue: Some(queue),
        }
    }

    /// A reporter that drops every update.
    pub fn detached(job_id: JobId) -> Self {
        Self {
            job_id,
            queue: None,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Record a milestone between 0 and 100.
    pub fn report(&self, progress: u8) {
        if let Some(queue) = &self.queue {
            let _ = queue.send_message(QueueMessage::Progress {
                job_id: self.job_id,
                progress: progress.min(100),
            });
        }
    }
}

/// A simple function-based booking handler.
pub struct FnHandler<F>
where
    F: Fn(&BookingJob, ProgressReporter) -> HandlerFuture + Send + Sync + 'static,
{
    handler: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&BookingJob, ProgressReporter) -> HandlerFuture + Send + Sync + 'static,
{
    /// Create a new function-based handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

impl<F> BookingHandler for FnHandler<F>
where
    F: Fn(&BookingJob, ProgressReporter) -> HandlerFuture + Send + Sync + 'static,
{
    fn handle(&self, job: &BookingJob, progress: ProgressReporter) -> HandlerFuture {
        (self.handler)(job, progress)
    }
}

/// Helper macro for creating booking handlers from async blocks.
#[macro_export]
macro_rules! booking_handler {
    (|$job:ident, $progress:ident| $body:expr) => {
        $crate::FnHandler::new(
            |$job: &booking_core::BookingJob, $progress: $crate::ProgressReporter| {
                let $job = $job.clone();
                Box::pin(async move {
                    let result: $crate::HandlerResult = $body;
                    result
                }) as $crate::HandlerFuture
            },
        )
    };
}
