//! The booking handler that admits jobs against the event catalog.

use std::sync::Arc;
use std::time::Duration;

use booking_core::{Booking, BookingJob, BookingSummary, JobError, Rejection};
use db::DbError;
use db::repositories::{AdmitError, BookingRepository, EventRepository};

use crate::handler::{BookingHandler, HandlerFuture, HandlerResult, ProgressReporter};

/// Admits booking jobs with an atomic capacity and duplicate check.
#[derive(Clone)]
pub struct AdmissionHandler {
    inner: Arc<Inner>,
}

struct Inner {
    events: EventRepository,
    bookings: BookingRepository,
    transaction_timeout: Duration,
}

impl AdmissionHandler {
    pub fn new(
        events: EventRepository,
        bookings: BookingRepository,
        transaction_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                events,
                bookings,
                transaction_timeout,
            }),
        }
    }
}

impl BookingHandler for AdmissionHandler {
    fn handle(&self, job: &BookingJob, progress: ProgressReporter) -> HandlerFuture {
        let inner = self.inner.clone();
        let job = job.clone();
        Box::pin(async move { inner.admit(&job, &progress).await })
    }
}

impl Inner {
    async fn admit(&self, job: &BookingJob, progress: &ProgressReporter) -> HandlerResult {
        progress.report(10);

        // Cheap reads first so common rejections skip the transaction.
        let event = self
            .events
            .get(job.event_id)
            .await
            .map_err(transient)?
            .ok_or(Rejection::EventNotFound)?;
        progress.report(30);

        let held = self
            .bookings
            .find(&job.user_id, job.event_id)
            .await
            .map_err(transient)?;
        let booking = match held {
            // A re-run of a job whose booking already committed
            Some(booking) if booking.job_id == job.id => booking,
            Some(_) => return Err(Rejection::DuplicateBooking.into()),
            None => {
                progress.report(50);
                self.commit(job, u64::from(event.capacity), progress).await?
            }
        };
        progress.report(90);

        let summary = BookingSummary {
            booking_id: booking.id,
            event_id: event.id,
            event_name: event.name,
            venue: event.venue,
            starts_at: event.starts_at,
            booked_at: booking.created_at,
        };
        progress.report(100);

        Ok(summary)
    }

    async fn commit(
        &self,
        job: &BookingJob,
        capacity: u64,
        progress: &ProgressReporter,
    ) -> Result<Booking, JobError> {
        let taken = self
            .bookings
            .count_for_event(job.event_id)
            .await
            .map_err(transient)?;
        if taken >= capacity {
            return Err(Rejection::EventFull.into());
        }
        progress.report(70);

        // The transaction re-checks everything; the reads above may be stale.
        match tokio::time::timeout(self.transaction_timeout, self.bookings.admit(job)).await {
            Ok(Ok(booking)) => Ok(booking),
            Ok(Err(AdmitError::Rejected(rejection))) => Err(rejection.into()),
            Ok(Err(AdmitError::Db(e))) => Err(transient(e)),
            Err(_) => Err(JobError::retryable(format!(
                "admission transaction timed out after {:?}",
                self.transaction_timeout
            ))),
        }
    }
}

fn transient(e: DbError) -> JobError {
    JobError::retryable(e.to_string())
}
