//! Admission API and booking status queries.

use booking_core::{
    AdmissionReceipt, Booking, BookingId, BookingJob, BookingStatusRecord, EventId, JobId, UserId,
};

use crate::error::ApiError;
use crate::init::BookingService;

impl BookingService {
    /// Accept a booking request for later admission.
    ///
    /// Unknown events are rejected at once and nothing is enqueued. Capacity
    /// and duplicates are only decided by the worker.
    pub async fn request_booking(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<AdmissionReceipt, ApiError> {
        if self.events.get(event_id).await?.is_none() {
            return Err(ApiError::EventNotFound(event_id));
        }

        let job = BookingJob::new(user_id, event_id);
        let job_id = job.id;
        let snapshot = self.queue.enqueue(job).await?;
        let receipt = AdmissionReceipt::new(job_id, snapshot, self.config.per_job_estimate());

        tracing::info!(
            "Booking job {} queued for event {} at position {}",
            job_id,
            event_id,
            receipt.queue_position
        );
        Ok(receipt)
    }

    /// Current status of a booking job.
    ///
    /// Served from the status cache; on a miss the queue's own view of the
    /// job is returned.
    pub async fn booking_status(&self, job_id: JobId) -> Result<BookingStatusRecord, ApiError> {
        match self.statuses.get(job_id).await {
            Ok(Some(record)) => return Ok(record),
            Ok(None) => {}
            Err(e) => tracing::warn!("Failed to read status for job {}: {}", job_id, e),
        }

        self.queue
            .get_job(job_id)
            .await?
            .map(|job| job.status_record())
            .ok_or(ApiError::JobNotFound(job_id))
    }

    /// Bookings held by a user, oldest first.
    pub async fn bookings_for_user(&self, user_id: &UserId) -> Result<Vec<Booking>, ApiError> {
        Ok(self.bookings.list_for_user(user_id).await?)
    }

    /// Cancel a booking owned by `user_id`, freeing its seat.
    pub async fn cancel_booking(
        &self,
        booking_id: BookingId,
        user_id: &UserId,
    ) -> Result<Booking, ApiError> {
        let booking = self.bookings.cancel(booking_id, user_id).await?;
        tracing::info!("Booking {} cancelled by {}", booking_id, user_id);
        Ok(booking)
    }
}
