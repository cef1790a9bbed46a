//! Booking repository, including the admission transaction.

use booking_core::{Booking, BookingId, BookingJob, EventId, JobId, Rejection, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::invalid_id;
use crate::{Database, DbError};

/// Repository for booking persistence operations.
#[derive(Clone)]
pub struct BookingRepository {
    db: Database,
}

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct BookingRecord {
    booking_id: String,
    user_id: String,
    event_id: String,
    job_id: String,
    created_at: DateTime<Utc>,
}

impl From<&Booking> for BookingRecord {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id.to_string(),
            user_id: booking.user_id.to_string(),
            event_id: booking.event_id.to_string(),
            job_id: booking.job_id.to_string(),
            created_at: booking.created_at,
        }
    }
}

impl TryFrom<BookingRecord> for Booking {
    type Error = DbError;

    fn try_from(record: BookingRecord) -> Result<Self, Self::Error> {
        let id = BookingId::parse(&record.booking_id)
            .map_err(|e| invalid_id("booking", &record.booking_id, e))?;
        let event_id = EventId::parse(&record.event_id)
            .map_err(|e| invalid_id("event", &record.event_id, e))?;
        let job_id =
            JobId::parse(&record.job_id).map_err(|e| invalid_id("job", &record.job_id, e))?;
        Ok(Booking {
            id,
            user_id: UserId(record.user_id),
            event_id,
            job_id,
            created_at: record.created_at,
        })
    }
}

/// Why the admission transaction did not create a booking.
#[derive(Debug, thiserror::Error)]
pub enum AdmitError {
    /// A business rule refused the booking; retrying cannot help.
    #[error("{0}")]
    Rejected(Rejection),
    /// The database failed or the transaction conflicted.
    #[error(transparent)]
    Db(#[from] DbError),
}

impl AdmitError {
    /// Classify the messages of a failed transaction.
    fn from_messages(messages: Vec<String>) -> Self {
        if let Some(rejection) = messages.iter().find_map(|m| Rejection::from_message(m)) {
            return AdmitError::Rejected(rejection);
        }
        // The unique index fires if a duplicate slipped past the read check.
        if messages.iter().any(|m| m.contains("booking_user_event")) {
            return AdmitError::Rejected(Rejection::DuplicateBooking);
        }
        AdmitError::Db(DbError::Query(messages.join("; ")))
    }
}

/// Checks and insert run as one transaction; every `THROW` aborts it.
fn admit_query() -> String {
    format!(
        r#"
        BEGIN TRANSACTION;
        LET $event = (SELECT capacity FROM type::thing("event", $event_key))[0];
        IF $event = NONE {{ THROW "{not_found}" }};
        LET $existing = (SELECT VALUE booking_id FROM booking WHERE event_id = $event_key AND user_id = $user_id);
        IF array::len($existing) > 0 {{ THROW "{duplicate}" }};
        LET $taken = (SELECT VALUE booking_id FROM booking WHERE event_id = $event_key);
        IF array::len($taken) >= $event.capacity {{ THROW "{full}" }};
        CREATE type::thing("booking", $booking_key) CONTENT $record RETURN NONE;
        COMMIT TRANSACTION;
        "#,
        not_found = Rejection::EventNotFound.reason(),
        duplicate = Rejection::DuplicateBooking.reason(),
        full = Rejection::EventFull.reason(),
    )
}

impl BookingRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Atomically check capacity and duplicates for `job` and insert one
    /// booking.
    ///
    /// Admitting the same job again returns the booking it already holds.
    pub async fn admit(&self, job: &BookingJob) -> Result<Booking, AdmitError> {
        if let Some(existing) = self.find_for_job(job.id).await? {
            tracing::debug!("Job {} already admitted as booking {}", job.id, existing.id);
            return Ok(existing);
        }

        match self.insert(job).await {
            Err(AdmitError::Rejected(Rejection::DuplicateBooking)) => {
                match self.find_for_job(job.id).await? {
                    Some(existing) => Ok(existing),
                    None => Err(AdmitError::Rejected(Rejection::DuplicateBooking)),
                }
            }
            result => result,
        }
    }

    async fn insert(&self, job: &BookingJob) -> Result<Booking, AdmitError> {
        let booking = Booking {
            id: BookingId::new(),
            user_id: job.user_id.clone(),
            event_id: job.event_id,
            job_id: job.id,
            created_at: Utc::now(),
        };

        let mut response = self
            .db
            .query(admit_query())
            .bind(("event_key", booking.event_id.to_string()))
            .bind(("user_id", booking.user_id.to_string()))
            .bind(("booking_key", booking.id.to_string()))
            .bind(("record", BookingRecord::from(&booking)))
            .await
            .map_err(|e| AdmitError::from_messages(vec![e.to_string()]))?;

        let errors = response.take_errors();
        if !errors.is_empty() {
            let mut errors: Vec<(usize, surrealdb::Error)> = errors.into_iter().collect();
            errors.sort_by_key(|(index, _)| *index);
            let messages = errors.into_iter().map(|(_, e)| e.to_string()).collect();
            return Err(AdmitError::from_messages(messages));
        }

        tracing::debug!(
            "Booking {} created for user {} on event {}",
            booking.id,
            booking.user_id,
            booking.event_id
        );
        Ok(booking)
    }

    /// Get a booking by ID.
    pub async fn get(&self, id: BookingId) -> Result<Option<Booking>, DbError> {
        let mut response = self
            .db
            .query(r#"SELECT * OMIT id FROM type::thing("booking", $key)"#)
            .bind(("key", id.to_string()))
            .await?;

        let records: Vec<BookingRecord> = response.take(0)?;
        records.into_iter().next().map(Booking::try_from).transpose()
    }

    /// Find the booking a user holds for an event.
    pub async fn find(&self, user_id: &UserId, event_id: EventId) -> Result<Option<Booking>, DbError> {
        let mut response = self
            .db
            .query("SELECT * OMIT id FROM booking WHERE user_id = $user_id AND event_id = $event_id")
            .bind(("user_id", user_id.to_string()))
            .bind(("event_id", event_id.to_string()))
            .await?;

        let records: Vec<BookingRecord> = response.take(0)?;
        records.into_iter().next().map(Booking::try_from).transpose()
    }

    /// Find the booking admitted by a job.
    pub async fn find_for_job(&self, job_id: JobId) -> Result<Option<Booking>, DbError> {
        let mut response = self
            .db
            .query("SELECT * OMIT id FROM booking WHERE job_id = $job_id")
            .bind(("job_id", job_id.to_string()))
            .await?;

        let records: Vec<BookingRecord> = response.take(0)?;
        records.into_iter().next().map(Booking::try_from).transpose()
    }

    /// Number of bookings held for an event.
    pub async fn count_for_event(&self, event_id: EventId) -> Result<u64, DbError> {
        let mut response = self
            .db
            .query("SELECT count() AS count FROM booking WHERE event_id = $event_id GROUP ALL")
            .bind(("event_id", event_id.to_string()))
            .await?;

        let count: Option<i64> = response.take("count")?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    /// All bookings for an event, oldest first.
    pub async fn list_for_event(&self, event_id: EventId) -> Result<Vec<Booking>, DbError> {
        let mut response = self
            .db
            .query("SELECT * OMIT id FROM booking WHERE event_id = $event_id ORDER BY created_at ASC")
            .bind(("event_id", event_id.to_string()))
            .await?;

        let records: Vec<BookingRecord> = response.take(0)?;
        records.into_iter().map(Booking::try_from).collect()
    }

    /// Booking history of a user, oldest first.
    pub async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Booking>, DbError> {
        let mut response = self
            .db
            .query("SELECT * OMIT id FROM booking WHERE user_id = $user_id ORDER BY created_at ASC")
            .bind(("user_id", user_id.to_string()))
            .await?;

        let records: Vec<BookingRecord> = response.take(0)?;
        records.into_iter().map(Booking::try_from).collect()
    }

    /// Delete a booking owned by `user_id`, freeing its seat.
    pub async fn cancel(&self, id: BookingId, user_id: &UserId) -> Result<Booking, DbError> {
        let booking = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::NotFound(format!("Booking not found: {}", id)))?;

        if &booking.user_id != user_id {
            return Err(DbError::Forbidden(format!(
                "booking {} belongs to another user",
                id
            )));
        }

        self.db
            .query(r#"DELETE type::thing("booking", $key)"#)
            .bind(("key", id.to_string()))
            .await?
            .check()?;

        tracing::debug!("Booking {} cancelled by user {}", id, user_id);
        Ok(booking)
    }
}
