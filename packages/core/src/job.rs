//! Booking jobs and their queue-side bookkeeping.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::catalog::{EventId, UserId};
use crate::status::{BookingStatusRecord, BookingSummary};

/// Unique identifier for a booking job, using ULID for chronological sorting.
///
/// Ids are generated fresh for every admission and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Ulid);

impl JobId {
    /// Create a new unique job ID.
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Parse a job ID from a string.
    pub fn parse(s: &str) -> Result<Self, ulid::DecodeError> {
        Ok(Self(Ulid::from_string(s)?))
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Immutable payload of one booking attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingJob {
    pub id: JobId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub enqueued_at: DateTime<Utc>,
}

impl BookingJob {
    /// Create a job for `user_id` wanting a seat at `event_id`.
    pub fn new(user_id: UserId, event_id: EventId) -> Self {
        Self {
            id: JobId::new(),
            user_id,
            event_id,
            enqueued_at: Utc::now(),
        }
    }
}

/// Position of a job inside the queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting in FIFO order for the worker.
    #[default]
    Waiting,
    /// Currently held by the worker.
    Active,
    /// Waiting for its retry backoff to elapse.
    Delayed,
    /// Finished with a booking.
    Completed,
    /// Finished without a booking; will never run again.
    Failed,
}

impl JobState {
    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Waiting => "waiting",
            JobState::Active => "active",
            JobState::Delayed => "delayed",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deterministic reasons a booking cannot be admitted.
///
/// Retrying never changes these outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    EventNotFound,
    DuplicateBooking,
    EventFull,
}

impl Rejection {
    pub const ALL: [Rejection; 3] = [
        Rejection::EventNotFound,
        Rejection::DuplicateBooking,
        Rejection::EventFull,
    ];

    /// Human-readable reason surfaced to pollers.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::EventNotFound => "event not found",
            Rejection::DuplicateBooking => "user already has a booking for this event",
            Rejection::EventFull => "event is fully booked",
        }
    }

    /// Recover a rejection from an error message that embeds its reason.
    pub fn from_message(message: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|rejection| message.contains(rejection.reason()))
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.reason())
    }
}

/// Failure outcome of processing a job.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum JobError {
    /// Business-rule failure; the job fails immediately.
    #[error("{0}")]
    Terminal(Rejection),
    /// Transient failure; the job is retried while attempts remain.
    #[error("{0}")]
    Retryable(String),
}

impl JobError {
    pub fn retryable(reason: impl Into<String>) -> Self {
        JobError::Retryable(reason.into())
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, JobError::Retryable(_))
    }
}

impl From<Rejection> for JobError {
    fn from(rejection: Rejection) -> Self {
        JobError::Terminal(rejection)
    }
}

/// Exponential retry delay: `initial`, `2 * initial`, `4 * initial`, ...
///
/// `attempt` is the number of attempts already made (1 after the first run).
pub fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    initial.saturating_mul(1u32 << exponent)
}

/// A booking job together with the queue's mutable bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job: BookingJob,
    pub state: JobState,
    /// Enqueue sequence number; defines FIFO order.
    pub seq: u64,
    /// Number of times the job has been handed to the worker.
    #[serde(default)]
    pub attempts: u32,
    pub max_attempts: u32,
    /// Latest progress milestone, 0-100.
    #[serde(default)]
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BookingSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ready_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl QueuedJob {
    /// Wrap a freshly admitted job as waiting.
    pub fn waiting(job: BookingJob, seq: u64, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            job,
            state: JobState::Waiting,
            seq,
            attempts: 0,
            max_attempts,
            progress: 0,
            last_error: None,
            result: None,
            worker_id: None,
            started_at: None,
            ready_at: None,
            finished_at: None,
            updated_at: now,
        }
    }

    pub fn id(&self) -> JobId {
        self.job.id
    }

    /// Whether another attempt is allowed after the current one.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// An active job running longer than `threshold`.
    pub fn is_stalled(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        if self.state != JobState::Active {
            return false;
        }
        let Some(started_at) = self.started_at else {
            return false;
        };
        match (now - started_at).to_std() {
            Ok(elapsed) => elapsed > threshold,
            Err(_) => false,
        }
    }

    /// Status record equivalent to the queue's view of this job.
    pub fn status_record(&self) -> BookingStatusRecord {
        let record = BookingStatusRecord::queued(&self.job);
        let record = match self.state {
            JobState::Waiting if self.attempts == 0 => record,
            JobState::Waiting | JobState::Active | JobState::Delayed => {
                record.processing(self.attempts, self.last_error.clone())
            }
            JobState::Completed => match &self.result {
                Some(summary) => record.completed(self.attempts, summary.clone()),
                None => record.processing(self.attempts, None),
            },
            JobState::Failed => record.failed(
                self.attempts,
                self.last_error.clone().unwrap_or_default(),
            ),
        };
        record.at(self.updated_at)
    }
}
