//! Caller-facing booking status records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{BookingId, EventId, UserId};
use crate::job::{BookingJob, JobId};

/// Lifecycle of a booking request as seen by pollers.
///
/// Statuses only move forward: queued -> processing -> completed | failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl BookingStatus {
    fn rank(&self) -> u8 {
        match self {
            BookingStatus::Queued => 0,
            BookingStatus::Processing => 1,
            BookingStatus::Completed | BookingStatus::Failed => 2,
        }
    }

    /// Check if moving to `next` keeps the lifecycle monotonic.
    ///
    /// Rewriting the same non-terminal status is allowed; a retry refreshes
    /// `processing` with the latest error.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Queued => "queued",
            BookingStatus::Processing => "processing",
            BookingStatus::Completed => "completed",
            BookingStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of a booking created by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSummary {
    pub booking_id: BookingId,
    pub event_id: EventId,
    pub event_name: String,
    pub venue: String,
    pub starts_at: DateTime<Utc>,
    pub booked_at: DateTime<Utc>,
}

/// Latest known state of a booking request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingStatusRecord {
    pub job_id: JobId,
    pub status: BookingStatus,
    /// Present only when completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<BookingSummary>,
    /// Latest failure reason; a processing record carries the error of the
    /// previous attempt while a retry is pending.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// No further attempt will be made.
    #[serde(default)]
    pub final_failure: bool,
    #[serde(default)]
    pub attempts: u32,
    pub user_id: UserId,
    pub event_id: EventId,
    pub updated_at: DateTime<Utc>,
}

impl BookingStatusRecord {
    /// Initial record written at admission.
    pub fn queued(job: &BookingJob) -> Self {
        Self {
            job_id: job.id,
            status: BookingStatus::Queued,
            result: None,
            error: None,
            final_failure: false,
            attempts: 0,
            user_id: job.user_id.clone(),
            event_id: job.event_id,
            updated_at: Utc::now(),
        }
    }

    pub fn processing(mut self, attempts: u32, last_error: Option<String>) -> Self {
        self.status = BookingStatus::Processing;
        self.attempts = attempts;
        self.error = last_error;
        self.updated_at = Utc::now();
        self
    }

    pub fn completed(mut self, attempts: u32, summary: BookingSummary) -> Self {
        self.status = BookingStatus::Completed;
        self.attempts = attempts;
        self.result = Some(summary);
        self.error = None;
        self.updated_at = Utc::now();
        self
    }

    pub fn failed(mut self, attempts: u32, reason: impl Into<String>) -> Self {
        self.status = BookingStatus::Failed;
        self.attempts = attempts;
        self.error = Some(reason.into());
        self.final_failure = true;
        self.updated_at = Utc::now();
        self
    }

    /// Override the record timestamp.
    pub fn at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }
}
