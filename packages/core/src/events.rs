//! Event types for real-time updates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{JobId, QueuedJob};
use crate::queue::QueueRunState;
use crate::status::BookingSummary;

/// Events emitted by the booking queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum QueueEvent {
    /// The queue's run state changed (running, paused, draining).
    QueueStateChanged {
        old_state: QueueRunState,
        new_state: QueueRunState,
        timestamp: DateTime<Utc>,
    },
    /// Terminal jobs were purged.
    QueueCleaned {
        removed: usize,
        timestamp: DateTime<Utc>,
    },

    /// A new job was enqueued.
    JobEnqueued {
        job: QueuedJob,
        timestamp: DateTime<Utc>,
    },
    /// The worker picked a job up.
    JobStarted {
        job_id: JobId,
        worker_id: String,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },
    /// The worker reached a progress milestone.
    JobProgress {
        job_id: JobId,
        progress: u8,
        timestamp: DateTime<Utc>,
    },
    /// A booking was created.
    JobCompleted {
        job_id: JobId,
        summary: BookingSummary,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    /// An attempt failed.
    JobFailed {
        job_id: JobId,
        error: String,
        attempts: u32,
        will_retry: bool,
        timestamp: DateTime<Utc>,
    },
    /// A delayed job became eligible for dispatch again.
    JobRetrying {
        job_id: JobId,
        attempt: u32,
        timestamp: DateTime<Utc>,
    },

    /// The sweeper removed stale status records.
    StatusSwept {
        removed: usize,
        timestamp: DateTime<Utc>,
    },
}

impl QueueEvent {
    /// Get the timestamp of the event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            QueueEvent::QueueStateChanged { timestamp, .. } => *timestamp,
            QueueEvent::QueueCleaned { timestamp, .. } => *timestamp,
            QueueEvent::JobEnqueued { timestamp, .. } => *timestamp,
            QueueEvent::JobStarted { timestamp, .. } => *timestamp,
            QueueEvent::JobProgress { timestamp, .. } => *timestamp,
            QueueEvent::JobCompleted { timestamp, .. } => *timestamp,
            QueueEvent::JobFailed { timestamp, .. } => *timestamp,
            QueueEvent::JobRetrying { timestamp, .. } => *timestamp,
            QueueEvent::StatusSwept { timestamp, .. } => *timestamp,
        }
    }

    /// Get the job ID associated with this event, if any.
    pub fn job_id(&self) -> Option<JobId> {
        match self {
            QueueEvent::JobEnqueued { job, .. } => Some(job.id()),
            QueueEvent::JobStarted { job_id, .. } => Some(*job_id),
            QueueEvent::JobProgress { job_id, .. } => Some(*job_id),
            QueueEvent::JobCompleted { job_id, .. } => Some(*job_id),
            QueueEvent::JobFailed { job_id, .. } => Some(*job_id),
            QueueEvent::JobRetrying { job_id, .. } => Some(*job_id),
            _ => None,
        }
    }

    /// Get a short description of this event for logging.
    pub fn description(&self) -> String {
        match self {
            QueueEvent::QueueStateChanged { new_state, .. } => format!("Queue -> {}", new_state),
            QueueEvent::QueueCleaned { removed, .. } => {
                format!("Queue cleaned: {} terminal jobs removed", removed)
            }
            QueueEvent::JobEnqueued { job, .. } => format!(
                "Job {} enqueued for user {} on event {}",
                job.id(),
                job.job.user_id,
                job.job.event_id
            ),
            QueueEvent::JobStarted {
                job_id,
                worker_id,
                attempt,
                ..
            } => format!("Job {} started by {} (attempt {})", job_id, worker_id, attempt),
            QueueEvent::JobProgress {
                job_id, progress, ..
            } => format!("Job {} at {}%", job_id, progress),
            QueueEvent::JobCompleted {
                job_id,
                summary,
                duration_ms,
                ..
            } => format!(
                "Job {} booked {} in {}ms",
                job_id, summary.booking_id, duration_ms
            ),
            QueueEvent::JobFailed {
                job_id,
                error,
                will_retry,
                ..
            } => {
                let retry = if *will_retry { " (will retry)" } else { "" };
                format!("Job {} failed: {}{}", job_id, error, retry)
            }
            QueueEvent::JobRetrying {
                job_id, attempt, ..
            } => format!("Job {} retrying (attempt {})", job_id, attempt),
            QueueEvent::StatusSwept { removed, .. } => {
                format!("Swept {} stale status records", removed)
            }
        }
    }
}
