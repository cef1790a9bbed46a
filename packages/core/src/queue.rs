//! Queue configuration, statistics and admission arithmetic.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{EventId, UserId};
use crate::job::{JobId, QueuedJob};

/// Current operational state of the booking queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueRunState {
    /// Dispatching waiting jobs to the worker.
    #[default]
    Running,
    /// Paused by an operator; in-flight work still completes.
    Paused,
    /// Shutting down, finishing current work without dispatching more.
    Draining,
}

impl QueueRunState {
    /// Check if the queue hands out new jobs.
    pub fn is_dispatching(&self) -> bool {
        matches!(self, QueueRunState::Running)
    }
}

impl std::fmt::Display for QueueRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueRunState::Running => write!(f, "running"),
            QueueRunState::Paused => write!(f, "paused"),
            QueueRunState::Draining => write!(f, "draining"),
        }
    }
}

/// Configuration for queue, worker and sweeper behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Attempts per job, including the first run.
    pub max_attempts: u32,
    /// First retry delay; doubles on every further attempt.
    pub backoff_initial_ms: u64,
    /// Completed jobs kept for inspection.
    pub keep_completed: usize,
    /// Failed jobs kept for inspection.
    pub keep_failed: usize,
    /// Lifetime of a status record.
    pub status_ttl_ms: u64,
    /// Per-job processing estimate used for wait times.
    pub per_job_estimate_ms: u64,
    /// Active jobs running longer than this are reported as stalled.
    pub stall_threshold_ms: u64,
    /// Bound on the admission transaction.
    pub transaction_timeout_ms: u64,
    /// Bound on a whole handler run.
    pub job_timeout_ms: u64,
    /// How often the worker asks for work.
    pub poll_interval_ms: u64,
    /// How often delayed jobs are checked for promotion.
    pub tick_interval_ms: u64,
    /// How often the sweeper runs.
    pub sweep_interval_ms: u64,
    /// Status records older than this are removed by the sweeper.
    pub sweep_max_age_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_initial_ms: 2_000,
            keep_completed: 50,
            keep_failed: 100,
            status_ttl_ms: 300_000,
            per_job_estimate_ms: 2_000,
            stall_threshold_ms: 30_000,
            transaction_timeout_ms: 10_000,
            job_timeout_ms: 30_000,
            poll_interval_ms: 100,
            tick_interval_ms: 250,
            sweep_interval_ms: 5 * 60 * 1_000,
            sweep_max_age_ms: 10 * 60 * 1_000,
        }
    }
}

impl QueueConfig {
    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn status_ttl(&self) -> Duration {
        Duration::from_millis(self.status_ttl_ms)
    }

    pub fn per_job_estimate(&self) -> Duration {
        Duration::from_millis(self.per_job_estimate_ms)
    }

    pub fn stall_threshold(&self) -> Duration {
        Duration::from_millis(self.stall_threshold_ms)
    }

    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_millis(self.job_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn sweep_max_age(&self) -> Duration {
        Duration::from_millis(self.sweep_max_age_ms)
    }
}

/// Counts of jobs per state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueStats {
    pub waiting: u64,
    pub active: u64,
    pub delayed: u64,
    pub completed: u64,
    pub failed: u64,
}

impl QueueStats {
    /// Total jobs known to the queue.
    pub fn total(&self) -> u64 {
        self.waiting + self.active + self.delayed + self.completed + self.failed
    }

    /// Jobs that still have work ahead of them.
    pub fn pending(&self) -> u64 {
        self.waiting + self.active + self.delayed
    }
}

/// Queue counts observed while a job was enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub waiting: usize,
    pub active: usize,
    /// 1-based rank of the job among waiting jobs, if still waiting.
    pub rank: Option<usize>,
}

impl QueueSnapshot {
    /// Active jobs plus the job's rank among waiting jobs.
    pub fn position(&self) -> u64 {
        self.active.saturating_add(self.rank.unwrap_or(0)) as u64
    }

    /// Seconds until the queue, as observed, has been worked off.
    pub fn estimated_wait(&self, per_job: Duration) -> Duration {
        let ahead = u32::try_from(self.waiting.saturating_add(self.active)).unwrap_or(u32::MAX);
        per_job.saturating_mul(ahead)
    }
}

/// Accepted-but-pending response to a booking request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionReceipt {
    pub job_id: JobId,
    pub queue_position: u64,
    /// Seconds.
    pub estimated_wait_time: u64,
    pub status_endpoint: String,
}

impl AdmissionReceipt {
    pub fn new(job_id: JobId, snapshot: QueueSnapshot, per_job: Duration) -> Self {
        Self {
            job_id,
            queue_position: snapshot.position(),
            estimated_wait_time: snapshot.estimated_wait(per_job).as_secs(),
            status_endpoint: format!("/api/bookings/status/{job_id}"),
        }
    }
}

/// One line of the detailed queue listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub id: JobId,
    pub user_id: UserId,
    pub event_id: EventId,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl From<&QueuedJob> for JobSummary {
    fn from(queued: &QueuedJob) -> Self {
        Self {
            id: queued.job.id,
            user_id: queued.job.user_id.clone(),
            event_id: queued.job.event_id,
            enqueued_at: queued.job.enqueued_at,
            attempts: queued.attempts,
            progress: queued.progress,
            started_at: queued.started_at,
            last_error: queued.last_error.clone(),
        }
    }
}

/// Waiting and active jobs in dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueDetails {
    pub waiting: Vec<JobSummary>,
    pub active: Vec<JobSummary>,
}

/// Health report for the booking queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueHealth {
    pub state: QueueRunState,
    pub stats: QueueStats,
    pub stalled_jobs: Vec<JobId>,
    pub healthy: bool,
}

impl QueueHealth {
    /// Healthy when dispatching and nothing is stalled.
    pub fn new(state: QueueRunState, stats: QueueStats, stalled_jobs: Vec<JobId>) -> Self {
        let healthy = state.is_dispatching() && stalled_jobs.is_empty();
        Self {
            state,
            stats,
            stalled_jobs,
            healthy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_counts_active_jobs_ahead_of_rank() {
        let snapshot = QueueSnapshot {
            waiting: 5,
            active: 1,
            rank: Some(3),
        };
        assert_eq!(snapshot.position(), 4);
        assert_eq!(
            snapshot.estimated_wait(Duration::from_secs(2)),
            Duration::from_secs(12)
        );
    }

    #[test]
    fn estimated_wait_saturates_on_huge_queues() {
        let snapshot = QueueSnapshot {
            waiting: usize::MAX,
            active: 1,
            rank: None,
        };
        assert_eq!(
            snapshot.estimated_wait(Duration::from_millis(1)),
            Duration::from_millis(u64::from(u32::MAX))
        );
        assert_eq!(snapshot.estimated_wait(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn receipt_points_at_status_endpoint() {
        let job_id = JobId::new();
        let snapshot = QueueSnapshot {
            waiting: 1,
            active: 0,
            rank: Some(1),
        };
        let receipt = AdmissionReceipt::new(job_id, snapshot, Duration::from_secs(2));
        assert_eq!(receipt.queue_position, 1);
        assert_eq!(receipt.estimated_wait_time, 2);
        assert_eq!(receipt.status_endpoint, format!("/api/bookings/status/{job_id}"));
    }

    #[test]
    fn paused_queue_is_unhealthy() {
        let health = QueueHealth::new(QueueRunState::Paused, QueueStats::default(), vec![]);
        assert!(!health.healthy);

        let health = QueueHealth::new(QueueRunState::Running, QueueStats::default(), vec![]);
        assert!(health.healthy);
    }
}
