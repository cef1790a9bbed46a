//! Queue monitor: stats, listings, health and admin operations.

use booking_core::{JobState, JobSummary, QueueDetails, QueueHealth, QueueStats};
use chrono::Utc;

use crate::error::ApiError;
use crate::init::BookingService;

impl BookingService {
    /// Job counts per state.
    pub async fn queue_stats(&self) -> Result<QueueStats, ApiError> {
        Ok(self.queue.stats().await?)
    }

    /// Waiting and active jobs in dispatch order.
    pub async fn queue_details(&self) -> Result<QueueDetails, ApiError> {
        let waiting = self.queue.list(JobState::Waiting).await?;
        let active = self.queue.list(JobState::Active).await?;
        Ok(QueueDetails {
            waiting: waiting.iter().map(JobSummary::from).collect(),
            active: active.iter().map(JobSummary::from).collect(),
        })
    }

    /// Unhealthy when the queue is not dispatching or an active job has
    /// stalled.
    pub async fn queue_health(&self) -> Result<QueueHealth, ApiError> {
        let state = self.queue.state().await?;
        let stats = self.queue.stats().await?;
        let now = Utc::now();
        let threshold = self.config.stall_threshold();

        let stalled = self
            .queue
            .list(JobState::Active)
            .await?
            .into_iter()
            .filter(|job| job.is_stalled(now, threshold))
            .map(|job| job.id())
            .collect::<Vec<_>>();
        for job_id in &stalled {
            tracing::warn!("Job {} is stalled", job_id);
        }

        Ok(QueueHealth::new(state, stats, stalled))
    }

    /// Stop dispatching; the active job runs to completion.
    pub async fn pause_queue(&self) -> Result<(), ApiError> {
        Ok(self.queue.pause().await?)
    }

    pub async fn resume_queue(&self) -> Result<(), ApiError> {
        Ok(self.queue.resume().await?)
    }

    /// Remove all completed and failed jobs.
    pub async fn clean_queue(&self) -> Result<usize, ApiError> {
        Ok(self.queue.clean().await?)
    }

    /// Remove stale status records now instead of waiting for the sweeper.
    pub async fn sweep_statuses(&self) -> Result<usize, ApiError> {
        Ok(self.queue.sweep().await?)
    }
}
