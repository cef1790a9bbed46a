use std::sync::Arc;
use std::time::Duration;

use actors::{BookingHandler, BookingQueue, SupervisorArgs, start_supervisor};
use booking_core::{
    BookingJob, BookingSummary, EventId, JobId, QueueConfig, QueuedJob, UserId,
};
use chrono::Utc;
use db::{Database, DbConfig};
use tokio::sync::broadcast;

pub async fn setup_db() -> Database {
    db::init(&DbConfig::memory()).await.expect("in-memory database")
}

/// Timings short enough for retries to play out within a test.
pub fn fast_config() -> QueueConfig {
    QueueConfig {
        backoff_initial_ms: 20,
        tick_interval_ms: 10,
        poll_interval_ms: 10,
        ..Default::default()
    }
}

pub async fn start(
    db: Database,
    config: QueueConfig,
    handler: impl BookingHandler,
) -> (BookingQueue, tokio::task::JoinHandle<()>) {
    let (event_tx, _) = broadcast::channel(256);
    let (supervisor, handle) = start_supervisor(SupervisorArgs {
        config,
        db,
        handler: Arc::new(handler),
        event_tx: event_tx.clone(),
    })
    .await
    .expect("supervisor starts");
    (BookingQueue::new(supervisor, event_tx), handle)
}

pub fn job(user: &str) -> BookingJob {
    BookingJob::new(UserId::from(user), EventId::new())
}

pub fn summary_for(job: &BookingJob) -> BookingSummary {
    BookingSummary {
        booking_id: Default::default(),
        event_id: job.event_id,
        event_name: "Night Concert".into(),
        venue: "Main Hall".into(),
        starts_at: Utc::now(),
        booked_at: Utc::now(),
    }
}

/// Poll the queue until the job satisfies `done`, for up to five seconds.
pub async fn wait_for(
    queue: &BookingQueue,
    job_id: JobId,
    done: impl Fn(&QueuedJob) -> bool,
) -> QueuedJob {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if let Some(job) = queue.get_job(job_id).await.expect("queue reachable")
            && done(&job)
        {
            return job;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} did not reach the expected state",
            job_id
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
