#![allow(clippy::disallowed_methods)]

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use actors::{AdmissionHandler, BookingHandler, FnHandler, HandlerFuture, ProgressReporter};
use booking_core::{
    BookingJob, BookingStatus, BookingStatusRecord, Event, JobError, JobState, QueueConfig, QueueEvent, QueueRunState,
    Rejection, UserId,
};
use chrono::Utc;
use db::repositories::{BookingRepository, EventRepository, StatusRepository};

/// A handler whose outcome depends on the attempt number.
fn counting_handler(
    calls: Arc<AtomicU32>,
    outcome: impl Fn(u32) -> Result<(), JobError> + Send + Sync + 'static,
) -> impl BookingHandler {
    FnHandler::new(move |job, _progress| {
        let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let result = outcome(attempt).map(|()| common::summary_for(job));
        Box::pin(async move { result }) as HandlerFuture
    })
}

#[tokio::test]
async fn test_retryable_failure_is_retried_until_success() {
    let db = common::setup_db().await;
    let calls = Arc::new(AtomicU32::new(0));
    let handler = counting_handler(calls.clone(), |attempt| {
        if attempt < 3 {
            Err(JobError::retryable("write conflict"))
        } else {
            Ok(())
        }
    });
    let (queue, _handle) = common::start(db.clone(), common::fast_config(), handler).await;

    let job = common::job("alice");
    queue.enqueue(job.clone()).await.unwrap();

    let done = common::wait_for(&queue, job.id, |j| j.state.is_terminal()).await;
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.attempts, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let status = StatusRepository::new(db).get(job.id).await.unwrap().unwrap();
    assert_eq!(status.status, BookingStatus::Completed);
    assert!(status.result.is_some());
    assert!(!status.final_failure);

    queue.shutdown().unwrap();
}

#[tokio::test]
async fn test_terminal_rejection_is_not_retried() {
    let db = common::setup_db().await;
    let calls = Arc::new(AtomicU32::new(0));
    let handler = counting_handler(calls.clone(), |_| Err(Rejection::EventFull.into()));
    let (queue, _handle) = common::start(db.clone(), common::fast_config(), handler).await;

    let job = common::job("bob");
    queue.enqueue(job.clone()).await.unwrap();

    let done = common::wait_for(&queue, job.id, |j| j.state.is_terminal()).await;
    assert_eq!(done.state, JobState::Failed);
    assert_eq!(done.attempts, 1);

    // Give a stray retry the chance to show up
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let status = StatusRepository::new(db).get(job.id).await.unwrap().unwrap();
    assert_eq!(status.status, BookingStatus::Failed);
    assert!(status.final_failure);
    assert_eq!(status.error.as_deref(), Some("event is fully booked"));

    queue.shutdown().unwrap();
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_job() {
    let db = common::setup_db().await;
    let calls = Arc::new(AtomicU32::new(0));
    let handler = counting_handler(calls.clone(), |_| Err(JobError::retryable("connection reset")));
    let (queue, _handle) = common::start(db.clone(), common::fast_config(), handler).await;
    let mut events = queue.subscribe();

    let job = common::job("carol");
    queue.enqueue(job.clone()).await.unwrap();

    let done = common::wait_for(&queue, job.id, |j| j.state.is_terminal()).await;
    assert_eq!(done.state, JobState::Failed);
    assert_eq!(done.attempts, 3);
    assert_eq!(done.last_error.as_deref(), Some("connection reset"));

    let status = StatusRepository::new(db).get(job.id).await.unwrap().unwrap();
    assert!(status.final_failure);
    assert_eq!(status.attempts, 3);

    let mut retries = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let QueueEvent::JobFailed { will_retry, .. } = event {
            retries.push(will_retry);
        }
    }
    assert_eq!(retries, vec![true, true, false]);

    queue.shutdown().unwrap();
}

#[tokio::test]
async fn test_paused_queue_reports_positions_and_resumes() {
    let db = common::setup_db().await;
    let calls = Arc::new(AtomicU32::new(0));
    let handler = counting_handler(calls.clone(), |_| Ok(()));
    let (queue, _handle) = common::start(db, common::fast_config(), handler).await;

    queue.pause().await.unwrap();
    assert_eq!(queue.state().await.unwrap(), QueueRunState::Paused);

    let mut jobs = Vec::new();
    for (i, user) in ["u1", "u2", "u3"].into_iter().enumerate() {
        let job = common::job(user);
        let snapshot = queue.enqueue(job.clone()).await.unwrap();
        assert_eq!(snapshot.position(), i as u64 + 1);
        jobs.push(job);
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = queue.stats().await.unwrap();
    assert_eq!(stats.waiting, 3);
    assert_eq!(stats.active, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let waiting = queue.list(JobState::Waiting).await.unwrap();
    let order: Vec<_> = waiting.iter().map(|j| j.id()).collect();
    assert_eq!(order, jobs.iter().map(|j| j.id).collect::<Vec<_>>());

    queue.resume().await.unwrap();
    for job in &jobs {
        common::wait_for(&queue, job.id, |j| j.state == JobState::Completed).await;
    }
    assert_eq!(queue.stats().await.unwrap().completed, 3);

    queue.shutdown().unwrap();
}

#[tokio::test]
async fn test_retention_and_clean() {
    let db = common::setup_db().await;
    let handler = actors::booking_handler!(|job, _progress| Ok(common::summary_for(&job)));
    let config = QueueConfig {
        keep_completed: 2,
        ..common::fast_config()
    };
    let (queue, _handle) = common::start(db, config, handler).await;

    let mut jobs = Vec::new();
    for user in ["a", "b", "c", "d"] {
        let job = common::job(user);
        queue.enqueue(job.clone()).await.unwrap();
        jobs.push(job);
    }
    let last = jobs.last().unwrap().id;
    common::wait_for(&queue, last, |j| j.state == JobState::Completed).await;

    assert_eq!(queue.stats().await.unwrap().completed, 2);
    assert!(queue.get_job(jobs[0].id).await.unwrap().is_none());

    assert_eq!(queue.clean().await.unwrap(), 2);
    assert_eq!(queue.stats().await.unwrap().total(), 0);

    queue.shutdown().unwrap();
}

#[tokio::test]
async fn test_draining_queue_refuses_new_jobs() {
    let db = common::setup_db().await;
    let calls = Arc::new(AtomicU32::new(0));
    let handler = counting_handler(calls, |_| Ok(()));
    let (queue, _handle) = common::start(db, common::fast_config(), handler).await;

    assert!(queue.drain(Duration::from_secs(1)).await.unwrap());
    assert_eq!(queue.state().await.unwrap(), QueueRunState::Draining);
    assert_eq!(
        queue.enqueue(common::job("late")).await,
        Err(actors::QueueError::Draining)
    );

    queue.shutdown().unwrap();
}

#[tokio::test]
async fn test_queue_recovers_jobs_and_pause_after_restart() {
    let db = common::setup_db().await;
    let calls = Arc::new(AtomicU32::new(0));
    let handler = counting_handler(calls.clone(), |_| Ok(()));
    let (queue, handle) = common::start(db.clone(), common::fast_config(), handler).await;

    queue.pause().await.unwrap();
    let first = common::job("x");
    let second = common::job("y");
    queue.enqueue(first.clone()).await.unwrap();
    queue.enqueue(second.clone()).await.unwrap();
    queue.shutdown().unwrap();
    handle.await.unwrap();

    let handler = counting_handler(calls.clone(), |_| Ok(()));
    let (queue, _handle) = common::start(db, common::fast_config(), handler).await;
    assert_eq!(queue.state().await.unwrap(), QueueRunState::Paused);

    let waiting = queue.list(JobState::Waiting).await.unwrap();
    let order: Vec<_> = waiting.iter().map(|j| j.id()).collect();
    assert_eq!(order, vec![first.id, second.id]);

    queue.resume().await.unwrap();
    common::wait_for(&queue, second.id, |j| j.state == JobState::Completed).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    queue.shutdown().unwrap();
}

#[tokio::test]
async fn test_failed_worker_releases_its_job() {
    let db = common::setup_db().await;
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let handler = FnHandler::new(move |job, _progress| {
        let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
        let summary = common::summary_for(job);
        Box::pin(async move {
            if attempt == 1 {
                panic!("worker crashed");
            }
            Ok(summary)
        }) as HandlerFuture
    });
    let (queue, _handle) = common::start(db, common::fast_config(), handler).await;

    let job = common::job("dave");
    queue.enqueue(job.clone()).await.unwrap();

    let done = common::wait_for(&queue, job.id, |j| j.state.is_terminal()).await;
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.attempts, 2);

    queue.shutdown().unwrap();
}

/// Admits for real but reports the first successful commit as a timeout.
struct LostCommitHandler {
    admission: AdmissionHandler,
    calls: Arc<AtomicU32>,
}

impl BookingHandler for LostCommitHandler {
    fn handle(&self, job: &BookingJob, progress: ProgressReporter) -> HandlerFuture {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let admitted = self.admission.handle(job, progress);
        Box::pin(async move {
            let summary = admitted.await?;
            if attempt == 1 {
                return Err(JobError::retryable("admission transaction timed out"));
            }
            Ok(summary)
        })
    }
}

#[tokio::test]
async fn test_retry_after_committed_booking_completes() {
    let db = common::setup_db().await;
    let events = EventRepository::new(db.clone());
    let bookings = BookingRepository::new(db.clone());
    let event = Event::new("Night Concert", "Main Hall", Utc::now(), 1);
    events.create(&event).await.unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let handler = LostCommitHandler {
        admission: AdmissionHandler::new(events, bookings.clone(), Duration::from_secs(10)),
        calls: calls.clone(),
    };
    let (queue, _handle) = common::start(db.clone(), common::fast_config(), handler).await;

    let job = BookingJob::new(UserId::from("erin"), event.id);
    queue.enqueue(job.clone()).await.unwrap();

    let done = common::wait_for(&queue, job.id, |j| j.state.is_terminal()).await;
    assert_eq!(done.state, JobState::Completed);
    assert_eq!(done.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let status = StatusRepository::new(db).get(job.id).await.unwrap().unwrap();
    assert_eq!(status.status, BookingStatus::Completed);
    assert!(!status.final_failure);

    let held = bookings.list_for_event(event.id).await.unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].job_id, job.id);
    assert_eq!(status.result.map(|r| r.booking_id), Some(held[0].id));

    queue.shutdown().unwrap();
}

#[tokio::test]
async fn test_terminal_status_is_never_rewritten() {
    let db = common::setup_db().await;
    let statuses = StatusRepository::new(db.clone());
    let job = common::job("frank");
    let finished = BookingStatusRecord::queued(&job).completed(1, common::summary_for(&job));
    statuses
        .put(&finished, Duration::from_secs(300))
        .await
        .unwrap();

    let calls = Arc::new(AtomicU32::new(0));
    let handler = counting_handler(calls.clone(), |_| Err(Rejection::EventFull.into()));
    let (queue, _handle) = common::start(db, common::fast_config(), handler).await;

    queue.enqueue(job.clone()).await.unwrap();
    let done = common::wait_for(&queue, job.id, |j| j.state.is_terminal()).await;
    assert_eq!(done.state, JobState::Failed);

    // Later writes for the job must not replace a terminal record
    let status = statuses.get(job.id).await.unwrap().unwrap();
    assert_eq!(status.status, BookingStatus::Completed);
    assert_eq!(status.attempts, 1);
    assert!(status.error.is_none());
    assert_eq!(
        status.result.map(|r| r.booking_id),
        finished.result.map(|r| r.booking_id)
    );

    queue.shutdown().unwrap();
}
