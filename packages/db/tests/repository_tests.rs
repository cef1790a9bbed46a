#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::time::Duration;

use booking_core::{
    BookingJob, BookingStatus, BookingStatusRecord, JobState, QueuedJob, Rejection, UserId,
};
use db::DbError;
use db::repositories::{
    AdmitError, BookingRepository, EventRepository, JobRepository, QueueRepository,
    StatusRepository,
};

#[tokio::test]
async fn test_event_catalog() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let events = EventRepository::new(db.clone());
    let bookings = BookingRepository::new(db);

    let mut event = common::concert(2);
    events.create(&event).await?;

    let loaded = events.get(event.id).await?.expect("event exists");
    assert_eq!(loaded, event);
    assert_eq!(events.list().await?.len(), 1);

    let zero = common::concert(0);
    assert!(matches!(events.create(&zero).await, Err(DbError::Invalid(_))));

    // Capacity cannot shrink below existing bookings
    bookings.admit(&BookingJob::new(UserId::from("a"), event.id)).await?;
    bookings.admit(&BookingJob::new(UserId::from("b"), event.id)).await?;
    event.capacity = 1;
    assert!(matches!(events.update(&event).await, Err(DbError::Invalid(_))));

    event.capacity = 5;
    event.venue = "Open Air Stage".into();
    events.update(&event).await?;
    let loaded = events.get(event.id).await?.expect("event exists");
    assert_eq!(loaded.capacity, 5);
    assert_eq!(loaded.venue, "Open Air Stage");

    events.delete(event.id).await?;
    assert!(events.get(event.id).await?.is_none());
    assert_eq!(bookings.count_for_event(event.id).await?, 0);
    assert!(matches!(events.delete(event.id).await, Err(DbError::NotFound(_))));

    Ok(())
}

#[tokio::test]
async fn test_admission_enforces_capacity_and_duplicates() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let events = EventRepository::new(db.clone());
    let bookings = BookingRepository::new(db);

    let event = common::concert(1);
    events.create(&event).await?;

    let alice = UserId::from("alice");
    let bob = UserId::from("bob");

    let booking = bookings.admit(&BookingJob::new(alice.clone(), event.id)).await?;
    assert_eq!(booking.user_id, alice);
    assert_eq!(booking.event_id, event.id);

    let duplicate = bookings.admit(&BookingJob::new(alice.clone(), event.id)).await;
    assert!(matches!(
        duplicate,
        Err(AdmitError::Rejected(Rejection::DuplicateBooking))
    ));

    let full = bookings.admit(&BookingJob::new(bob.clone(), event.id)).await;
    assert!(matches!(full, Err(AdmitError::Rejected(Rejection::EventFull))));

    let missing = bookings
        .admit(&BookingJob::new(bob.clone(), booking_core::EventId::new()))
        .await;
    assert!(matches!(
        missing,
        Err(AdmitError::Rejected(Rejection::EventNotFound))
    ));

    assert_eq!(bookings.count_for_event(event.id).await?, 1);
    assert_eq!(bookings.list_for_event(event.id).await?.len(), 1);
    assert!(bookings.find(&bob, event.id).await?.is_none());

    Ok(())
}

#[tokio::test]
async fn test_readmitting_a_job_returns_its_booking() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let events = EventRepository::new(db.clone());
    let bookings = BookingRepository::new(db);

    let event = common::concert(1);
    events.create(&event).await?;

    let job = BookingJob::new(UserId::from("alice"), event.id);
    let first = bookings.admit(&job).await?;
    assert_eq!(first.job_id, job.id);

    // The seat is taken, yet the job that holds it is admitted again
    let second = bookings.admit(&job).await?;
    assert_eq!(second, first);
    assert_eq!(bookings.find_for_job(job.id).await?, Some(first));
    assert_eq!(bookings.count_for_event(event.id).await?, 1);

    Ok(())
}

#[tokio::test]
async fn test_cancel_frees_a_seat() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let events = EventRepository::new(db.clone());
    let bookings = BookingRepository::new(db);

    let event = common::concert(1);
    events.create(&event).await?;

    let alice = UserId::from("alice");
    let bob = UserId::from("bob");
    let booking = bookings.admit(&BookingJob::new(alice.clone(), event.id)).await?;

    let forbidden = bookings.cancel(booking.id, &bob).await;
    assert!(matches!(forbidden, Err(DbError::Forbidden(_))));

    bookings.cancel(booking.id, &alice).await?;
    assert!(bookings.list_for_user(&alice).await?.is_empty());

    let rebooked = bookings.admit(&BookingJob::new(bob.clone(), event.id)).await?;
    assert_eq!(bookings.list_for_user(&bob).await?, vec![rebooked]);

    Ok(())
}

#[tokio::test]
async fn test_status_records_expire_and_are_purged() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let statuses = StatusRepository::new(db);

    let job = BookingJob::new(UserId::from("alice"), booking_core::EventId::new());
    let record = BookingStatusRecord::queued(&job);

    statuses.put(&record, Duration::from_secs(300)).await?;
    let loaded = statuses.get(job.id).await?.expect("record is live");
    assert_eq!(loaded.status, BookingStatus::Queued);

    let processing = record.clone().processing(1, None);
    statuses.put(&processing, Duration::from_secs(300)).await?;
    let loaded = statuses.get(job.id).await?.expect("record is live");
    assert_eq!(loaded.status, BookingStatus::Processing);

    // Expired records are unreadable even before the sweeper runs
    let short = BookingJob::new(UserId::from("bob"), booking_core::EventId::new());
    statuses
        .put(&BookingStatusRecord::queued(&short), Duration::from_millis(20))
        .await?;
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(statuses.get(short.id).await?.is_none());
    assert_eq!(statuses.count().await?, 2);

    // Old timestamps are swept regardless of a refreshed TTL
    let old = BookingJob::new(UserId::from("carol"), booking_core::EventId::new());
    let stale = BookingStatusRecord::queued(&old).at(chrono::Utc::now() - chrono::Duration::minutes(11));
    statuses.put(&stale, Duration::from_secs(300)).await?;

    let removed = statuses.purge_stale(Duration::from_secs(600)).await?;
    assert_eq!(removed, 2);
    assert!(statuses.get(old.id).await?.is_none());
    assert!(statuses.get(job.id).await?.is_some());

    Ok(())
}

#[tokio::test]
async fn test_job_records_round_trip_in_enqueue_order() -> Result<(), Box<dyn Error>> {
    let db = common::setup_db().await?;
    let jobs = JobRepository::new(db.clone());
    let queue = QueueRepository::new(db);

    let event_id = booking_core::EventId::new();
    let second = QueuedJob::waiting(BookingJob::new(UserId::from("b"), event_id), 2, 3);
    let mut first = QueuedJob::waiting(BookingJob::new(UserId::from("a"), event_id), 1, 3);
    first.state = JobState::Active;
    first.attempts = 1;
    first.worker_id = Some("worker-1".into());

    jobs.save(&second).await?;
    jobs.save(&first).await?;

    let loaded = jobs.load_all().await?;
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].id(), first.id());
    assert_eq!(loaded[0].state, JobState::Active);
    assert_eq!(loaded[1].id(), second.id());

    first.state = JobState::Failed;
    first.last_error = Some("event is fully booked".into());
    jobs.save(&first).await?;
    let loaded = jobs.load_all().await?;
    assert_eq!(loaded.len(), 2);
    let reloaded = &loaded[0];
    assert_eq!(reloaded.id(), first.id());
    assert_eq!(reloaded.state, JobState::Failed);
    assert_eq!(reloaded.last_error.as_deref(), Some("event is fully booked"));

    jobs.delete_many(&[first.id(), second.id()]).await?;
    assert!(jobs.load_all().await?.is_empty());

    assert!(!queue.is_paused().await?);
    queue.set_paused(true).await?;
    assert!(queue.is_paused().await?);

    Ok(())
}
