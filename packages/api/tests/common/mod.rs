use std::time::Duration;

use api::{BookingConfig, BookingService, BookingStatusRecord, Event, JobId};
use booking_core::QueueConfig;
use chrono::Utc;
use db::{Database, DbConfig};

pub async fn setup_db() -> Database {
    db::init(&DbConfig::memory()).await.expect("in-memory database")
}

/// Default limits with timings short enough for tests.
pub fn fast_config() -> QueueConfig {
    BookingConfig::memory()
        .with_backoff(Duration::from_millis(20))
        .with_poll_interval(Duration::from_millis(10))
        .queue
}

pub async fn start(db: Database) -> BookingService {
    start_with(db, fast_config()).await
}

pub async fn start_with(db: Database, config: QueueConfig) -> BookingService {
    BookingService::start_with_db(db, config)
        .await
        .expect("service starts")
}

pub async fn create_event(service: &BookingService, capacity: u32) -> Event {
    let event = Event::new(
        "Night Concert",
        "Main Hall",
        Utc::now() + chrono::Duration::days(7),
        capacity,
    );
    service.events().create(&event).await.expect("event created")
}

/// Poll a job's status until it is terminal, for up to ten seconds.
pub async fn wait_terminal(service: &BookingService, job_id: JobId) -> BookingStatusRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let record = service.booking_status(job_id).await.expect("status known");
        if record.status.is_terminal() {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} still {}",
            job_id,
            record.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
