use chrono::{Duration, Utc};

use booking_core::Event;
use db::{Database, DbConfig, DbError};

/// A fresh, isolated in-memory database with the schema applied.
pub async fn setup_db() -> Result<Database, DbError> {
    db::init(&DbConfig::memory()).await
}

pub fn concert(capacity: u32) -> Event {
    Event::new(
        "Night Concert",
        "Main Hall",
        Utc::now() + Duration::days(7),
        capacity,
    )
}
