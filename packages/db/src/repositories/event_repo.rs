//! Event catalog repository.

use booking_core::{Event, EventId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::invalid_id;
use crate::{Database, DbError};

/// Repository for the event catalog.
#[derive(Clone)]
pub struct EventRepository {
    db: Database,
}

/// Internal record type for SurrealDB.
#[derive(Debug, Serialize, Deserialize)]
struct EventRecord {
    event_id: String,
    name: String,
    venue: String,
    starts_at: DateTime<Utc>,
    capacity: u32,
    created_at: DateTime<Utc>,
}

impl From<&Event> for EventRecord {
    fn from(event: &Event) -> Self {
        Self {
            event_id: event.id.to_string(),
            name: event.name.clone(),
            venue: event.venue.clone(),
            starts_at: event.starts_at,
            capacity: event.capacity,
            created_at: event.created_at,
        }
    }
}

impl TryFrom<EventRecord> for Event {
    type Error = DbError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let id = EventId::parse(&record.event_id)
            .map_err(|e| invalid_id("event", &record.event_id, e))?;
        Ok(Event {
            id,
            name: record.name,
            venue: record.venue,
            starts_at: record.starts_at,
            capacity: record.capacity,
            created_at: record.created_at,
        })
    }
}

impl EventRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Create a new event in the database.
    pub async fn create(&self, event: &Event) -> Result<Event, DbError> {
        if event.capacity == 0 {
            return Err(DbError::Invalid("event capacity must be greater than zero".into()));
        }

        self.db
            .query(r#"CREATE type::thing("event", $key) CONTENT $record RETURN NONE"#)
            .bind(("key", event.id.to_string()))
            .bind(("record", EventRecord::from(event)))
            .await?
            .check()?;

        tracing::debug!("Created event {} with capacity {}", event.id, event.capacity);
        Ok(event.clone())
    }

    /// Get an event by ID.
    pub async fn get(&self, id: EventId) -> Result<Option<Event>, DbError> {
        let mut response = self
            .db
            .query(r#"SELECT * OMIT id FROM type::thing("event", $key)"#)
            .bind(("key", id.to_string()))
            .await?;

        let records: Vec<EventRecord> = response.take(0)?;
        records.into_iter().next().map(Event::try_from).transpose()
    }

    /// List all events, oldest first.
    pub async fn list(&self) -> Result<Vec<Event>, DbError> {
        let mut response = self
            .db
            .query("SELECT * OMIT id FROM event ORDER BY created_at ASC")
            .await?;

        let records: Vec<EventRecord> = response.take(0)?;
        records.into_iter().map(Event::try_from).collect()
    }

    /// Replace an event's metadata.
    ///
    /// Capacity may not drop below the number of existing bookings.
    pub async fn update(&self, event: &Event) -> Result<Event, DbError> {
        if event.capacity == 0 {
            return Err(DbError::Invalid("event capacity must be greater than zero".into()));
        }
        if self.get(event.id).await?.is_none() {
            return Err(DbError::NotFound(format!("Event not found: {}", event.id)));
        }

        let mut response = self
            .db
            .query("SELECT count() AS count FROM booking WHERE event_id = $key GROUP ALL")
            .bind(("key", event.id.to_string()))
            .await?;
        let booked: Option<i64> = response.take("count")?;
        if booked.unwrap_or(0) > i64::from(event.capacity) {
            return Err(DbError::Invalid(format!(
                "capacity {} is below the {} existing bookings",
                event.capacity,
                booked.unwrap_or(0)
            )));
        }

        self.db
            .query(r#"UPDATE type::thing("event", $key) CONTENT $record RETURN NONE"#)
            .bind(("key", event.id.to_string()))
            .bind(("record", EventRecord::from(event)))
            .await?
            .check()?;

        Ok(event.clone())
    }

    /// Delete an event and its bookings.
    pub async fn delete(&self, id: EventId) -> Result<(), DbError> {
        if self.get(id).await?.is_none() {
            return Err(DbError::NotFound(format!("Event not found: {}", id)));
        }

        self.db
            .query(
                r#"
                BEGIN TRANSACTION;
                DELETE booking WHERE event_id = $key;
                DELETE type::thing("event", $key);
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("key", id.to_string()))
            .await?
            .check()?;

        Ok(())
    }
}
