//! Persisted operator state of the booking queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Database, DbError};

/// Repository for queue-level state that survives restarts.
#[derive(Clone)]
pub struct QueueRepository {
    db: Database,
}

#[derive(Debug, Serialize, Deserialize)]
struct QueueRecord {
    paused: bool,
    updated_at: DateTime<Utc>,
}

impl QueueRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether an operator left the queue paused.
    pub async fn is_paused(&self) -> Result<bool, DbError> {
        let mut response = self
            .db
            .query(r#"SELECT * OMIT id FROM type::thing("booking_queue", "main")"#)
            .await?;

        let records: Vec<QueueRecord> = response.take(0)?;
        Ok(records.first().is_some_and(|r| r.paused))
    }

    /// Persist the paused flag.
    pub async fn set_paused(&self, paused: bool) -> Result<(), DbError> {
        self.db
            .query(r#"UPSERT type::thing("booking_queue", "main") CONTENT $record RETURN NONE"#)
            .bind((
                "record",
                QueueRecord {
                    paused,
                    updated_at: Utc::now(),
                },
            ))
            .await?
            .check()?;
        Ok(())
    }
}
