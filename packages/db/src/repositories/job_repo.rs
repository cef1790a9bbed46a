//! Durable records backing the booking queue.

use booking_core::{JobId, QueuedJob};

use crate::{Database, DbError};

/// Repository for queue job persistence.
///
/// Stores the full queue-side view of each retained job so the queue can be
/// rebuilt after a restart.
#[derive(Clone)]
pub struct JobRepository {
    db: Database,
}

impl JobRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or replace a job record.
    pub async fn save(&self, job: &QueuedJob) -> Result<(), DbError> {
        self.db
            .query(r#"UPSERT type::thing("booking_job", $key) CONTENT $record RETURN NONE"#)
            .bind(("key", job.id().to_string()))
            .bind(("record", job.clone()))
            .await?
            .check()?;
        Ok(())
    }

    /// All retained jobs in enqueue order.
    pub async fn load_all(&self) -> Result<Vec<QueuedJob>, DbError> {
        let mut response = self
            .db
            .query("SELECT * OMIT id FROM booking_job ORDER BY seq ASC")
            .await?;

        Ok(response.take(0)?)
    }

    /// Delete job records.
    pub async fn delete_many(&self, ids: &[JobId]) -> Result<(), DbError> {
        if ids.is_empty() {
            return Ok(());
        }

        let keys: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        self.db
            .query(
                r#"
                FOR $key IN $keys {
                    DELETE type::thing("booking_job", $key);
                };
                "#,
            )
            .bind(("keys", keys))
            .await?
            .check()?;
        Ok(())
    }
}
