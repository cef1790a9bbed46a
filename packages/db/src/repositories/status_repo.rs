//! Status store: short-lived booking status records.

use std::time::Duration;

use booking_core::{BookingStatusRecord, JobId};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::{Database, DbError, unix_millis};

/// Repository for booking status records.
///
/// Records expire `ttl` after their last write; expired records are never
/// returned and are physically removed by [`StatusRepository::purge_stale`].
#[derive(Clone)]
pub struct StatusRepository {
    db: Database,
}

/// Internal record type; the millisecond fields are what queries compare.
#[derive(Debug, Serialize, Deserialize)]
struct StatusRecord {
    record: BookingStatusRecord,
    updated_at_ms: i64,
    expires_at_ms: i64,
}

impl StatusRepository {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Write the latest status for a job, replacing any previous record.
    pub async fn put(&self, record: &BookingStatusRecord, ttl: Duration) -> Result<(), DbError> {
        let updated_at_ms = unix_millis(record.updated_at);
        let expires_at_ms = unix_millis(Utc::now()).saturating_add(ttl.as_millis() as i64);

        self.db
            .query(r#"UPSERT type::thing("booking_status", $key) CONTENT $record RETURN NONE"#)
            .bind(("key", record.job_id.to_string()))
            .bind((
                "record",
                StatusRecord {
                    record: record.clone(),
                    updated_at_ms,
                    expires_at_ms,
                },
            ))
            .await?
            .check()?;
        Ok(())
    }

    /// Get the live status record for a job.
    pub async fn get(&self, job_id: JobId) -> Result<Option<BookingStatusRecord>, DbError> {
        let mut response = self
            .db
            .query(
                r#"SELECT * OMIT id FROM type::thing("booking_status", $key) WHERE expires_at_ms > $now"#,
            )
            .bind(("key", job_id.to_string()))
            .bind(("now", unix_millis(Utc::now())))
            .await?;

        let records: Vec<StatusRecord> = response.take(0)?;
        Ok(records.into_iter().next().map(|r| r.record))
    }

    /// Number of stored records, expired or not.
    pub async fn count(&self) -> Result<u64, DbError> {
        let mut response = self
            .db
            .query("SELECT count() AS count FROM booking_status GROUP ALL")
            .await?;
        let count: Option<i64> = response.take("count")?;
        Ok(count.unwrap_or(0).max(0) as u64)
    }

    /// Delete records last written more than `max_age` ago, along with any
    /// already past their expiry. Returns how many were removed.
    pub async fn purge_stale(&self, max_age: Duration) -> Result<usize, DbError> {
        let now = unix_millis(Utc::now());
        let cutoff = now.saturating_sub(max_age.as_millis() as i64);

        let mut response = self
            .db
            .query(
                "SELECT VALUE record.job_id FROM booking_status WHERE updated_at_ms < $cutoff OR expires_at_ms <= $now",
            )
            .bind(("cutoff", cutoff))
            .bind(("now", now))
            .await?;
        let stale: Vec<String> = response.take(0)?;

        if stale.is_empty() {
            return Ok(0);
        }

        self.db
            .query(
                r#"
                FOR $key IN $keys {
                    DELETE type::thing("booking_status", $key);
                };
                "#,
            )
            .bind(("keys", stale.clone()))
            .await?
            .check()?;

        Ok(stale.len())
    }
}
