//! Database schema definitions using SurrealQL.

use crate::{Database, DbError};

/// Initialize the database schema.
///
/// This creates all necessary tables, fields, and indexes.
pub async fn init_schema(db: &Database) -> Result<(), DbError> {
    tracing::info!("Initializing database schema...");

    db.query(EVENT_SCHEMA).await?.check()?;
    db.query(BOOKING_SCHEMA).await?.check()?;
    db.query(BOOKING_JOB_SCHEMA).await?.check()?;
    db.query(BOOKING_STATUS_SCHEMA).await?.check()?;
    db.query(BOOKING_QUEUE_SCHEMA).await?.check()?;

    tracing::info!("Database schema initialized");

    Ok(())
}

/// Event catalog table.
const EVENT_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS event SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS event_id ON event TYPE string;
DEFINE FIELD IF NOT EXISTS name ON event TYPE string;
DEFINE FIELD IF NOT EXISTS venue ON event TYPE string;
DEFINE FIELD IF NOT EXISTS starts_at ON event TYPE string;
DEFINE FIELD IF NOT EXISTS capacity ON event TYPE int ASSERT $value > 0;
DEFINE FIELD IF NOT EXISTS created_at ON event TYPE string;
"#;

/// Booking table. The unique index backs up the worker's duplicate check.
const BOOKING_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS booking SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS booking_id ON booking TYPE string;
DEFINE FIELD IF NOT EXISTS user_id ON booking TYPE string;
DEFINE FIELD IF NOT EXISTS event_id ON booking TYPE string;
DEFINE FIELD IF NOT EXISTS job_id ON booking TYPE string;
DEFINE FIELD IF NOT EXISTS created_at ON booking TYPE string;

DEFINE INDEX IF NOT EXISTS booking_user_event ON booking FIELDS user_id, event_id UNIQUE;
DEFINE INDEX IF NOT EXISTS booking_event ON booking FIELDS event_id;
DEFINE INDEX IF NOT EXISTS booking_user ON booking FIELDS user_id;
DEFINE INDEX IF NOT EXISTS booking_admitted_by ON booking FIELDS job_id UNIQUE;
"#;

/// Durable job records backing the in-memory queue.
const BOOKING_JOB_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS booking_job SCHEMALESS;

DEFINE INDEX IF NOT EXISTS booking_job_seq ON booking_job FIELDS seq;
DEFINE INDEX IF NOT EXISTS booking_job_state ON booking_job FIELDS state;
"#;

/// Ephemeral status records with expiry timestamps.
const BOOKING_STATUS_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS booking_status SCHEMALESS;

DEFINE INDEX IF NOT EXISTS booking_status_updated ON booking_status FIELDS updated_at_ms;
DEFINE INDEX IF NOT EXISTS booking_status_expires ON booking_status FIELDS expires_at_ms;
"#;

/// Singleton row holding operator-controlled queue state.
const BOOKING_QUEUE_SCHEMA: &str = r#"
DEFINE TABLE IF NOT EXISTS booking_queue SCHEMAFULL;

DEFINE FIELD IF NOT EXISTS paused ON booking_queue TYPE bool DEFAULT false;
DEFINE FIELD IF NOT EXISTS updated_at ON booking_queue TYPE string;
"#;
