//! SurrealDB integration for the booking admission queue.
//!
//! This crate provides database connectivity and repositories for
//! events, bookings, durable job records and booking status records.
//!
//! # Features
//!
//! - `memory` (default): Use in-memory storage for testing
//! - `rocksdb`: Use RocksDB for persistent file-based storage

mod connection;
mod schema;
pub mod repositories;

pub use connection::{Database, DbConfig, DbError, connect};
pub use schema::init_schema;

/// Connect and make sure the schema exists.
///
/// This should be called once at application startup; the returned handle is
/// passed to every component that needs storage.
pub async fn init(config: &DbConfig) -> Result<Database, DbError> {
    let db = connect(config).await?;
    init_schema(&db).await?;
    Ok(db)
}

/// Milliseconds since the Unix epoch, the representation used for
/// timestamps the database must compare.
pub(crate) fn unix_millis(at: chrono::DateTime<chrono::Utc>) -> i64 {
    at.timestamp_millis()
}
