//! Service configuration.

use std::str::FromStr;
use std::time::Duration;

use booking_core::QueueConfig;
use db::DbConfig;

use crate::error::ApiError;

/// Database and queue settings for a [`crate::BookingService`].
#[derive(Debug, Clone, Default)]
pub struct BookingConfig {
    pub db: DbConfig,
    pub queue: QueueConfig,
}

impl BookingConfig {
    /// Build a config from `BOOKING_*` environment variables, falling back
    /// to the defaults for anything unset.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ApiError> {
        let mut config = Self::default();

        if let Some(endpoint) = lookup("BOOKING_DB_ENDPOINT") {
            config.db = config.db.with_endpoint(endpoint);
        }
        if let Some(namespace) = lookup("BOOKING_DB_NAMESPACE") {
            config.db = config.db.with_namespace(namespace);
        }
        if let Some(database) = lookup("BOOKING_DB_DATABASE") {
            config.db = config.db.with_database(database);
        }
        if let (Some(user), Some(pass)) = (lookup("BOOKING_DB_USER"), lookup("BOOKING_DB_PASS")) {
            config.db = config.db.with_credentials(user, pass);
        }

        if let Some(attempts) = parse(&lookup, "BOOKING_MAX_ATTEMPTS")? {
            config = config.with_max_attempts(attempts);
        }
        if let Some(ms) = parse(&lookup, "BOOKING_BACKOFF_MS")? {
            config = config.with_backoff(Duration::from_millis(ms));
        }
        if let Some(secs) = parse(&lookup, "BOOKING_STATUS_TTL_SECS")? {
            config = config.with_status_ttl(Duration::from_secs(secs));
        }
        if let Some(secs) = parse(&lookup, "BOOKING_SWEEP_INTERVAL_SECS")? {
            config = config.with_sweep_interval(Duration::from_secs(secs));
        }

        Ok(config)
    }

    /// Use an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    pub fn with_db(mut self, db: DbConfig) -> Self {
        self.db = db;
        self
    }

    pub fn with_queue(mut self, queue: QueueConfig) -> Self {
        self.queue = queue;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.queue.max_attempts = attempts.max(1);
        self
    }

    pub fn with_backoff(mut self, initial: Duration) -> Self {
        self.queue.backoff_initial_ms = millis(initial);
        self
    }

    pub fn with_status_ttl(mut self, ttl: Duration) -> Self {
        self.queue.status_ttl_ms = millis(ttl);
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.queue.sweep_interval_ms = millis(interval);
        self
    }

    pub fn with_sweep_max_age(mut self, max_age: Duration) -> Self {
        self.queue.sweep_max_age_ms = millis(max_age);
        self
    }

    pub fn with_per_job_estimate(mut self, estimate: Duration) -> Self {
        self.queue.per_job_estimate_ms = millis(estimate);
        self
    }

    pub fn with_stall_threshold(mut self, threshold: Duration) -> Self {
        self.queue.stall_threshold_ms = millis(threshold);
        self
    }

    /// Shrink every polling interval; for tests.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.queue.poll_interval_ms = millis(interval);
        self.queue.tick_interval_ms = millis(interval);
        self
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn parse<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ApiError> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ApiError::Config(format!("{key} has an invalid value: {raw}"))),
        None => Ok(None),
    }
}
