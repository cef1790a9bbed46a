//! Service construction and lifecycle.

use std::sync::Arc;
use std::time::Duration;

use actors::{AdmissionHandler, BookingHandler, BookingQueue, SupervisorArgs, start_supervisor};
use booking_core::QueueConfig;
use db::Database;
use db::repositories::{BookingRepository, EventRepository, StatusRepository};
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;

use crate::config::BookingConfig;
use crate::error::ApiError;

/// Capacity of the queue event channel.
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// The booking admission service.
///
/// Cheap to clone; clones share the same queue and database connection.
#[derive(Clone)]
pub struct BookingService {
    pub(crate) queue: BookingQueue,
    pub(crate) events: EventRepository,
    pub(crate) bookings: BookingRepository,
    pub(crate) statuses: StatusRepository,
    pub(crate) config: QueueConfig,
    supervisor_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl BookingService {
    /// Connect to the database and start the queue, worker and sweeper.
    pub async fn start(config: BookingConfig) -> Result<Self, ApiError> {
        tracing::info!("Initializing booking service...");
        let db = db::init(&config.db).await?;
        Self::start_with_db(db, config.queue).await
    }

    /// Start on an already initialized database.
    pub async fn start_with_db(db: Database, config: QueueConfig) -> Result<Self, ApiError> {
        let handler = AdmissionHandler::new(
            EventRepository::new(db.clone()),
            BookingRepository::new(db.clone()),
            config.transaction_timeout(),
        );
        Self::start_with_handler(db, config, handler).await
    }

    /// Start with a custom booking handler.
    pub async fn start_with_handler(
        db: Database,
        config: QueueConfig,
        handler: impl BookingHandler,
    ) -> Result<Self, ApiError> {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        let (supervisor, handle) = start_supervisor(SupervisorArgs {
            config: config.clone(),
            db: db.clone(),
            handler: Arc::new(handler),
            event_tx: event_tx.clone(),
        })
        .await
        .map_err(|e| ApiError::Startup(e.to_string()))?;

        tracing::info!("Booking service started");

        Ok(Self {
            queue: BookingQueue::new(supervisor, event_tx),
            events: EventRepository::new(db.clone()),
            bookings: BookingRepository::new(db.clone()),
            statuses: StatusRepository::new(db),
            config,
            supervisor_handle: Arc::new(Mutex::new(Some(handle))),
        })
    }

    /// The event catalog.
    pub fn events(&self) -> &EventRepository {
        &self.events
    }

    /// The underlying queue handle.
    pub fn queue(&self) -> &BookingQueue {
        &self.queue
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Stop dispatching, give the active job up to `timeout` to finish, then
    /// stop every actor.
    ///
    /// Jobs still waiting stay in the job table and resume on next start.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), ApiError> {
        tracing::info!("Draining booking queue...");
        match self.queue.drain(timeout).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("Active job still running after {:?}", timeout),
            Err(e) => tracing::warn!("Failed to drain booking queue: {}", e),
        }

        self.queue.shutdown()?;
        if let Some(handle) = self.supervisor_handle.lock().await.take()
            && let Err(e) = handle.await
        {
            tracing::warn!("Supervisor task ended abnormally: {}", e);
        }

        tracing::info!("Booking service stopped");
        Ok(())
    }
}
