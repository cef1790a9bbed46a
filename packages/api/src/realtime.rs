//! Real-time queue event streaming.

use booking_core::QueueEvent;
use tokio::sync::broadcast;

use crate::init::BookingService;

impl BookingService {
    /// Subscribe to queue lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.queue.subscribe()
    }
}
