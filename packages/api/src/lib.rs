//! Service façade for the booking admission system.
//!
//! This crate is what an HTTP boundary calls into:
//! - Admission (request a booking, poll its status)
//! - Booking history and cancellation
//! - Queue monitoring and administration (stats, details, health, pause,
//!   resume, clean)
//! - Real-time queue events

mod bookings;
mod config;
mod error;
mod init;
mod queues;
mod realtime;

pub use config::BookingConfig;
pub use error::ApiError;
pub use init::BookingService;

// Re-export core types for convenience
pub use booking_core::{
    AdmissionReceipt, Booking, BookingId, BookingStatus, BookingStatusRecord, Event, EventId,
    JobId, QueueDetails, QueueEvent, QueueHealth, QueueRunState, QueueStats, UserId,
};
