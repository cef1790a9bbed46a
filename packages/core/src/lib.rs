//! Core domain types for the booking admission queue.
//!
//! This crate contains shared types used across all packages:
//! - BookingJob, QueuedJob and JobState for queued work
//! - BookingStatusRecord for caller-facing status
//! - Event and Booking for the durable catalog
//! - Queue configuration, statistics and events

mod catalog;
mod events;
mod job;
mod queue;
mod status;

pub use catalog::{Booking, BookingId, Event, EventId, UserId};
pub use events::QueueEvent;
pub use job::{BookingJob, JobError, JobId, JobState, QueuedJob, Rejection, backoff_delay};
pub use queue::{
    AdmissionReceipt, JobSummary, QueueConfig, QueueDetails, QueueHealth, QueueRunState,
    QueueSnapshot, QueueStats,
};
pub use status::{BookingStatus, BookingStatusRecord, BookingSummary};
