//! Actor system for the booking queue.
//!
//! This crate provides the Ractor-based actors that admit booking jobs
//! one at a time against the event catalog.
//!
//! # Architecture
//!
//! - `Supervisor` - Top-level actor; restarts failed children
//! - `QueueActor` - Owns job state, retries and the status cache writes
//! - `WorkerActor` - Runs one job at a time through a `BookingHandler`
//! - `SweeperActor` - Periodically removes stale status records
//!
//! # Usage
//!
//! ```ignore
//! use actors::{AdmissionHandler, BookingQueue, SupervisorArgs, start_supervisor};
//!
//! let (supervisor, _handle) = start_supervisor(args).await?;
//! let queue = BookingQueue::new(supervisor, event_tx);
//! let snapshot = queue.enqueue(job).await?;
//! ```

mod admission;
mod client;
mod handler;
mod messages;
mod queue_actor;
mod supervisor;
mod sweeper;
mod worker_actor;

pub use admission::AdmissionHandler;
pub use client::BookingQueue;
pub use handler::{BookingHandler, FnHandler, HandlerFuture, HandlerResult, ProgressReporter};
pub use messages::{QueueError, QueueMessage, SupervisorMessage, SweeperMessage, WorkerMessage};
pub use queue_actor::{QueueActor, QueueActorArgs, WORKER_CONCURRENCY};
pub use supervisor::{Supervisor, SupervisorArgs, start_supervisor};
pub use sweeper::{SweeperActor, SweeperArgs};
pub use worker_actor::{WorkerActor, WorkerArgs};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};
