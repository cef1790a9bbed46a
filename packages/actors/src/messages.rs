//! Message types for actor communication.

use booking_core::{
    BookingJob, BookingSummary, JobError, JobId, JobState, QueueRunState, QueueSnapshot,
    QueueStats, QueuedJob,
};
use ractor::{ActorRef, RpcReplyPort};

/// Messages for the QueueActor.
#[derive(Debug)]
pub enum QueueMessage {
    /// Enqueue a new job.
    Enqueue {
        job: Box<BookingJob>,
        reply: RpcReplyPort<Result<QueueSnapshot, QueueError>>,
    },

    /// Request the next job for a worker.
    RequestJob {
        worker_id: String,
        reply: RpcReplyPort<Option<QueuedJob>>,
    },

    /// Report a progress milestone of an active job.
    Progress { job_id: JobId, progress: u8 },

    /// Report job completion.
    JobCompleted {
        job_id: JobId,
        worker_id: String,
        summary: BookingSummary,
    },

    /// Report job failure.
    JobFailed {
        job_id: JobId,
        worker_id: String,
        error: JobError,
    },

    /// Put every job held by a worker back at the front of the queue.
    ReleaseWorker { worker_id: String },

    /// Get a job by ID.
    GetJob {
        job_id: JobId,
        reply: RpcReplyPort<Option<QueuedJob>>,
    },

    /// List jobs in one state, in queue order.
    ListJobs {
        state: JobState,
        reply: RpcReplyPort<Vec<QueuedJob>>,
    },

    /// Get queue stats.
    GetStats { reply: RpcReplyPort<QueueStats> },

    /// Get the current run state.
    GetState { reply: RpcReplyPort<QueueRunState> },

    /// Pause the queue.
    Pause,

    /// Resume the queue.
    Resume,

    /// Stop dispatching ahead of shutdown.
    Drain,

    /// Remove all completed and failed jobs.
    Clean { reply: RpcReplyPort<usize> },

    /// Shutdown the queue gracefully.
    Shutdown,

    /// Periodic tick for housekeeping.
    Tick,
}

/// Messages for the WorkerActor.
#[derive(Debug)]
pub enum WorkerMessage {
    /// Process a job handed out by the queue.
    ProcessJob { job: Box<QueuedJob> },

    /// Shutdown the worker.
    Shutdown,

    /// Heartbeat tick; an idle worker asks the queue for work.
    Heartbeat,
}

/// Messages for the SweeperActor.
#[derive(Debug)]
pub enum SweeperMessage {
    /// Sweep now and report how many records were removed.
    SweepNow { reply: RpcReplyPort<usize> },

    /// Scheduled sweep.
    Tick,

    /// Shutdown the sweeper.
    Shutdown,
}

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Get the queue actor.
    GetQueue {
        reply: RpcReplyPort<ActorRef<QueueMessage>>,
    },

    /// Get the sweeper actor.
    GetSweeper {
        reply: RpcReplyPort<ActorRef<SweeperMessage>>,
    },

    /// Stop all children and the supervisor.
    Shutdown,
}

/// Error type for queue operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Queue is shutting down")]
    Draining,

    #[error("Queue is unavailable")]
    Unavailable,

    #[error("Database error: {0}")]
    Database(String),

    #[error("Timeout")]
    Timeout,
}
