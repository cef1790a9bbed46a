//! Typed handle over the supervised booking queue.

use std::time::Duration;

use booking_core::{
    BookingJob, JobId, JobState, QueueEvent, QueueRunState, QueueSnapshot, QueueStats, QueuedJob,
};
use ractor::rpc::CallResult;
use ractor::{ActorRef, RpcReplyPort};
use tokio::sync::broadcast;

use crate::messages::{QueueError, QueueMessage, SupervisorMessage, SweeperMessage};

const CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Cheap, cloneable handle for talking to the booking queue.
///
/// Every call resolves the current queue actor through the supervisor, so
/// the handle stays valid across restarts.
#[derive(Clone)]
pub struct BookingQueue {
    supervisor: ActorRef<SupervisorMessage>,
    event_tx: broadcast::Sender<QueueEvent>,
}

async fn ask<M, T>(
    actor: &ActorRef<M>,
    msg: impl FnOnce(RpcReplyPort<T>) -> M,
) -> Result<T, QueueError>
where
    M: ractor::Message,
    T: Send + 'static,
{
    match ractor::rpc::call(actor, msg, Some(CALL_TIMEOUT)).await {
        Ok(CallResult::Success(value)) => Ok(value),
        Ok(CallResult::Timeout) => Err(QueueError::Timeout),
        Ok(CallResult::SenderError) => Err(QueueError::Unavailable),
        Err(_) => Err(QueueError::Unavailable),
    }
}

impl BookingQueue {
    pub fn new(
        supervisor: ActorRef<SupervisorMessage>,
        event_tx: broadcast::Sender<QueueEvent>,
    ) -> Self {
        Self {
            supervisor,
            event_tx,
        }
    }

    pub fn supervisor(&self) -> &ActorRef<SupervisorMessage> {
        &self.supervisor
    }

    async fn queue(&self) -> Result<ActorRef<QueueMessage>, QueueError> {
        ask(&self.supervisor, |reply| SupervisorMessage::GetQueue { reply }).await
    }

    async fn tell(&self, msg: QueueMessage) -> Result<(), QueueError> {
        self.queue()
            .await?
            .send_message(msg)
            .map_err(|_| QueueError::Unavailable)
    }

    /// Enqueue a job and return its position snapshot.
    pub async fn enqueue(&self, job: BookingJob) -> Result<QueueSnapshot, QueueError> {
        let queue = self.queue().await?;
        ask(&queue, |reply| QueueMessage::Enqueue {
            job: Box::new(job),
            reply,
        })
        .await?
    }

    pub async fn get_job(&self, job_id: JobId) -> Result<Option<QueuedJob>, QueueError> {
        let queue = self.queue().await?;
        ask(&queue, |reply| QueueMessage::GetJob { job_id, reply }).await
    }

    /// Jobs in one state, in queue order.
    pub async fn list(&self, state: JobState) -> Result<Vec<QueuedJob>, QueueError> {
        let queue = self.queue().await?;
        ask(&queue, |reply| QueueMessage::ListJobs { state, reply }).await
    }

    pub async fn stats(&self) -> Result<QueueStats, QueueError> {
        let queue = self.queue().await?;
        ask(&queue, |reply| QueueMessage::GetStats { reply }).await
    }

    pub async fn state(&self) -> Result<QueueRunState, QueueError> {
        let queue = self.queue().await?;
        ask(&queue, |reply| QueueMessage::GetState { reply }).await
    }

    pub async fn pause(&self) -> Result<(), QueueError> {
        self.tell(QueueMessage::Pause).await
    }

    pub async fn resume(&self) -> Result<(), QueueError> {
        self.tell(QueueMessage::Resume).await
    }

    /// Remove every completed and failed job; returns how many went.
    pub async fn clean(&self) -> Result<usize, QueueError> {
        let queue = self.queue().await?;
        ask(&queue, |reply| QueueMessage::Clean { reply }).await
    }

    /// Run the status sweeper immediately.
    pub async fn sweep(&self) -> Result<usize, QueueError> {
        let sweeper = ask(&self.supervisor, |reply| SupervisorMessage::GetSweeper {
            reply,
        })
        .await?;
        ask(&sweeper, |reply| SweeperMessage::SweepNow { reply }).await
    }

    /// Stop dispatching and wait up to `timeout` for the active job to finish.
    ///
    /// Returns whether the queue went idle in time.
    pub async fn drain(&self, timeout: Duration) -> Result<bool, QueueError> {
        self.tell(QueueMessage::Drain).await?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.stats().await?.active == 0 {
                return Ok(true);
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    /// Stop the supervisor and every child.
    pub fn shutdown(&self) -> Result<(), QueueError> {
        self.supervisor
            .send_message(SupervisorMessage::Shutdown)
            .map_err(|_| QueueError::Unavailable)
    }

    /// Subscribe to queue lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }
}
