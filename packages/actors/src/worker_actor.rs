//! Worker actor for executing booking jobs.

use std::sync::Arc;
use std::time::Duration;

use booking_core::{JobError, QueuedJob};
use ractor::{Actor, ActorProcessingErr, ActorRef};

use crate::handler::{BookingHandler, ProgressReporter};
use crate::messages::{QueueMessage, WorkerMessage};

/// State for the worker actor.
pub struct WorkerActorState {
    /// Unique worker ID.
    pub worker_id: String,
    /// Current job being processed.
    pub current_job: Option<QueuedJob>,
    /// Queue actor reference.
    pub queue: ActorRef<QueueMessage>,
    /// Booking handler.
    pub handler: Arc<dyn BookingHandler>,
    /// Upper bound on one handler run.
    pub job_timeout: Duration,
}

impl WorkerActorState {
    /// Check if the worker is idle.
    pub fn is_idle(&self) -> bool {
        self.current_job.is_none()
    }
}

/// Worker actor arguments.
pub struct WorkerArgs {
    pub worker_id: String,
    pub queue: ActorRef<QueueMessage>,
    pub handler: Arc<dyn BookingHandler>,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
}

/// Worker actor that executes booking jobs one at a time.
pub struct WorkerActor;

impl Actor for WorkerActor {
    type Msg = WorkerMessage;
    type State = WorkerActorState;
    type Arguments = WorkerArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting worker: {}", args.worker_id);

        // Start the work loop
        let myself_clone = myself.clone();
        let poll_interval = args.poll_interval;
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(poll_interval).await;
                if myself_clone.send_message(WorkerMessage::Heartbeat).is_err() {
                    break;
                }
            }
        });

        Ok(WorkerActorState {
            worker_id: args.worker_id,
            current_job: None,
            queue: args.queue,
            handler: args.handler,
            job_timeout: args.job_timeout,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            WorkerMessage::ProcessJob { job } => {
                let job = *job;
                let job_id = job.id();
                state.current_job = Some(job.clone());

                let progress = ProgressReporter::new(job_id, state.queue.clone());
                let result = tokio::time::timeout(
                    state.job_timeout,
                    state.handler.handle(&job.job, progress),
                )
                .await;

                let worker_id = state.worker_id.clone();
                match result {
                    Ok(Ok(summary)) => {
                        state.queue.send_message(QueueMessage::JobCompleted {
                            job_id,
                            worker_id,
                            summary,
                        })?;
                    }
                    Ok(Err(error)) => {
                        state.queue.send_message(QueueMessage::JobFailed {
                            job_id,
                            worker_id,
                            error,
                        })?;
                    }
                    Err(_) => {
                        state.queue.send_message(QueueMessage::JobFailed {
                            job_id,
                            worker_id,
                            error: JobError::retryable(format!(
                                "job timed out after {:?}",
                                state.job_timeout
                            )),
                        })?;
                    }
                }

                state.current_job = None;
            }

            WorkerMessage::Shutdown => {
                tracing::info!("Shutting down worker: {}", state.worker_id);
                myself.stop(None);
                return Ok(());
            }

            WorkerMessage::Heartbeat => {
                // If idle, request a job
                if state.is_idle() {
                    let timeout = Duration::from_secs(5);
                    let result = ractor::rpc::call(
                        &state.queue,
                        |reply| QueueMessage::RequestJob {
                            worker_id: state.worker_id.clone(),
                            reply,
                        },
                        Some(timeout),
                    )
                    .await;
                    if let Ok(ractor::rpc::CallResult::Success(Some(job))) = result {
                        myself.send_message(WorkerMessage::ProcessJob { job: Box::new(job) })?;
                    }
                }
            }
        }

        Ok(())
    }
}
