//! Supervisor actor owning the queue, the worker and the sweeper.

use std::sync::Arc;

use booking_core::{QueueConfig, QueueEvent};
use db::Database;
use db::repositories::{JobRepository, QueueRepository, StatusRepository};
use ractor::{Actor, ActorCell, ActorProcessingErr, ActorRef, SupervisionEvent};
use tokio::sync::broadcast;

use crate::handler::BookingHandler;
use crate::messages::{QueueMessage, SupervisorMessage, SweeperMessage, WorkerMessage};
use crate::queue_actor::{QueueActor, QueueActorArgs};
use crate::sweeper::{SweeperActor, SweeperArgs};
use crate::worker_actor::{WorkerActor, WorkerArgs};

/// Arguments for starting the supervisor.
pub struct SupervisorArgs {
    pub config: QueueConfig,
    pub db: Database,
    pub handler: Arc<dyn BookingHandler>,
    pub event_tx: broadcast::Sender<QueueEvent>,
}

/// State for the supervisor actor.
pub struct SupervisorState {
    config: QueueConfig,
    db: Database,
    handler: Arc<dyn BookingHandler>,
    event_tx: broadcast::Sender<QueueEvent>,
    queue: ActorRef<QueueMessage>,
    worker: ActorRef<WorkerMessage>,
    worker_id: String,
    sweeper: ActorRef<SweeperMessage>,
    /// Worker counter for unique IDs.
    worker_counter: u64,
    stopping: bool,
}

impl SupervisorState {
    /// Generate a unique worker ID.
    fn next_worker_id(&mut self) -> String {
        self.worker_counter += 1;
        format!("worker-{}", self.worker_counter)
    }
}

async fn spawn_queue(
    supervisor: ActorCell,
    config: &QueueConfig,
    db: &Database,
    event_tx: &broadcast::Sender<QueueEvent>,
) -> Result<ActorRef<QueueMessage>, ActorProcessingErr> {
    let args = QueueActorArgs {
        config: config.clone(),
        jobs: JobRepository::new(db.clone()),
        statuses: StatusRepository::new(db.clone()),
        queue_state: QueueRepository::new(db.clone()),
        event_tx: event_tx.clone(),
    };
    let (actor, _handle) = Actor::spawn_linked(None, QueueActor, args, supervisor)
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn queue: {}", e)))?;
    Ok(actor)
}

async fn spawn_worker(
    supervisor: ActorCell,
    worker_id: String,
    queue: ActorRef<QueueMessage>,
    handler: Arc<dyn BookingHandler>,
    config: &QueueConfig,
) -> Result<ActorRef<WorkerMessage>, ActorProcessingErr> {
    let args = WorkerArgs {
        worker_id,
        queue,
        handler,
        poll_interval: config.poll_interval(),
        job_timeout: config.job_timeout(),
    };
    let (actor, _handle) = Actor::spawn_linked(None, WorkerActor, args, supervisor)
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn worker: {}", e)))?;
    Ok(actor)
}

async fn spawn_sweeper(
    supervisor: ActorCell,
    config: &QueueConfig,
    db: &Database,
    event_tx: &broadcast::Sender<QueueEvent>,
) -> Result<ActorRef<SweeperMessage>, ActorProcessingErr> {
    let args = SweeperArgs {
        statuses: StatusRepository::new(db.clone()),
        interval: config.sweep_interval(),
        max_age: config.sweep_max_age(),
        event_tx: event_tx.clone(),
    };
    let (actor, _handle) = Actor::spawn_linked(None, SweeperActor, args, supervisor)
        .await
        .map_err(|e| ActorProcessingErr::from(format!("Failed to spawn sweeper: {}", e)))?;
    Ok(actor)
}

/// Supervisor actor for the booking queue.
pub struct Supervisor;

impl Supervisor {
    /// Replace the worker, handing its jobs back to the queue first.
    async fn restart_worker(
        myself: &ActorRef<SupervisorMessage>,
        state: &mut SupervisorState,
    ) -> Result<(), ActorProcessingErr> {
        let old_id = state.worker_id.clone();
        let _ = state
            .queue
            .send_message(QueueMessage::ReleaseWorker { worker_id: old_id });

        let worker_id = state.next_worker_id();
        state.worker = spawn_worker(
            myself.get_cell(),
            worker_id.clone(),
            state.queue.clone(),
            state.handler.clone(),
            &state.config,
        )
        .await?;
        state.worker_id = worker_id;
        Ok(())
    }

    /// Replace the queue; it rebuilds itself from the job table.
    async fn restart_queue(
        myself: &ActorRef<SupervisorMessage>,
        state: &mut SupervisorState,
    ) -> Result<(), ActorProcessingErr> {
        state.queue = spawn_queue(myself.get_cell(), &state.config, &state.db, &state.event_tx)
            .await?;
        // The old worker still points at the dead queue.
        let _ = state.worker.send_message(WorkerMessage::Shutdown);
        Ok(())
    }
}

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = SupervisorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting booking queue supervisor");

        let queue = spawn_queue(myself.get_cell(), &args.config, &args.db, &args.event_tx).await?;
        let worker_id = "worker-1".to_string();
        let worker = spawn_worker(
            myself.get_cell(),
            worker_id.clone(),
            queue.clone(),
            args.handler.clone(),
            &args.config,
        )
        .await?;
        let sweeper =
            spawn_sweeper(myself.get_cell(), &args.config, &args.db, &args.event_tx).await?;

        Ok(SupervisorState {
            config: args.config,
            db: args.db,
            handler: args.handler,
            event_tx: args.event_tx,
            queue,
            worker,
            worker_id,
            sweeper,
            worker_counter: 1,
            stopping: false,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::GetQueue { reply } => {
                let _ = reply.send(state.queue.clone());
            }

            SupervisorMessage::GetSweeper { reply } => {
                let _ = reply.send(state.sweeper.clone());
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down supervisor");
                state.stopping = true;
                let _ = state.worker.send_message(WorkerMessage::Shutdown);
                let _ = state.sweeper.send_message(SweeperMessage::Shutdown);
                let _ = state.queue.send_message(QueueMessage::Shutdown);
                myself.stop(None);
                return Ok(());
            }
        }

        Ok(())
    }

    async fn handle_supervisor_evt(
        &self,
        myself: ActorRef<Self::Msg>,
        message: SupervisionEvent,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        if state.stopping {
            return Ok(());
        }

        let cell = match &message {
            SupervisionEvent::ActorFailed(cell, err) => {
                tracing::error!("Child actor {} failed: {}", cell.get_id(), err);
                cell
            }
            SupervisionEvent::ActorTerminated(cell, _, reason) => {
                tracing::warn!("Child actor {} terminated: {:?}", cell.get_id(), reason);
                cell
            }
            _ => return Ok(()),
        };
        let id = cell.get_id();

        if id == state.queue.get_id() {
            Self::restart_queue(&myself, state).await?;
        } else if id == state.worker.get_id() {
            Self::restart_worker(&myself, state).await?;
        } else if id == state.sweeper.get_id() {
            state.sweeper =
                spawn_sweeper(myself.get_cell(), &state.config, &state.db, &state.event_tx)
                    .await?;
        }
        Ok(())
    }
}

/// Start the supervisor and its children.
pub async fn start_supervisor(
    args: SupervisorArgs,
) -> Result<(ActorRef<SupervisorMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    Actor::spawn(None, Supervisor, args).await
}
