//! Sweeper actor that removes stale status records on a schedule.

use std::time::Duration;

use booking_core::QueueEvent;
use chrono::Utc;
use db::repositories::StatusRepository;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::messages::SweeperMessage;

/// Sweeper actor arguments.
pub struct SweeperArgs {
    pub statuses: StatusRepository,
    pub interval: Duration,
    /// Records last written longer ago than this are removed.
    pub max_age: Duration,
    pub event_tx: broadcast::Sender<QueueEvent>,
}

pub struct SweeperState {
    statuses: StatusRepository,
    max_age: Duration,
    event_tx: broadcast::Sender<QueueEvent>,
}

impl SweeperState {
    async fn sweep(&self) -> usize {
        match self.statuses.purge_stale(self.max_age).await {
            Ok(0) => 0,
            Ok(removed) => {
                tracing::info!("Swept {} stale status records", removed);
                let _ = self.event_tx.send(QueueEvent::StatusSwept {
                    removed,
                    timestamp: Utc::now(),
                });
                removed
            }
            Err(e) => {
                tracing::warn!("Failed to sweep status records: {}", e);
                0
            }
        }
    }
}

pub struct SweeperActor;

impl Actor for SweeperActor {
    type Msg = SweeperMessage;
    type State = SweeperState;
    type Arguments = SweeperArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting status sweeper every {:?}", args.interval);

        let period = args.interval;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                if myself.send_message(SweeperMessage::Tick).is_err() {
                    break;
                }
            }
        });

        Ok(SweeperState {
            statuses: args.statuses,
            max_age: args.max_age,
            event_tx: args.event_tx,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SweeperMessage::SweepNow { reply } => {
                let removed = state.sweep().await;
                let _ = reply.send(removed);
            }
            SweeperMessage::Tick => {
                state.sweep().await;
            }
            SweeperMessage::Shutdown => {
                myself.stop(None);
            }
        }
        Ok(())
    }
}
