//! Queue actor owning the booking job queue.
//!
//! The actor is the single authority on job state. Every transition is
//! written through to the job table and mirrored into the status store
//! before the next message is handled.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use booking_core::{
    BookingSummary, JobError, JobId, JobState, QueueConfig, QueueEvent, QueueRunState,
    QueueSnapshot, QueueStats, QueuedJob, backoff_delay,
};
use chrono::{DateTime, Utc};
use db::repositories::{JobRepository, QueueRepository, StatusRepository};
use ractor::{Actor, ActorProcessingErr, ActorRef};
use tokio::sync::broadcast;

use crate::messages::{QueueError, QueueMessage};

/// Jobs handed out at once. Admission correctness relies on this being one.
pub const WORKER_CONCURRENCY: usize = 1;

/// Arguments for spawning the queue actor.
pub struct QueueActorArgs {
    pub config: QueueConfig,
    pub jobs: JobRepository,
    pub statuses: StatusRepository,
    pub queue_state: QueueRepository,
    pub event_tx: broadcast::Sender<QueueEvent>,
}

/// State for the queue actor.
pub struct QueueActorState {
    config: QueueConfig,
    run_state: QueueRunState,
    next_seq: u64,
    /// Waiting jobs in dispatch order.
    waiting: VecDeque<JobId>,
    /// Jobs sitting out a retry backoff.
    delayed: Vec<JobId>,
    /// Jobs held by the worker.
    active: Vec<JobId>,
    /// Retained terminal jobs, oldest first.
    completed: VecDeque<JobId>,
    failed: VecDeque<JobId>,
    /// All retained jobs by ID.
    jobs: HashMap<JobId, QueuedJob>,
    job_repo: JobRepository,
    statuses: StatusRepository,
    queue_repo: QueueRepository,
    event_tx: broadcast::Sender<QueueEvent>,
}

impl QueueActorState {
    fn new(args: QueueActorArgs) -> Self {
        Self {
            config: args.config,
            run_state: QueueRunState::Running,
            next_seq: 1,
            waiting: VecDeque::new(),
            delayed: Vec::new(),
            active: Vec::new(),
            completed: VecDeque::new(),
            failed: VecDeque::new(),
            jobs: HashMap::new(),
            job_repo: args.jobs,
            statuses: args.statuses,
            queue_repo: args.queue_state,
            event_tx: args.event_tx,
        }
    }

    /// Rebuild queue state from persisted job records.
    ///
    /// Jobs that were active when the process stopped go back to waiting.
    async fn restore(&mut self, records: Vec<QueuedJob>) {
        let mut interrupted = Vec::new();

        for mut job in records {
            let id = job.id();
            self.next_seq = self.next_seq.max(job.seq + 1);
            match job.state {
                JobState::Waiting => self.waiting.push_back(id),
                JobState::Active => {
                    job.state = JobState::Waiting;
                    job.worker_id = None;
                    job.started_at = None;
                    job.updated_at = Utc::now();
                    self.waiting.push_back(id);
                    interrupted.push(job.clone());
                }
                JobState::Delayed => self.delayed.push(id),
                JobState::Completed => self.completed.push_back(id),
                JobState::Failed => self.failed.push_back(id),
            }
            self.jobs.insert(id, job);
        }

        let finished_at = |jobs: &HashMap<JobId, QueuedJob>, id: &JobId| {
            jobs.get(id).and_then(|j| j.finished_at)
        };
        self.completed
            .make_contiguous()
            .sort_by_key(|id| finished_at(&self.jobs, id));
        self.failed
            .make_contiguous()
            .sort_by_key(|id| finished_at(&self.jobs, id));

        for job in &interrupted {
            tracing::warn!("Job {} was interrupted mid-flight, requeued", job.id());
            self.persist(job).await;
        }
        self.enforce_retention().await;

        tracing::info!(
            "Restored booking queue: {} waiting, {} delayed, {} completed, {} failed",
            self.waiting.len(),
            self.delayed.len(),
            self.completed.len(),
            self.failed.len()
        );
    }

    /// Broadcast an event.
    fn broadcast(&self, event: QueueEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Write a job record through to the database.
    async fn persist(&self, job: &QueuedJob) {
        if let Err(e) = self.job_repo.save(job).await {
            tracing::warn!("Failed to persist job {}: {}", job.id(), e);
        }
    }

    /// Mirror a job's state into the status store.
    async fn write_status(&self, job: &QueuedJob) {
        let record = job.status_record();
        match self.statuses.get(job.id()).await {
            Ok(Some(previous)) if !previous.status.can_transition_to(record.status) => {
                tracing::warn!(
                    "Refusing to move status of job {} from {} to {}",
                    job.id(),
                    previous.status,
                    record.status
                );
                return;
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("Failed to read status for job {}: {}", job.id(), e),
        }
        if let Err(e) = self.statuses.put(&record, self.config.status_ttl()).await {
            tracing::warn!("Failed to write status for job {}: {}", job.id(), e);
        }
    }

    async fn persist_and_publish(&self, job: &QueuedJob) {
        self.persist(job).await;
        self.write_status(job).await;
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            waiting: self.waiting.len() as u64,
            active: self.active.len() as u64,
            delayed: self.delayed.len() as u64,
            completed: self.completed.len() as u64,
            failed: self.failed.len() as u64,
        }
    }

    fn snapshot(&self, job_id: JobId) -> QueueSnapshot {
        QueueSnapshot {
            waiting: self.waiting.len(),
            active: self.active.len(),
            rank: self
                .waiting
                .iter()
                .position(|id| *id == job_id)
                .map(|index| index + 1),
        }
    }

    fn collect<'a>(&self, ids: impl Iterator<Item = &'a JobId>) -> Vec<QueuedJob> {
        ids.filter_map(|id| self.jobs.get(id).cloned()).collect()
    }

    fn list(&self, state: JobState) -> Vec<QueuedJob> {
        match state {
            JobState::Waiting => self.collect(self.waiting.iter()),
            JobState::Active => self.collect(self.active.iter()),
            JobState::Delayed => {
                let mut delayed = self.collect(self.delayed.iter());
                delayed.sort_by_key(|j| j.ready_at);
                delayed
            }
            JobState::Completed => self.collect(self.completed.iter()),
            JobState::Failed => self.collect(self.failed.iter()),
        }
    }

    fn set_run_state(&mut self, new_state: QueueRunState) {
        let old_state = self.run_state;
        if old_state == new_state {
            return;
        }
        self.run_state = new_state;
        tracing::info!("Booking queue {} -> {}", old_state, new_state);
        self.broadcast(QueueEvent::QueueStateChanged {
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    async fn save_paused(&self, paused: bool) {
        if let Err(e) = self.queue_repo.set_paused(paused).await {
            tracing::warn!("Failed to persist queue state: {}", e);
        }
    }

    /// Evict the oldest terminal jobs beyond the retention bounds.
    async fn enforce_retention(&mut self) {
        let mut evicted = Vec::new();
        while self.completed.len() > self.config.keep_completed {
            if let Some(id) = self.completed.pop_front() {
                evicted.push(id);
            }
        }
        while self.failed.len() > self.config.keep_failed {
            if let Some(id) = self.failed.pop_front() {
                evicted.push(id);
            }
        }
        self.forget(&evicted).await;
    }

    /// Drop jobs from memory and from the job table.
    async fn forget(&mut self, ids: &[JobId]) {
        for id in ids {
            self.jobs.remove(id);
        }
        if let Err(e) = self.job_repo.delete_many(ids).await {
            tracing::warn!("Failed to delete {} job records: {}", ids.len(), e);
        }
    }

    /// Move a finished attempt into its terminal list.
    async fn finish(&mut self, job: QueuedJob) {
        let id = job.id();
        self.persist_and_publish(&job).await;
        match job.state {
            JobState::Completed => self.completed.push_back(id),
            _ => self.failed.push_back(id),
        }
        self.jobs.insert(id, job);
        self.enforce_retention().await;
    }

    fn take_active(&mut self, job_id: JobId) -> Option<QueuedJob> {
        let index = self.active.iter().position(|id| *id == job_id)?;
        self.active.remove(index);
        self.jobs.get(&job_id).cloned()
    }

    /// Promote delayed jobs whose backoff has elapsed.
    async fn promote_delayed(&mut self, now: DateTime<Utc>) {
        let mut due: Vec<QueuedJob> = self
            .delayed
            .iter()
            .filter_map(|id| self.jobs.get(id))
            .filter(|job| job.ready_at.is_none_or(|at| at <= now))
            .cloned()
            .collect();
        if due.is_empty() {
            return;
        }
        due.sort_by_key(|job| (job.ready_at, job.seq));

        for mut job in due {
            let id = job.id();
            self.delayed.retain(|d| *d != id);
            job.state = JobState::Waiting;
            job.ready_at = None;
            job.updated_at = now;
            self.persist(&job).await;
            self.waiting.push_back(id);
            self.broadcast(QueueEvent::JobRetrying {
                job_id: id,
                attempt: job.attempts + 1,
                timestamp: now,
            });
            self.jobs.insert(id, job);
        }
    }
}

/// Queue actor that manages the booking queue.
pub struct QueueActor;

impl Actor for QueueActor {
    type Msg = QueueMessage;
    type State = QueueActorState;
    type Arguments = QueueActorArgs;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting booking queue actor");

        let tick_interval = args.config.tick_interval();
        let mut state = QueueActorState::new(args);

        let records = state
            .job_repo
            .load_all()
            .await
            .map_err(|e| ActorProcessingErr::from(format!("Failed to load jobs: {}", e)))?;
        state.restore(records).await;

        match state.queue_repo.is_paused().await {
            Ok(true) => state.run_state = QueueRunState::Paused,
            Ok(false) => {}
            Err(e) => tracing::warn!("Failed to load queue state: {}", e),
        }

        // Start periodic tick
        spawn_ticker(myself, tick_interval);

        Ok(state)
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            QueueMessage::Enqueue { job, reply } => {
                if state.run_state == QueueRunState::Draining {
                    let _ = reply.send(Err(QueueError::Draining));
                    return Ok(());
                }

                let seq = state.next_seq;
                let queued = QueuedJob::waiting(*job, seq, state.config.max_attempts);
                let job_id = queued.id();

                if let Err(e) = state.job_repo.save(&queued).await {
                    let _ = reply.send(Err(QueueError::Database(e.to_string())));
                    return Ok(());
                }
                state.next_seq += 1;
                state.write_status(&queued).await;

                state.jobs.insert(job_id, queued.clone());
                state.waiting.push_back(job_id);

                tracing::debug!("Job {} enqueued at seq {}", job_id, seq);
                state.broadcast(QueueEvent::JobEnqueued {
                    job: queued,
                    timestamp: Utc::now(),
                });

                let _ = reply.send(Ok(state.snapshot(job_id)));
            }

            QueueMessage::RequestJob { worker_id, reply } => {
                if !state.run_state.is_dispatching() || state.active.len() >= WORKER_CONCURRENCY {
                    let _ = reply.send(None);
                    return Ok(());
                }

                let Some(job_id) = state.waiting.pop_front() else {
                    let _ = reply.send(None);
                    return Ok(());
                };
                let Some(mut job) = state.jobs.get(&job_id).cloned() else {
                    let _ = reply.send(None);
                    return Ok(());
                };

                let now = Utc::now();
                job.state = JobState::Active;
                job.attempts = job.attempts.saturating_add(1);
                job.worker_id = Some(worker_id.clone());
                job.started_at = Some(now);
                job.progress = 0;
                job.updated_at = now;

                if let Err(e) = state.job_repo.save(&job).await {
                    tracing::warn!("Failed to mark job {} active: {}", job_id, e);
                    state.waiting.push_front(job_id);
                    let _ = reply.send(None);
                    return Ok(());
                }
                state.write_status(&job).await;

                state.jobs.insert(job_id, job.clone());
                state.active.push(job_id);

                state.broadcast(QueueEvent::JobStarted {
                    job_id,
                    worker_id,
                    attempt: job.attempts,
                    timestamp: now,
                });

                let _ = reply.send(Some(job));
            }

            QueueMessage::Progress { job_id, progress } => {
                if !state.active.contains(&job_id) {
                    return Ok(());
                }
                if let Some(job) = state.jobs.get_mut(&job_id) {
                    job.progress = progress.min(100);
                    job.updated_at = Utc::now();
                }
                state.broadcast(QueueEvent::JobProgress {
                    job_id,
                    progress,
                    timestamp: Utc::now(),
                });
            }

            QueueMessage::JobCompleted {
                job_id,
                worker_id: _,
                summary,
            } => {
                if let Some(job) = state.take_active(job_id) {
                    let now = Utc::now();
                    let duration_ms = job
                        .started_at
                        .map(|started| (now - started).num_milliseconds().max(0) as u64)
                        .unwrap_or(0);

                    let job = completed(job, summary.clone(), now);
                    state.finish(job).await;

                    tracing::info!("Job {} completed: booking {}", job_id, summary.booking_id);
                    state.broadcast(QueueEvent::JobCompleted {
                        job_id,
                        summary,
                        duration_ms,
                        timestamp: now,
                    });
                }
            }

            QueueMessage::JobFailed {
                job_id,
                worker_id: _,
                error,
            } => {
                if let Some(mut job) = state.take_active(job_id) {
                    let now = Utc::now();
                    let attempts = job.attempts;
                    let will_retry = error.is_retryable() && job.has_attempts_left();

                    job.last_error = Some(error.to_string());
                    job.worker_id = None;
                    job.updated_at = now;

                    if will_retry {
                        let delay = backoff_delay(state.config.backoff_initial(), attempts);
                        job.state = JobState::Delayed;
                        job.ready_at = Some(now + to_chrono(delay));

                        tracing::warn!(
                            "Job {} attempt {} failed: {}; retrying in {:?}",
                            job_id,
                            attempts,
                            error,
                            delay
                        );
                        state.persist_and_publish(&job).await;
                        state.delayed.push(job_id);
                        state.jobs.insert(job_id, job);
                    } else {
                        match &error {
                            JobError::Terminal(rejection) => {
                                tracing::info!("Job {} rejected: {}", job_id, rejection)
                            }
                            JobError::Retryable(reason) => tracing::error!(
                                "Job {} failed after {} attempts: {}",
                                job_id,
                                attempts,
                                reason
                            ),
                        }
                        job.state = JobState::Failed;
                        job.finished_at = Some(now);
                        state.finish(job).await;
                    }

                    state.broadcast(QueueEvent::JobFailed {
                        job_id,
                        error: error.to_string(),
                        attempts,
                        will_retry,
                        timestamp: now,
                    });
                }
            }

            QueueMessage::ReleaseWorker { worker_id } => {
                let held: Vec<JobId> = state
                    .active
                    .iter()
                    .filter(|id| {
                        state
                            .jobs
                            .get(*id)
                            .is_some_and(|j| j.worker_id.as_deref() == Some(worker_id.as_str()))
                    })
                    .copied()
                    .collect();

                for job_id in held.into_iter().rev() {
                    let Some(mut job) = state.take_active(job_id) else {
                        continue;
                    };
                    let now = Utc::now();
                    job.worker_id = None;
                    job.started_at = None;
                    job.updated_at = now;

                    if job.has_attempts_left() {
                        tracing::warn!("Job {} released by {}, requeued", job_id, worker_id);
                        job.state = JobState::Waiting;
                        state.persist_and_publish(&job).await;
                        state.waiting.push_front(job_id);
                        state.jobs.insert(job_id, job);
                    } else {
                        job.state = JobState::Failed;
                        job.last_error = Some("worker stopped while processing".into());
                        job.finished_at = Some(now);
                        state.finish(job).await;
                    }
                }
            }

            QueueMessage::GetJob { job_id, reply } => {
                let _ = reply.send(state.jobs.get(&job_id).cloned());
            }

            QueueMessage::ListJobs {
                state: job_state,
                reply,
            } => {
                let _ = reply.send(state.list(job_state));
            }

            QueueMessage::GetStats { reply } => {
                let _ = reply.send(state.stats());
            }

            QueueMessage::GetState { reply } => {
                let _ = reply.send(state.run_state);
            }

            QueueMessage::Pause => {
                if state.run_state == QueueRunState::Running {
                    state.set_run_state(QueueRunState::Paused);
                    state.save_paused(true).await;
                }
            }

            QueueMessage::Resume => {
                if state.run_state == QueueRunState::Paused {
                    state.set_run_state(QueueRunState::Running);
                    state.save_paused(false).await;
                }
            }

            QueueMessage::Drain => {
                state.set_run_state(QueueRunState::Draining);
            }

            QueueMessage::Clean { reply } => {
                let mut removed: Vec<JobId> = state.completed.drain(..).collect();
                removed.extend(state.failed.drain(..));
                state.forget(&removed).await;

                tracing::info!("Cleaned {} terminal jobs", removed.len());
                state.broadcast(QueueEvent::QueueCleaned {
                    removed: removed.len(),
                    timestamp: Utc::now(),
                });
                let _ = reply.send(removed.len());
            }

            QueueMessage::Shutdown => {
                tracing::info!("Shutting down booking queue");
                myself.stop(None);
                return Ok(());
            }

            QueueMessage::Tick => {
                state.promote_delayed(Utc::now()).await;
            }
        }

        Ok(())
    }
}

fn completed(mut job: QueuedJob, summary: BookingSummary, now: DateTime<Utc>) -> QueuedJob {
    job.state = JobState::Completed;
    job.result = Some(summary);
    job.progress = 100;
    job.worker_id = None;
    job.finished_at = Some(now);
    job.updated_at = now;
    job
}

fn to_chrono(delay: Duration) -> chrono::Duration {
    chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(365))
}

fn spawn_ticker(myself: ActorRef<QueueMessage>, period: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            if myself.send_message(QueueMessage::Tick).is_err() {
                break;
            }
        }
    });
}
