//! Upload engine facade.
//!
//! `Uploader` owns the task registry, the scheduler actor and the
//! conflict resolver, and exposes the control operations a UI needs.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::conflict::{ConflictPrompt, ConflictResolver};
use crate::error::UploadError;
use crate::registry::TaskRegistry;
use crate::remote::RemoteStore;
use crate::replace::{ReplacementGuard, RollbackOutcome};
use crate::scheduler::{SchedulerHandle, SchedulerStats};
use crate::session::SessionContext;
use crate::task::UploadTask;
use crate::types::{
    ConflictDecision, EngineConfig, TaskId, TaskSnapshot, TaskStatus, UploadEvent, UploadSource,
};

/// Receiving ends handed to the front-end.
pub struct UploaderChannels {
    pub events: mpsc::Receiver<UploadEvent>,
    /// Collisions waiting for a decision. Keep this receiver alive and
    /// answer every prompt, or the affected tasks fail.
    pub prompts: mpsc::Receiver<ConflictPrompt>,
}

/// Resumable upload engine.
pub struct Uploader {
    registry: TaskRegistry,
    scheduler: SchedulerHandle,
    resolver: Arc<ConflictResolver>,
    guard: ReplacementGuard,
    events: mpsc::Sender<UploadEvent>,
}

impl Uploader {
    /// Creates an engine talking to `remote`.
    ///
    /// Must be called within a Tokio runtime.
    pub fn new(remote: Arc<dyn RemoteStore>, config: EngineConfig) -> (Self, UploaderChannels) {
        let (events_tx, events_rx) = mpsc::channel(256);
        let (prompts_tx, prompts_rx) = mpsc::channel(16);

        let resolver = Arc::new(ConflictResolver::new(prompts_tx));
        let guard = ReplacementGuard::new(remote.clone());
        let concurrency = config.concurrency;
        let ctx = Arc::new(SessionContext {
            remote,
            resolver: resolver.clone(),
            guard: guard.clone(),
            config,
        });

        let uploader = Self {
            registry: TaskRegistry::default(),
            scheduler: SchedulerHandle::spawn(concurrency, ctx),
            resolver,
            guard,
            events: events_tx,
        };
        let channels = UploaderChannels {
            events: events_rx,
            prompts: prompts_rx,
        };
        (uploader, channels)
    }

    /// Queues a file for upload.
    pub async fn submit(&self, source: UploadSource) -> Result<TaskId, UploadError> {
        let task = Arc::new(UploadTask::new(source, self.events.clone()));
        let id = task.id;
        debug!(task = %id, name = %task.source.name, size = task.source.size, "task submitted");

        self.registry.insert(task.clone());
        self.scheduler.enqueue(task).await?;
        Ok(id)
    }

    pub async fn submit_all(
        &self,
        sources: impl IntoIterator<Item = UploadSource>,
    ) -> Result<Vec<TaskId>, UploadError> {
        let mut ids = Vec::new();
        for source in sources {
            ids.push(self.submit(source).await?);
        }
        Ok(ids)
    }

    /// Pauses a task. A running session's in-flight call or backoff wait
    /// is aborted and its scheduler slot freed; the task stays registered.
    pub async fn pause(&self, id: TaskId) -> Result<(), UploadError> {
        let task = self.task(id)?;
        let status = task.status();
        if status.is_terminal() {
            return Err(UploadError::InvalidState { id, status });
        }
        if !task.request_pause() {
            return Ok(());
        }

        self.scheduler.withdraw(id).await?;
        task.force_status(TaskStatus::Paused, "Paused");
        info!(task = %id, "task paused");
        Ok(())
    }

    /// Requeues a paused task as a new admission.
    pub async fn resume(&self, id: TaskId) -> Result<(), UploadError> {
        let task = self.task(id)?;
        if !task.pause_requested() {
            return Err(UploadError::InvalidState {
                id,
                status: task.status(),
            });
        }

        // The previous session may still be unwinding.
        task.wait_stopped().await;
        task.prepare_resume();
        self.scheduler.enqueue(task).await?;
        info!(task = %id, "task resumed");
        Ok(())
    }

    /// Aborts an unfinished task, restores any file it trashed, and
    /// removes it.
    pub async fn cancel(&self, id: TaskId) -> Result<(), UploadError> {
        let task = self.task(id)?;
        let status = task.status();
        if status.is_terminal() {
            return Err(UploadError::InvalidState { id, status });
        }
        self.discard(task).await
    }

    /// Starts a failed task over.
    pub async fn retry(&self, id: TaskId) -> Result<(), UploadError> {
        let task = self.task(id)?;
        let status = task.status();
        if status != TaskStatus::Failed {
            return Err(UploadError::InvalidState { id, status });
        }

        task.wait_stopped().await;
        task.prepare_retry();
        self.scheduler.enqueue(task).await?;
        info!(task = %id, "task retried");
        Ok(())
    }

    /// Removes a task in any state, cancelling it first if needed.
    pub async fn remove(&self, id: TaskId) -> Result<(), UploadError> {
        let task = self.task(id)?;
        self.discard(task).await
    }

    /// Removes succeeded tasks. Returns how many were removed.
    pub async fn clear_completed(&self) -> usize {
        let done = self.registry.with_status(TaskStatus::Succeeded);
        let count = done.len();
        for task in done {
            if let Err(e) = self.discard(task).await {
                warn!(error = %e, "failed to clear task");
            }
        }
        count
    }

    /// Cancels and removes every task and forgets any remembered
    /// conflict decision.
    pub async fn clear_all(&self) {
        for task in self.registry.all() {
            if let Err(e) = self.discard(task).await {
                warn!(error = %e, "failed to clear task");
            }
        }
        self.resolver.clear();
        info!("all tasks cleared");
    }

    pub fn snapshot(&self, id: TaskId) -> Option<TaskSnapshot> {
        self.registry.get(id).map(|t| t.snapshot())
    }

    /// Current state of every task, in submission order.
    pub fn snapshots(&self) -> Vec<TaskSnapshot> {
        self.registry.snapshots()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Waits until no task is queued or running. Paused and finished
    /// tasks do not count.
    pub async fn wait_idle(&self) -> Result<(), UploadError> {
        self.scheduler.wait_idle().await
    }

    /// Answers every future collision with `decision` without prompting.
    pub fn set_conflict_default(&self, decision: ConflictDecision) {
        self.resolver.set_sticky(ConflictDecision {
            apply_to_all: true,
            ..decision
        });
    }

    /// Forgets a remembered "apply to all" decision.
    pub fn clear_conflict_decision(&self) {
        self.resolver.clear();
    }

    fn task(&self, id: TaskId) -> Result<Arc<UploadTask>, UploadError> {
        self.registry.get(id).ok_or(UploadError::NotFound(id))
    }

    async fn discard(&self, task: Arc<UploadTask>) -> Result<(), UploadError> {
        let id = task.id;
        if !task.status().is_terminal() {
            task.cancel();
        }
        self.scheduler.withdraw(id).await?;
        task.wait_stopped().await;

        match self.guard.rollback(&task).await {
            RollbackOutcome::Nothing => {}
            outcome => info!(task = %id, ?outcome, "pending replacement undone"),
        }

        self.registry.remove(id);
        let _ = self.events.try_send(UploadEvent::Removed { task_id: id });
        debug!(task = %id, "task removed");
        Ok(())
    }
}
