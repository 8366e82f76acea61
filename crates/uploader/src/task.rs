//! Per-task state shared between the registry and the running session.
//!
//! Each task owns its pause flag and cancellation token; nothing here is
//! reached into from another task's session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::types::{TaskId, TaskSnapshot, TaskStatus, UploadEvent, UploadSource};

struct TaskState {
    status: TaskStatus,
    percent: u8,
    message: String,
    replaced: Vec<i64>,
    auto_rename: bool,
    error: Option<String>,
}

/// One file submitted for transfer.
pub(crate) struct UploadTask {
    pub(crate) id: TaskId,
    pub(crate) source: UploadSource,
    state: Mutex<TaskState>,
    pause_requested: AtomicBool,
    cancel: Mutex<CancellationToken>,
    running: watch::Sender<bool>,
    events: mpsc::Sender<UploadEvent>,
}

impl UploadTask {
    pub(crate) fn new(source: UploadSource, events: mpsc::Sender<UploadEvent>) -> Self {
        Self {
            id: TaskId::new(),
            source,
            state: Mutex::new(TaskState {
                status: TaskStatus::Queued,
                percent: 0,
                message: "Waiting".into(),
                replaced: Vec::new(),
                auto_rename: false,
                error: None,
            }),
            pause_requested: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
            running: watch::channel(false).0,
            events,
        }
    }

    fn state(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: UploadEvent) {
        // Events are advisory; snapshots are authoritative.
        let _ = self.events.try_send(event);
    }

    // -- control flags ------------------------------------------------------

    pub(crate) fn cancel_token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Aborts the in-flight call, if any.
    pub(crate) fn cancel(&self) {
        self.cancel_token().cancel();
    }

    /// Installs a fresh token for a new run.
    fn reissue_token(&self) {
        *self.cancel.lock().unwrap_or_else(PoisonError::into_inner) = CancellationToken::new();
    }

    /// Flags the task as paused and aborts the current run's in-flight
    /// call or backoff wait. Returns `true` on the first request.
    pub(crate) fn request_pause(&self) -> bool {
        let first = !self.pause_requested.swap(true, Ordering::SeqCst);
        if first {
            self.cancel();
        }
        first
    }

    pub(crate) fn pause_requested(&self) -> bool {
        self.pause_requested.load(Ordering::SeqCst)
    }

    /// Whether the session should stop at its next checkpoint.
    pub(crate) fn is_interrupted(&self) -> bool {
        self.pause_requested() || self.cancel_token().is_cancelled()
    }

    pub(crate) fn mark_running(&self) {
        self.running.send_replace(true);
    }

    pub(crate) fn mark_stopped(&self) {
        self.running.send_replace(false);
    }

    /// Waits until no session is working on this task.
    pub(crate) async fn wait_stopped(&self) {
        let mut rx = self.running.subscribe();
        let _ = rx.wait_for(|running| !*running).await;
    }

    // -- session-driven updates --------------------------------------------
    //
    // Once a pause or cancel is requested the registry owns the visible
    // state, so these become no-ops.

    pub(crate) fn set_status(&self, status: TaskStatus, message: impl Into<String>) {
        if self.is_interrupted() {
            return;
        }
        self.apply_status(status, message.into());
    }

    pub(crate) fn set_message(&self, message: impl Into<String>) {
        if self.is_interrupted() {
            return;
        }
        let message = message.into();
        let percent = {
            let mut s = self.state();
            s.message = message.clone();
            s.percent
        };
        self.emit(UploadEvent::Progress {
            task_id: self.id,
            percent,
            message,
        });
    }

    /// Raises the percentage; never lowers it.
    pub(crate) fn set_progress(&self, percent: u8, message: impl Into<String>) {
        if self.is_interrupted() {
            return;
        }
        let message = message.into();
        let percent = {
            let mut s = self.state();
            s.percent = s.percent.max(percent.min(100));
            s.message = message.clone();
            s.percent
        };
        self.emit(UploadEvent::Progress {
            task_id: self.id,
            percent,
            message,
        });
    }

    pub(crate) fn succeed(&self, message: impl Into<String>) {
        let message = message.into();
        {
            let mut s = self.state();
            s.status = TaskStatus::Succeeded;
            s.percent = 100;
            s.message = message.clone();
            s.error = None;
        }
        self.pause_requested.store(false, Ordering::SeqCst);
        self.retire_token();
        self.emit(UploadEvent::Succeeded {
            task_id: self.id,
            message,
        });
    }

    pub(crate) fn fail(&self, error: impl Into<String>) {
        let error = error.into();
        {
            let mut s = self.state();
            s.status = TaskStatus::Failed;
            s.message = error.clone();
            s.error = Some(error.clone());
        }
        self.pause_requested.store(false, Ordering::SeqCst);
        self.retire_token();
        self.emit(UploadEvent::Failed {
            task_id: self.id,
            error,
        });
    }

    fn retire_token(&self) {
        self.cancel();
    }

    // -- registry-driven updates -------------------------------------------

    /// Sets the visible state regardless of pending interruptions.
    pub(crate) fn force_status(&self, status: TaskStatus, message: impl Into<String>) {
        self.apply_status(status, message.into());
    }

    /// Clears the pause request and requeues the task with a fresh token.
    pub(crate) fn prepare_resume(&self) {
        self.reissue_token();
        self.pause_requested.store(false, Ordering::SeqCst);
        self.apply_status(TaskStatus::Queued, "Waiting".into());
    }

    /// Resets a failed task for a fresh run.
    pub(crate) fn prepare_retry(&self) {
        self.reissue_token();
        self.pause_requested.store(false, Ordering::SeqCst);
        {
            let mut s = self.state();
            s.percent = 0;
            s.error = None;
        }
        self.apply_status(TaskStatus::Queued, "Waiting".into());
    }

    fn apply_status(&self, status: TaskStatus, message: String) {
        {
            let mut s = self.state();
            if s.status == status && s.message == message {
                return;
            }
            s.status = status;
            s.message = message.clone();
        }
        self.emit(UploadEvent::StatusChanged {
            task_id: self.id,
            status,
            message,
        });
    }

    // -- conflict bookkeeping ----------------------------------------------

    pub(crate) fn auto_rename(&self) -> bool {
        self.state().auto_rename
    }

    /// Stays on for the rest of this task's attempts.
    pub(crate) fn enable_auto_rename(&self) {
        self.state().auto_rename = true;
    }

    pub(crate) fn record_replaced(&self, file_id: i64) {
        let mut s = self.state();
        if !s.replaced.contains(&file_id) {
            s.replaced.push(file_id);
        }
    }

    /// Removes and returns the pending replacements, so each is resolved once.
    pub(crate) fn take_replaced(&self) -> Vec<i64> {
        std::mem::take(&mut self.state().replaced)
    }

    pub(crate) fn has_replacement(&self) -> bool {
        !self.state().replaced.is_empty()
    }

    // -- queries -------------------------------------------------------------

    pub(crate) fn status(&self) -> TaskStatus {
        self.state().status
    }

    pub(crate) fn snapshot(&self) -> TaskSnapshot {
        let s = self.state();
        TaskSnapshot {
            id: self.id,
            name: self.source.name.clone(),
            relative_path: self.source.relative_path.clone(),
            size: self.source.size,
            status: s.status,
            percent: s.percent,
            message: s.message.clone(),
            replaced_entity_ids: s.replaced.clone(),
            error: s.error.clone(),
        }
    }
}
