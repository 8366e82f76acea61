//! Name-collision broker between sessions and an external decision-maker.
//!
//! A session that hits a collision asks the resolver. A remembered
//! "apply to all" answer is returned straight away; otherwise the prompt
//! goes out on a channel and the session waits for the reply. Prompts
//! are sent one at a time, and a session waiting its turn checks the
//! remembered answer again before prompting.

use std::sync::{Mutex, PoisonError};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::UploadError;
use crate::task::UploadTask;
use crate::types::{ConflictDecision, TaskId, TaskStatus};

/// A collision waiting for an answer.
///
/// Drop it without responding to fail the waiting task.
#[derive(Debug)]
pub struct ConflictPrompt {
    pub task_id: TaskId,
    pub file_name: String,
    pub relative_path: Option<String>,
    /// Id of the existing remote file.
    pub file_id: i64,
    reply: oneshot::Sender<ConflictDecision>,
}

impl ConflictPrompt {
    /// Answers this prompt. Returns `false` if the task stopped waiting.
    pub fn respond(self, decision: ConflictDecision) -> bool {
        self.reply.send(decision).is_ok()
    }
}

pub(crate) struct ConflictResolver {
    sticky: Mutex<Option<ConflictDecision>>,
    turn: tokio::sync::Mutex<()>,
    prompts: mpsc::Sender<ConflictPrompt>,
}

impl ConflictResolver {
    pub(crate) fn new(prompts: mpsc::Sender<ConflictPrompt>) -> Self {
        Self {
            sticky: Mutex::new(None),
            turn: tokio::sync::Mutex::new(()),
            prompts,
        }
    }

    pub(crate) fn sticky(&self) -> Option<ConflictDecision> {
        *self.sticky.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remembers `decision` for every later collision.
    pub(crate) fn set_sticky(&self, decision: ConflictDecision) {
        *self.sticky.lock().unwrap_or_else(PoisonError::into_inner) = Some(decision);
    }

    pub(crate) fn clear(&self) {
        *self.sticky.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Decides how `task` handles a collision with remote file `file_id`.
    pub(crate) async fn resolve(
        &self,
        task: &UploadTask,
        file_id: i64,
        cancel: &CancellationToken,
    ) -> Result<ConflictDecision, UploadError> {
        if let Some(decision) = self.sticky() {
            debug!(task = %task.id, file_id, action = ?decision.action, "using remembered conflict decision");
            return Ok(decision);
        }

        task.set_status(
            TaskStatus::Paused,
            format!("\"{}\" already exists, waiting for a decision", task.source.name),
        );

        let _turn = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Interrupted),
            guard = self.turn.lock() => guard,
        };

        // An earlier prompt may have been answered with "apply to all".
        if let Some(decision) = self.sticky() {
            return Ok(decision);
        }

        let (reply, rx) = oneshot::channel();
        let prompt = ConflictPrompt {
            task_id: task.id,
            file_name: task.source.name.clone(),
            relative_path: task.source.relative_path.clone(),
            file_id,
            reply,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Interrupted),
            sent = self.prompts.send(prompt) => sent.map_err(|_| UploadError::NoDecisionMaker)?,
        }

        let decision = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UploadError::Interrupted),
            answer = rx => answer.map_err(|_| UploadError::NoDecisionMaker)?,
        };

        info!(
            task = %task.id,
            file_id,
            action = ?decision.action,
            apply_to_all = decision.apply_to_all,
            "conflict decision received"
        );

        if decision.apply_to_all {
            self.set_sticky(decision);
        }
        Ok(decision)
    }
}
