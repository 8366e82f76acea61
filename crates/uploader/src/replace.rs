//! Safe overwrite of an existing remote file.
//!
//! The old file is moved to the trash before the new one is written. It is
//! purged only after the new file is stored, and restored if the upload
//! fails or is cancelled. Ids are taken off the task as they are resolved,
//! so each trashed file is purged or restored at most once.

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::remote::RemoteStore;
use crate::task::UploadTask;

/// Result of undoing pending replacements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// No replacement was pending.
    Nothing,
    Restored,
    /// At least one trashed file could not be restored.
    RestoreFailed,
}

#[derive(Clone)]
pub(crate) struct ReplacementGuard {
    remote: Arc<dyn RemoteStore>,
}

impl ReplacementGuard {
    pub(crate) fn new(remote: Arc<dyn RemoteStore>) -> Self {
        Self { remote }
    }

    /// Trashes `file_id` and records it on the task.
    pub(crate) async fn replace(
        &self,
        task: &UploadTask,
        file_id: i64,
    ) -> Result<(), skydrive_api::Error> {
        self.remote.soft_delete(file_id).await?;
        task.record_replaced(file_id);
        info!(task = %task.id, file_id, "existing file moved to trash for replacement");
        Ok(())
    }

    /// Purges the trashed files once the new file is stored.
    pub(crate) async fn commit(&self, task: &UploadTask) {
        for file_id in task.take_replaced() {
            match self.remote.purge(file_id).await {
                Ok(()) => info!(task = %task.id, file_id, "replaced file purged"),
                // The new file is stored; the old one just stays in the trash.
                Err(e) => warn!(task = %task.id, file_id, error = %e, "failed to purge replaced file"),
            }
        }
    }

    /// Restores the trashed files after a failed or abandoned upload.
    pub(crate) async fn rollback(&self, task: &UploadTask) -> RollbackOutcome {
        let ids = task.take_replaced();
        if ids.is_empty() {
            return RollbackOutcome::Nothing;
        }

        let mut outcome = RollbackOutcome::Restored;
        for file_id in ids {
            match self.remote.restore(file_id).await {
                Ok(()) => info!(task = %task.id, file_id, "replaced file restored"),
                Err(e) => {
                    error!(task = %task.id, file_id, error = %e, "failed to restore replaced file");
                    outcome = RollbackOutcome::RestoreFailed;
                }
            }
        }
        outcome
    }
}
