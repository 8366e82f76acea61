//! Ordered store of submitted tasks.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::task::UploadTask;
use crate::types::{TaskId, TaskSnapshot, TaskStatus};

/// Tasks in submission order.
#[derive(Default)]
pub(crate) struct TaskRegistry {
    tasks: Mutex<Vec<Arc<UploadTask>>>,
}

impl TaskRegistry {
    fn tasks(&self) -> MutexGuard<'_, Vec<Arc<UploadTask>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, task: Arc<UploadTask>) {
        self.tasks().push(task);
    }

    pub(crate) fn get(&self, id: TaskId) -> Option<Arc<UploadTask>> {
        self.tasks().iter().find(|t| t.id == id).cloned()
    }

    pub(crate) fn remove(&self, id: TaskId) -> Option<Arc<UploadTask>> {
        let mut tasks = self.tasks();
        let pos = tasks.iter().position(|t| t.id == id)?;
        Some(tasks.remove(pos))
    }

    pub(crate) fn all(&self) -> Vec<Arc<UploadTask>> {
        self.tasks().clone()
    }

    /// Tasks currently in `status`.
    pub(crate) fn with_status(&self, status: TaskStatus) -> Vec<Arc<UploadTask>> {
        self.tasks()
            .iter()
            .filter(|t| t.status() == status)
            .cloned()
            .collect()
    }

    pub(crate) fn snapshots(&self) -> Vec<TaskSnapshot> {
        self.tasks().iter().map(|t| t.snapshot()).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks().len()
    }
}
