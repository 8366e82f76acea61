//! Data types for the upload engine.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::UploadError;

/// Opaque task identifier, stable for the task's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Visible state of an upload task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Queued,
    Hashing,
    Checking,
    Uploading,
    Merging,
    Paused,
    Succeeded,
    Failed,
}

impl TaskStatus {
    /// Whether the task has finished for good (until an explicit retry).
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Hashing => "hashing",
            Self::Checking => "checking",
            Self::Uploading => "uploading",
            Self::Merging => "merging",
            Self::Paused => "paused",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How to handle a name collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictAction {
    /// Let the server pick a free name.
    Rename,
    /// Trash the existing file, store the new one, then purge the old one.
    Replace,
    /// Leave the existing file alone and finish without transferring.
    Skip,
}

impl FromStr for ConflictAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rename" => Ok(Self::Rename),
            "replace" => Ok(Self::Replace),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown conflict action: {other}")),
        }
    }
}

/// Answer to one collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDecision {
    pub action: ConflictAction,
    /// Reuse this answer for every later collision without asking.
    pub apply_to_all: bool,
}

impl ConflictDecision {
    pub fn once(action: ConflictAction) -> Self {
        Self {
            action,
            apply_to_all: false,
        }
    }

    pub fn always(action: ConflictAction) -> Self {
        Self {
            action,
            apply_to_all: true,
        }
    }
}

/// A local file to upload and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub path: PathBuf,
    /// Name of the file entry on the server.
    pub name: String,
    pub size: u64,
    /// Destination folder id (0 is the root folder).
    pub parent_id: i64,
    /// Folder path under `parent_id`, `/`-separated, for directory uploads.
    pub relative_path: Option<String>,
}

impl UploadSource {
    /// Describes a single local file uploaded into `parent_id`.
    pub fn from_file(path: impl Into<PathBuf>, parent_id: i64) -> Result<Self, UploadError> {
        let path = path.into();
        let metadata = std::fs::metadata(&path)?;
        if !metadata.is_file() {
            return Err(UploadError::InvalidSource(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| UploadError::InvalidSource(format!("{} has no file name", path.display())))?;

        Ok(Self {
            path,
            name,
            size: metadata.len(),
            parent_id,
            relative_path: None,
        })
    }
}

/// Backoff between whole-sequence attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Attempts per task, including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Delay after `failed` attempts have failed: `base * 2^failed`.
    pub fn delay_for_attempt(&self, failed: u32) -> Duration {
        self.base_delay.saturating_mul(1u32 << failed.min(16))
    }
}

/// Engine tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Sessions allowed to run at once.
    pub concurrency: usize,
    pub chunk_size: u64,
    pub hash_block_size: u64,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            concurrency: 3,
            chunk_size: skydrive_transfer::DEFAULT_CHUNK_SIZE,
            hash_block_size: skydrive_transfer::DEFAULT_HASH_BLOCK_SIZE,
            retry: RetryPolicy::default(),
        }
    }
}

/// Progress event emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    StatusChanged {
        task_id: TaskId,
        status: TaskStatus,
        message: String,
    },
    Progress {
        task_id: TaskId,
        percent: u8,
        message: String,
    },
    Succeeded {
        task_id: TaskId,
        message: String,
    },
    Failed {
        task_id: TaskId,
        error: String,
    },
    /// The task was cancelled or cleared and no longer exists.
    Removed { task_id: TaskId },
}

/// Point-in-time view of a task for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub name: String,
    pub relative_path: Option<String>,
    pub size: u64,
    pub status: TaskStatus,
    pub percent: u8,
    pub message: String,
    /// Trashed remote files awaiting purge or restore.
    pub replaced_entity_ids: Vec<i64>,
    pub error: Option<String>,
}
