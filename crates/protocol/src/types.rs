use serde::{Deserialize, Serialize};

/// A file or folder entry as returned by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMeta {
    pub id: i64,
    pub file_name: String,
    #[serde(default)]
    pub is_folder: bool,
    #[serde(default)]
    pub parent_id: i64,
    #[serde(default)]
    pub user_id: i64,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub deleted_at: Option<String>,
}

/// Structured `detail` of a name-collision (409) response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictDetail {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub file_id: Option<i64>,
}

/// The `detail` field of an error response.
///
/// Plain errors carry a string, collisions an object, and request
/// validation failures a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorDetail {
    Message(String),
    Conflict(ConflictDetail),
    Other(serde_json::Value),
}

/// Error response body: `{"detail": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: ErrorDetail,
}

impl ErrorBody {
    /// Best human-readable message carried by the body, if any.
    pub fn message(&self) -> Option<&str> {
        match &self.detail {
            ErrorDetail::Message(m) if !m.is_empty() => Some(m),
            ErrorDetail::Conflict(c) if !c.message.is_empty() => Some(&c.message),
            _ => None,
        }
    }

    /// Identifier of the entity that caused a name collision.
    pub fn conflicting_file_id(&self) -> Option<i64> {
        match &self.detail {
            ErrorDetail::Conflict(c) => c.file_id,
            _ => None,
        }
    }
}
