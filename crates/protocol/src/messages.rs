//! Request and response bodies for the upload endpoints.

use serde::{Deserialize, Serialize};

use crate::types::FileMeta;

/// Asks whether content with this digest can be linked without a transfer.
///
/// Sent form-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckFastUploadRequest {
    pub file_hash: String,
    pub file_name: String,
    pub parent_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub auto_rename: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckFastUploadResponse {
    pub can_fast_upload: bool,
    #[serde(default)]
    pub file_meta: Option<FileMeta>,
}

/// Opens (or reopens) a chunked transfer session.
///
/// Sent as a JSON body; `auto_rename` travels as a query flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadRequest {
    pub file_hash: String,
    pub file_size: u64,
    pub file_name: String,
    pub parent_id: i64,
    pub total_chunks: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
}

/// Session handle plus the chunk indices the server already holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    pub upload_id: String,
    #[serde(default)]
    pub uploaded_chunks: Vec<u64>,
}

/// Acknowledgement for one stored chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadChunkAck {
    pub status: String,
    pub chunk_index: u64,
}

/// Finalizes a transfer session into a file entry.
///
/// Sent form-encoded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    pub upload_id: String,
    pub file_name: String,
    pub file_hash: String,
    pub parent_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub auto_rename: bool,
}
