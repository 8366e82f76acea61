//! Wire protocol types for the SkyDrive upload API.
//!
//! Field names follow the server's snake_case JSON/form conventions.

pub mod constants;
pub mod messages;
pub mod types;

pub use messages::{
    CheckFastUploadRequest, CheckFastUploadResponse, InitUploadRequest, InitUploadResponse,
    MergeRequest, UploadChunkAck,
};
pub use types::{ConflictDetail, ErrorBody, ErrorDetail, FileMeta};
