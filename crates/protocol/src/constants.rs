//! REST endpoint paths, relative to the versioned API root.

/// Versioned API root appended to the server URL.
pub const API_V1_PREFIX: &str = "/api/v1";

pub const CHECK_FAST_UPLOAD: &str = "/files/check_fast_upload";
pub const UPLOAD_INIT: &str = "/files/upload/init";
pub const UPLOAD_CHUNK: &str = "/files/upload/chunk";
pub const UPLOAD_MERGE: &str = "/files/upload/merge";

/// Soft-deletes a file (moves it to the trash).
pub fn file_path(file_id: i64) -> String {
    format!("/files/{file_id}")
}

/// Restores a trashed file to its original folder.
pub fn trash_restore_path(file_id: i64) -> String {
    format!("/files/trash/{file_id}/restore")
}

/// Permanently removes a trashed file.
pub fn trash_path(file_id: i64) -> String {
    format!("/files/trash/{file_id}")
}
