use std::path::{Component, Path};

use crate::TransferError;

/// Characters the server refuses in file and folder names.
const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Validates a single file name before it is sent to the server.
///
/// Rejects empty names, `.`/`..`, and names containing
/// `< > : " / \ | ? *`.
pub fn validate_file_name(name: &str) -> Result<(), TransferError> {
    if name.trim().is_empty() {
        return Err(TransferError::InvalidName("empty name".into()));
    }
    if name == "." || name == ".." {
        return Err(TransferError::InvalidName(format!("reserved name: {name}")));
    }
    if let Some(c) = name.chars().find(|c| FORBIDDEN_NAME_CHARS.contains(c)) {
        return Err(TransferError::InvalidName(format!(
            "'{name}' contains forbidden character '{c}'"
        )));
    }
    Ok(())
}

/// Validates a file's path below the upload root: folder segments
/// followed by the file name, e.g. `photos/2024/a.jpg`.
///
/// Rejects:
/// - Absolute paths (Unix `/` or Windows `C:\`)
/// - Parent directory traversal (`..`)
/// - Path segments that are not valid names
pub fn validate_relative_path(relative_path: &str) -> Result<(), TransferError> {
    let path = Path::new(relative_path);

    if path.is_absolute() || relative_path.starts_with('/') {
        return Err(TransferError::InvalidPath(format!(
            "absolute path not allowed: {relative_path}"
        )));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(TransferError::InvalidPath(format!(
                    "parent directory traversal not allowed: {relative_path}"
                )));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(TransferError::InvalidPath(format!(
                    "absolute path not allowed: {relative_path}"
                )));
            }
            Component::Normal(segment) => {
                let segment = segment.to_string_lossy();
                validate_file_name(&segment)
                    .map_err(|e| TransferError::InvalidPath(format!("{relative_path}: {e}")))?;
            }
            Component::CurDir => {}
        }
    }

    Ok(())
}
