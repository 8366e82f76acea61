//! Source scanning for upload.
//!
//! A directory is walked recursively and every regular file becomes one
//! [`UploadSource`]. The scanned folder itself is recreated remotely, so
//! each file's relative path starts with the folder's own name and ends
//! with the file name (`photos/2024/a.jpg`). The server creates every
//! segment but the last as a folder. Separators are always `/`, even on
//! Windows.

use std::path::Path;

use tracing::debug;

use crate::error::UploadError;
use crate::types::UploadSource;

/// Expands `path` into upload sources destined for folder `parent_id`.
///
/// A plain file yields a single source without a relative path.
pub fn scan_sources(path: &Path, parent_id: i64) -> Result<Vec<UploadSource>, UploadError> {
    let metadata = std::fs::metadata(path)?;
    if metadata.is_file() {
        return Ok(vec![UploadSource::from_file(path, parent_id)?]);
    }
    if !metadata.is_dir() {
        return Err(UploadError::InvalidSource(format!(
            "{} is neither a file nor a directory",
            path.display()
        )));
    }

    let base = path.parent().unwrap_or(Path::new(""));
    let mut sources = Vec::new();
    walk_dir(base, path, parent_id, &mut sources)?;

    debug!(root = %path.display(), files = sources.len(), "directory scanned");
    Ok(sources)
}

fn walk_dir(
    base: &Path,
    current: &Path,
    parent_id: i64,
    sources: &mut Vec<UploadSource>,
) -> Result<(), UploadError> {
    let mut entries = std::fs::read_dir(current)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            walk_dir(base, &path, parent_id, sources)?;
        } else if metadata.is_file() {
            let folder = current.strip_prefix(base).map_err(std::io::Error::other)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let relative_path = format!("{}/{name}", folder.to_string_lossy().replace('\\', "/"));

            sources.push(UploadSource {
                name,
                size: metadata.len(),
                parent_id,
                relative_path: Some(relative_path),
                path,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("photos");

        fs::create_dir_all(root.join("2024").join("summer")).unwrap();
        fs::write(root.join("index.txt"), b"INDEX").unwrap();
        fs::write(root.join("2024").join("a.jpg"), b"JPEG_A").unwrap();
        fs::write(
            root.join("2024").join("summer").join("beach.jpg"),
            b"JPEG_BEACH",
        )
        .unwrap();

        dir
    }

    #[test]
    fn scan_finds_all_files_with_relative_paths() {
        let dir = create_test_tree();
        let sources = scan_sources(&dir.path().join("photos"), 5).unwrap();

        let mut found: Vec<String> = sources
            .iter()
            .map(|s| s.relative_path.clone().unwrap())
            .collect();
        found.sort();
        assert_eq!(
            found,
            vec![
                "photos/2024/a.jpg",
                "photos/2024/summer/beach.jpg",
                "photos/index.txt",
            ]
        );
        assert!(sources.iter().all(|s| s.parent_id == 5));
    }

    #[test]
    fn last_segment_is_the_file_name() {
        let dir = create_test_tree();
        let sources = scan_sources(&dir.path().join("photos"), 0).unwrap();

        for source in &sources {
            let path = source.relative_path.as_deref().unwrap();
            let (folders, file) = path.rsplit_once('/').unwrap();
            assert_eq!(file, source.name);
            // Files at the top of the scan still land inside the scanned folder.
            assert!(folders == "photos" || folders.starts_with("photos/"));
        }
        let index = sources.iter().find(|s| s.name == "index.txt").unwrap();
        assert_eq!(index.relative_path.as_deref(), Some("photos/index.txt"));
    }

    #[test]
    fn scan_reports_sizes() {
        let dir = create_test_tree();
        let sources = scan_sources(&dir.path().join("photos"), 0).unwrap();
        let beach = sources.iter().find(|s| s.name == "beach.jpg").unwrap();
        assert_eq!(beach.size, b"JPEG_BEACH".len() as u64);
    }

    #[test]
    fn scan_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("solo.bin");
        fs::write(&file, vec![0u8; 1234]).unwrap();

        let sources = scan_sources(&file, 3).unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].size, 1234);
        assert!(sources[0].relative_path.is_none());
    }

    #[test]
    fn scan_empty_dir() {
        let dir = TempDir::new().unwrap();
        let sources = scan_sources(dir.path(), 0).unwrap();
        assert!(sources.is_empty());
    }

    #[test]
    fn scan_nonexistent_path() {
        let result = scan_sources(Path::new("/nonexistent/path/that/does/not/exist"), 0);
        assert!(result.is_err());
    }
}
