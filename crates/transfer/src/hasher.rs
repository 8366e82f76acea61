use std::path::Path;

use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;

use crate::{DEFAULT_HASH_BLOCK_SIZE, TransferError};

/// Streams a file block by block into a single MD5 digest.
///
/// Only one block is held in memory at a time.
#[derive(Debug, Clone, Copy)]
pub struct ChunkHasher {
    block_size: u64,
}

impl ChunkHasher {
    /// Creates a hasher reading `block_size` bytes per step.
    ///
    /// If `block_size` is 0, [`DEFAULT_HASH_BLOCK_SIZE`] is used.
    pub fn new(block_size: u64) -> Self {
        let block_size = if block_size == 0 {
            DEFAULT_HASH_BLOCK_SIZE
        } else {
            block_size
        };
        Self { block_size }
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    /// Number of blocks a file of `file_size` bytes is read in.
    pub fn block_count(&self, file_size: u64) -> u64 {
        file_size.div_ceil(self.block_size)
    }

    /// Hashes the file at `path`.
    ///
    /// `interrupted` is polled before every block; when it returns `true`
    /// the pass stops with [`TransferError::Interrupted`] and the partial
    /// state is dropped. `on_progress` receives the percentage of blocks
    /// consumed so far.
    pub async fn digest_file<I, P>(
        &self,
        path: &Path,
        mut interrupted: I,
        mut on_progress: P,
    ) -> Result<String, TransferError>
    where
        I: FnMut() -> bool,
        P: FnMut(u8),
    {
        let mut file = tokio::fs::File::open(path).await?;
        let total_blocks = self.block_count(file.metadata().await?.len());

        let mut hasher = Md5::new();
        let mut buf = vec![0u8; self.block_size as usize];
        let mut consumed: u64 = 0;

        loop {
            if interrupted() {
                return Err(TransferError::Interrupted);
            }

            let n = read_block(&mut file, &mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            consumed += 1;

            if total_blocks > 0 {
                let percent = (consumed.min(total_blocks) * 100 / total_blocks) as u8;
                on_progress(percent);
            }

            if n < buf.len() {
                break;
            }
        }

        Ok(hex::encode(hasher.finalize()))
    }
}

/// Fills `buf` unless EOF comes first. Returns the number of bytes read.
async fn read_block(file: &mut tokio::fs::File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn checksum_bytes(data: &[u8]) -> String {
        let mut hasher = Md5::new();
        hasher.update(data);
        hex::encode(hasher.finalize())
    }

    fn create_test_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(data).unwrap();
        path
    }

    #[test]
    fn checksum_bytes_known_value() {
        assert_eq!(checksum_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(checksum_bytes(b"hello world"), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }

    #[test]
    fn block_count_scenario() {
        let mib = 1024 * 1024;
        let hasher = ChunkHasher::new(10 * mib);
        assert_eq!(hasher.block_count(45 * mib), 5);
        assert_eq!(hasher.block_count(0), 0);
        assert_eq!(hasher.block_count(10 * mib), 1);
    }

    #[test]
    fn zero_block_size_uses_default() {
        assert_eq!(ChunkHasher::new(0).block_size(), DEFAULT_HASH_BLOCK_SIZE);
    }

    #[tokio::test]
    async fn digest_matches_in_memory_checksum() {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let path = create_test_file(dir.path(), "data.bin", &data);

        // Block size that does not divide the file evenly.
        let hasher = ChunkHasher::new(333);
        let digest = hasher.digest_file(&path, || false, |_| {}).await.unwrap();
        assert_eq!(digest, checksum_bytes(&data));
    }

    #[tokio::test]
    async fn digest_reports_progress_per_block() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "data.bin", b"0123456789");

        let hasher = ChunkHasher::new(4);
        let mut seen = Vec::new();
        hasher
            .digest_file(&path, || false, |p| seen.push(p))
            .await
            .unwrap();
        assert_eq!(seen, vec![33, 66, 100]);
    }

    #[tokio::test]
    async fn digest_of_empty_file() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "empty.bin", b"");

        let digest = ChunkHasher::new(4)
            .digest_file(&path, || false, |_| {})
            .await
            .unwrap();
        assert_eq!(digest, "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[tokio::test]
    async fn digest_stops_when_interrupted() {
        let dir = TempDir::new().unwrap();
        let path = create_test_file(dir.path(), "data.bin", b"0123456789");

        let mut polls = 0;
        let result = ChunkHasher::new(4)
            .digest_file(
                &path,
                || {
                    polls += 1;
                    polls > 1
                },
                |_| {},
            )
            .await;
        assert!(matches!(result, Err(TransferError::Interrupted)));
        assert_eq!(polls, 2);
    }

    #[tokio::test]
    async fn digest_missing_file_is_io_error() {
        let result = ChunkHasher::new(4)
            .digest_file(Path::new("/nonexistent/skydrive/file"), || false, |_| {})
            .await;
        assert!(matches!(result, Err(TransferError::Io(_))));
    }
}
