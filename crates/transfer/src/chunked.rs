use std::collections::BTreeSet;
use std::io::SeekFrom;
use std::ops::Range;
use std::path::Path;

use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

// ---------------------------------------------------------------------------
// ChunkPlan
// ---------------------------------------------------------------------------

/// Splits a file of known size into fixed-size transfer chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    file_size: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// Creates a plan for `file_size` bytes.
    ///
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] (20 MiB) is used.
    pub fn new(file_size: u64, chunk_size: u64) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self {
            file_size,
            chunk_size,
        }
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// `ceil(file_size / chunk_size)`; zero for an empty file.
    pub fn total_chunks(&self) -> u64 {
        self.file_size.div_ceil(self.chunk_size)
    }

    /// Byte range `[index*chunk_size, min(size, (index+1)*chunk_size))`.
    pub fn chunk_range(&self, index: u64) -> Result<Range<u64>, TransferError> {
        let total = self.total_chunks();
        if index >= total {
            return Err(TransferError::ChunkOutOfRange { index, total });
        }
        let start = index * self.chunk_size;
        let end = (start + self.chunk_size).min(self.file_size);
        Ok(start..end)
    }

    /// Keeps only the indices that belong to this plan.
    ///
    /// Returns the accepted set and the rejected indices.
    pub fn received_set(&self, indices: &[u64]) -> (BTreeSet<u64>, Vec<u64>) {
        let total = self.total_chunks();
        let mut accepted = BTreeSet::new();
        let mut rejected = Vec::new();
        for &index in indices {
            if index < total {
                accepted.insert(index);
            } else {
                rejected.push(index);
            }
        }
        (accepted, rejected)
    }

    /// Indices still to send, in ascending order.
    pub fn pending<'a>(&self, received: &'a BTreeSet<u64>) -> impl Iterator<Item = u64> + 'a {
        (0..self.total_chunks()).filter(move |index| !received.contains(index))
    }
}

// ---------------------------------------------------------------------------
// ChunkReader
// ---------------------------------------------------------------------------

/// Reads individual chunks of a file at their planned offsets.
pub struct ChunkReader {
    file: tokio::fs::File,
    plan: ChunkPlan,
}

impl ChunkReader {
    /// Opens `path` for chunked reading according to `plan`.
    pub async fn open(path: &Path, plan: ChunkPlan) -> Result<Self, TransferError> {
        let file = tokio::fs::File::open(path).await?;
        Ok(Self { file, plan })
    }

    /// Reads chunk `index`. A file shorter than planned is an I/O error.
    pub async fn read_chunk(&mut self, index: u64) -> Result<Vec<u8>, TransferError> {
        let range = self.plan.chunk_range(index)?;
        self.file.seek(SeekFrom::Start(range.start)).await?;

        let mut buf = vec![0u8; (range.end - range.start) as usize];
        self.file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}
