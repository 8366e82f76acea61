//! Content hashing and chunked file slicing for resumable uploads.
//!
//! Nothing here talks to the network; the upload engine drives these
//! pieces and decides retry policy.

mod chunked;
mod hasher;
mod progress;
mod validation;

pub use chunked::{ChunkPlan, ChunkReader};
pub use hasher::ChunkHasher;
pub use progress::{SpeedCalculator, format_rate, format_size};
pub use validation::{validate_file_name, validate_relative_path};

/// Default transfer chunk size: 20 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 20 * 1024 * 1024;

/// Default hashing block size: 10 MiB.
///
/// Independent of the chunk size; only affects read granularity and how
/// often a hashing pass can be interrupted.
pub const DEFAULT_HASH_BLOCK_SIZE: u64 = 10 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A pause or cancel request was observed between blocks.
    #[error("interrupted")]
    Interrupted,

    #[error("chunk {index} out of range (total {total})")]
    ChunkOutOfRange { index: u64, total: u64 },

    #[error("invalid file name: {0}")]
    InvalidName(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
