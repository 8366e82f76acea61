//! Resumable chunked upload engine.
//!
//! This crate implements the **business logic** for moving local files
//! into the remote store. It has no UI dependencies: front-ends submit
//! [`UploadSource`]s, watch [`UploadEvent`]s and answer
//! [`ConflictPrompt`]s, while the network side sits behind the
//! [`RemoteStore`] trait.
//!
//! # Pipeline (per file)
//!
//! 1. **Hash**: MD5 over the whole file in fixed-size blocks
//! 2. **Check**: ask the store whether identical content already exists
//! 3. **Init**: open a transfer session and learn which chunks it holds
//! 4. **Chunks**: send the missing chunks in ascending order
//! 5. **Merge**: turn the session into a file entry
//!
//! Name collisions at steps 2, 3 and 5 go through the conflict resolver.
//! A "replace" answer trashes the existing file first and only purges it
//! once the new one is stored.

pub mod conflict;
pub mod engine;
pub mod error;
pub mod registry;
pub mod remote;
pub mod replace;
pub mod scanner;
pub mod scheduler;
pub mod session;
pub mod task;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use conflict::ConflictPrompt;
pub use engine::{Uploader, UploaderChannels};
pub use error::UploadError;
pub use remote::RemoteStore;
pub use replace::RollbackOutcome;
pub use scanner::scan_sources;
pub use scheduler::SchedulerStats;
pub use types::{
    ConflictAction, ConflictDecision, EngineConfig, RetryPolicy, TaskId, TaskSnapshot,
    TaskStatus, UploadEvent, UploadSource,
};
