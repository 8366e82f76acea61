//! Scripted in-memory remote store and fixtures for engine tests.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use skydrive_api::Error;
use skydrive_protocol::{
    CheckFastUploadRequest, CheckFastUploadResponse, FileMeta, InitUploadRequest,
    InitUploadResponse, MergeRequest,
};
use tempfile::TempDir;
use tokio::sync::mpsc;

use crate::remote::{RemoteFuture, RemoteStore};
use crate::task::UploadTask;
use crate::types::{UploadEvent, UploadSource};

/// A call received by [`MockRemote`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Check { auto_rename: bool },
    Init { auto_rename: bool },
    Chunk(u64),
    Merge { auto_rename: bool },
    Delete(i64),
    Restore(i64),
    Purge(i64),
}

#[derive(Default)]
struct MockState {
    calls: Vec<Call>,
    fast: bool,
    preloaded: Vec<u64>,
    received: HashMap<String, BTreeSet<u64>>,
    chunk_data: HashMap<u64, Vec<u8>>,
    stored: Vec<u64>,
    check_conflicts: VecDeque<Option<i64>>,
    init_conflicts: VecDeque<Option<i64>>,
    merge_conflicts: VecDeque<Option<i64>>,
    merge_failures: u32,
    init_status: Option<u16>,
    fail_restore: bool,
    fail_delete: bool,
    chunk_delay: Duration,
    merged_hashes: Vec<String>,
    open_files: HashSet<String>,
    max_open_files: usize,
    next_id: i64,
}

#[derive(Default)]
pub(crate) struct MockRemote {
    state: Mutex<MockState>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn conflict(file_id: Option<i64>) -> Error {
    Error::Conflict {
        file_id,
        message: "A file with this name already exists".into(),
    }
}

/// Decrements the in-flight counter even if the call is aborted.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl MockRemote {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn set_fast(&self, fast: bool) {
        self.state().fast = fast;
    }

    /// Chunk indices reported as received by every init call.
    pub(crate) fn set_preloaded(&self, indices: Vec<u64>) {
        self.state().preloaded = indices;
    }

    /// Fails the next `n` merges with 503 (`u32::MAX` fails forever).
    pub(crate) fn set_merge_failures(&self, n: u32) {
        self.state().merge_failures = n;
    }

    pub(crate) fn set_init_status(&self, status: u16) {
        self.state().init_status = Some(status);
    }

    pub(crate) fn set_fail_restore(&self, fail: bool) {
        self.state().fail_restore = fail;
    }

    pub(crate) fn set_fail_delete(&self, fail: bool) {
        self.state().fail_delete = fail;
    }

    pub(crate) fn set_chunk_delay(&self, delay: Duration) {
        self.state().chunk_delay = delay;
    }

    pub(crate) fn push_check_conflict(&self, file_id: Option<i64>) {
        self.state().check_conflicts.push_back(file_id);
    }

    pub(crate) fn push_init_conflict(&self, file_id: Option<i64>) {
        self.state().init_conflicts.push_back(file_id);
    }

    pub(crate) fn push_merge_conflict(&self, file_id: Option<i64>) {
        self.state().merge_conflicts.push_back(file_id);
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub(crate) fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.state().calls.iter().filter(|c| pred(c)).count()
    }

    pub(crate) fn chunk_indices(&self) -> Vec<u64> {
        self.state()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Chunk(i) => Some(*i),
                _ => None,
            })
            .collect()
    }

    /// Chunk indices the store accepted, in order. Aborted calls are absent.
    pub(crate) fn stored_chunks(&self) -> Vec<u64> {
        self.state().stored.clone()
    }

    pub(crate) fn chunk_bytes(&self, index: u64) -> Vec<u8> {
        self.state()
            .chunk_data
            .get(&index)
            .cloned()
            .unwrap_or_default()
    }

    /// Digests of successfully merged files.
    pub(crate) fn hashes(&self) -> Vec<String> {
        self.state().merged_hashes.clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Peak number of files checked but not yet linked or merged.
    pub(crate) fn max_open_files(&self) -> usize {
        self.state().max_open_files
    }
}

impl RemoteStore for MockRemote {
    fn check_fast_upload<'a>(
        &'a self,
        req: &'a CheckFastUploadRequest,
    ) -> RemoteFuture<'a, CheckFastUploadResponse> {
        let result = {
            let mut s = self.state();
            s.calls.push(Call::Check {
                auto_rename: req.auto_rename,
            });
            s.open_files.insert(req.file_name.clone());
            s.max_open_files = s.max_open_files.max(s.open_files.len());
            match s.check_conflicts.pop_front() {
                Some(file_id) => Err(conflict(file_id)),
                None => {
                    if s.fast {
                        s.open_files.remove(&req.file_name);
                    }
                    Ok(CheckFastUploadResponse {
                        can_fast_upload: s.fast,
                        file_meta: None,
                    })
                }
            }
        };
        Box::pin(async move { result })
    }

    fn init_upload<'a>(
        &'a self,
        req: &'a InitUploadRequest,
        auto_rename: bool,
    ) -> RemoteFuture<'a, InitUploadResponse> {
        let result = {
            let mut s = self.state();
            s.calls.push(Call::Init { auto_rename });
            if let Some(status) = s.init_status {
                Err(Error::Api {
                    status,
                    message: "rejected".into(),
                })
            } else if let Some(file_id) = s.init_conflicts.pop_front() {
                Err(conflict(file_id))
            } else {
                let upload_id = format!("{}:{}", req.file_hash, req.file_name);
                let mut uploaded: BTreeSet<u64> = s.preloaded.iter().copied().collect();
                if let Some(received) = s.received.get(&upload_id) {
                    uploaded.extend(received.iter().copied());
                }
                Ok(InitUploadResponse {
                    upload_id,
                    uploaded_chunks: uploaded.into_iter().collect(),
                })
            }
        };
        Box::pin(async move { result })
    }

    fn upload_chunk<'a>(
        &'a self,
        upload_id: &'a str,
        chunk_index: u64,
        data: Vec<u8>,
    ) -> RemoteFuture<'a, ()> {
        let delay = {
            let mut s = self.state();
            s.calls.push(Call::Chunk(chunk_index));
            s.chunk_delay
        };
        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            let _guard = InFlight(&self.in_flight);

            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }

            let mut s = self.state();
            s.received
                .entry(upload_id.to_string())
                .or_default()
                .insert(chunk_index);
            s.chunk_data.insert(chunk_index, data);
            s.stored.push(chunk_index);
            Ok(())
        })
    }

    fn merge_upload<'a>(&'a self, req: &'a MergeRequest) -> RemoteFuture<'a, FileMeta> {
        let result = {
            let mut s = self.state();
            s.calls.push(Call::Merge {
                auto_rename: req.auto_rename,
            });
            if let Some(file_id) = s.merge_conflicts.pop_front() {
                Err(conflict(file_id))
            } else if s.merge_failures > 0 {
                if s.merge_failures != u32::MAX {
                    s.merge_failures -= 1;
                }
                Err(Error::Api {
                    status: 503,
                    message: "service unavailable".into(),
                })
            } else {
                s.next_id += 1;
                s.merged_hashes.push(req.file_hash.clone());
                s.open_files.remove(&req.file_name);
                let file_name = if req.auto_rename {
                    format!("{} (1)", req.file_name)
                } else {
                    req.file_name.clone()
                };
                Ok(FileMeta {
                    id: s.next_id,
                    file_name,
                    is_folder: false,
                    parent_id: req.parent_id,
                    user_id: 1,
                    file_hash: Some(req.file_hash.clone()),
                    file_size: 0,
                    created_at: None,
                    updated_at: None,
                    deleted_at: None,
                })
            }
        };
        Box::pin(async move { result })
    }

    fn soft_delete(&self, file_id: i64) -> RemoteFuture<'_, ()> {
        let result = {
            let mut s = self.state();
            s.calls.push(Call::Delete(file_id));
            if s.fail_delete {
                Err(Error::Api {
                    status: 404,
                    message: "File not found".into(),
                })
            } else {
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn restore(&self, file_id: i64) -> RemoteFuture<'_, ()> {
        let result = {
            let mut s = self.state();
            s.calls.push(Call::Restore(file_id));
            if s.fail_restore {
                Err(Error::Api {
                    status: 500,
                    message: "restore failed".into(),
                })
            } else {
                Ok(())
            }
        };
        Box::pin(async move { result })
    }

    fn purge(&self, file_id: i64) -> RemoteFuture<'_, ()> {
        self.state().calls.push(Call::Purge(file_id));
        Box::pin(async move { Ok(()) })
    }
}

/// A task whose source does not exist on disk.
pub(crate) fn test_task(name: &str, size: u64) -> (UploadTask, mpsc::Receiver<UploadEvent>) {
    let (tx, rx) = mpsc::channel(256);
    let source = UploadSource {
        path: Path::new("/nonexistent").join(name),
        name: name.into(),
        size,
        parent_id: 0,
        relative_path: None,
    };
    (UploadTask::new(source, tx), rx)
}

/// Writes `data` to a temp file and returns a source for it.
pub(crate) fn write_source(dir: &Path, name: &str, data: &[u8]) -> UploadSource {
    // The on-disk name must stay valid even when the upload name is not.
    let path = dir.join(name.replace(['?', '*', ':', '<', '>', '|', '"'], "_"));
    std::fs::write(&path, data).unwrap();
    UploadSource {
        path,
        name: name.into(),
        size: data.len() as u64,
        parent_id: 0,
        relative_path: None,
    }
}

/// A task backed by a temp file holding `data`.
pub(crate) fn source_file(
    name: &str,
    data: &[u8],
) -> (TempDir, UploadTask, mpsc::Receiver<UploadEvent>) {
    let dir = tempfile::tempdir().unwrap();
    let source = write_source(dir.path(), name, data);
    let (tx, rx) = mpsc::channel(256);
    (dir, UploadTask::new(source, tx), rx)
}
