//! Remote store trait.
//!
//! `RemoteStore` is what the engine talks to. [`skydrive_api::Client`]
//! implements it over HTTP; tests implement it with scripted mocks.

use std::future::Future;
use std::pin::Pin;

use skydrive_api::{Client, Error};
use skydrive_protocol::{
    CheckFastUploadRequest, CheckFastUploadResponse, FileMeta, InitUploadRequest,
    InitUploadResponse, MergeRequest,
};

/// Boxed future returned by [`RemoteStore`] calls.
pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, Error>> + Send + 'a>>;

/// Abstract remote file store.
pub trait RemoteStore: Send + Sync {
    /// Asks whether content with this digest can be linked without a transfer.
    fn check_fast_upload<'a>(
        &'a self,
        req: &'a CheckFastUploadRequest,
    ) -> RemoteFuture<'a, CheckFastUploadResponse>;

    /// Opens or reopens a transfer session.
    fn init_upload<'a>(
        &'a self,
        req: &'a InitUploadRequest,
        auto_rename: bool,
    ) -> RemoteFuture<'a, InitUploadResponse>;

    fn upload_chunk<'a>(
        &'a self,
        upload_id: &'a str,
        chunk_index: u64,
        data: Vec<u8>,
    ) -> RemoteFuture<'a, ()>;

    fn merge_upload<'a>(&'a self, req: &'a MergeRequest) -> RemoteFuture<'a, FileMeta>;

    /// Moves a file to the trash.
    fn soft_delete(&self, file_id: i64) -> RemoteFuture<'_, ()>;

    /// Restores a trashed file.
    fn restore(&self, file_id: i64) -> RemoteFuture<'_, ()>;

    /// Permanently removes a trashed file.
    fn purge(&self, file_id: i64) -> RemoteFuture<'_, ()>;
}

impl RemoteStore for Client {
    fn check_fast_upload<'a>(
        &'a self,
        req: &'a CheckFastUploadRequest,
    ) -> RemoteFuture<'a, CheckFastUploadResponse> {
        Box::pin(Client::check_fast_upload(self, req))
    }

    fn init_upload<'a>(
        &'a self,
        req: &'a InitUploadRequest,
        auto_rename: bool,
    ) -> RemoteFuture<'a, InitUploadResponse> {
        Box::pin(Client::init_upload(self, req, auto_rename))
    }

    fn upload_chunk<'a>(
        &'a self,
        upload_id: &'a str,
        chunk_index: u64,
        data: Vec<u8>,
    ) -> RemoteFuture<'a, ()> {
        Box::pin(Client::upload_chunk(self, upload_id, chunk_index, data))
    }

    fn merge_upload<'a>(&'a self, req: &'a MergeRequest) -> RemoteFuture<'a, FileMeta> {
        Box::pin(Client::merge_upload(self, req))
    }

    fn soft_delete(&self, file_id: i64) -> RemoteFuture<'_, ()> {
        Box::pin(self.delete_file(file_id))
    }

    fn restore(&self, file_id: i64) -> RemoteFuture<'_, ()> {
        Box::pin(self.restore_file(file_id))
    }

    fn purge(&self, file_id: i64) -> RemoteFuture<'_, ()> {
        Box::pin(self.purge_file(file_id))
    }
}
