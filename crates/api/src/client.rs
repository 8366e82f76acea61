//! SkyDrive API client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use skydrive_protocol::constants::{
    self, API_V1_PREFIX, CHECK_FAST_UPLOAD, UPLOAD_CHUNK, UPLOAD_INIT, UPLOAD_MERGE,
};
use skydrive_protocol::{
    CheckFastUploadRequest, CheckFastUploadResponse, FileMeta, InitUploadRequest,
    InitUploadResponse, MergeRequest,
};
use tracing::debug;

use crate::error::Error;

/// Deadlines applied to every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// Time allowed to establish the TCP/TLS connection.
    pub connect: Duration,
    /// Time allowed for a whole request, body upload included. Must cover
    /// one full chunk on the slowest expected link.
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            request: Duration::from_secs(300),
        }
    }
}

/// SkyDrive API client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Creates a client for the server at `server_url`.
    ///
    /// Requests go to `{server_url}/api/v1`. A non-empty `token` is sent
    /// as a Bearer credential on every call.
    pub fn new(server_url: &str, token: Option<&str>) -> Result<Self, Error> {
        Self::with_timeouts(server_url, token, Timeouts::default())
    }

    /// Like [`Client::new`], with explicit request deadlines. A request
    /// that runs past them fails with a retryable [`Error::Http`].
    pub fn with_timeouts(
        server_url: &str,
        token: Option<&str>,
        timeouts: Timeouts,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|_| Error::InvalidToken)?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.request)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("{}{API_V1_PREFIX}", server_url.trim_end_matches('/')),
        })
    }

    /// Sets a custom API root (for testing).
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Sends a request and maps non-success statuses to [`Error`].
    async fn execute(&self, request: reqwest::RequestBuilder) -> Result<Vec<u8>, Error> {
        let resp = request.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "API call failed");
            return Err(Error::from_response(status, &body));
        }

        Ok(resp.bytes().await?.to_vec())
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Error> {
        let body = self.execute(request).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Asks whether identical content already exists so the file can be
    /// linked without transferring bytes.
    pub async fn check_fast_upload(
        &self,
        req: &CheckFastUploadRequest,
    ) -> Result<CheckFastUploadResponse, Error> {
        let request = self.http.post(self.url(CHECK_FAST_UPLOAD)).form(req);
        self.execute_json(request).await
    }

    /// Opens a transfer session, or reopens the one for the same content.
    pub async fn init_upload(
        &self,
        req: &InitUploadRequest,
        auto_rename: bool,
    ) -> Result<InitUploadResponse, Error> {
        let request = self
            .http
            .post(self.url(UPLOAD_INIT))
            .query(&[("auto_rename", auto_rename)])
            .json(req);
        self.execute_json(request).await
    }

    /// Uploads one chunk under a transfer session.
    pub async fn upload_chunk(
        &self,
        upload_id: &str,
        chunk_index: u64,
        data: Vec<u8>,
    ) -> Result<(), Error> {
        let form = Form::new()
            .text("upload_id", upload_id.to_string())
            .text("chunk_index", chunk_index.to_string())
            .part("file", Part::bytes(data).file_name(format!("chunk_{chunk_index}")));
        let request = self.http.post(self.url(UPLOAD_CHUNK)).multipart(form);
        self.execute(request).await?;
        Ok(())
    }

    /// Merges the uploaded chunks into a file entry.
    pub async fn merge_upload(&self, req: &MergeRequest) -> Result<FileMeta, Error> {
        let request = self.http.post(self.url(UPLOAD_MERGE)).form(req);
        self.execute_json(request).await
    }

    /// Moves a file to the trash.
    pub async fn delete_file(&self, file_id: i64) -> Result<(), Error> {
        let request = self.http.delete(self.url(&constants::file_path(file_id)));
        self.execute(request).await?;
        Ok(())
    }

    /// Restores a trashed file to where it was.
    pub async fn restore_file(&self, file_id: i64) -> Result<(), Error> {
        let request = self
            .http
            .post(self.url(&constants::trash_restore_path(file_id)));
        self.execute(request).await?;
        Ok(())
    }

    /// Permanently removes a trashed file.
    pub async fn purge_file(&self, file_id: i64) -> Result<(), Error> {
        let request = self.http.delete(self.url(&constants::trash_path(file_id)));
        self.execute(request).await?;
        Ok(())
    }
}
