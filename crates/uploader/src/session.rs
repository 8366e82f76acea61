//! Per-file upload state machine.
//!
//! `Hash → Check → (fast done | Init → Chunks → Merge) → Success`.
//!
//! A whole attempt is retried with exponential backoff on transient
//! errors. A name collision is not an error: the step that hit it is
//! repeated after the resolver answers, without using up an attempt.
//! A pause or cancel aborts the in-flight call or backoff wait and ends
//! the session without touching the task's visible state; the registry
//! owns that.

use std::collections::BTreeSet;
use std::sync::Arc;

use skydrive_protocol::{CheckFastUploadRequest, FileMeta, InitUploadRequest, MergeRequest};
use skydrive_transfer::{
    ChunkHasher, ChunkPlan, ChunkReader, SpeedCalculator, format_rate, validate_file_name,
    validate_relative_path,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::conflict::ConflictResolver;
use crate::error::UploadError;
use crate::remote::{RemoteFuture, RemoteStore};
use crate::replace::{ReplacementGuard, RollbackOutcome};
use crate::task::UploadTask;
use crate::types::{ConflictAction, EngineConfig, TaskStatus};

/// Collisions tolerated on a single step before giving up.
const MAX_STEP_REPEATS: u32 = 8;

/// Shared by every session of one engine.
pub(crate) struct SessionContext {
    pub(crate) remote: Arc<dyn RemoteStore>,
    pub(crate) resolver: Arc<ConflictResolver>,
    pub(crate) guard: ReplacementGuard,
    pub(crate) config: EngineConfig,
}

enum Completion {
    /// Identical content was already stored; nothing transferred.
    FastUploaded,
    Uploaded(FileMeta),
    Skipped,
}

/// What to do after a collision was resolved.
enum Flow {
    Repeat,
    Skip,
}

/// Runs one admission of `task` to completion or interruption.
pub(crate) async fn run(ctx: &SessionContext, task: &UploadTask) {
    UploadSession {
        ctx,
        task,
        cancel: task.cancel_token(),
        digest: None,
    }
    .run()
    .await
}

struct UploadSession<'a> {
    ctx: &'a SessionContext,
    task: &'a UploadTask,
    cancel: CancellationToken,
    /// Kept across attempts; the source does not change.
    digest: Option<String>,
}

impl UploadSession<'_> {
    async fn run(mut self) {
        if let Err(e) = self.validate() {
            self.finish_failed(e).await;
            return;
        }

        let max_attempts = self.ctx.config.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(task = %self.task.id, attempt, "starting upload attempt");

            match self.attempt().await {
                Ok(completion) => {
                    self.finish_completed(completion).await;
                    return;
                }
                Err(UploadError::Interrupted) => {
                    debug!(task = %self.task.id, "upload session interrupted");
                    return;
                }
                // The failure was most likely caused by the interruption.
                Err(_) if self.task.is_interrupted() => return,
                Err(e) if !e.is_retryable() || attempt >= max_attempts => {
                    self.finish_failed(e).await;
                    return;
                }
                Err(e) => {
                    let delay = self.ctx.config.retry.delay_for_attempt(attempt);
                    warn!(
                        task = %self.task.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "upload attempt failed, retrying"
                    );
                    self.task.set_message(format!(
                        "Attempt {attempt} failed ({}), retrying in {:.1}s",
                        e.user_message(),
                        delay.as_secs_f64()
                    ));

                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn validate(&self) -> Result<(), UploadError> {
        validate_file_name(&self.task.source.name)?;
        if let Some(relative_path) = &self.task.source.relative_path {
            validate_relative_path(relative_path)?;
        }
        Ok(())
    }

    async fn attempt(&mut self) -> Result<Completion, UploadError> {
        let digest = self.digest().await?;
        let task = self.task;
        let source = &task.source;

        // Check
        let mut repeats = 0;
        let check = loop {
            self.checkpoint()?;
            self.task
                .set_status(TaskStatus::Checking, "Checking for identical content");
            let req = CheckFastUploadRequest {
                file_hash: digest.clone(),
                file_name: source.name.clone(),
                parent_id: source.parent_id,
                relative_path: source.relative_path.clone(),
                auto_rename: self.task.auto_rename(),
            };
            match self.call(self.ctx.remote.check_fast_upload(&req)).await {
                Ok(resp) => break resp,
                Err(e) => match self.on_error(e, &mut repeats).await? {
                    Flow::Repeat => continue,
                    Flow::Skip => return Ok(Completion::Skipped),
                },
            }
        };
        if check.can_fast_upload {
            return Ok(Completion::FastUploaded);
        }

        // Init
        let plan = ChunkPlan::new(source.size, self.ctx.config.chunk_size);
        debug!(
            task = %self.task.id,
            chunk_size = plan.chunk_size(),
            total_chunks = plan.total_chunks(),
            "upload planned"
        );
        let mut repeats = 0;
        let init = loop {
            self.checkpoint()?;
            self.task
                .set_status(TaskStatus::Uploading, "Preparing upload");
            let req = InitUploadRequest {
                file_hash: digest.clone(),
                file_size: source.size,
                file_name: source.name.clone(),
                parent_id: source.parent_id,
                total_chunks: plan.total_chunks(),
                relative_path: source.relative_path.clone(),
            };
            match self
                .call(self.ctx.remote.init_upload(&req, self.task.auto_rename()))
                .await
            {
                Ok(resp) => break resp,
                Err(e) => match self.on_error(e, &mut repeats).await? {
                    Flow::Repeat => continue,
                    Flow::Skip => return Ok(Completion::Skipped),
                },
            }
        };

        let (received, rejected) = plan.received_set(&init.uploaded_chunks);
        if !rejected.is_empty() {
            warn!(
                task = %self.task.id,
                ?rejected,
                total_chunks = plan.total_chunks(),
                "server reported chunk indices outside the plan, ignoring"
            );
        }
        debug!(
            task = %self.task.id,
            upload_id = %init.upload_id,
            total_chunks = plan.total_chunks(),
            already_received = received.len(),
            "transfer session open"
        );

        self.upload_chunks(plan, &init.upload_id, &received).await?;

        // Merge
        let mut repeats = 0;
        let meta = loop {
            self.checkpoint()?;
            self.task.set_status(TaskStatus::Merging, "Merging chunks");
            let req = MergeRequest {
                upload_id: init.upload_id.clone(),
                file_name: source.name.clone(),
                file_hash: digest.clone(),
                parent_id: source.parent_id,
                relative_path: source.relative_path.clone(),
                auto_rename: self.task.auto_rename(),
            };
            match self.call(self.ctx.remote.merge_upload(&req)).await {
                Ok(meta) => break meta,
                Err(e) => match self.on_error(e, &mut repeats).await? {
                    Flow::Repeat => continue,
                    Flow::Skip => return Ok(Completion::Skipped),
                },
            }
        };

        Ok(Completion::Uploaded(meta))
    }

    async fn digest(&mut self) -> Result<String, UploadError> {
        if let Some(digest) = &self.digest {
            return Ok(digest.clone());
        }
        self.checkpoint()?;
        self.task
            .set_status(TaskStatus::Hashing, "Computing checksum");

        let task = self.task;
        let hasher = ChunkHasher::new(self.ctx.config.hash_block_size);
        debug!(task = %task.id, block_size = hasher.block_size(), "hashing source");
        let digest = hasher
            .digest_file(
                &task.source.path,
                || task.is_interrupted(),
                |percent| task.set_message(format!("Computing checksum {percent}%")),
            )
            .await?;

        debug!(task = %task.id, %digest, "checksum computed");
        self.digest = Some(digest.clone());
        Ok(digest)
    }

    /// Sends the chunks the server does not have yet, in ascending order.
    async fn upload_chunks(
        &self,
        plan: ChunkPlan,
        upload_id: &str,
        received: &BTreeSet<u64>,
    ) -> Result<(), UploadError> {
        let total = plan.total_chunks();
        let pending: Vec<u64> = plan.pending(received).collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mut done = total - pending.len() as u64;
        self.task.set_progress(
            chunk_percent(done, total),
            format!("Uploading {done}/{total} chunks"),
        );

        let mut reader = ChunkReader::open(&self.task.source.path, plan).await?;
        let speed = SpeedCalculator::default();
        speed.add_sample(0);

        for index in pending {
            self.checkpoint()?;
            let data = reader.read_chunk(index).await?;
            let len = data.len() as u64;

            self.call(self.ctx.remote.upload_chunk(upload_id, index, data))
                .await?;

            done += 1;
            speed.add_sample(len);
            self.task.set_progress(
                chunk_percent(done, total),
                format!(
                    "Uploading {done}/{total} chunks · {}",
                    format_rate(speed.bytes_per_second())
                ),
            );
        }
        Ok(())
    }

    /// Routes a collision through the resolver; returns any other error.
    async fn on_error(&self, err: UploadError, repeats: &mut u32) -> Result<Flow, UploadError> {
        let (file_id, message) = match err {
            UploadError::Api(skydrive_api::Error::Conflict { file_id, message }) => {
                (file_id, message)
            }
            other => return Err(other),
        };

        *repeats += 1;
        if *repeats > MAX_STEP_REPEATS {
            return Err(UploadError::ConflictLoop(MAX_STEP_REPEATS));
        }
        let Some(file_id) = file_id else {
            warn!(task = %self.task.id, %message, "conflict without a file id");
            return Err(UploadError::UnidentifiedConflict);
        };
        info!(task = %self.task.id, file_id, %message, "name conflict");

        let decision = self
            .ctx
            .resolver
            .resolve(self.task, file_id, &self.cancel)
            .await?;

        match decision.action {
            ConflictAction::Skip => Ok(Flow::Skip),
            ConflictAction::Rename => {
                self.task.enable_auto_rename();
                Ok(Flow::Repeat)
            }
            ConflictAction::Replace => {
                self.checkpoint()?;
                self.ctx.guard.replace(self.task, file_id).await?;
                Ok(Flow::Repeat)
            }
        }
    }

    /// Runs a remote call, aborting it if the task is cancelled.
    async fn call<T>(&self, fut: RemoteFuture<'_, T>) -> Result<T, UploadError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Interrupted),
            result = fut => result.map_err(UploadError::from),
        }
    }

    fn checkpoint(&self) -> Result<(), UploadError> {
        if self.task.is_interrupted() {
            Err(UploadError::Interrupted)
        } else {
            Ok(())
        }
    }

    async fn finish_completed(&self, completion: Completion) {
        match completion {
            Completion::FastUploaded => {
                self.ctx.guard.commit(self.task).await;
                info!(task = %self.task.id, name = %self.task.source.name, "instant upload complete");
                self.task
                    .succeed("Instant upload: identical content already stored");
            }
            Completion::Uploaded(meta) => {
                self.ctx.guard.commit(self.task).await;
                info!(
                    task = %self.task.id,
                    file_id = meta.id,
                    name = %meta.file_name,
                    "upload complete"
                );
                if meta.file_name == self.task.source.name {
                    self.task.succeed("Upload complete");
                } else {
                    self.task
                        .succeed(format!("Upload complete, saved as \"{}\"", meta.file_name));
                }
            }
            Completion::Skipped => {
                // Nothing new was stored, so a file trashed earlier comes back.
                let outcome = self.ctx.guard.rollback(self.task).await;
                info!(task = %self.task.id, ?outcome, "upload skipped");
                self.task
                    .succeed("Skipped: a file with this name already exists");
            }
        }
    }

    async fn finish_failed(&self, err: UploadError) {
        let reason = err.user_message();
        let message = match self.ctx.guard.rollback(self.task).await {
            RollbackOutcome::Nothing => reason,
            RollbackOutcome::Restored => {
                format!("{reason} (upload failed, original file restored)")
            }
            RollbackOutcome::RestoreFailed => {
                format!("{reason} (upload failed, restoration also failed)")
            }
        };
        error!(task = %self.task.id, name = %self.task.source.name, error = %err, "upload failed");
        self.task.fail(message);
    }
}

/// Chunk-count progress, held below 100 until the merge succeeds.
fn chunk_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (done * 100 / total).min(99) as u8
}
