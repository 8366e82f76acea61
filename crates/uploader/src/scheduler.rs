//! Bounded-parallelism admission of upload sessions.
//!
//! The scheduler is a single actor task. It owns the FIFO queue and the
//! active count; enqueue, withdraw and completion are handled one after
//! another on that task, so nothing else ever mutates them.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error};

use crate::error::UploadError;
use crate::session::{self, SessionContext};
use crate::task::UploadTask;
use crate::types::{TaskId, TaskStatus};

/// Queue depth and running sessions at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub active: usize,
    pub queued: usize,
}

enum Command {
    Enqueue(Arc<UploadTask>),
    /// Drops a task from the queue; replies whether it was queued.
    Withdraw(TaskId, oneshot::Sender<bool>),
    /// Replies once nothing is queued or running.
    WhenIdle(oneshot::Sender<()>),
}

/// Handle to the scheduler actor.
#[derive(Clone)]
pub(crate) struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
    stats: watch::Receiver<SchedulerStats>,
}

impl SchedulerHandle {
    /// Starts the actor. Must be called within a Tokio runtime.
    pub(crate) fn spawn(concurrency: usize, ctx: Arc<SessionContext>) -> Self {
        let (commands, command_rx) = mpsc::channel(256);
        let (done_tx, done_rx) = mpsc::channel(256);
        let (stats_tx, stats) = watch::channel(SchedulerStats::default());

        let scheduler = Scheduler {
            concurrency: concurrency.max(1),
            queue: VecDeque::new(),
            active: 0,
            ctx,
            done_tx,
            idle_waiters: Vec::new(),
            stats: stats_tx,
        };
        tokio::spawn(scheduler.run(command_rx, done_rx));

        Self { commands, stats }
    }

    pub(crate) async fn enqueue(&self, task: Arc<UploadTask>) -> Result<(), UploadError> {
        self.commands
            .send(Command::Enqueue(task))
            .await
            .map_err(|_| UploadError::EngineStopped)
    }

    pub(crate) async fn withdraw(&self, id: TaskId) -> Result<bool, UploadError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Withdraw(id, tx))
            .await
            .map_err(|_| UploadError::EngineStopped)?;
        rx.await.map_err(|_| UploadError::EngineStopped)
    }

    pub(crate) async fn wait_idle(&self) -> Result<(), UploadError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::WhenIdle(tx))
            .await
            .map_err(|_| UploadError::EngineStopped)?;
        rx.await.map_err(|_| UploadError::EngineStopped)
    }

    pub(crate) fn stats(&self) -> SchedulerStats {
        *self.stats.borrow()
    }
}

struct Scheduler {
    concurrency: usize,
    queue: VecDeque<Arc<UploadTask>>,
    active: usize,
    ctx: Arc<SessionContext>,
    done_tx: mpsc::Sender<TaskId>,
    idle_waiters: Vec<oneshot::Sender<()>>,
    stats: watch::Sender<SchedulerStats>,
}

impl Scheduler {
    async fn run(
        mut self,
        mut commands: mpsc::Receiver<Command>,
        mut done: mpsc::Receiver<TaskId>,
    ) {
        let mut open = true;
        loop {
            tokio::select! {
                cmd = commands.recv(), if open => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => open = false,
                },
                Some(id) = done.recv() => {
                    self.active = self.active.saturating_sub(1);
                    debug!(task = %id, active = self.active, "upload session finished");
                }
            }

            self.admit();
            self.publish();

            // Every handle is gone and the last session has reported back.
            if !open && self.active == 0 {
                break;
            }
        }
        debug!("scheduler stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue(task) => {
                debug!(task = %task.id, queued = self.queue.len() + 1, "task queued");
                self.queue.push_back(task);
            }
            Command::Withdraw(id, reply) => {
                let before = self.queue.len();
                self.queue.retain(|task| task.id != id);
                let _ = reply.send(self.queue.len() != before);
            }
            Command::WhenIdle(reply) => self.idle_waiters.push(reply),
        }
    }

    /// Starts queued tasks in FIFO order while slots are free.
    fn admit(&mut self) {
        while self.active < self.concurrency {
            let Some(task) = self.queue.pop_front() else {
                break;
            };
            if task.is_interrupted() || task.status() != TaskStatus::Queued {
                debug!(task = %task.id, "skipping task no longer waiting");
                continue;
            }

            self.active += 1;
            task.mark_running();
            debug!(task = %task.id, active = self.active, "admitting upload session");

            let ctx = self.ctx.clone();
            let done = self.done_tx.clone();
            tokio::spawn(async move {
                let id = task.id;
                let session = tokio::spawn({
                    let task = task.clone();
                    async move { session::run(&ctx, &task).await }
                });
                if let Err(e) = session.await {
                    error!(task = %id, error = %e, "upload session panicked");
                    task.fail("internal error");
                }
                task.mark_stopped();
                let _ = done.send(id).await;
            });
        }
    }

    fn publish(&mut self) {
        let stats = SchedulerStats {
            active: self.active,
            queued: self.queue.len(),
        };
        self.stats.send_replace(stats);

        if stats.active == 0 && stats.queued == 0 {
            for waiter in self.idle_waiters.drain(..) {
                let _ = waiter.send(());
            }
        }
    }
}
