//! The per-queue engine: pending list → current task → finished list.
//!
//! All state transitions happen under one per-queue async mutex. While a
//! task occupies the running slot a stepper task polls the supervisor; on
//! termination it records the finished row, deletes the pending row, empties
//! the output window and either auto-advances or goes idle. The running
//! task's pending row stays in the store until it finishes, so a crashed
//! process restarts with the task back at the head of pending.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::{BackendKind, Queue};
use crate::config::{STEP_INTERVAL, STOP_POLL_INTERVAL, STOP_WAIT};
use crate::error::{Error, Result};
use crate::proc::{ExitStatus, Supervisor};
use crate::store::TaskStore;
use crate::task::Task;

struct Inner {
    store: TaskStore,
    supervisor: Supervisor,
    current: Option<Task>,
    next_id: i32,
    /// Set by `stop`: the stepper records the killed task and goes idle
    /// instead of advancing into the next pending task.
    stopping: bool,
}

/// Local queue over one backing store and one supervisor.
pub struct LocalQueue {
    name: StdMutex<String>,
    closed: AtomicBool,
    inner: Mutex<Inner>,
    weak: Weak<LocalQueue>,
}

impl LocalQueue {
    /// Open the queue's store under `dir` and seed the ID counter from the
    /// persisted watermark, which outlives every row ever cleared.
    pub async fn open(dir: &Path, name: &str) -> Result<Arc<Self>> {
        let mut store = TaskStore::open(dir, name).await?;
        let next_id = store.last_issued_id().await?.checked_add(1).ok_or_else(|| {
            Error::os(format!("queue {name} exhausted its task ID space"))
        })?;
        let mut supervisor = Supervisor::new();
        supervisor.init()?;

        Ok(Arc::new_cyclic(|weak| Self {
            name: StdMutex::new(name.to_string()),
            closed: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                store,
                supervisor,
                current: None,
                next_id,
                stopping: false,
            }),
            weak: weak.clone(),
        }))
    }

    /// Rename the backing store; the caller (queue-list) updates its map.
    pub(super) async fn rename(&self, new_name: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.store.rename(new_name).await?;
        *self.name.lock().expect("queue name lock poisoned") = new_name.to_string();
        Ok(())
    }

    /// Current backing-store path.
    pub(super) async fn store_file(&self) -> PathBuf {
        self.inner.lock().await.store.path().to_path_buf()
    }

    /// Kill the running task and mark the queue closed so a live stepper
    /// exits instead of advancing. Used by queue deletion.
    pub(super) async fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut inner = self.inner.lock().await;
        let was_running = inner.current.take().is_some();
        if was_running {
            inner.supervisor.kill();
        }
        drop(inner);
        if was_running {
            self.wait_for_exit().await;
        }
    }

    /// Bounded wait for a killed child to disappear. Re-acquires the queue
    /// lock only for each non-blocking reap, so concurrent operations and
    /// the runtime stay responsive while waiting.
    async fn wait_for_exit(&self) {
        let deadline = Instant::now() + STOP_WAIT;
        loop {
            {
                let mut inner = self.inner.lock().await;
                if !inner.supervisor.is_running() {
                    return;
                }
            }
            if Instant::now() >= deadline {
                warn!("child survived the forced kill past the stop wait");
                return;
            }
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }
    }

    /// Move the head of pending into the running slot and spawn it. Returns
    /// false when pending is empty. On spawn failure the running slot stays
    /// empty and the task keeps its place at the head of pending.
    async fn start_next(inner: &mut Inner) -> Result<bool> {
        let pending = inner.store.list_pending().await?;
        let Some(head) = pending.first().copied() else {
            return Ok(false);
        };
        let task = inner
            .store
            .pending_details(head)
            .await?
            .ok_or_else(|| Error::os(format!("pending row {head} vanished")))?;

        inner.supervisor.init()?;
        inner.supervisor.start(&task)?;
        info!(id = task.id, exec = %task.exec_name, "task started");
        inner.current = Some(task);
        Ok(true)
    }

    /// Poll the supervisor until the running slot empties out, finishing
    /// tasks and auto-advancing through pending.
    fn spawn_stepper(&self) {
        let Some(queue) = self.weak.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(STEP_INTERVAL).await;
                let mut inner = queue.inner.lock().await;

                if queue.closed.load(Ordering::SeqCst) || inner.current.is_none() {
                    break;
                }
                if inner.supervisor.is_running() {
                    continue;
                }

                let status = inner
                    .supervisor
                    .exit_status()
                    .unwrap_or(ExitStatus::Exited(1));
                let mut task = inner.current.take().expect("running slot checked above");
                task.exit_code = status.code();
                task.is_success = status.success();
                info!(
                    id = task.id,
                    exit_code = task.exit_code,
                    success = task.is_success,
                    "task finished"
                );

                if let Err(err) = inner.store.insert_finished(&task).await {
                    error!(id = task.id, %err, "failed to record finished task");
                    break;
                }
                if let Err(err) = inner.store.remove_pending(task.id).await {
                    error!(id = task.id, %err, "failed to drop pending row");
                    break;
                }
                inner.supervisor.clear_output();

                if inner.stopping {
                    inner.stopping = false;
                    break;
                }
                match LocalQueue::start_next(&mut inner).await {
                    Ok(true) => {}
                    Ok(false) => break,
                    Err(err) => {
                        error!(%err, "failed to start next task");
                        break;
                    }
                }
            }
            debug!("stepper idle");
        });
    }
}

#[async_trait]
impl Queue for LocalQueue {
    fn name(&self) -> String {
        self.name.lock().expect("queue name lock poisoned").clone()
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Local
    }

    async fn list_pending(&self) -> Result<Vec<i32>> {
        let mut inner = self.inner.lock().await;
        let mut ids = inner.store.list_pending().await?;
        if let Some(current) = &inner.current {
            let running = current.id;
            ids.retain(|id| *id != running);
        }
        Ok(ids)
    }

    async fn list_finished(&self) -> Result<Vec<i32>> {
        self.inner.lock().await.store.list_finished().await
    }

    async fn pending_details(&self, id: i32) -> Result<Task> {
        let mut inner = self.inner.lock().await;
        if inner.current.as_ref().is_some_and(|task| task.id == id) {
            return Err(Error::not_found(format!("task {id} is running")));
        }
        inner
            .store
            .pending_details(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("no pending task {id}")))
    }

    async fn finished_details(&self, id: i32) -> Result<Task> {
        self.inner
            .lock()
            .await
            .store
            .finished_details(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("no finished task {id}")))
    }

    async fn clear_pending(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let keep = inner.current.as_ref().map(|task| task.id);
        inner.store.clear_pending_except(keep).await
    }

    async fn clear_finished(&self) -> Result<()> {
        self.inner.lock().await.store.clear_finished().await
    }

    async fn current_task(&self) -> Result<Task> {
        self.inner
            .lock()
            .await
            .current
            .clone()
            .ok_or_else(|| Error::not_found("no task is running"))
    }

    async fn add_task(&self, mut task: Task) -> Result<i32> {
        if task.exec_name.is_empty() {
            return Err(Error::invalid("executable name must not be empty"));
        }

        let mut inner = self.inner.lock().await;
        task.id = inner.next_id;
        task.exit_code = 0;
        task.is_success = false;
        // The in-memory counter only advances once the row is durable.
        inner.store.insert_pending(&task).await?;
        inner.next_id += 1;
        debug!(id = task.id, exec = %task.exec_name, "task enqueued");
        Ok(task.id)
    }

    async fn remove_task(&self, id: i32) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.current.as_ref().is_some_and(|task| task.id == id) {
            return Err(Error::not_found(format!("task {id} is running")));
        }
        if inner.store.remove_pending(id).await? {
            Ok(())
        } else {
            Err(Error::not_found(format!("no pending task {id}")))
        }
    }

    async fn is_running(&self) -> Result<bool> {
        Ok(self.inner.lock().await.current.is_some())
    }

    async fn read_current_output(&self) -> Result<Vec<Vec<u8>>> {
        let inner = self.inner.lock().await;
        if inner.current.is_none() {
            return Ok(Vec::new());
        }
        Ok(inner.supervisor.read_current_output())
    }

    async fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.current.is_some() {
            debug!("queue is already running");
            return Ok(());
        }
        inner.stopping = false;
        if LocalQueue::start_next(&mut inner).await? {
            self.spawn_stepper();
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if inner.current.is_none() {
            return Ok(());
        }
        inner.stopping = true;
        inner.supervisor.kill();
        drop(inner);
        // Bounded wait with the lock released between reaps; the stepper
        // observes the termination and records the task.
        self.wait_for_exit().await;
        Ok(())
    }
}
