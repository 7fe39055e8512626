//! The three polymorphic interface families and their two variants.
//!
//! A connection points at where state lives, a queue-list manages named
//! queues, and a queue runs tasks. Each family is a trait with exactly two
//! implementations: the local backend (embedded store + supervisor) and the
//! remote backend (stubs over the wire client). Callers route through
//! `Arc<dyn …>` objects; the handle registry keeps the family and variant
//! tags for the C-ABI.

pub mod local;
pub mod remote;

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::task::Task;

/// Which concrete variant an interface object belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded per-queue SQLite store in a local data directory.
    Local,
    /// Thin client forwarding every operation to a remote daemon.
    Remote,
}

/// A capability naming where state lives: a validated data directory for
/// the local backend, a transport channel for the remote one. Immutable
/// once `start_connect` has succeeded.
#[async_trait]
pub trait Connect: Send + Sync {
    /// Bind the connection. Local: `target` is the data directory and the
    /// port is ignored. Remote: dials `target:port` under the RPC deadline.
    async fn start_connect(&self, target: &str, port: u16) -> Result<()>;

    /// Build the queue-list matching this connection's variant.
    async fn open_queue_list(&self) -> Result<Arc<dyn QueueList>>;

    fn backend(&self) -> BackendKind;

    /// The bound data directory; `None` for the remote variant.
    fn target_path(&self) -> Option<PathBuf>;
}

/// Discovery and lifecycle of the named queues behind a connection.
#[async_trait]
pub trait QueueList: Send + Sync {
    async fn create_queue(&self, name: &str) -> Result<()>;

    /// All queue names, sorted.
    async fn list_queue(&self) -> Result<Vec<String>>;

    /// Remove the queue and its backing store. Retrying a successful delete
    /// reports not-found.
    async fn delete_queue(&self, name: &str) -> Result<()>;

    async fn rename_queue(&self, old_name: &str, new_name: &str) -> Result<()>;

    /// Shared reference to a queue; pair with [`return_queue`](Self::return_queue).
    async fn get_queue(&self, name: &str) -> Result<Arc<dyn Queue>>;

    /// Release a reference from [`get_queue`](Self::get_queue). A no-op for
    /// the local backend, which retains ownership of its queues.
    async fn return_queue(&self, queue: Arc<dyn Queue>);

    fn backend(&self) -> BackendKind;
}

/// A named, persistent FIFO of tasks running at most one child at a time.
#[async_trait]
pub trait Queue: Send + Sync {
    fn name(&self) -> String;

    fn backend(&self) -> BackendKind;

    /// Pending task IDs in insertion order, excluding the running task.
    async fn list_pending(&self) -> Result<Vec<i32>>;

    /// Finished task IDs in completion order.
    async fn list_finished(&self) -> Result<Vec<i32>>;

    async fn pending_details(&self, id: i32) -> Result<Task>;

    async fn finished_details(&self, id: i32) -> Result<Task>;

    async fn clear_pending(&self) -> Result<()>;

    async fn clear_finished(&self) -> Result<()>;

    /// The running task, or not-found when the queue is idle.
    async fn current_task(&self) -> Result<Task>;

    /// Enqueue a task, assigning and returning a fresh monotonic ID.
    async fn add_task(&self, task: Task) -> Result<i32>;

    /// Remove a pending task; running, finished or unknown IDs are not-found.
    async fn remove_task(&self, id: i32) -> Result<()>;

    async fn is_running(&self) -> Result<bool>;

    /// Drain the sliding output window of the running task; empty when idle.
    async fn read_current_output(&self) -> Result<Vec<Vec<u8>>>;

    /// Move the queue from idle to running if any task is pending.
    async fn start(&self) -> Result<()>;

    /// Force-kill the running task; pending tasks are left untouched.
    async fn stop(&self) -> Result<()>;
}
