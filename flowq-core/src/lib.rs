//! Flowq Core - Persistent Multi-Queue Task Runner
//!
//! Named queues of child-process jobs, persisted one SQLite file per queue,
//! executed one at a time through a pseudo-terminal so interactive tools
//! keep producing output. The same three interfaces (connection, queue-list,
//! queue) are reachable in-process, over a C-ABI handle registry and over a
//! framed TCP wire protocol served by the `flowqd` daemon.
//!
//! # Architecture:
//! - One supervisor and one reader thread per running task
//! - One stepper task per running queue driving the state machine
//! - Local and remote backends behind the same trait family

pub mod backend;
pub mod capi;
pub mod config;
pub mod error;
pub mod net;
pub mod proc;
pub mod registry;
pub mod store;
pub mod task;

pub use backend::local::{LocalConnect, LocalQueue, LocalQueueList};
pub use backend::remote::{RemoteConnect, RemoteQueue, RemoteQueueList};
pub use backend::{BackendKind, Connect, Queue, QueueList};
pub use error::{Error, Result};
pub use proc::{running_as_super_user, ExitStatus, OutputWindow, Supervisor};
pub use registry::{Handle, Registry};
pub use task::Task;

use tracing::info;

/// Install the tracing subscriber for binaries. Safe to call more than
/// once; later calls are no-ops.
pub fn init() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if tracing_subscriber::fmt().with_env_filter(filter).try_init().is_ok() {
        info!("flowq core v{}", env!("CARGO_PKG_VERSION"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
