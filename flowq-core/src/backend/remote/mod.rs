//! Remote backend: the three interfaces as thin stubs over the wire client.

mod connect;
mod queue;
mod queue_list;

pub use connect::RemoteConnect;
pub use queue::RemoteQueue;
pub use queue_list::RemoteQueueList;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::net::client::WireClient;

/// The transport channel shared by every stub of one connection. Calls are
/// serialised through the mutex.
pub(crate) type SharedClient = Arc<Mutex<WireClient>>;
