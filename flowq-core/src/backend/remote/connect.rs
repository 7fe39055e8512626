//! Remote connection: a transport channel to `(host, port)`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backend::{BackendKind, Connect, QueueList};
use crate::error::{Error, Result};
use crate::net::client::WireClient;

use super::{RemoteQueueList, SharedClient};

/// Capability token for the remote backend. The channel is established
/// exactly once by a successful `start_connect`.
pub struct RemoteConnect {
    client: StdMutex<Option<SharedClient>>,
}

impl RemoteConnect {
    pub fn new() -> Self {
        Self {
            client: StdMutex::new(None),
        }
    }

    fn channel(&self) -> Result<SharedClient> {
        self.client
            .lock()
            .expect("connect lock poisoned")
            .clone()
            .ok_or_else(|| Error::invalid("connection is not established"))
    }
}

impl Default for RemoteConnect {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connect for RemoteConnect {
    async fn start_connect(&self, target: &str, port: u16) -> Result<()> {
        if target.is_empty() {
            return Err(Error::invalid("target host must not be empty"));
        }
        if self.client.lock().expect("connect lock poisoned").is_some() {
            return Err(Error::invalid("connection is already established"));
        }

        let client = WireClient::connect(target, port).await?;
        *self.client.lock().expect("connect lock poisoned") = Some(Arc::new(Mutex::new(client)));
        Ok(())
    }

    async fn open_queue_list(&self) -> Result<Arc<dyn QueueList>> {
        Ok(Arc::new(RemoteQueueList::new(self.channel()?)))
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Remote
    }

    fn target_path(&self) -> Option<PathBuf> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_list_requires_established_channel() {
        let conn = RemoteConnect::new();
        assert!(conn.open_queue_list().await.is_err());
        assert_eq!(conn.backend(), BackendKind::Remote);
        assert!(conn.target_path().is_none());
    }

    #[tokio::test]
    async fn test_start_connect_rejects_empty_host() {
        let conn = RemoteConnect::new();
        assert!(matches!(
            conn.start_connect("", 9000).await,
            Err(Error::InvalidArgument(_))
        ));
    }
}
