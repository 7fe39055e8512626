//! Remote queue-list: every operation is one request on the channel.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::backend::{BackendKind, Queue, QueueList};
use crate::error::{Error, Result};
use crate::net::{Request, Response};

use super::{RemoteQueue, SharedClient};

pub struct RemoteQueueList {
    client: SharedClient,
}

impl RemoteQueueList {
    pub(crate) fn new(client: SharedClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl QueueList for RemoteQueueList {
    async fn create_queue(&self, name: &str) -> Result<()> {
        let mut client = self.client.lock().await;
        client
            .unary(Request::CreateQueue { name: name.into() })
            .await?;
        Ok(())
    }

    async fn list_queue(&self) -> Result<Vec<String>> {
        let mut client = self.client.lock().await;
        match client.unary(Request::ListQueue).await? {
            Response::QueueNames { names } => Ok(names),
            other => Err(Error::os(format!("unexpected response: {other:?}"))),
        }
    }

    async fn delete_queue(&self, name: &str) -> Result<()> {
        let mut client = self.client.lock().await;
        client
            .unary(Request::DeleteQueue { name: name.into() })
            .await?;
        Ok(())
    }

    async fn rename_queue(&self, old_name: &str, new_name: &str) -> Result<()> {
        let mut client = self.client.lock().await;
        client
            .unary(Request::RenameQueue {
                old_name: old_name.into(),
                new_name: new_name.into(),
            })
            .await?;
        Ok(())
    }

    async fn get_queue(&self, name: &str) -> Result<Arc<dyn Queue>> {
        if name.is_empty() {
            return Err(Error::invalid("queue name must not be empty"));
        }
        // A lightweight stub; the server resolves the name on every call.
        Ok(Arc::new(RemoteQueue::new(
            name.to_string(),
            Arc::clone(&self.client),
        )))
    }

    async fn return_queue(&self, queue: Arc<dyn Queue>) {
        debug!(queue = %queue.name(), "queue stub released");
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Remote
    }
}
