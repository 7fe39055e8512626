//! Remote queue stub: carries only its name and the shared channel.

use async_trait::async_trait;

use crate::backend::{BackendKind, Queue};
use crate::error::{Error, Result};
use crate::net::{Request, Response};
use crate::task::Task;

use super::SharedClient;

pub struct RemoteQueue {
    name: String,
    client: SharedClient,
}

impl RemoteQueue {
    pub(crate) fn new(name: String, client: SharedClient) -> Self {
        Self { name, client }
    }

    async fn unary_ok(&self, request: Request) -> Result<()> {
        let mut client = self.client.lock().await;
        client.unary(request).await?;
        Ok(())
    }

    async fn unary_task(&self, request: Request) -> Result<Task> {
        let mut client = self.client.lock().await;
        match client.unary(request).await? {
            Response::Task { task } => Ok(task),
            other => Err(Error::os(format!("unexpected response: {other:?}"))),
        }
    }

    async fn streamed_ids(&self, request: Request) -> Result<Vec<i32>> {
        let mut client = self.client.lock().await;
        let items = client.streamed(request).await?;
        items
            .into_iter()
            .map(|item| match item {
                Response::IdItem { id } => Ok(id),
                other => Err(Error::os(format!("unexpected stream item: {other:?}"))),
            })
            .collect()
    }
}

#[async_trait]
impl Queue for RemoteQueue {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn backend(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn list_pending(&self) -> Result<Vec<i32>> {
        self.streamed_ids(Request::ListPending {
            name: self.name.clone(),
        })
        .await
    }

    async fn list_finished(&self) -> Result<Vec<i32>> {
        self.streamed_ids(Request::ListFinished {
            name: self.name.clone(),
        })
        .await
    }

    async fn pending_details(&self, id: i32) -> Result<Task> {
        self.unary_task(Request::PendingDetails {
            name: self.name.clone(),
            id,
        })
        .await
    }

    async fn finished_details(&self, id: i32) -> Result<Task> {
        self.unary_task(Request::FinishedDetails {
            name: self.name.clone(),
            id,
        })
        .await
    }

    async fn clear_pending(&self) -> Result<()> {
        self.unary_ok(Request::ClearPending {
            name: self.name.clone(),
        })
        .await
    }

    async fn clear_finished(&self) -> Result<()> {
        self.unary_ok(Request::ClearFinished {
            name: self.name.clone(),
        })
        .await
    }

    async fn current_task(&self) -> Result<Task> {
        self.unary_task(Request::CurrentTask {
            name: self.name.clone(),
        })
        .await
    }

    async fn add_task(&self, task: Task) -> Result<i32> {
        let mut client = self.client.lock().await;
        match client
            .unary(Request::AddTask {
                name: self.name.clone(),
                task,
            })
            .await?
        {
            Response::TaskId { id } => Ok(id),
            other => Err(Error::os(format!("unexpected response: {other:?}"))),
        }
    }

    async fn remove_task(&self, id: i32) -> Result<()> {
        self.unary_ok(Request::RemoveTask {
            name: self.name.clone(),
            id,
        })
        .await
    }

    async fn is_running(&self) -> Result<bool> {
        let mut client = self.client.lock().await;
        match client
            .unary(Request::IsRunning {
                name: self.name.clone(),
            })
            .await?
        {
            Response::Running { running } => Ok(running),
            other => Err(Error::os(format!("unexpected response: {other:?}"))),
        }
    }

    async fn read_current_output(&self) -> Result<Vec<Vec<u8>>> {
        let mut client = self.client.lock().await;
        let items = client
            .streamed(Request::ReadCurrentOutput {
                name: self.name.clone(),
            })
            .await?;
        items
            .into_iter()
            .map(|item| match item {
                Response::ChunkItem { data } => Ok(data),
                other => Err(Error::os(format!("unexpected stream item: {other:?}"))),
            })
            .collect()
    }

    async fn start(&self) -> Result<()> {
        self.unary_ok(Request::Start {
            name: self.name.clone(),
        })
        .await
    }

    async fn stop(&self) -> Result<()> {
        self.unary_ok(Request::Stop {
            name: self.name.clone(),
        })
        .await
    }
}
