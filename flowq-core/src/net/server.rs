//! Service adapter: maps every wire request onto the queue-list / queue
//! contract, method for method.
//!
//! One task per client connection; requests on a connection are handled in
//! order. The adapter itself holds no state beyond the shared queue-list.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::{debug, info};

use crate::backend::QueueList;
use crate::error::{Error, Result, WireStatus};

use super::{decode, encode, Request, Response};

/// Accept clients forever, spawning one handler task per connection.
pub async fn serve(listener: TcpListener, list: Arc<dyn QueueList>) -> Result<()> {
    info!(addr = %listener.local_addr()?, "serving");
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "client connected");
        let list = Arc::clone(&list);
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, list).await {
                debug!(%peer, %err, "client connection ended");
            }
        });
    }
}

async fn handle_client(stream: TcpStream, list: Arc<dyn QueueList>) -> Result<()> {
    let mut framed = Framed::new(stream, LengthDelimitedCodec::new());

    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let responses = match decode::<Request>(&frame) {
            Ok(request) => dispatch(list.as_ref(), request).await,
            Err(err) => vec![error_response(&Error::invalid(format!(
                "undecodable request: {err}"
            )))],
        };
        for response in responses {
            framed.send(encode(&response)?).await?;
        }
    }
    Ok(())
}

fn error_response(err: &Error) -> Response {
    Response::Error {
        status: WireStatus::from(err),
        message: err.to_string(),
    }
}

fn unary(result: Result<Response>) -> Vec<Response> {
    match result {
        Ok(response) => vec![response],
        Err(err) => vec![error_response(&err)],
    }
}

async fn dispatch(list: &dyn QueueList, request: Request) -> Vec<Response> {
    match request {
        Request::CreateQueue { name } => {
            unary(list.create_queue(&name).await.map(|_| Response::Ok))
        }
        Request::ListQueue => unary(
            list.list_queue()
                .await
                .map(|names| Response::QueueNames { names }),
        ),
        Request::DeleteQueue { name } => {
            unary(list.delete_queue(&name).await.map(|_| Response::Ok))
        }
        Request::RenameQueue { old_name, new_name } => unary(
            list.rename_queue(&old_name, &new_name)
                .await
                .map(|_| Response::Ok),
        ),
        queue_request => dispatch_queue(list, queue_request).await,
    }
}

async fn dispatch_queue(list: &dyn QueueList, request: Request) -> Vec<Response> {
    let name = request
        .queue_name()
        .expect("list-level requests are handled in dispatch")
        .to_string();
    let queue = match list.get_queue(&name).await {
        Ok(queue) => queue,
        Err(err) => return vec![error_response(&err)],
    };

    let responses = match request {
        Request::ListPending { .. } => match queue.list_pending().await {
            Ok(ids) => stream_ids(ids),
            Err(err) => vec![error_response(&err)],
        },
        Request::ListFinished { .. } => match queue.list_finished().await {
            Ok(ids) => stream_ids(ids),
            Err(err) => vec![error_response(&err)],
        },
        Request::ReadCurrentOutput { .. } => match queue.read_current_output().await {
            Ok(chunks) => chunks
                .into_iter()
                .map(|data| Response::ChunkItem { data })
                .chain(std::iter::once(Response::EndOfStream))
                .collect(),
            Err(err) => vec![error_response(&err)],
        },
        Request::PendingDetails { id, .. } => unary(
            queue
                .pending_details(id)
                .await
                .map(|task| Response::Task { task }),
        ),
        Request::FinishedDetails { id, .. } => unary(
            queue
                .finished_details(id)
                .await
                .map(|task| Response::Task { task }),
        ),
        Request::ClearPending { .. } => {
            unary(queue.clear_pending().await.map(|_| Response::Ok))
        }
        Request::ClearFinished { .. } => {
            unary(queue.clear_finished().await.map(|_| Response::Ok))
        }
        Request::CurrentTask { .. } => unary(
            queue
                .current_task()
                .await
                .map(|task| Response::Task { task }),
        ),
        Request::AddTask { task, .. } => {
            unary(queue.add_task(task).await.map(|id| Response::TaskId { id }))
        }
        Request::RemoveTask { id, .. } => {
            unary(queue.remove_task(id).await.map(|_| Response::Ok))
        }
        Request::IsRunning { .. } => unary(
            queue
                .is_running()
                .await
                .map(|running| Response::Running { running }),
        ),
        Request::Start { .. } => unary(queue.start().await.map(|_| Response::Ok)),
        Request::Stop { .. } => unary(queue.stop().await.map(|_| Response::Ok)),
        Request::CreateQueue { .. }
        | Request::ListQueue
        | Request::DeleteQueue { .. }
        | Request::RenameQueue { .. } => unreachable!("handled in dispatch"),
    };

    list.return_queue(queue).await;
    responses
}

fn stream_ids(ids: Vec<i32>) -> Vec<Response> {
    ids.into_iter()
        .map(|id| Response::IdItem { id })
        .chain(std::iter::once(Response::EndOfStream))
        .collect()
}
