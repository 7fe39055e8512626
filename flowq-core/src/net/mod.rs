//! Wire protocol between the remote backend and a daemon.
//!
//! One serde-encoded message per length-delimited frame over TCP. Every
//! operation is a single request; the response is either one frame or, for
//! the streaming operations (pending/finished listings and output chunks),
//! a sequence of item frames closed by `EndOfStream`. Errors travel as an
//! `Error` frame carrying the transport status and a short message.

pub mod client;
pub mod server;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{Result, WireStatus};
use crate::task::Task;

/// One remote procedure call. Queue-level operations name their queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    CreateQueue { name: String },
    ListQueue,
    DeleteQueue { name: String },
    RenameQueue { old_name: String, new_name: String },
    ListPending { name: String },
    ListFinished { name: String },
    PendingDetails { name: String, id: i32 },
    FinishedDetails { name: String, id: i32 },
    ClearPending { name: String },
    ClearFinished { name: String },
    CurrentTask { name: String },
    AddTask { name: String, task: Task },
    RemoveTask { name: String, id: i32 },
    IsRunning { name: String },
    ReadCurrentOutput { name: String },
    Start { name: String },
    Stop { name: String },
}

impl Request {
    /// The queue a queue-level request addresses; `None` for list-level
    /// operations.
    pub fn queue_name(&self) -> Option<&str> {
        match self {
            Request::CreateQueue { .. }
            | Request::ListQueue
            | Request::DeleteQueue { .. }
            | Request::RenameQueue { .. } => None,
            Request::ListPending { name }
            | Request::ListFinished { name }
            | Request::PendingDetails { name, .. }
            | Request::FinishedDetails { name, .. }
            | Request::ClearPending { name }
            | Request::ClearFinished { name }
            | Request::CurrentTask { name }
            | Request::AddTask { name, .. }
            | Request::RemoveTask { name, .. }
            | Request::IsRunning { name }
            | Request::ReadCurrentOutput { name }
            | Request::Start { name }
            | Request::Stop { name } => Some(name),
        }
    }
}

/// A single response frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    Ok,
    Error { status: WireStatus, message: String },
    QueueNames { names: Vec<String> },
    Task { task: Task },
    TaskId { id: i32 },
    Running { running: bool },
    /// One element of a streamed ID listing.
    IdItem { id: i32 },
    /// One element of a streamed output read.
    ChunkItem { data: Vec<u8> },
    /// Terminates a streamed response.
    EndOfStream,
}

pub(crate) fn encode<T: Serialize>(message: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec(message)?))
}

pub(crate) fn decode<T: for<'de> Deserialize<'de>>(frame: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(frame)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frames_round_trip() {
        let request = Request::AddTask {
            name: "q1".into(),
            task: Task::new("/bin/echo", vec!["hi".into()], "."),
        };
        let frame = encode(&request).unwrap();
        let decoded: Request = decode(&frame).unwrap();
        assert_eq!(decoded.queue_name(), Some("q1"));
    }

    #[test]
    fn test_chunk_bytes_survive_the_codec() {
        let response = Response::ChunkItem {
            data: vec![0, 155, 255, b'\n'],
        };
        let frame = encode(&response).unwrap();
        match decode::<Response>(&frame).unwrap() {
            Response::ChunkItem { data } => assert_eq!(data, vec![0, 155, 255, b'\n']),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_list_level_requests_have_no_queue() {
        assert!(Request::ListQueue.queue_name().is_none());
        assert!(Request::DeleteQueue { name: "x".into() }.queue_name().is_none());
    }
}
