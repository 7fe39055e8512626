//! Wire client used by the remote backend.
//!
//! Every call — including the initial dial — runs under the RPC deadline.
//! A missed deadline surfaces as a timeout error and leaves the server-side
//! effect unknown, so non-idempotent operations must not be retried blindly.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::codec::{Framed, LengthDelimitedCodec};
use tracing::debug;

use crate::config::RPC_DEADLINE;
use crate::error::{Error, Result};

use super::{decode, encode, Request, Response};

/// A framed connection to a remote daemon. Calls are serialised by the
/// owner (the remote backend wraps this in an async mutex).
pub struct WireClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    deadline: Duration,
}

impl WireClient {
    /// Dial `target:port` under the deadline.
    pub async fn connect(target: &str, port: u16) -> Result<Self> {
        let stream = timeout(RPC_DEADLINE, TcpStream::connect((target, port)))
            .await
            .map_err(|_| Error::Timeout(format!("dialing {target}:{port}")))?
            .map_err(|err| Error::os(format!("failed to connect to {target}:{port}: {err}")))?;
        debug!(target, port, "connected");
        Ok(Self {
            framed: Framed::new(stream, LengthDelimitedCodec::new()),
            deadline: RPC_DEADLINE,
        })
    }

    async fn send(&mut self, request: &Request) -> Result<()> {
        let frame = encode(request)?;
        timeout(self.deadline, self.framed.send(frame))
            .await
            .map_err(|_| Error::Timeout("sending request".into()))?
            .map_err(|err| Error::os(format!("failed to send request: {err}")))
    }

    /// Next frame from the server; error frames become library errors.
    async fn recv(&mut self) -> Result<Response> {
        let frame = timeout(self.deadline, self.framed.next())
            .await
            .map_err(|_| Error::Timeout("waiting for response".into()))?
            .ok_or_else(|| Error::os("connection closed by server"))?
            .map_err(|err| Error::os(format!("failed to read response: {err}")))?;

        match decode::<Response>(&frame)? {
            Response::Error { status, message } => Err(status.into_error(message)),
            response => Ok(response),
        }
    }

    /// Single-response call.
    pub async fn unary(&mut self, request: Request) -> Result<Response> {
        self.send(&request).await?;
        self.recv().await
    }

    /// Streamed call: collect item frames until end-of-stream.
    pub async fn streamed(&mut self, request: Request) -> Result<Vec<Response>> {
        self.send(&request).await?;
        let mut items = Vec::new();
        loop {
            match self.recv().await? {
                Response::EndOfStream => return Ok(items),
                item => items.push(item),
            }
        }
    }
}
