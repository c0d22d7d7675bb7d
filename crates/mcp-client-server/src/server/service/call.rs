//! The unit of work that flows through the middleware pipeline.
//!
//! A server-streaming RPC has no single response value, so the pipeline
//! carries the outbound stream inside the call instead. Each stage receives a
//! [`Call`] and resolves to a [`StreamSummary`] once the handler has finished
//! writing, which lets outer stages observe the true outcome of the stream.

use mcp_client_core::{Error, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Per-call metadata shared by every pipeline stage.
#[derive(Debug, Clone)]
pub struct CallContext {
    procedure: &'static str,
    cancel: CancellationToken,
}

impl CallContext {
    pub fn new(procedure: &'static str, cancel: CancellationToken) -> Self {
        Self { procedure, cancel }
    }

    /// Fully qualified RPC path, e.g. `/mcpclient.v1.McpClientService/SendMessage`.
    pub fn procedure(&self) -> &'static str {
        self.procedure
    }

    /// Fires when the client goes away or the service shuts down.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Write half of a server-streamed response.
#[derive(Debug)]
pub struct ServerStream<T> {
    tx: mpsc::Sender<core::result::Result<T, Status>>,
}

impl<T> Clone for ServerStream<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ServerStream<T> {
    /// Creates a bounded stream and the receiver that feeds the transport.
    pub fn channel(buffer: usize) -> (Self, mpsc::Receiver<core::result::Result<T, Status>>) {
        let (tx, rx) = mpsc::channel(buffer);
        (Self { tx }, rx)
    }

    /// Delivers one message, waiting for buffer space if the client is slow.
    ///
    /// # Errors
    ///
    /// [`Error::ChannelError`] once the receiving side is gone.
    pub async fn send(&self, message: T) -> Result<()> {
        self.tx
            .send(Ok(message))
            .await
            .map_err(|_| Error::ChannelError {
                context: "client disconnected before the response was delivered".to_string(),
            })
    }

    /// Terminates the stream with `status`. Best effort: a client that has
    /// already left never sees it.
    pub async fn fail(&self, status: Status) {
        let _ = self.tx.send(Err(status)).await;
    }
}

/// One inbound server-streaming call.
#[derive(Debug)]
pub struct Call<Req, Res> {
    pub ctx: CallContext,
    pub request: Req,
    pub stream: ServerStream<Res>,
}

/// Outcome of a stream that completed without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamSummary {
    pub messages_sent: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_fails_after_receiver_is_dropped() {
        let (stream, rx) = ServerStream::<u32>::channel(1);
        drop(rx);

        assert!(matches!(
            stream.send(7).await,
            Err(Error::ChannelError { .. })
        ));
    }

    #[tokio::test]
    async fn fail_delivers_terminal_status() {
        let (stream, mut rx) = ServerStream::<u32>::channel(2);
        stream.send(1).await.unwrap();
        stream.fail(Status::unknown("boom")).await;
        drop(stream);

        assert_eq!(rx.recv().await.unwrap().unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap().unwrap_err().message(), "boom");
        assert!(rx.recv().await.is_none());
    }
}
