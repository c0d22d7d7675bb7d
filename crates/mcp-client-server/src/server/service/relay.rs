//! Core `SendMessage` logic: one model call, re-chunked into a response
//! stream.

use super::call::{Call, StreamSummary};
use crate::server::model::ModelBackend;
use core::task::{Context, Poll};
use futures::future::BoxFuture;
use mcp_client_core::{
    Error, Result,
    proto::{SendMessageRequest, SendMessageResponse},
};
use std::sync::Arc;

pub type SendMessageCall = Call<SendMessageRequest, SendMessageResponse>;

/// Innermost pipeline stage. Holds the shared model session for the lifetime
/// of the process.
pub struct Relay<B> {
    session: Option<Arc<B>>,
}

impl<B> Clone for Relay<B> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<B> Default for Relay<B> {
    /// A relay without a session. Every call fails with
    /// [`Error::NotConfigured`].
    fn default() -> Self {
        Self { session: None }
    }
}

impl<B: ModelBackend> Relay<B> {
    pub fn new(session: Arc<B>) -> Self {
        Self {
            session: Some(session),
        }
    }

    /// Invokes the model once and streams every non-empty text part of the
    /// first candidate, in order.
    ///
    /// Fails without calling the model when the call is already cancelled or
    /// no session is configured. Stops at the first fragment that cannot be
    /// delivered. A result with no text at all is reported as
    /// [`Error::EmptyResult`] rather than closing the stream empty.
    pub async fn send_message(&self, call: SendMessageCall) -> Result<StreamSummary> {
        let Call {
            ctx,
            request,
            stream,
        } = call;

        if ctx.is_cancelled() {
            return Err(Error::RequestCancelled);
        }

        let Some(session) = self.session.as_deref() else {
            return Err(Error::NotConfigured {
                reason: "chat session not initialized".to_string(),
            });
        };

        let response = session
            .generate(ctx.cancellation(), &request.instructions, &request.content)
            .await?;

        let mut summary = StreamSummary::default();
        for text in response
            .into_first_candidate_parts()?
            .into_iter()
            .filter_map(|part| part.text)
            .filter(|text| !text.is_empty())
        {
            stream.send(SendMessageResponse { content: text }).await?;
            summary.messages_sent += 1;
        }

        if summary.messages_sent == 0 {
            return Err(Error::EmptyResult {
                reason: "model response contained no text".to_string(),
            });
        }

        Ok(summary)
    }
}

impl<B> tower::Service<SendMessageCall> for Relay<B>
where
    B: ModelBackend + 'static,
{
    type Response = StreamSummary;
    type Error = Error;
    type Future = BoxFuture<'static, Result<StreamSummary>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, call: SendMessageCall) -> Self::Future {
        let relay = self.clone();
        Box::pin(async move { relay.send_message(call).await })
    }
}
