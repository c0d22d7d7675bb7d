//! gRPC entry point for `SendMessage`.
//!
//! [`ChatService`] implements the generated [`McpClientService`] trait. Each
//! call is turned into a [`Call`] and driven through the middleware pipeline on
//! its own task while the transport drains the response stream:
//!
//! ```text
//! Request ──► Logging ──► Validate ──► Relay ──► model
//!                                        │
//! Response ◄── GuardedStream ◄── mpsc ◄──┘
//! ```
//!
//! Pipeline errors terminate the stream with the matching `Status`. Dropping
//! the response (client disconnect) cancels the call; so does
//! [`ChatService::shutdown`] for every call in flight.

use super::{
    call::{Call, CallContext, ServerStream},
    relay::Relay,
    stream::GuardedStream,
};
use crate::server::{
    middleware::{Logging, LoggingLayer, Validate, ValidateLayer},
    model::ModelBackend,
    telemetry::{
        decrement_streams_inflight, increment_fragments_sent, increment_requests,
        increment_stream_errors, increment_streams_inflight, record_stream_duration,
    },
};
use mcp_client_core::proto::{
    SendMessageRequest, SendMessageResponse, mcp_client_service_server::McpClientService,
};
use std::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tower::{ServiceBuilder, ServiceExt};
use tracing::Instrument;

const SEND_MESSAGE: &str = "/mcpclient.v1.McpClientService/SendMessage";

type Pipeline<B> = Logging<Validate<Relay<B>>>;

pub type ResponseStream =
    GuardedStream<ReceiverStream<Result<SendMessageResponse, Status>>>;

pub struct ChatService<B> {
    pipeline: Pipeline<B>,
    shutdown: CancellationToken,
    stream_buffer_size: usize,
}

impl<B> Clone for ChatService<B> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            shutdown: self.shutdown.clone(),
            stream_buffer_size: self.stream_buffer_size,
        }
    }
}

impl<B: ModelBackend + 'static> ChatService<B> {
    /// Wraps `relay` in the logging and validation stages.
    pub fn new(relay: Relay<B>, stream_buffer_size: usize) -> Self {
        let pipeline = ServiceBuilder::new()
            .layer(LoggingLayer)
            .layer(ValidateLayer)
            .service(relay);

        Self {
            pipeline,
            shutdown: CancellationToken::new(),
            stream_buffer_size,
        }
    }

    /// Cancels every in-flight and future call. Registered as a shutdown
    /// operation.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

#[tonic::async_trait]
impl<B: ModelBackend + 'static> McpClientService for ChatService<B> {
    type SendMessageStream = ResponseStream;

    async fn send_message(
        &self,
        request: Request<SendMessageRequest>,
    ) -> Result<Response<Self::SendMessageStream>, Status> {
        let start = Instant::now();
        increment_requests();
        increment_streams_inflight();

        let cancel = self.shutdown.child_token();
        let (stream, rx) = ServerStream::channel(self.stream_buffer_size);
        let call = Call {
            ctx: CallContext::new(SEND_MESSAGE, cancel.clone()),
            request: request.into_inner(),
            stream: stream.clone(),
        };

        let pipeline = self.pipeline.clone();
        let fut = async move {
            match pipeline.oneshot(call).await {
                Ok(summary) => increment_fragments_sent(summary.messages_sent as u64),
                Err(e) => {
                    increment_stream_errors();
                    stream.fail(e.into()).await;
                }
            }
            decrement_streams_inflight();
            record_stream_duration(start.elapsed().as_secs_f64() * 1000.0);
        };
        tokio::spawn(fut.instrument(tracing::info_span!("send_message")));

        Ok(Response::new(GuardedStream::new(
            ReceiverStream::new(rx),
            cancel.drop_guard(),
        )))
    }
}
