use crate::server::service::call::Call;
use core::task::{Context, Poll};
use futures::future::{Either, Ready, ready};
use mcp_client_core::Error;
use tower::{Layer, Service};

/// Rejects calls whose request payload violates its declared constraints.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidateLayer;

impl<S> Layer<S> for ValidateLayer {
    type Service = Validate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Validate { inner }
    }
}

/// Middleware produced by [`ValidateLayer`].
///
/// A violation resolves immediately to [`Error::InvalidRequest`] and the
/// inner service never sees the call. Valid calls pass through untouched.
#[derive(Debug, Clone)]
pub struct Validate<S> {
    inner: S,
}

impl<S, Req, Res> Service<Call<Req, Res>> for Validate<S>
where
    S: Service<Call<Req, Res>, Error = Error>,
    Req: mcp_client_core::validator::Validate,
{
    type Response = S::Response;
    type Error = Error;
    type Future = Either<Ready<Result<S::Response, Error>>, S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call<Req, Res>) -> Self::Future {
        match call.request.validate() {
            Ok(()) => Either::Right(self.inner.call(call)),
            Err(errors) => Either::Left(ready(Err(Error::InvalidRequest {
                reason: errors.to_string(),
            }))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::service::{
        call::StreamSummary,
        relay::{Relay, tests::{StubBackend, call}},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn empty_content_is_rejected_before_the_relay() {
        let backend = Arc::new(StubBackend::with_parts(&["Hello"]));
        let service = ValidateLayer.layer(Relay::new(Arc::clone(&backend)));
        let (call, _cancel, _rx) = call("", "be brief", 4);

        let err = service.oneshot(call).await.unwrap_err();

        match err {
            Error::InvalidRequest { reason } => assert!(reason.contains("content")),
            other => panic!("expected invalid request, got {other:?}"),
        }
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn empty_instructions_are_rejected_before_the_relay() {
        let backend = Arc::new(StubBackend::with_parts(&["Hello"]));
        let service = ValidateLayer.layer(Relay::new(Arc::clone(&backend)));
        let (call, _cancel, _rx) = call("hi", "", 4);

        assert!(matches!(
            service.oneshot(call).await,
            Err(Error::InvalidRequest { .. })
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn valid_request_passes_through_unchanged() {
        let backend = Arc::new(StubBackend::with_parts(&["Hello", "world"]));
        let service = ValidateLayer.layer(Relay::new(Arc::clone(&backend)));
        let (call, _cancel, _rx) = call("hi", "be brief", 4);

        assert_eq!(
            service.oneshot(call).await.unwrap(),
            StreamSummary { messages_sent: 2 }
        );
        assert_eq!(backend.calls(), 1);
    }
}
