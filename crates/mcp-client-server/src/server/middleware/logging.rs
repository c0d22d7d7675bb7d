use crate::server::service::call::Call;
use core::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use pin_project_lite::pin_project;
use std::time::Instant;
use tower::{Layer, Service};

/// Emits one structured record per call: procedure, request, outcome and
/// elapsed time. Only emits events; the subscriber is installed once at
/// startup.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer;

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging { inner }
    }
}

#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
}

impl<S, Req, Res> Service<Call<Req, Res>> for Logging<S>
where
    S: Service<Call<Req, Res>>,
    S::Response: fmt::Debug,
    S::Error: fmt::Display,
    Req: fmt::Debug,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = LoggingFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, call: Call<Req, Res>) -> Self::Future {
        let procedure = call.ctx.procedure();
        let request = format!("{:?}", call.request);
        LoggingFuture {
            inner: self.inner.call(call),
            procedure,
            request,
            start: Instant::now(),
        }
    }
}

pin_project! {
    /// Response future for [`Logging`]. Resolves to the inner result as is.
    pub struct LoggingFuture<F> {
        #[pin]
        inner: F,
        procedure: &'static str,
        request: String,
        start: Instant,
    }
}

impl<F, T, E> Future for LoggingFuture<F>
where
    F: Future<Output = Result<T, E>>,
    T: fmt::Debug,
    E: fmt::Display,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let result = core::task::ready!(this.inner.poll(cx));
        let duration_ms = this.start.elapsed().as_secs_f64() * 1000.0;

        match &result {
            Ok(response) => tracing::info!(
                procedure = *this.procedure,
                request = %this.request,
                response = ?response,
                duration_ms,
                "call completed"
            ),
            Err(error) => tracing::error!(
                procedure = *this.procedure,
                request = %this.request,
                error = %error,
                duration_ms,
                "call failed"
            ),
        }

        Poll::Ready(result)
    }
}
