use core::{
    pin::Pin,
    task::{Context, Poll},
};
use pin_project_lite::pin_project;
use tokio_stream::Stream;
use tokio_util::sync::DropGuard;

pin_project! {
    /// A response stream that cancels its call when the transport drops it.
    ///
    /// Tonic drops the response body as soon as the client disconnects. The
    /// embedded [`DropGuard`] turns that into a cancellation of the call
    /// token, so the relay task stops waiting on the model.
    pub struct GuardedStream<S> {
        #[pin]
        inner: S,
        _guard: DropGuard,
    }
}

impl<S> GuardedStream<S> {
    pub fn new(inner: S, guard: DropGuard) -> Self {
        Self {
            inner,
            _guard: guard,
        }
    }
}

impl<S: Stream> Stream for GuardedStream<S> {
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.project().inner.poll_next(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_stream::StreamExt;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn yields_inner_items() {
        let token = CancellationToken::new();
        let stream = GuardedStream::new(tokio_stream::iter([1, 2, 3]), token.clone().drop_guard());

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items, vec![1, 2, 3]);
    }

    #[test]
    fn dropping_the_stream_cancels_the_token() {
        let token = CancellationToken::new();
        let stream = GuardedStream::new(tokio_stream::iter([1]), token.clone().drop_guard());
        assert!(!token.is_cancelled());

        drop(stream);
        assert!(token.is_cancelled());
    }
}
