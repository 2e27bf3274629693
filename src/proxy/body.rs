//! Streaming response body relay
//!
//! Frames are passed through as they arrive from upstream. The request
//! deadline keeps running while the body streams, and the connection slot
//! is released as soon as the body finishes.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use hyper::body::{Body, Frame, SizeHint};
use pin_project_lite::pin_project;
use thiserror::Error;
use tokio::sync::OwnedSemaphorePermit;
use tokio::time::{Instant, Sleep};
use tower::BoxError;
use tracing::warn;

/// The request deadline passed while the body was still streaming
#[derive(Debug, Error)]
#[error("upstream deadline elapsed during body relay")]
pub struct DeadlineElapsed;

pin_project! {
    /// Response body wrapper that enforces the request deadline.
    pub struct RelayBody<B> {
        #[pin]
        inner: B,
        #[pin]
        deadline: Sleep,
        slot: Option<OwnedSemaphorePermit>,
        debug: bool,
        done: bool,
    }

    impl<B> PinnedDrop for RelayBody<B> {
        fn drop(this: Pin<&mut Self>) {
            let this = this.project();
            if !*this.done && *this.debug {
                warn!("Response relay ended before the upstream body completed");
            }
        }
    }
}

impl<B> RelayBody<B> {
    pub fn new(
        inner: B,
        deadline: Instant,
        slot: Option<OwnedSemaphorePermit>,
        debug: bool,
    ) -> Self {
        Self {
            inner,
            deadline: tokio::time::sleep_until(deadline),
            slot,
            debug,
            done: false,
        }
    }
}

impl<B> Body for RelayBody<B>
where
    B: Body<Data = Bytes>,
    B::Error: Into<BoxError>,
{
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.project();
        if *this.done {
            return Poll::Ready(None);
        }

        match this.inner.poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => return Poll::Ready(Some(Ok(frame))),
            Poll::Ready(Some(Err(e))) => {
                let e: BoxError = e.into();
                *this.done = true;
                this.slot.take();
                if *this.debug {
                    warn!(error = %e, "Failed to relay response body");
                }
                return Poll::Ready(Some(Err(e)));
            }
            Poll::Ready(None) => {
                *this.done = true;
                this.slot.take();
                return Poll::Ready(None);
            }
            Poll::Pending => {}
        }

        if this.deadline.poll(cx).is_ready() {
            *this.done = true;
            this.slot.take();
            if *this.debug {
                warn!("Upstream deadline elapsed during response relay");
            }
            return Poll::Ready(Some(Err(Box::new(DeadlineElapsed))));
        }

        Poll::Pending
    }

    fn is_end_stream(&self) -> bool {
        self.done || self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::time::Duration;

    use futures::stream::{self, StreamExt};
    use http_body_util::{BodyExt, Full, StreamBody};
    use tokio::sync::Semaphore;

    #[tokio::test]
    async fn test_relay_passes_bytes_through() {
        let body = RelayBody::new(
            Full::new(Bytes::from_static(b"{\"code\":\"0\"}")),
            Instant::now() + Duration::from_secs(5),
            None,
            false,
        );

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(&collected[..], b"{\"code\":\"0\"}");
    }

    #[tokio::test]
    async fn test_relay_errors_when_deadline_passes() {
        let stalled = stream::once(async {
            Ok::<_, Infallible>(Frame::data(Bytes::from_static(b"partial")))
        })
        .chain(stream::pending());
        let body = RelayBody::new(
            StreamBody::new(stalled),
            Instant::now() + Duration::from_millis(100),
            None,
            false,
        );

        let err = body.collect().await.unwrap_err();
        assert!(err.is::<DeadlineElapsed>());
    }

    #[tokio::test]
    async fn test_slot_released_when_body_completes() {
        let slots = Arc::new(Semaphore::new(1));
        let permit = slots.clone().acquire_owned().await.unwrap();

        let body = RelayBody::new(
            Full::new(Bytes::from_static(b"ok")),
            Instant::now() + Duration::from_secs(5),
            Some(permit),
            false,
        );
        assert_eq!(slots.available_permits(), 0);

        let mut body = Box::pin(body);
        while let Some(frame) = body.frame().await {
            frame.unwrap();
        }
        assert_eq!(slots.available_permits(), 1);
    }
}
