//! Request timeouts which can be adjusted after the client is built.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A duration shared between clones of a client.
///
/// Stored as whole milliseconds so that a single atomic holds it.
#[derive(Debug, Clone)]
pub struct SharedDuration {
    millis: Arc<AtomicU64>,
}

impl SharedDuration {
    /// Create a new shared duration
    pub fn new(duration: Duration) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(as_millis(duration))),
        }
    }

    /// Get the duration stored here.
    pub fn get(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Acquire))
    }

    /// Set the duration stored here, visible to every clone.
    pub fn set(&self, duration: Duration) {
        self.millis.store(as_millis(duration), Ordering::Release);
    }
}

fn as_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A layer to apply a timeout using a [`SharedDuration`]
#[derive(Debug, Clone)]
pub struct SharedTimeoutLayer {
    timeout: SharedDuration,
}

impl From<SharedDuration> for SharedTimeoutLayer {
    fn from(timeout: SharedDuration) -> Self {
        SharedTimeoutLayer { timeout }
    }
}

impl<S> tower::Layer<S> for SharedTimeoutLayer {
    type Service = TimeoutService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            service: inner,
            timeout: self.timeout.clone(),
        }
    }
}

/// A [tower::Service] which fails requests that outlive the shared timeout.
#[derive(Debug, Clone)]
pub struct TimeoutService<S> {
    service: S,
    timeout: SharedDuration,
}

impl<S, R> tower::Service<R> for TimeoutService<S>
where
    S: tower::Service<R, Error = hyperdriver::client::Error>,
{
    type Response = S::Response;
    type Error = hyperdriver::client::Error;
    type Future = self::future::TimeoutFuture<S::Future>;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, req: R) -> Self::Future {
        self::future::TimeoutFuture::new(self.service.call(req), self.timeout.get())
    }
}

mod future {
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{ready, Context, Poll};
    use std::time::Duration;

    use pin_project::pin_project;
    use tokio::time::Timeout;

    #[pin_project]
    #[derive(Debug)]
    pub struct TimeoutFuture<F> {
        #[pin]
        future: Timeout<F>,
    }

    impl<F: Future> TimeoutFuture<F> {
        pub(super) fn new(future: F, timeout: Duration) -> Self {
            Self {
                future: tokio::time::timeout(timeout, future),
            }
        }
    }

    impl<F, R> Future for TimeoutFuture<F>
    where
        F: Future<Output = Result<R, hyperdriver::client::Error>>,
    {
        type Output = Result<R, hyperdriver::client::Error>;

        fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
            Poll::Ready(match ready!(self.project().future.poll(cx)) {
                Ok(result) => result,
                Err(_) => {
                    tracing::debug!("request timed out");
                    Err(hyperdriver::client::Error::RequestTimeout)
                }
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::future::Future;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tower::{Layer as _, ServiceExt as _};

    use super::*;

    #[derive(Debug, Clone)]
    struct Stalled;

    impl tower::Service<()> for Stalled {
        type Response = ();
        type Error = hyperdriver::client::Error;
        type Future = Pin<Box<dyn Future<Output = Result<(), Self::Error>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _req: ()) -> Self::Future {
            Box::pin(std::future::pending())
        }
    }

    #[test]
    fn shared_duration_is_shared() {
        let duration = SharedDuration::new(Duration::from_secs(1));
        let other = duration.clone();
        other.set(Duration::from_millis(250));
        assert_eq!(duration.get(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_request_times_out() {
        let timeout = SharedDuration::new(Duration::from_secs(5));
        let service = SharedTimeoutLayer::from(timeout).layer(Stalled);

        let result = service.oneshot(()).await;
        assert!(matches!(
            result,
            Err(hyperdriver::client::Error::RequestTimeout)
        ));
    }
}
