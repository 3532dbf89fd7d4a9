//! Coalescing of concurrent requests for the same work.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};

use futures::FutureExt as _;
use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};

pub(crate) type BoxFut<'f, O> = Pin<Box<dyn Future<Output = O> + Send + 'f>>;

/// Resolves to the result of the in-flight work this handle is attached to.
pub(crate) struct Handle<T> {
    fut: BoxFut<'static, Result<T, RecvError>>,
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle").finish()
    }
}

impl<T> Future for Handle<T> {
    type Output = Result<T, RecvError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        self.fut.poll_unpin(cx)
    }
}

impl<T> Handle<T>
where
    T: Clone + Send + 'static,
{
    fn new(mut receiver: broadcast::Receiver<T>) -> Self {
        Self {
            fut: Box::pin(async move { receiver.recv().await }),
        }
    }
}

/// At most one piece of work runs at a time; callers arriving while it runs
/// share its result instead of starting another.
pub(crate) struct InFlight<T> {
    inflight: Arc<Mutex<Option<Weak<broadcast::Sender<T>>>>>,
}

impl<T> fmt::Debug for InFlight<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("running", &self.is_running())
            .finish()
    }
}

impl<T> Default for InFlight<T> {
    fn default() -> Self {
        Self {
            inflight: Default::default(),
        }
    }
}

impl<T> InFlight<T> {
    /// Whether work is running right now.
    pub(crate) fn is_running(&self) -> bool {
        self.inflight
            .lock()
            .as_ref()
            .is_some_and(|tx| tx.strong_count() > 0)
    }
}

impl<T> InFlight<T>
where
    T: Clone + Send + 'static,
{
    /// Attach to the running work, or spawn `f` on the runtime if none is running.
    ///
    /// Returns the handle and whether it joined work that was already running.
    pub(crate) fn handle<F>(&self, f: F) -> (Handle<T>, bool)
    where
        F: FnOnce() -> BoxFut<'static, T>,
    {
        // Held until the work is registered, so two callers cannot both start it.
        let mut inflight = self.inflight.lock();

        if let Some(tx) = inflight.as_ref().and_then(Weak::upgrade) {
            tracing::trace!("joining in-flight work");
            return (Handle::new(tx.subscribe()), true);
        }

        let (tx, rx) = broadcast::channel::<T>(1);
        let tx = Arc::new(tx);
        *inflight = Some(Arc::downgrade(&tx));

        let fut = (f)();
        let slot = Arc::clone(&self.inflight);
        tracing::trace!("launching work");
        tokio::spawn(async move {
            let result = fut.await;

            // Send under the lock so nobody subscribes between clearing the slot and sending.
            let mut inflight = slot.lock();
            *inflight = None;
            let _ = tx.send(result);
        });

        (Handle::new(rx), false)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::Notify;

    use super::*;

    #[tokio::test]
    async fn concurrent_callers_share_one_run() {
        let inflight = InFlight::<usize>::default();
        let runs = Arc::new(AtomicUsize::new(0));
        let gate = Arc::new(Notify::new());

        let start = || {
            let runs = runs.clone();
            let gate = gate.clone();
            move || -> BoxFut<'static, usize> {
                Box::pin(async move {
                    gate.notified().await;
                    runs.fetch_add(1, Ordering::SeqCst) + 1
                })
            }
        };

        let (first, first_joined) = inflight.handle(start());
        let (second, second_joined) = inflight.handle(start());
        assert!(!first_joined);
        assert!(second_joined);
        assert!(inflight.is_running());

        gate.notify_one();
        assert_eq!(first.await.unwrap(), 1);
        assert_eq!(second.await.unwrap(), 1);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn finished_work_is_not_joined() {
        let inflight = InFlight::<u8>::default();

        let (handle, joined) = inflight.handle(|| Box::pin(async { 1 }));
        assert!(!joined);
        assert_eq!(handle.await.unwrap(), 1);

        let (handle, joined) = inflight.handle(|| Box::pin(async { 2 }));
        assert!(!joined);
        assert_eq!(handle.await.unwrap(), 2);
    }
}
