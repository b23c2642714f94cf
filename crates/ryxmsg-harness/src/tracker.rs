//! Bookkeeping of open subscriptions.
//!
//! Every stream handed out by a harness service holds a
//! [`SubscriptionGuard`]. The guard is dropped when the stream ends or when
//! the subscription owning it is dropped, so [`SubscriptionTracker::open`]
//! reaching zero proves that nothing was leaked.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use futures::{StreamExt, stream};
use ryxmsg_core::{EventStream, Subscription};
use tokio_util::sync::CancellationToken;

/// Counts subscriptions handed out by a service.
#[derive(Debug, Default)]
pub struct SubscriptionTracker {
    open: AtomicUsize,
    opened: AtomicUsize,
}

impl SubscriptionTracker {
    /// Subscriptions currently alive.
    pub fn open(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    /// Subscriptions handed out so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn guard(self: &Arc<Self>) -> SubscriptionGuard {
        self.open.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
        SubscriptionGuard { tracker: Arc::clone(self) }
    }
}

/// Marks one open subscription until dropped.
#[derive(Debug)]
pub struct SubscriptionGuard {
    tracker: Arc<SubscriptionTracker>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.tracker.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wrap `stream` into a tracked subscription controlled by `token`.
///
/// The stream stops as soon as `token` is cancelled.
pub(crate) fn tracked<T: Send + 'static>(
    tracker: &Arc<SubscriptionTracker>,
    stream: EventStream<T>,
    token: CancellationToken,
) -> Subscription<T> {
    let guard = tracker.guard();
    let bounded = stream.take_until(token.clone().cancelled_owned()).boxed();
    let guarded = stream::unfold((bounded, guard), |(mut inner, guard)| async move {
        let item = inner.next().await?;
        Some((item, (inner, guard)))
    });
    Subscription::new(guarded, token)
}

#[cfg(test)]
mod tests {
    use ryxmsg_core::ServiceError;

    use super::*;

    #[tokio::test]
    async fn guard_released_on_drop() {
        let tracker = Arc::new(SubscriptionTracker::default());
        let sub = tracked::<u8>(&tracker, stream::pending().boxed(), CancellationToken::new());
        assert_eq!(tracker.open(), 1);
        drop(sub);
        assert_eq!(tracker.open(), 0);
        assert_eq!(tracker.opened(), 1);
    }

    #[tokio::test]
    async fn guard_released_at_stream_end() {
        let tracker = Arc::new(SubscriptionTracker::default());
        let items: Vec<Result<u8, ServiceError>> = vec![Ok(1)];
        let mut sub = tracked(&tracker, stream::iter(items).boxed(), CancellationToken::new());
        assert_eq!(sub.next().await, Some(Ok(1)));
        assert_eq!(sub.next().await, None);
        assert_eq!(tracker.open(), 0);
    }

    #[tokio::test]
    async fn cancelled_token_ends_stream() {
        let tracker = Arc::new(SubscriptionTracker::default());
        let token = CancellationToken::new();
        let mut sub = tracked::<u8>(&tracker, stream::pending().boxed(), token.clone());
        token.cancel();
        assert_eq!(sub.next().await, None);
    }
}
