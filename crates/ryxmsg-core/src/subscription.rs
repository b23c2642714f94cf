//! Scoped event subscriptions.
//!
//! A [`Subscription`] pairs an event stream with the token that keeps it
//! alive on the service side. Cancelling the token (explicitly, or by
//! dropping the subscription) tells the service to end the stream and release
//! whatever backs it. Teardown is therefore tied to the owner's scope: an
//! early return, a `?`, or an abandoned future all release the stream.

use std::fmt;

use futures::{Stream, StreamExt, stream::BoxStream};
use tokio_util::sync::CancellationToken;

use crate::error::ServiceError;

/// Boxed stream of events or stream failures.
pub type EventStream<T> = BoxStream<'static, Result<T, ServiceError>>;

/// Ordered, cancellable sequence of events from the protocol service.
pub struct Subscription<T> {
    stream: EventStream<T>,
    token: CancellationToken,
}

impl<T> Subscription<T> {
    /// Wrap a stream and the token that controls its lifetime.
    ///
    /// The service side is expected to end `stream` once `token` is
    /// cancelled.
    pub fn new<S>(stream: S, token: CancellationToken) -> Self
    where
        S: Stream<Item = Result<T, ServiceError>> + Send + 'static,
    {
        Self { stream: stream.boxed(), token }
    }

    /// Next event, or `None` once the stream has ended or was cancelled.
    pub async fn next(&mut self) -> Option<Result<T, ServiceError>> {
        if self.token.is_cancelled() {
            return None;
        }
        self.stream.next().await
    }

    /// Release the subscription.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the subscription has been released.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

impl<T> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("cancelled", &self.token.is_cancelled()).finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    #[tokio::test]
    async fn yields_items_then_ends() {
        let mut sub = Subscription::new(stream::iter([Ok(1), Ok(2)]), CancellationToken::new());
        assert_eq!(sub.next().await, Some(Ok(1)));
        assert_eq!(sub.next().await, Some(Ok(2)));
        assert_eq!(sub.next().await, None);
    }

    #[tokio::test]
    async fn cancelled_subscription_yields_nothing() {
        let mut sub = Subscription::new(stream::iter([Ok(1)]), CancellationToken::new());
        sub.cancel();
        assert!(sub.is_cancelled());
        assert_eq!(sub.next().await, None);
    }

    #[test]
    fn drop_cancels_token() {
        let token = CancellationToken::new();
        let sub = Subscription::<u8>::new(stream::empty(), token.clone());
        assert!(!token.is_cancelled());
        drop(sub);
        assert!(token.is_cancelled());
    }
}
