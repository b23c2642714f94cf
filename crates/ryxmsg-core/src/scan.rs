//! Consume-until-match over a subscription.
//!
//! Every stream consumer in the orchestrator has the same shape: pull events
//! in order, skip the ones that do not matter, stop on the first one that
//! does, on stream end, on a stream failure, or when the caller gives up.
//! [`scan`] is that loop, parameterized by the step that maps a raw event to
//! a match.
//!
//! Some answers cannot be read off a single event: a replayed log may retract
//! an earlier entry further down. [`settle`] folds every event that is
//! already available into an accumulator and only picks a match once the
//! stream stalls or ends.

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{
    error::{ResultExt, SessionError},
    subscription::Subscription,
};

/// How a scan finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan<U> {
    /// The step produced a match.
    Matched(U),
    /// The stream ended without a match.
    Ended,
}

/// Consume `subscription` until `step` returns `Some`.
///
/// `step` returning `Ok(None)` skips the event; an error from `step` aborts
/// the scan. A stream failure becomes [`SessionError::Protocol`] for
/// `operation`, and a fired `cancel` token becomes
/// [`SessionError::Cancelled`]. The subscription is cancelled before this
/// function returns, whatever the outcome.
pub async fn scan<T, U, F>(
    mut subscription: Subscription<T>,
    cancel: &CancellationToken,
    operation: &'static str,
    mut step: F,
) -> Result<Scan<U>, SessionError>
where
    F: FnMut(T) -> Result<Option<U>, SessionError>,
{
    let mut skipped = 0usize;
    let outcome = loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => break Err(SessionError::Cancelled),
            item = subscription.next() => item,
        };

        let Some(item) = item else {
            break Ok(Scan::Ended);
        };

        match item.during(operation).and_then(&mut step) {
            Ok(Some(found)) => break Ok(Scan::Matched(found)),
            Ok(None) => skipped += 1,
            Err(e) => break Err(e),
        }
    };

    subscription.cancel();
    debug!(operation, skipped, matched = matches!(outcome, Ok(Scan::Matched(_))), "subscription released");
    outcome
}

/// Fold `subscription` into `state`, picking a match whenever it stalls.
///
/// Each wake-up folds the event that woke the scan plus every event that is
/// ready right behind it, then asks `pick`. `pick` returning `None` waits for
/// more events. When the stream ends, `pick` gets a last chance before
/// [`Scan::Ended`]. Errors, cancellation and release behave as in [`scan`].
pub async fn settle<T, A, U, F, P>(
    mut subscription: Subscription<T>,
    cancel: &CancellationToken,
    operation: &'static str,
    mut state: A,
    mut fold: F,
    mut pick: P,
) -> Result<Scan<U>, SessionError>
where
    F: FnMut(&mut A, T) -> Result<(), SessionError>,
    P: FnMut(&mut A) -> Option<U>,
{
    let mut folded = 0usize;
    let outcome = 'scan: loop {
        let mut next = tokio::select! {
            biased;
            () = cancel.cancelled() => break Err(SessionError::Cancelled),
            item = subscription.next() => item,
        };

        let ended = loop {
            let Some(item) = next.take() else {
                break true;
            };
            if let Err(e) = item.during(operation).and_then(|item| fold(&mut state, item)) {
                break 'scan Err(e);
            }
            folded += 1;
            match subscription.next().now_or_never() {
                Some(ready) => next = ready,
                None => break false,
            }
        };

        match pick(&mut state) {
            Some(found) => break Ok(Scan::Matched(found)),
            None if ended => break Ok(Scan::Ended),
            None => {},
        }
    };

    subscription.cancel();
    debug!(operation, folded, matched = matches!(outcome, Ok(Scan::Matched(_))), "subscription released");
    outcome
}

#[cfg(test)]
mod tests {
    use futures::{StreamExt, stream};

    use super::*;
    use crate::error::{ProtocolFault, ServiceError};

    fn sub(items: Vec<Result<u32, ServiceError>>) -> (Subscription<u32>, CancellationToken) {
        let token = CancellationToken::new();
        (Subscription::new(stream::iter(items), token.clone()), token)
    }

    fn even(n: u32) -> Result<Option<u32>, SessionError> {
        Ok((n % 2 == 0).then_some(n))
    }

    #[tokio::test]
    async fn skips_until_match() {
        let (s, token) = sub(vec![Ok(1), Ok(3), Ok(4), Ok(6)]);
        let out = scan(s, &CancellationToken::new(), "test", even).await;
        assert_eq!(out, Ok(Scan::Matched(4)));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn end_without_match() {
        let (s, token) = sub(vec![Ok(1), Ok(3)]);
        let out = scan(s, &CancellationToken::new(), "test", even).await;
        assert_eq!(out, Ok(Scan::Ended));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn stream_failure_is_protocol_error() {
        let (s, token) = sub(vec![Ok(1), Err(ServiceError::Stream("reset".into())), Ok(2)]);
        let out = scan(s, &CancellationToken::new(), "test", even).await;
        assert_eq!(
            out,
            Err(SessionError::Protocol {
                operation: "test",
                source: ProtocolFault::Service(ServiceError::Stream("reset".into())),
            })
        );
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn step_error_aborts() {
        let (s, token) = sub(vec![Ok(1), Ok(2)]);
        let out: Result<Scan<u32>, _> =
            scan(s, &CancellationToken::new(), "test", |_| Err(SessionError::Closed)).await;
        assert_eq!(out, Err(SessionError::Closed));
        assert!(token.is_cancelled());
    }

    /// Sum of the backlog, but only once it is non-zero.
    async fn settle_sum(s: Subscription<u32>) -> Result<Scan<u32>, SessionError> {
        settle(
            s,
            &CancellationToken::new(),
            "test",
            0u32,
            |sum, n| {
                *sum += n;
                Ok(())
            },
            |sum| (*sum > 0).then_some(*sum),
        )
        .await
    }

    #[tokio::test]
    async fn settle_folds_whole_backlog_before_picking() {
        let token = CancellationToken::new();
        let s = Subscription::new(stream::iter([Ok(1), Ok(2), Ok(3)]).chain(stream::pending()), token.clone());

        assert_eq!(settle_sum(s).await, Ok(Scan::Matched(6)));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn settle_picks_on_end_then_reports_end() {
        let (s, _) = sub(vec![Ok(0), Ok(4)]);
        assert_eq!(settle_sum(s).await, Ok(Scan::Matched(4)));

        let (s, token) = sub(vec![Ok(0), Ok(0)]);
        assert_eq!(settle_sum(s).await, Ok(Scan::Ended));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn settle_waits_for_a_later_event() {
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let token = CancellationToken::new();
        let s = Subscription::new(rx, token.clone());
        tx.unbounded_send(Ok(0)).unwrap();

        let scan = tokio::spawn(settle_sum(s));
        tokio::task::yield_now().await;
        assert!(!scan.is_finished());
        tx.unbounded_send(Ok(5)).unwrap();

        assert_eq!(scan.await.unwrap(), Ok(Scan::Matched(5)));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn settle_surfaces_stream_failure() {
        let (s, token) = sub(vec![Ok(1), Err(ServiceError::Stream("reset".into()))]);
        assert!(matches!(settle_sum(s).await, Err(SessionError::Protocol { operation: "test", .. })));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_releases_pending_stream() {
        let token = CancellationToken::new();
        let s = Subscription::<u32>::new(stream::pending(), token.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let out = scan(s, &cancel, "test", even).await;
        assert_eq!(out, Err(SessionError::Cancelled));
        assert!(token.is_cancelled());
    }
}
