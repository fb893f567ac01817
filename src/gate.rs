//! Stream admission through a rate limiter
//!
//! A gated stream makes exactly one admission decision, at the point the
//! consumer first demands an item: a zero-wait permit check against the
//! limiter. Granted, it attaches to the upstream source and forwards every
//! signal untouched with no further per-item checks. Denied, it yields a
//! single [`RequestNotPermittedError`] and drops the upstream without ever
//! polling it, so a refused subscription costs the source nothing.
//!
//! A permit debited for a stream that is cancelled (dropped) later is not
//! returned to the limiter. That is a documented limitation of the admission
//! model, not an oversight to fix here.

use crate::errors::RequestNotPermittedError;
use crate::limiter::RateLimiter;
use futures_core::Stream;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::debug;

/// Where the gate is in its one-shot admission lifecycle
enum GateState<S> {
    /// Upstream held but untouched; no admission decision made yet
    Pending(S),
    /// Permit granted; forwarding upstream signals verbatim
    Attached(S),
    /// Denial delivered or upstream exhausted
    Finished,
}

/// A stream wrapped with subscription-time admission control.
///
/// Yields `Ok(item)` for every upstream item once admitted, or a single
/// `Err(RequestNotPermittedError)` if the limiter refuses the subscription.
pub struct RateLimitedStream<S> {
    limiter: Arc<RateLimiter>,
    state: GateState<S>,
}

impl<S> RateLimitedStream<S> {
    /// Gate `upstream` behind `limiter`.
    ///
    /// Construction is free: the permit is charged when the stream is first
    /// polled, the lazy-stream equivalent of subscription time.
    pub fn new(limiter: Arc<RateLimiter>, upstream: S) -> Self {
        Self {
            limiter,
            state: GateState::Pending(upstream),
        }
    }
}

impl<S> Stream for RateLimitedStream<S>
where
    S: Stream + Unpin,
{
    type Item = Result<S::Item, RequestNotPermittedError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match &mut this.state {
                GateState::Pending(_) => {
                    let GateState::Pending(upstream) =
                        mem::replace(&mut this.state, GateState::Finished)
                    else {
                        unreachable!()
                    };

                    if this.limiter.try_acquire(Duration::ZERO) {
                        this.state = GateState::Attached(upstream);
                        // Loop to poll the freshly attached upstream
                    } else {
                        // Upstream dropped unpolled; it never incurs any cost
                        debug!(limiter = %this.limiter.name(), "subscription denied");
                        return Poll::Ready(Some(Err(this.limiter.not_permitted())));
                    }
                }
                GateState::Attached(upstream) => {
                    return match Pin::new(upstream).poll_next(cx) {
                        Poll::Ready(Some(item)) => Poll::Ready(Some(Ok(item))),
                        Poll::Ready(None) => {
                            this.state = GateState::Finished;
                            Poll::Ready(None)
                        }
                        Poll::Pending => Poll::Pending,
                    };
                }
                GateState::Finished => return Poll::Ready(None),
            }
        }
    }
}

impl RateLimiter {
    /// Wrap `upstream` so its subscription is admission-controlled by this
    /// limiter. See [`RateLimitedStream`].
    pub fn gate<S>(self: Arc<Self>, upstream: S) -> RateLimitedStream<S>
    where
        S: Stream,
    {
        RateLimitedStream::new(self, upstream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::RateLimiterConfig;
    use futures::StreamExt;
    use futures::executor::block_on;

    fn limiter(limit: usize) -> Arc<RateLimiter> {
        Arc::new(RateLimiter::new(
            "test",
            RateLimiterConfig {
                limit_for_period: limit,
                limit_refresh_period: Duration::from_secs(60),
            },
        ))
    }

    #[test]
    fn test_granted_stream_passes_all_items_through() {
        let limiter = limiter(1);
        let gated = Arc::clone(&limiter).gate(futures::stream::iter(vec![1, 2, 3]));

        let items: Vec<_> = block_on(gated.collect());
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), &1);
        assert_eq!(items[2].as_ref().unwrap(), &3);

        // Exactly one permit charged for the whole stream
        assert_eq!(limiter.available_permits(), 0);
    }

    #[test]
    fn test_denied_stream_errors_once_then_ends() {
        let limiter = limiter(1);
        assert!(limiter.try_acquire(Duration::ZERO));

        let mut gated = limiter.gate(futures::stream::iter(vec![1, 2, 3]));

        let first = block_on(gated.next()).expect("denial must be delivered");
        let err = first.unwrap_err();
        assert_eq!(err.limiter, "test");

        assert!(block_on(gated.next()).is_none());
    }

    #[test]
    fn test_denied_stream_never_polls_upstream() {
        struct PanicStream;
        impl Stream for PanicStream {
            type Item = u32;
            fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<u32>> {
                panic!("upstream must not be polled on denial");
            }
        }

        let limiter = limiter(1);
        assert!(limiter.try_acquire(Duration::ZERO));

        let mut gated = limiter.gate(PanicStream);
        let first = block_on(gated.next()).unwrap();
        assert!(first.is_err());
    }

    #[test]
    fn test_construction_charges_nothing() {
        let limiter = limiter(1);

        // Build a gated stream but never poll it
        let _gated = Arc::clone(&limiter).gate(futures::stream::iter(vec![1]));
        assert_eq!(limiter.available_permits(), 1);
    }

    #[test]
    fn test_permit_not_returned_on_cancel() {
        let limiter = limiter(1);
        let mut gated = Arc::clone(&limiter).gate(futures::stream::iter(vec![1, 2, 3]));

        // Consume one item, then drop the stream mid-flight
        let first = block_on(gated.next()).unwrap();
        assert_eq!(first.unwrap(), 1);
        drop(gated);

        assert_eq!(limiter.available_permits(), 0);
    }

    #[test]
    fn test_empty_upstream_completes_cleanly() {
        let limiter = limiter(1);
        let mut gated = Arc::clone(&limiter).gate(futures::stream::iter(Vec::<u32>::new()));

        assert!(block_on(gated.next()).is_none());
        assert_eq!(limiter.available_permits(), 0);
    }
}
