use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::Error;

/// Canceller aborts a run. It is handed to every mapper and reducer invocation and can be called
/// from any of them, any number of times, concurrently. Only the first call records a cause, every
/// later call is a no-op.
///
/// Firing cancels the run's done token, which
/// - stops the worker pool from dispatching, it then drains the source so the producer is never
///   stuck on a full channel,
/// - turns every [crate::GuardedWriter] write into a discard,
/// - wakes up the orchestrator waiting for the result.
#[derive(Clone, Debug)]
pub struct Canceller {
    inner: Arc<CancelState>,
}

#[derive(Debug)]
struct CancelState {
    /// Set by whoever settles the run first, a cancellation or the reducer's completion.
    fired: AtomicBool,
    cause: OnceLock<Error>,
    done: CancellationToken,
}

impl Canceller {
    pub(crate) fn new() -> Self {
        Self {
            inner: Arc::new(CancelState {
                fired: AtomicBool::new(false),
                cause: OnceLock::new(),
                done: CancellationToken::new(),
            }),
        }
    }

    /// Cancels the run. `None` is recorded as [Error::CancelledWithNil] so that an intentional
    /// cancellation without a cause is never mistaken for success.
    pub fn cancel(&self, cause: Option<Error>) {
        if !self.try_fire() {
            debug!(?cause, "run already settled, ignoring cancellation");
            return;
        }

        let cause = cause.unwrap_or(Error::CancelledWithNil);
        warn!(%cause, "cancelling map-reduce run");
        // the fired flag makes us the only writer
        let _ = self.inner.cause.set(cause);
        self.inner.done.cancel();
    }

    /// Returns true once the run is either cancelled or completed.
    pub fn is_done(&self) -> bool {
        self.inner.done.is_cancelled()
    }

    /// Settles the run as completed without a cause. Cancellations arriving afterwards are ignored.
    pub(crate) fn finish(&self) {
        if self.try_fire() {
            debug!("map-reduce run completed");
            self.inner.done.cancel();
        }
    }

    pub(crate) fn cause(&self) -> Option<Error> {
        self.inner.cause.get().cloned()
    }

    pub(crate) fn done_token(&self) -> CancellationToken {
        self.inner.done.clone()
    }

    fn try_fire(&self) -> bool {
        self.inner
            .fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_cause_wins() {
        let canceller = Canceller::new();
        assert!(!canceller.is_done());
        assert_eq!(canceller.cause(), None);

        let first = Error::cancelled("first");
        canceller.cancel(Some(first.clone()));
        canceller.cancel(Some(Error::cancelled("second")));
        canceller.cancel(None);

        assert!(canceller.is_done());
        assert_eq!(canceller.cause(), Some(first));
    }

    #[test]
    fn test_cancel_with_nil() {
        let canceller = Canceller::new();
        canceller.cancel(None);
        assert_eq!(canceller.cause(), Some(Error::CancelledWithNil));
        assert!(canceller.done_token().is_cancelled());
    }

    #[test]
    fn test_cancel_after_finish_is_ignored() {
        let canceller = Canceller::new();
        canceller.finish();
        assert!(canceller.is_done());

        canceller.cancel(Some(Error::cancelled("late")));
        assert_eq!(canceller.cause(), None);
    }

    #[test]
    fn test_finish_after_cancel_keeps_cause() {
        let canceller = Canceller::new();
        let early = Error::cancelled("early");
        canceller.cancel(Some(early.clone()));
        canceller.finish();
        assert_eq!(canceller.cause(), Some(early));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_cancel_records_exactly_one_cause() {
        let canceller = Canceller::new();
        let mut join_set = tokio::task::JoinSet::new();

        for i in 0..32 {
            let canceller = canceller.clone();
            join_set.spawn(async move {
                canceller.cancel(Some(Error::cancelled(format!("cause-{i}"))));
            });
        }
        join_set.join_all().await;

        let cause = canceller.cause().expect("a cause should be recorded");
        let Error::Cancelled(msg) = &cause else {
            panic!("unexpected cause {cause:?}");
        };
        assert!(msg.to_string().starts_with("cause-"));

        // recorded cause is stable
        canceller.cancel(Some(Error::cancelled("another")));
        assert_eq!(canceller.cause(), Some(cause));
    }
}
