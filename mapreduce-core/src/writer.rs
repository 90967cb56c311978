use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// GuardedWriter is the only way user callbacks hand values to the next stage. Once the run is
/// done (cancelled or completed) every write is discarded without blocking, including a write
/// that is already waiting for room in a full channel. Delivery after cancellation is best-effort
/// and a discarded write is not reported to the caller.
#[derive(Debug)]
pub struct GuardedWriter<T> {
    tx: mpsc::Sender<T>,
    done: CancellationToken,
}

impl<T> Clone for GuardedWriter<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            done: self.done.clone(),
        }
    }
}

impl<T> GuardedWriter<T> {
    pub(crate) fn new(tx: mpsc::Sender<T>, done: CancellationToken) -> Self {
        Self { tx, done }
    }

    /// Forwards the value downstream unless the run is done.
    pub async fn write(&self, value: T) {
        if self.done.is_cancelled() {
            trace!("run is done, discarding write");
            // a producer looping on discarded writes must still reach a point where it can be
            // aborted
            tokio::task::yield_now().await;
            return;
        }

        tokio::select! {
            biased;
            _ = self.done.cancelled() => {
                trace!("run is done while waiting for capacity, discarding write");
            }
            result = self.tx.send(value) => {
                if result.is_err() {
                    trace!("receiver is gone, discarding write");
                }
            }
        }
    }

    /// Returns true once the run is done and further writes will be discarded. Long running
    /// producers can use it to stop early.
    pub fn is_done(&self) -> bool {
        self.done.is_cancelled()
    }
}
