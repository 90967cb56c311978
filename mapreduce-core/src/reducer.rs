use std::future::Future;

use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::shared::callback_outcome;
use crate::{Canceller, GuardedWriter, Result};

/// ReduceStage invokes the reducer exactly once with the stream of every mapped value.
///
/// The reducer owns the collector stream. When it returns, the stream is dropped which closes the
/// collector, so mapper invocations waiting for room are released right away instead of being left
/// stuck behind a reducer that stopped reading.
///
/// A reducer returning successfully does not settle the run by itself, mapper invocations still in
/// flight may yet fail. The run completes only once the worker pool is done as well.
pub(crate) struct ReduceStage {
    canceller: Canceller,
    /// Cancelled when the worker pool has returned, every mapper outcome is recorded by then.
    mappers_done: CancellationToken,
}

impl ReduceStage {
    pub(crate) fn new(canceller: Canceller, mappers_done: CancellationToken) -> Self {
        Self {
            canceller,
            mappers_done,
        }
    }

    /// Runs the reducer and settles the run, either as completed or as cancelled with the
    /// reducer's failure. A reducer failure cancels right away.
    pub(crate) async fn run<U, V, R, F>(
        self,
        reducer: R,
        collector: ReceiverStream<U>,
        output: GuardedWriter<V>,
    ) where
        U: Send + 'static,
        V: Send + 'static,
        R: FnOnce(ReceiverStream<U>, GuardedWriter<V>, Canceller) -> F + Send + 'static,
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let canceller = self.canceller.clone();
        let outcome = callback_outcome(
            tokio::spawn(async move { reducer(collector, output, canceller).await }).await,
        );

        match outcome {
            Ok(()) => {
                debug!("reducer completed, waiting for mappers");
                self.mappers_done.cancelled().await;
                self.canceller.finish();
            }
            Err(e) => {
                error!(?e, "reducer failed");
                self.canceller.cancel(Some(e));
            }
        }
    }
}
