use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info};

use crate::config::MIN_WORKERS;
use crate::shared::callback_outcome;
use crate::{Canceller, GuardedWriter, Result};

/// WorkerPool reads items from the source and invokes the mapper on each of them, at most
/// `workers` invocations at a time. Every invocation runs on its own task.
///
/// Error handling: a failed invocation (error or panic) cancels the run, the first failure wins.
/// Once the run is done we stop dispatching, close and drain the source so that the producer is
/// never blocked, and wait for every in-flight invocation to finish. Their writes are discarded by
/// the guarded collector. The collector is dropped only after all invocations have exited, which is
/// how the reducer learns about the end of the stream.
pub(crate) struct WorkerPool<M> {
    mapper: Arc<M>,
    workers: usize,
    canceller: Canceller,
}

impl<M> WorkerPool<M> {
    pub(crate) fn new(mapper: M, workers: usize, canceller: Canceller) -> Self {
        Self {
            mapper: Arc::new(mapper),
            workers: workers.max(MIN_WORKERS),
            canceller,
        }
    }

    pub(crate) async fn run<T, U, F>(
        self,
        mut source: ReceiverStream<T>,
        collector: GuardedWriter<U>,
    ) where
        T: Send + 'static,
        U: Send + 'static,
        M: Fn(T, GuardedWriter<U>, Canceller) -> F + Send + Sync + 'static,
        F: Future<Output = Result<()>> + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let done = self.canceller.done_token();
        let mut tasks = JoinSet::new();
        debug!(workers = self.workers, "worker pool started");

        loop {
            tokio::select! {
                biased;
                _ = done.cancelled() => {
                    debug!("run is done, worker pool stops dispatching");
                    break;
                }
                Some(joined) = tasks.join_next() => self.reap(joined),
                permit = Arc::clone(&semaphore).acquire_owned() => {
                    // the semaphore is never closed
                    let Ok(permit) = permit else {
                        break;
                    };

                    let item = tokio::select! {
                        biased;
                        _ = done.cancelled() => None,
                        item = source.next() => item,
                    };
                    // dropping the permit gives the slot back
                    let Some(item) = item else {
                        break;
                    };

                    let mapper = Arc::clone(&self.mapper);
                    let writer = collector.clone();
                    let canceller = self.canceller.clone();
                    tasks.spawn(async move {
                        let _permit = permit;
                        mapper(item, writer, canceller).await
                    });
                }
            }
        }

        // unblock the producer, anything still buffered is abandoned
        source.close();
        let mut drained = 0usize;
        while source.next().await.is_some() {
            drained += 1;
        }
        if drained > 0 {
            debug!(drained, "drained abandoned items from the source");
        }

        info!(
            inflight = tasks.len(),
            "source ended, waiting for inflight mappers to finish"
        );
        while let Some(joined) = tasks.join_next().await {
            self.reap(joined);
        }
        debug!("worker pool completed");
    }

    fn reap(&self, joined: std::result::Result<Result<()>, JoinError>) {
        if let Err(e) = callback_outcome(joined) {
            error!(?e, "mapper invocation failed");
            self.canceller.cancel(Some(e));
        }
    }
}
