use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::mapper::WorkerPool;
use crate::reducer::ReduceStage;
use crate::{Canceller, Error, GuardedWriter, MapReduceConfig, Result, generator};

/// Maps every item produced by `generate` and reduces the mapped values with `reducer`.
///
/// Returns the value written by the reducer. The run fails with the recorded cancellation cause if
/// any callback cancelled (or failed, or panicked), and with [Error::ReduceNoOutput] if the reducer
/// completed without writing. Every callback has exited by the time this returns.
pub async fn map_reduce<T, U, V, G, GF, M, MF, R, RF>(
    generate: G,
    mapper: M,
    reducer: R,
    config: &MapReduceConfig,
) -> Result<V>
where
    T: Send + 'static,
    U: Send + 'static,
    V: Send + 'static,
    G: FnOnce(GuardedWriter<T>) -> GF + Send + 'static,
    GF: Future<Output = Result<()>> + Send + 'static,
    M: Fn(T, GuardedWriter<U>, Canceller) -> MF + Send + Sync + 'static,
    MF: Future<Output = Result<()>> + Send + 'static,
    R: FnOnce(ReceiverStream<U>, GuardedWriter<V>, Canceller) -> RF + Send + 'static,
    RF: Future<Output = Result<()>> + Send + 'static,
{
    let canceller = Canceller::new();
    let (source, generator_handle) = generator::spawn(generate, canceller.clone());
    execute(
        source,
        mapper,
        reducer,
        config,
        canceller,
        Some(generator_handle),
    )
    .await
}

/// Same as [map_reduce] but reads the items from a source owned by the caller. If the run is
/// cancelled, the source is closed and drained, so the caller's sends fail instead of blocking.
pub async fn map_reduce_with_source<T, U, V, M, MF, R, RF>(
    source: ReceiverStream<T>,
    mapper: M,
    reducer: R,
    config: &MapReduceConfig,
) -> Result<V>
where
    T: Send + 'static,
    U: Send + 'static,
    V: Send + 'static,
    M: Fn(T, GuardedWriter<U>, Canceller) -> MF + Send + Sync + 'static,
    MF: Future<Output = Result<()>> + Send + 'static,
    R: FnOnce(ReceiverStream<U>, GuardedWriter<V>, Canceller) -> RF + Send + 'static,
    RF: Future<Output = Result<()>> + Send + 'static,
{
    execute(source, mapper, reducer, config, Canceller::new(), None).await
}

async fn execute<T, U, V, M, MF, R, RF>(
    source: ReceiverStream<T>,
    mapper: M,
    reducer: R,
    config: &MapReduceConfig,
    canceller: Canceller,
    generator_handle: Option<JoinHandle<()>>,
) -> Result<V>
where
    T: Send + 'static,
    U: Send + 'static,
    V: Send + 'static,
    M: Fn(T, GuardedWriter<U>, Canceller) -> MF + Send + Sync + 'static,
    MF: Future<Output = Result<()>> + Send + 'static,
    R: FnOnce(ReceiverStream<U>, GuardedWriter<V>, Canceller) -> RF + Send + 'static,
    RF: Future<Output = Result<()>> + Send + 'static,
{
    let workers = config.workers();
    let done = canceller.done_token();
    debug!(workers, "starting map-reduce run");

    let (output_tx, mut output_rx) = mpsc::channel(1);
    let (collector_tx, collector_rx) = mpsc::channel(workers);

    let mappers_done = CancellationToken::new();
    let reduce_handle = tokio::spawn(ReduceStage::new(canceller.clone(), mappers_done.clone()).run(
        reducer,
        ReceiverStream::new(collector_rx),
        GuardedWriter::new(output_tx, done.clone()),
    ));

    let pool = WorkerPool::new(mapper, workers, canceller.clone());
    let collector = GuardedWriter::new(collector_tx, done.clone());
    let pool_handle = tokio::spawn(async move {
        // fires even if the pool task itself panics or is aborted
        let _mappers_done = mappers_done.drop_guard();
        pool.run(source, collector).await
    });

    // a value already written wins over the done signal, the recorded cause is checked last
    let value = tokio::select! {
        biased;
        value = output_rx.recv() => value,
        _ = done.cancelled() => None,
    };
    if value.is_some() {
        // the result is known, stop the producer and the mappers still running
        canceller.finish();
    }
    // any further reducer write is discarded
    drop(output_rx);

    let stages = [
        ("reducer", Some(reduce_handle)),
        ("worker pool", Some(pool_handle)),
        ("generator", generator_handle),
    ];
    for (stage, handle) in stages {
        let Some(handle) = handle else {
            continue;
        };
        if let Err(e) = handle.await {
            error!(?e, stage, "map-reduce stage exited abnormally");
            canceller.cancel(Some(Error::Join(format!("{stage}: {e}"))));
        }
    }

    if let Some(cause) = canceller.cause() {
        debug!(%cause, "map-reduce run cancelled");
        return Err(cause);
    }

    value.ok_or(Error::ReduceNoOutput)
}
