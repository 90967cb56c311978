use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error};

use crate::shared::callback_outcome;
use crate::{Canceller, GuardedWriter, Result};

/// Source is a handoff, the generation routine runs at most one item ahead of the worker pool.
const SOURCE_CHANNEL_SIZE: usize = 1;

/// Runs the generation routine on its own task and returns the source it writes into. The source
/// is closed once the routine returns.
///
/// A failure of the routine (an error or a panic) cancels the run. The outcome is recorded before
/// the source is closed, so the worker pool can never observe the end of the source ahead of the
/// cancellation.
///
/// Once the run is done the routine is aborted and the returned handle completes, so a routine
/// that never stops on its own does not keep the run from returning.
pub(crate) fn spawn<T, G, F>(
    generate: G,
    canceller: Canceller,
) -> (ReceiverStream<T>, JoinHandle<()>)
where
    T: Send + 'static,
    G: FnOnce(GuardedWriter<T>) -> F + Send + 'static,
    F: Future<Output = Result<()>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(SOURCE_CHANNEL_SIZE);
    let done = canceller.done_token();
    let writer = GuardedWriter::new(tx, done.clone());

    let handle = tokio::spawn(async move {
        // keeps the source open until the outcome of the routine is known
        let source_guard = writer.clone();

        let mut task = tokio::spawn(async move { generate(writer).await });
        tokio::select! {
            biased;
            joined = &mut task => match callback_outcome(joined) {
                Ok(()) => debug!("generator completed"),
                Err(e) => {
                    error!(?e, "generator failed");
                    canceller.cancel(Some(e));
                }
            },
            _ = done.cancelled() => {
                // nothing the routine does from here on can change the outcome
                debug!("run is done, aborting generator");
                task.abort();
            }
        }

        drop(source_guard);
    });

    (ReceiverStream::new(rx), handle)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use tokio::time::timeout;
    use tokio_stream::StreamExt;

    use super::*;
    use crate::Error;

    #[derive(Debug, thiserror::Error)]
    #[error("no input")]
    struct NoInput;

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::Release);
        }
    }

    #[tokio::test]
    async fn test_generator_closes_source() {
        let canceller = Canceller::new();
        let (source, handle) = spawn(
            |writer: GuardedWriter<u32>| async move {
                for i in 0..5 {
                    writer.write(i).await;
                }
                Ok(())
            },
            canceller.clone(),
        );

        let items: Vec<u32> = source.collect().await;
        assert_eq!(items, vec![0, 1, 2, 3, 4]);
        handle.await.unwrap();
        assert_eq!(canceller.cause(), None);
        assert!(!canceller.is_done());
    }

    #[tokio::test]
    async fn test_generator_panic_cancels_run() {
        let canceller = Canceller::new();
        let (source, handle) = spawn(
            |writer: GuardedWriter<u32>| async move {
                let item = 1;
                writer.write(item).await;
                if item == 1 {
                    panic!("generator exploded");
                }
                Ok(())
            },
            canceller.clone(),
        );

        // the source closes only after the panic is recorded
        let _items: Vec<u32> = source.collect().await;
        assert_eq!(
            canceller.cause(),
            Some(Error::Panic("generator exploded".to_string()))
        );
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_generator_error_cancels_run() {
        let canceller = Canceller::new();
        let (source, handle) = spawn(
            |_writer: GuardedWriter<u32>| async move { Err(Error::cancelled(NoInput)) },
            canceller.clone(),
        );

        let items: Vec<u32> = source.collect().await;
        assert!(items.is_empty());
        handle.await.unwrap();

        let cause = canceller.cause().expect("a cause should be recorded");
        assert!(cause.user_error::<NoInput>().is_some());
    }

    #[tokio::test]
    async fn test_endless_generator_aborted_once_done() {
        let canceller = Canceller::new();
        let stopped = Arc::new(AtomicBool::new(false));

        let (mut source, handle) = spawn(
            {
                let stopped = Arc::clone(&stopped);
                move |writer: GuardedWriter<u64>| async move {
                    let _stopped = SetOnDrop(stopped);
                    for i in 0u64.. {
                        writer.write(i).await;
                    }
                    Ok(())
                }
            },
            canceller.clone(),
        );

        assert_eq!(source.next().await, Some(0));
        assert_eq!(source.next().await, Some(1));
        canceller.finish();

        timeout(Duration::from_secs(1), handle)
            .await
            .expect("generator should stop once the run is done")
            .unwrap();

        // the aborted routine drops its state
        timeout(Duration::from_secs(1), async {
            while !stopped.load(Ordering::Acquire) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("aborted generator should be dropped");
        assert_eq!(canceller.cause(), None);
    }
}
