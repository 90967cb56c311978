use std::path::PathBuf;

use mapreduce_core::{Canceller, Error, GuardedWriter, MapReduceConfig, Result, map_reduce};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Failures of the demo jobs, handed to the engine as cancellation causes.
#[derive(Debug, thiserror::Error)]
pub(crate) enum JobError {
    #[error("square of {0} overflows")]
    SquareOverflow(u64),

    #[error("sum overflows")]
    SumOverflow,

    #[error("reading {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Sums the squares of `1..=count`.
pub(crate) async fn squares(count: u64, config: &MapReduceConfig) -> Result<u64> {
    map_reduce(
        move |source: GuardedWriter<u64>| async move {
            for i in 1..=count {
                if source.is_done() {
                    break;
                }
                source.write(i).await;
            }
            Ok(())
        },
        |item: u64, writer: GuardedWriter<u64>, cancel: Canceller| async move {
            match item.checked_mul(item) {
                Some(square) => writer.write(square).await,
                None => cancel.cancel(Some(Error::cancelled(JobError::SquareOverflow(item)))),
            }
            Ok(())
        },
        sum,
        config,
    )
    .await
}

/// Counts the whitespace separated words across all the files. An unreadable file fails the run.
pub(crate) async fn word_count(files: Vec<PathBuf>, config: &MapReduceConfig) -> Result<u64> {
    map_reduce(
        move |source: GuardedWriter<PathBuf>| async move {
            for file in files {
                source.write(file).await;
            }
            Ok(())
        },
        |file: PathBuf, writer: GuardedWriter<u64>, _cancel: Canceller| async move {
            let content = tokio::fs::read_to_string(&file)
                .await
                .map_err(|source| {
                    Error::cancelled(JobError::Read {
                        path: file.clone(),
                        source,
                    })
                })?;
            let words = content.split_whitespace().count() as u64;
            debug!(file = %file.display(), words, "counted words");
            writer.write(words).await;
            Ok(())
        },
        sum,
        config,
    )
    .await
}

async fn sum(
    mut pipe: ReceiverStream<u64>,
    writer: GuardedWriter<u64>,
    cancel: Canceller,
) -> Result<()> {
    let mut total: u64 = 0;
    while let Some(value) = pipe.next().await {
        let Some(next) = total.checked_add(value) else {
            cancel.cancel(Some(Error::cancelled(JobError::SumOverflow)));
            return Ok(());
        };
        total = next;
    }
    writer.write(total).await;
    Ok(())
}
