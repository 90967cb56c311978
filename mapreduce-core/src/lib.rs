//! A map-reduce engine on top of tokio.
//!
//! A run wires three user callbacks together:
//! - a generator that writes items into the source,
//! - a mapper invoked concurrently, at most `workers` at a time, once per item,
//! - a reducer invoked once with the stream of every mapped value, writing the result.
//!
//! ```text
//! generator -> source -> [ mapper x workers ] -> collector -> reducer -> output -> caller
//!                 ^                                                         |
//!                 +-------------------- done (cancellation) <---------------+
//! ```
//!
//! Any callback can cancel the run through its [Canceller], the first cause wins and becomes the
//! error of the run. A callback returning an error or panicking cancels the run the same way, it
//! never brings down the caller. Values are handed downstream only through a [GuardedWriter],
//! which discards writes once the run is done instead of blocking.
//!
//! ```no_run
//! use mapreduce_core::{Canceller, GuardedWriter, MapReduceConfig, map_reduce};
//! use tokio_stream::StreamExt;
//! use tokio_stream::wrappers::ReceiverStream;
//!
//! # async fn run() -> mapreduce_core::Result<()> {
//! let sum = map_reduce(
//!     |source: GuardedWriter<u64>| async move {
//!         for i in 1..5 {
//!             source.write(i).await;
//!         }
//!         Ok(())
//!     },
//!     |item: u64, writer: GuardedWriter<u64>, _cancel: Canceller| async move {
//!         writer.write(item * item).await;
//!         Ok(())
//!     },
//!     |mut pipe: ReceiverStream<u64>, writer: GuardedWriter<u64>, _cancel: Canceller| async move {
//!         let mut sum = 0;
//!         while let Some(value) = pipe.next().await {
//!             sum += value;
//!         }
//!         writer.write(sum).await;
//!         Ok(())
//!     },
//!     &MapReduceConfig::default().with_workers(4),
//! )
//! .await?;
//! assert_eq!(sum, 30);
//! # Ok(())
//! # }
//! ```

mod cancel;
mod config;
mod error;
mod generator;
mod mapper;
mod orchestrator;
mod reducer;
mod shared;
mod writer;

pub use crate::cancel::Canceller;
pub use crate::config::MapReduceConfig;
pub use crate::error::{Error, Result, UserError};
pub use crate::orchestrator::{map_reduce, map_reduce_with_source};
pub use crate::writer::GuardedWriter;
