use std::error::Error;
use std::path::PathBuf;

use mapreduce_core::MapReduceConfig;
use tracing::{error, info};

mod cmdline;
mod jobs;
mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let matches = cmdline::root_cli().get_matches();

    let mut config = MapReduceConfig::from_env()?;
    if let Some(workers) = matches.get_one::<i64>(cmdline::ARG_WORKERS) {
        config = config.with_workers(*workers);
    }
    info!(workers = config.workers(), "Starting map-reduce");

    match matches.subcommand() {
        Some((cmdline::CMD_SQUARES, sub)) => {
            let count = sub.get_one::<u64>(cmdline::ARG_COUNT).copied().unwrap_or(4);
            let total = jobs::squares(count, &config)
                .await
                .map_err(|e| format!("Error running squares: {e}"))?;
            info!(count, total, "Sum of squares computed");
            println!("{total}");
        }
        Some((cmdline::CMD_WORD_COUNT, sub)) => {
            let files: Vec<PathBuf> = sub
                .get_many::<PathBuf>(cmdline::ARG_FILES)
                .map(|files| files.cloned().collect())
                .unwrap_or_default();
            let total = jobs::word_count(files, &config)
                .await
                .map_err(|e| format!("Error running word-count: {e}"))?;
            info!(total, "Words counted");
            println!("{total}");
        }
        Some((other, _)) => return Err(format!("unknown subcommand {other}").into()),
        None => return Err("a subcommand is required".into()),
    }

    Ok(())
}
