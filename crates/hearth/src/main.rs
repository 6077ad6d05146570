//! Hearth CLI: date-partitioned cost-of-living ingestion into a warehouse.

use std::process::ExitCode;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use hearth::{CliArgs, Config, cancel_on_shutdown, execute, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let args = CliArgs::parse();

    let paths = args.config_paths();
    if paths.is_empty() {
        eprintln!("Error: no config files or directories specified");
        return ExitCode::FAILURE;
    }

    info!("Loading config from {} source(s)", paths.len());

    let config = match Config::from_paths(&paths) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    info!("Starting hearth with {} dataset(s)", config.dataset_count());
    for (key, dataset) in config.datasets() {
        info!("  Dataset: {} -> {}", key, dataset.table);
    }

    let shutdown = cancel_on_shutdown(CancellationToken::new());

    match execute(args.command, config, shutdown).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Hearth failed: {e}");
            ExitCode::FAILURE
        }
    }
}
