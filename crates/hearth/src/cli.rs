//! Command line interface.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use snafu::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use hearth_core::ConfigPath;

use crate::config::Config;
use crate::error::{MetricsSnafu, PipelineError};
use crate::pipeline::Pipeline;
use crate::request::EXTRACT_DATE_FIELD;
use crate::server;
use crate::sink::{MemoryWarehouse, PostgresWarehouse, WarehouseRef};

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct CliArgs {
    /// Path to configuration file (can be specified multiple times)
    #[arg(short, long, global = true)]
    pub config: Vec<PathBuf>,

    /// Path to configuration directory (can be specified multiple times)
    #[arg(short = 'C', long = "config-dir", global = true)]
    pub config_dirs: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ingest one extract date and print the invocation response as JSON.
    Run {
        /// Extract date as YYYY-MM-DD.
        #[arg(long)]
        date: String,

        /// Load into an in-memory warehouse instead of the configured one.
        #[arg(long)]
        dry_run: bool,
    },

    /// Accept invocations over HTTP on `POST /invoke`.
    Serve {
        /// Listen address.
        #[arg(long, env = "HEARTH_ADDRESS", default_value = "0.0.0.0:8080")]
        address: String,

        /// Load into an in-memory warehouse instead of the configured one.
        #[arg(long)]
        dry_run: bool,
    },
}

impl Command {
    fn dry_run(&self) -> bool {
        match self {
            Command::Run { dry_run, .. } | Command::Serve { dry_run, .. } => *dry_run,
        }
    }
}

impl CliArgs {
    /// Convert CLI arguments to configuration paths.
    pub fn config_paths(&self) -> Vec<ConfigPath> {
        ConfigPath::from_cli_args(&self.config, &self.config_dirs)
    }
}

/// Trigger payload for `hearth run --date`.
///
/// The date is passed through unparsed so a bad value is reported the same
/// way a bad HTTP payload is.
pub fn run_payload(date: &str) -> Vec<u8> {
    serde_json::json!({ EXTRACT_DATE_FIELD: date })
        .to_string()
        .into_bytes()
}

fn warehouse(config: &Config, dry_run: bool) -> Result<WarehouseRef, PipelineError> {
    if dry_run {
        info!("Dry run: loading into an in-memory warehouse");
        return Ok(Arc::new(MemoryWarehouse::new()));
    }
    Ok(Arc::new(PostgresWarehouse::connect_lazy(&config.warehouse)?))
}

/// Execute the parsed command with an already loaded config.
pub async fn execute(
    command: Command,
    config: Config,
    shutdown: CancellationToken,
) -> Result<ExitCode, PipelineError> {
    let warehouse = warehouse(&config, command.dry_run())?;
    let metrics_enabled = config.metrics.enabled;
    let pipeline = Pipeline::from_config(Arc::new(config), warehouse, shutdown).await?;

    match command {
        Command::Run { date, .. } => {
            let result = pipeline.invoke(&run_payload(&date)).await;
            match serde_json::to_string_pretty(&result.response()) {
                Ok(json) => println!("{json}"),
                Err(e) => error!(error = %e, "Failed to serialize invocation response"),
            }
            Ok(if result.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Serve { address, .. } => {
            if metrics_enabled {
                hearth_core::init_metrics().context(MetricsSnafu)?;
            }
            server::serve(Arc::new(pipeline), &address, metrics_enabled).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
