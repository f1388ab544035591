use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use loginwatch_daemon::cli::DaemonCli;
use loginwatch_daemon::logging;
use loginwatch_daemon::orchestrator::{self, Orchestrator};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = DaemonCli::parse();

    let config = match orchestrator::load_config(&cli).await {
        Ok(config) => config,
        Err(e) if cli.validate => {
            eprintln!("configuration invalid: {e:#}");
            return Ok(ExitCode::FAILURE);
        }
        Err(e) => return Err(e),
    };

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        return Ok(ExitCode::SUCCESS);
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "loginwatch-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config)?;
    let reason = orchestrator.run().await?;

    tracing::info!(reason = %reason, "loginwatch-daemon shut down");
    Ok(if reason.is_failure() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
