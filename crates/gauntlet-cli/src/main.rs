//! gauntlet: staged resilience runs against a P2P node network

use clap::Parser;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use gauntlet_cli::{cli::Cli, commands, error::CliError};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let code = match commands::execute(cli, interrupted()).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            e.downcast_ref::<CliError>().map_or(1, CliError::exit_code)
        }
    };
    std::process::exit(code);
}

/// `RUST_LOG` wins; otherwise info, or debug with `--verbose`
fn setup_logging(verbose: bool) {
    let default = if verbose { "gauntlet=debug" } else { "gauntlet=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves on ctrl-c
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for ctrl-c, interrupts disabled");
        std::future::pending::<()>().await;
    }
}
