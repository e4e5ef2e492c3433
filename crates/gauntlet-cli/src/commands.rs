//! Command handlers for the gauntlet CLI

use std::future::Future;
use std::path::Path;

use anyhow::Context;
use gauntlet_runtime::monitor::{self, HealthMonitor};
use gauntlet_runtime::{plan_topology, NodeClient, Orchestrator};
use tracing::{info, warn};

use crate::cli::{Cli, Commands, RunArgs, TopologyArgs};
use crate::config::{load_for_run, load_for_topology};
use crate::error::CliError;

/// Execute a CLI command and return the process exit code
pub async fn execute<F>(cli: Cli, shutdown: F) -> anyhow::Result<i32>
where
    F: Future<Output = ()>,
{
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Run(args) => handle_run(config_path, &args, shutdown).await,
        Commands::Plan {
            topology,
            print_config,
        } => handle_plan(config_path, &topology, print_config),
        Commands::Probe { topology } => handle_probe(config_path, &topology).await,
    }
}

async fn handle_run<F>(config_path: Option<&Path>, args: &RunArgs, shutdown: F) -> anyhow::Result<i32>
where
    F: Future<Output = ()>,
{
    let config = load_for_run(config_path, args)?;
    info!(
        nodes = config.topology.nodes,
        adversarial = ?config.topology.adversarial,
        scenarios = config.attacks.scenarios.len(),
        "Starting gauntlet run"
    );

    let orchestrator = Orchestrator::from_config(config).context("failed to set up the harness")?;
    let outcome = orchestrator.run(shutdown).await.context("run failed")?;

    println!("{}", outcome.report_path.display());
    Ok(outcome.exit_code())
}

fn handle_plan(config_path: Option<&Path>, args: &TopologyArgs, print_config: bool) -> anyhow::Result<i32> {
    let config = load_for_topology(config_path, args)?;
    if print_config {
        print!("{}", toml::to_string_pretty(&config).map_err(CliError::from)?);
        return Ok(0);
    }

    let planned = plan_topology(&config, true).map_err(CliError::from)?;
    println!("{}", serde_json::to_string_pretty(&planned).map_err(CliError::from)?);
    Ok(0)
}

/// Sample a topology started earlier with the same configuration
async fn handle_probe(config_path: Option<&Path>, args: &TopologyArgs) -> anyhow::Result<i32> {
    let config = load_for_topology(config_path, args)?;
    let planned = plan_topology(&config, false).map_err(CliError::from)?;
    let client = NodeClient::new(&config.node).context("failed to build HTTP client")?;

    let health = HealthMonitor::new(
        client,
        config.timing.health_timeout(),
        config.supervisor.max_concurrency,
    );
    let sample = health.sample(&planned).await;
    monitor::summarize(&planned, &sample);
    let nodes = health.inspect(&planned, &sample).await;

    let output = serde_json::json!({ "sample": sample, "nodes": nodes });
    println!("{}", serde_json::to_string_pretty(&output).map_err(CliError::from)?);

    if sample.healthy_nodes < sample.total_nodes {
        warn!(
            unreachable = ?sample.unreachable_nodes().collect::<Vec<_>>(),
            "Some nodes did not answer"
        );
        return Ok(1);
    }
    Ok(0)
}
