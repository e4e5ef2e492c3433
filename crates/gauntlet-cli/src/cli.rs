//! Command-line interface definitions and parsing

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "gauntlet", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to ./gauntlet.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full staged scenario: bring-up, attacks, monitoring, report
    Run(RunArgs),
    /// Print the planned topology as JSON without starting anything
    Plan {
        #[command(flatten)]
        topology: TopologyArgs,
        /// Print the effective configuration as TOML instead
        #[arg(long)]
        print_config: bool,
    },
    /// Take one health sample of an already running topology
    Probe {
        #[command(flatten)]
        topology: TopologyArgs,
    },
}

/// Flags shaping the planned topology
#[derive(Args, Debug, Default, Clone)]
pub struct TopologyArgs {
    /// Total number of nodes, genesis included
    #[arg(long)]
    pub nodes: Option<usize>,

    /// Comma separated indices of adversarial nodes
    #[arg(long, value_delimiter = ',')]
    pub adversarial: Option<Vec<usize>>,

    #[arg(long)]
    pub p2p_base: Option<u16>,

    #[arg(long)]
    pub http_base: Option<u16>,

    #[arg(long)]
    pub admin_base: Option<u16>,

    /// Directory holding per-node data dirs and logs
    #[arg(long)]
    pub work_dir: Option<PathBuf>,

    /// Node binary to launch
    #[arg(long)]
    pub binary: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub topology: TopologyArgs,

    /// Where the report is written
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Comma separated scenario list, `default` or `all`
    #[arg(long)]
    pub scenarios: Option<String>,

    /// How long the health loop samples once attacks start
    #[arg(long)]
    pub observe_secs: Option<u64>,

    #[arg(long)]
    pub sample_interval_ms: Option<u64>,

    /// Grow the network to this many nodes in an extra stage
    #[arg(long)]
    pub expand_to: Option<usize>,

    /// Run nodes through the container supervisor
    #[arg(long)]
    pub container: bool,

    /// Keep nodes up after the run until interrupted
    #[arg(long)]
    pub keep_running: bool,
}
