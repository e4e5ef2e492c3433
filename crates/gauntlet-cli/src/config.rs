//! Layered configuration loading
//!
//! Priority, highest first: CLI flags, `GAUNTLET_*` environment variables,
//! the config file (`--config` or `./gauntlet.toml`), built-in defaults.
//!
//! Environment keys use a double underscore between section and field, so
//! `GAUNTLET_TOPOLOGY__NODES=7` sets `topology.nodes`.

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use gauntlet_core::AttackType;
use gauntlet_runtime::{GauntletConfig, SupervisorKind};
use tracing::debug;

use crate::cli::{RunArgs, TopologyArgs};
use crate::error::{CliError, Result};

pub const CONFIG_FILE: &str = "gauntlet.toml";
pub const ENV_PREFIX: &str = "GAUNTLET_";

/// Defaults, config file and environment, without CLI overrides
pub fn base_figment(config_path: Option<&Path>) -> Result<Figment> {
    let file = match config_path {
        Some(path) if !path.exists() => {
            return Err(CliError::Config(format!(
                "config file {} does not exist",
                path.display()
            )));
        }
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(CONFIG_FILE),
    };
    debug!(file = %file.display(), "Loading configuration");

    Ok(Figment::new()
        .merge(Serialized::defaults(GauntletConfig::default()))
        .merge(Toml::file(file))
        .merge(Env::prefixed(ENV_PREFIX).split("__")))
}

fn merge_topology(mut figment: Figment, args: &TopologyArgs) -> Figment {
    if let Some(nodes) = args.nodes {
        figment = figment.merge(("topology.nodes", nodes));
    }
    if let Some(adversarial) = &args.adversarial {
        figment = figment.merge(("topology.adversarial", adversarial.clone()));
    }
    if let Some(base) = args.p2p_base {
        figment = figment.merge(("topology.p2p_base", base));
    }
    if let Some(base) = args.http_base {
        figment = figment.merge(("topology.http_base", base));
    }
    if let Some(base) = args.admin_base {
        figment = figment.merge(("topology.admin_base", base));
    }
    if let Some(dir) = &args.work_dir {
        figment = figment.merge(("topology.work_dir", dir.clone()));
    }
    if let Some(binary) = &args.binary {
        figment = figment.merge(("node.binary", binary.clone()));
    }
    figment
}

fn merge_run(mut figment: Figment, args: &RunArgs) -> Result<Figment> {
    figment = merge_topology(figment, &args.topology);
    if let Some(dir) = &args.output_dir {
        figment = figment.merge(("output.dir", dir.clone()));
    }
    if let Some(list) = &args.scenarios {
        let scenarios = AttackType::parse_list(list)?;
        figment = figment.merge(("attacks.scenarios", scenarios));
    }
    if let Some(secs) = args.observe_secs {
        figment = figment.merge(("timing.observe_secs", secs));
    }
    if let Some(ms) = args.sample_interval_ms {
        figment = figment.merge(("timing.sample_interval_ms", ms));
    }
    if let Some(target) = args.expand_to {
        figment = figment.merge(("topology.expand_to", target));
    }
    if args.container {
        figment = figment.merge(("supervisor.kind", SupervisorKind::Container));
    }
    if args.keep_running {
        figment = figment.merge(("output.keep_running", true));
    }
    Ok(figment)
}

fn extract(figment: Figment) -> Result<GauntletConfig> {
    let config: GauntletConfig = figment.extract()?;
    config.validate()?;
    Ok(config)
}

/// Configuration for `run`
pub fn load_for_run(config_path: Option<&Path>, args: &RunArgs) -> Result<GauntletConfig> {
    extract(merge_run(base_figment(config_path)?, args)?)
}

/// Configuration for `plan` and `probe`
pub fn load_for_topology(config_path: Option<&Path>, args: &TopologyArgs) -> Result<GauntletConfig> {
    extract(merge_topology(base_figment(config_path)?, args))
}
