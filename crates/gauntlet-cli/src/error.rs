//! Error handling for the gauntlet CLI

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Configuration loading failed: {0}")]
    Figment(#[from] Box<figment::Error>),

    #[error("Harness error: {0}")]
    Harness(#[from] gauntlet_runtime::HarnessError),

    #[error("Invalid argument: {0}")]
    Core(#[from] gauntlet_core::CoreError),

    #[error("Topology planning failed: {0}")]
    Topology(#[from] gauntlet_core::TopologyError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl CliError {
    /// Process exit code for this failure
    ///
    /// Configuration and usage problems exit with 2, anything else with 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Config(_)
            | CliError::Figment(_)
            | CliError::Core(_)
            | CliError::Topology(_)
            | CliError::Harness(gauntlet_runtime::HarnessError::Config(_)) => 2,
            _ => 1,
        }
    }
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        CliError::Figment(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_kind() {
        assert_eq!(CliError::Config("bad".into()).exit_code(), 2);
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(CliError::from(json).exit_code(), 1);
    }
}
