//! Gauntlet CLI library
//!
//! Argument parsing, layered configuration and command handlers behind the
//! `gauntlet` binary.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;

pub use cli::{Cli, Commands, RunArgs, TopologyArgs};
pub use error::{CliError, Result};
