//! Command-line interface.

pub mod args;
pub mod client;
pub mod control;
pub mod logs;

pub use args::{Cli, CliCommand, JoinCliArgs, LogsCliArgs};
pub use client::ApiClient;
pub use logs::handle_logs_command;

use anyhow::Result;
use std::path::Path;

use crate::config::Config;

/// `--config` when given, the default location otherwise.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}
