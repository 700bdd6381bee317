use anyhow::{Context, Result};
use std::path::PathBuf;

const APP_DIR: &str = "roomkeeper";

pub fn config_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR))
        .context("Unable to determine config directory")
}

pub fn config_file() -> Result<PathBuf> {
    Ok(config_dir()?.join("config.toml"))
}

/// Name of the systemd user unit the agent runs under.
pub const SERVICE_UNIT: &str = "roomkeeper.service";
