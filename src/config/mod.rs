use crate::global;
use crate::meeting::Platform;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub room: RoomConfig,
    pub meeting: MeetingConfig,
    pub api: ApiConfig,
    pub services: Vec<ProcessServiceConfig>,
}

/// Room-level defaults applied to join requests that leave them unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    pub name: String,
    /// Name shown to other participants.
    pub display_name: String,
    pub camera_on: bool,
    pub mic_on: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeetingConfig {
    /// Platforms to load providers for, in preference order.
    pub platforms: Vec<Platform>,
    /// Program that opens a meeting link (usually a kiosk browser).
    pub launcher_command: String,
    /// Arguments for the launcher. `{url}` and `{name}` are substituted.
    pub launcher_args: Vec<String>,
    /// How long a launcher that exits is treated as failing rather than
    /// handing the link off.
    pub launch_grace_ms: u64,
    /// Shell command run for camera/microphone control.
    /// Env vars: ROOMKEEPER_ACTION, ROOMKEEPER_PLATFORM,
    /// ROOMKEEPER_MEETING_ID, ROOMKEEPER_MEETING_URL
    pub control_command: String,
    pub join_timeout_seconds: u64,
    pub lobby_timeout_seconds: u64,
    pub control_timeout_seconds: u64,
    /// Services the meeting coordinator starts after, when registered.
    pub depends_on: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub enabled: bool,
    pub bind: String,
    pub port: u16,
}

/// An external subsystem binary supervised by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessServiceConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub depends_on: Vec<String>,
    pub startup_grace_ms: u64,
    pub enabled: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            name: "Meeting Room".to_string(),
            display_name: "Meeting Room".to_string(),
            camera_on: true,
            mic_on: true,
        }
    }
}

impl Default for MeetingConfig {
    fn default() -> Self {
        Self {
            platforms: Platform::ALL.to_vec(),
            launcher_command: "chromium".to_string(),
            launcher_args: vec![
                "--kiosk".to_string(),
                "--use-fake-ui-for-media-stream".to_string(),
                "{url}".to_string(),
            ],
            launch_grace_ms: 500,
            control_command: String::new(),
            join_timeout_seconds: 60,
            lobby_timeout_seconds: 300,
            control_timeout_seconds: 10,
            depends_on: vec!["audio".to_string(), "video".to_string()],
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind: "127.0.0.1".to_string(),
            port: 3939,
        }
    }
}

impl Default for ProcessServiceConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            command: String::new(),
            args: Vec::new(),
            depends_on: Vec::new(),
            startup_grace_ms: 500,
            enabled: true,
        }
    }
}

impl ApiConfig {
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.bind, self.port)
    }
}

impl Config {
    /// Load from the default location, writing defaults there on first run.
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}
