//! Shell hook for in-meeting device control.
//!
//! Browser-based sessions cannot be driven directly, so camera and
//! microphone changes are handed to an external command (usually a small
//! script talking to the browser's remote debugging port or to the room's
//! AV controller).

use anyhow::{bail, Context, Result};
use std::process::Stdio;
use std::time::Duration;
use tracing::{debug, info};

use super::Platform;

/// Environment variable names passed to the control command.
pub mod hook_env {
    pub const ACTION: &str = "ROOMKEEPER_ACTION";
    pub const PLATFORM: &str = "ROOMKEEPER_PLATFORM";
    pub const MEETING_ID: &str = "ROOMKEEPER_MEETING_ID";
    pub const MEETING_URL: &str = "ROOMKEEPER_MEETING_URL";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    CameraOn,
    CameraOff,
    MicOn,
    MicOff,
    Leave,
}

impl ControlAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CameraOn => "camera_on",
            Self::CameraOff => "camera_off",
            Self::MicOn => "mic_on",
            Self::MicOff => "mic_off",
            Self::Leave => "leave",
        }
    }

    pub fn camera(on: bool) -> Self {
        if on {
            Self::CameraOn
        } else {
            Self::CameraOff
        }
    }

    pub fn microphone(on: bool) -> Self {
        if on {
            Self::MicOn
        } else {
            Self::MicOff
        }
    }
}

/// Meeting the action applies to.
#[derive(Debug, Clone, Default)]
pub struct ControlTarget {
    pub meeting_id: String,
    pub url: String,
}

/// Runs `sh -c <command>` with the action and meeting in the environment.
/// - Kills the process on timeout
/// - Non-zero exit fails the action
pub struct ShellControlHook {
    command: String,
    timeout: Duration,
}

impl ShellControlHook {
    pub fn new(command: String, timeout_seconds: u64) -> Self {
        Self {
            command,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    pub async fn run(
        &self,
        platform: Platform,
        action: ControlAction,
        target: &ControlTarget,
    ) -> Result<()> {
        info!(
            "Running control hook for {} ({}): {}",
            platform,
            action.as_str(),
            self.command
        );

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env(hook_env::ACTION, action.as_str())
            .env(hook_env::PLATFORM, platform.as_str())
            .env(hook_env::MEETING_ID, &target.meeting_id)
            .env(hook_env::MEETING_URL, &target.url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("Failed to spawn control hook")?;

        // kill_on_drop handles cleanup on timeout
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.context("Control hook failed to execute")?,
            Err(_) => bail!(
                "control hook timed out after {}s",
                self.timeout.as_secs()
            ),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "control hook exited with status {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!("Control hook stdout: {}", stdout.trim());
        }
        Ok(())
    }
}
