//! Session drivers: the transport a provider uses to reach a meeting.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::control_hook::{ControlAction, ControlTarget, ShellControlHook};
use super::Platform;
use crate::config::MeetingConfig;

/// Outcome of opening a meeting link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    /// Parked until a host lets the room in.
    Lobby,
}

/// What the driver needs to open a session.
#[derive(Debug, Clone)]
pub struct DriverJoin {
    pub meeting_id: String,
    pub join_url: String,
    pub display_name: String,
    pub camera_on: bool,
    pub mic_on: bool,
}

#[async_trait]
pub trait SessionDriver: Send + Sync {
    /// Acquire long-lived resources (browser profile, SDK handle, ...).
    async fn prepare(&self) -> Result<()>;

    async fn open(&self, join: &DriverJoin) -> Result<Admission>;

    /// Resolve once a host admits the room from the lobby.
    async fn await_admission(&self) -> Result<()>;

    async fn set_camera(&self, on: bool) -> Result<()>;

    async fn set_microphone(&self, on: bool) -> Result<()>;

    async fn participants(&self) -> Result<Vec<String>>;

    /// Hang up the current session.
    async fn close(&self) -> Result<()>;

    /// Release everything acquired by `prepare`.
    async fn release(&self) -> Result<()>;
}

struct LaunchedSession {
    child: Option<Child>,
    target: ControlTarget,
}

/// Opens meetings by launching an external program (a kiosk browser by
/// default) and controls devices through an optional shell hook.
pub struct LauncherDriver {
    platform: Platform,
    command: String,
    args: Vec<String>,
    launch_grace: Duration,
    hook: Option<ShellControlHook>,
    session: Mutex<Option<LaunchedSession>>,
}

impl LauncherDriver {
    pub fn new(platform: Platform, command: String, args: Vec<String>) -> Self {
        Self {
            platform,
            command,
            args,
            launch_grace: Duration::from_millis(500),
            hook: None,
            session: Mutex::new(None),
        }
    }

    pub fn from_config(platform: Platform, config: &MeetingConfig) -> Self {
        let driver = Self::new(
            platform,
            config.launcher_command.clone(),
            config.launcher_args.clone(),
        )
        .with_launch_grace(Duration::from_millis(config.launch_grace_ms));
        if config.control_command.trim().is_empty() {
            driver
        } else {
            driver.with_hook(ShellControlHook::new(
                config.control_command.clone(),
                config.control_timeout_seconds,
            ))
        }
    }

    pub fn with_launch_grace(mut self, grace: Duration) -> Self {
        self.launch_grace = grace;
        self
    }

    pub fn with_hook(mut self, hook: ShellControlHook) -> Self {
        self.hook = Some(hook);
        self
    }

    fn launch_args(&self, join: &DriverJoin) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{url}", &join.join_url)
                    .replace("{name}", &join.display_name)
            })
            .collect()
    }

    async fn control(&self, action: ControlAction) -> Result<()> {
        let target = match self.session.lock().await.as_ref() {
            Some(session) => session.target.clone(),
            None => bail!("no open {} session", self.platform),
        };

        match &self.hook {
            Some(hook) => hook.run(self.platform, action, &target).await,
            None => {
                debug!(
                    "No control command configured; {} tracked locally",
                    action.as_str()
                );
                Ok(())
            }
        }
    }
}

#[async_trait]
impl SessionDriver for LauncherDriver {
    async fn prepare(&self) -> Result<()> {
        let program = which::which(&self.command)
            .with_context(|| format!("launcher '{}' not found on PATH", self.command))?;
        debug!("{} sessions will launch {:?}", self.platform, program);
        Ok(())
    }

    async fn open(&self, join: &DriverJoin) -> Result<Admission> {
        let mut slot = self.session.lock().await;
        if slot.is_some() {
            bail!("a {} session is already open", self.platform);
        }

        let args = self.launch_args(join);
        info!("Launching {} {:?}", self.command, args);

        let mut child = Command::new(&self.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to launch {}", self.command))?;

        // Launchers such as xdg-open hand the link off and exit cleanly.
        let waited = tokio::time::timeout(self.launch_grace, child.wait()).await;
        let child = match waited {
            Ok(status) => {
                let status = status.context("Failed to poll launcher")?;
                if !status.success() {
                    bail!("{} exited with {}", self.command, status);
                }
                None
            }
            Err(_) => Some(child),
        };

        *slot = Some(LaunchedSession {
            child,
            target: ControlTarget {
                meeting_id: join.meeting_id.clone(),
                url: join.join_url.clone(),
            },
        });
        drop(slot);

        if !join.camera_on {
            if let Err(e) = self.control(ControlAction::camera(false)).await {
                warn!("Failed to disable camera on join: {:#}", e);
            }
        }
        if !join.mic_on {
            if let Err(e) = self.control(ControlAction::microphone(false)).await {
                warn!("Failed to mute microphone on join: {:#}", e);
            }
        }

        Ok(Admission::Admitted)
    }

    async fn await_admission(&self) -> Result<()> {
        Ok(())
    }

    async fn set_camera(&self, on: bool) -> Result<()> {
        self.control(ControlAction::camera(on)).await
    }

    async fn set_microphone(&self, on: bool) -> Result<()> {
        self.control(ControlAction::microphone(on)).await
    }

    async fn participants(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<()> {
        if self.hook.is_some() {
            if let Err(e) = self.control(ControlAction::Leave).await {
                warn!("Leave hook failed: {:#}", e);
            }
        }

        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };

        if let Some(mut child) = session.child {
            if let Err(e) = child.start_kill() {
                warn!("Failed to signal launcher: {}", e);
            }
            child.wait().await.context("Failed to reap launcher")?;
        }
        info!("Closed {} session", self.platform);
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.close().await
    }
}
