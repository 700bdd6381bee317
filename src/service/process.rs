//! External subsystem managed as a child process.
//!
//! The audio, video, display and dashboard subsystems ship as their own
//! binaries; the room agent only decides when they run.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::Service;
use crate::config::ProcessServiceConfig;

pub struct ProcessService {
    name: String,
    command: String,
    args: Vec<String>,
    startup_grace: Duration,
    child: Mutex<Option<Child>>,
}

impl ProcessService {
    pub fn new(name: impl Into<String>, command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args,
            startup_grace: Duration::from_millis(500),
            child: Mutex::new(None),
        }
    }

    pub fn from_config(config: &ProcessServiceConfig) -> Self {
        Self::new(&config.name, &config.command, config.args.clone())
            .with_startup_grace(Duration::from_millis(config.startup_grace_ms))
    }

    /// How long the process must stay alive after spawning to count as started.
    pub fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub async fn is_running(&self) -> bool {
        let mut child = self.child.lock().await;
        match child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

#[async_trait]
impl Service for ProcessService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<()> {
        let mut slot = self.child.lock().await;
        if slot.is_some() {
            bail!("{} is already running", self.name);
        }

        let program = which::which(&self.command)
            .with_context(|| format!("'{}' not found on PATH", self.command))?;
        debug!("Spawning {:?} {:?} for '{}'", program, self.args, self.name);

        let mut child = Command::new(&program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn {:?}", program))?;

        if !self.startup_grace.is_zero() {
            tokio::time::sleep(self.startup_grace).await;
        }

        if let Some(status) = child
            .try_wait()
            .context("Failed to poll subsystem process")?
        {
            bail!("{} exited during startup ({})", self.command, status);
        }

        info!(
            "Subsystem '{}' running (pid {})",
            self.name,
            child.id().unwrap_or_default()
        );
        *slot = Some(child);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(mut child) = self.child.lock().await.take() else {
            return Ok(());
        };

        if let Err(e) = child.start_kill() {
            warn!("Failed to signal '{}': {}", self.name, e);
        }

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to reap '{}'", self.name))?;
        debug!("Subsystem '{}' exited with {}", self.name, status);
        Ok(())
    }
}
