//! Service lifecycle management.
//!
//! Every long-lived subsystem on the device (audio, video, display, dashboard
//! uplink, the meeting coordinator, the control API) implements [`Service`]
//! and is registered with an [`Orchestrator`]. The orchestrator starts the
//! fleet in dependency order, rolls back on a failed start and stops the
//! fleet in reverse order on shutdown.

mod error;
pub mod orchestrator;
pub mod process;
pub mod registry;

pub use error::ServiceError;
pub use orchestrator::Orchestrator;
pub use process::ProcessService;
pub use registry::{DependencyRegistry, ServiceEntry};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Uniform lifecycle surface implemented by every subsystem.
///
/// Lifecycle state is tracked by the orchestrator, not the implementation;
/// implementations only acquire and release their own resources. A
/// service's status (state, last error, uptime) is read through
/// [`Orchestrator::status`] or [`ServiceEntry::status`].
#[async_trait]
pub trait Service: Send + Sync {
    /// Unique name used for registration and dependency declarations.
    fn name(&self) -> &str;

    /// Acquire resources and begin work.
    async fn start(&self) -> Result<()>;

    /// Release resources. Implementations should be best-effort and only
    /// report failures they could not recover from.
    async fn stop(&self) -> Result<()>;

    async fn restart(&self) -> Result<()> {
        if let Err(e) = self.stop().await {
            warn!("Service '{}' failed to stop during restart: {:#}", self.name(), e);
        }
        self.start().await
    }
}

/// Lifecycle state of a registered service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Error => "error",
        }
    }

    /// `Stopped` and `Error` are resting states; the others are only held
    /// while a start or stop call is in flight (or the service is up).
    pub fn is_resting(&self) -> bool {
        matches!(self, Self::Stopped | Self::Error)
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a service, as reported to the dashboard/UI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub name: String,
    pub state: ServiceState,
    pub error: Option<String>,
    pub uptime_seconds: u64,
    pub depends_on: Vec<String>,
}
