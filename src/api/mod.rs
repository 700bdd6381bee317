//! Local REST API for status and control.
//!
//! Provides HTTP endpoints for:
//! - Service fleet status and single-service restarts
//! - Meeting session control (join, leave, camera, mute)
//! - Platform listing and link classification
//! - Agent logs
//!
//! The server runs as a [`Service`] so the orchestrator starts it after the
//! meeting coordinator and stops it before.

pub mod error;
pub mod routes;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::ApiConfig;
use crate::meeting::MeetingCoordinator;
use crate::service::{Orchestrator, Service};

pub use routes::ApiState;

pub const SERVICE_NAME: &str = "api";

struct Running {
    shutdown: CancellationToken,
    addr: SocketAddr,
    task: JoinHandle<()>,
}

pub struct ApiService {
    config: ApiConfig,
    state: ApiState,
    running: Mutex<Option<Running>>,
}

impl ApiService {
    /// The orchestrator is held weakly since it also owns this service.
    pub fn new(
        config: ApiConfig,
        orchestrator: Weak<Orchestrator>,
        coordinator: Arc<MeetingCoordinator>,
    ) -> Self {
        Self {
            config,
            state: ApiState {
                orchestrator,
                coordinator,
            },
            running: Mutex::new(None),
        }
    }

    /// Bound address while the server is running.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.running.lock().await.as_ref().map(|running| running.addr)
    }
}

#[async_trait]
impl Service for ApiService {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        let bind = format!("{}:{}", self.config.bind, self.config.port);
        let listener = TcpListener::bind(&bind)
            .await
            .with_context(|| format!("Failed to bind API server to {bind}"))?;
        let addr = listener.local_addr()?;

        let app = routes::router(self.state.clone());
        let shutdown = CancellationToken::new();
        let signal = shutdown.clone();

        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app)
                .with_graceful_shutdown(async move { signal.cancelled().await });
            if let Err(e) = server.await {
                error!("API server failed: {}", e);
            }
        });

        info!("API server listening on http://{}", addr);
        info!("Endpoints:");
        info!("  GET  /                        - Service info");
        info!("  GET  /status                  - Services and meeting status");
        info!("  GET  /services                - Service statuses in start order");
        info!("  POST /services/:name/restart  - Restart one service");
        info!("  GET  /meeting                 - Meeting status");
        info!("  POST /meeting/join            - Join a meeting link");
        info!("  POST /meeting/leave           - Leave the current meeting");
        info!("  POST /meeting/camera          - Toggle camera");
        info!("  POST /meeting/mute            - Toggle microphone");
        info!("  GET  /platforms               - Loaded platforms");
        info!("  GET  /platforms/classify?url= - Classify a meeting link");
        info!("  GET  /logs                    - Agent logs");

        *running = Some(Running {
            shutdown,
            addr,
            task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };

        running.shutdown.cancel();
        running
            .task
            .await
            .context("API server task panicked")?;
        info!("API server stopped");
        Ok(())
    }
}
