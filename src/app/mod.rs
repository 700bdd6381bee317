//! Application assembly: build the service fleet, start it and run until a
//! shutdown signal arrives.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

use crate::api::ApiService;
use crate::config::Config;
use crate::meeting::coordinator::SERVICE_NAME as MEETING_SERVICE;
use crate::meeting::{MeetingCoordinator, MeetingEvent, MeetingState};
use crate::service::{Orchestrator, ProcessService};

pub async fn run_service(config: Config) -> Result<()> {
    info!("Starting roomkeeper for '{}'", config.room.name);

    let orchestrator = Arc::new(Orchestrator::new());
    let coordinator = Arc::new(MeetingCoordinator::from_config(&config)?);

    register_services(&orchestrator, &coordinator, &config).await?;
    spawn_event_logger(coordinator.subscribe());
    spawn_signal_handler(orchestrator.clone());

    orchestrator
        .start_all()
        .await
        .context("Startup failed; started services were rolled back")?;

    info!("roomkeeper is ready");
    if config.api.enabled {
        info!("Status: curl {}/status", config.api.base_url());
    }

    orchestrator.wait_for_shutdown().await;
    // Shutdown may have been requested without a fleet stop.
    orchestrator.stop_all().await;
    info!("roomkeeper stopped");
    Ok(())
}

/// Register the enabled process services, the meeting coordinator and the
/// API, in that order.
pub async fn register_services(
    orchestrator: &Arc<Orchestrator>,
    coordinator: &Arc<MeetingCoordinator>,
    config: &Config,
) -> Result<()> {
    let mut process_names = Vec::new();
    for service in config.services.iter().filter(|service| service.enabled) {
        if service.name.trim().is_empty() || service.command.trim().is_empty() {
            warn!("Skipping [[services]] entry without a name or command");
            continue;
        }
        orchestrator
            .register(
                Arc::new(ProcessService::from_config(service)),
                service.depends_on.clone(),
            )
            .await?;
        process_names.push(service.name.clone());
    }

    let meeting_dependencies: Vec<String> = config
        .meeting
        .depends_on
        .iter()
        .filter(|name| process_names.contains(name))
        .cloned()
        .collect();
    orchestrator
        .register(coordinator.clone(), meeting_dependencies)
        .await?;

    if config.api.enabled {
        let api = ApiService::new(
            config.api.clone(),
            Arc::downgrade(orchestrator),
            coordinator.clone(),
        );
        orchestrator
            .register(Arc::new(api), [MEETING_SERVICE])
            .await?;
    }

    Ok(())
}

fn spawn_event_logger(mut events: broadcast::Receiver<MeetingEvent>) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Meeting event log fell behind, skipped {} events", skipped)
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

fn log_event(event: &MeetingEvent) {
    let meeting_id = event
        .meeting
        .as_ref()
        .map(|meeting| meeting.meeting_id.as_str())
        .unwrap_or("-");
    match event.meeting.as_ref().and_then(|m| m.error_message.as_deref()) {
        Some(message) if event.state == MeetingState::Error => {
            error!(
                "{} meeting {} failed: {}",
                event.platform, meeting_id, message
            )
        }
        _ => info!(
            "{} meeting {} is {}",
            event.platform, meeting_id, event.state
        ),
    }
}

fn spawn_signal_handler(orchestrator: Arc<Orchestrator>) {
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received, stopping services");
        orchestrator.stop_all().await;
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
