//! Fleet lifecycle through the public orchestrator API.

use anyhow::{bail, Result};
use async_trait::async_trait;
use roomkeeper::service::{
    DependencyRegistry, Orchestrator, ProcessService, Service, ServiceError, ServiceState,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Journal = Arc<Mutex<Vec<String>>>;

struct RecordingService {
    name: &'static str,
    fail_start: bool,
    fail_stop: bool,
    journal: Journal,
}

impl RecordingService {
    fn new(name: &'static str, journal: &Journal) -> Arc<Self> {
        Self::build(name, false, false, journal)
    }

    fn build(name: &'static str, fail_start: bool, fail_stop: bool, journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            name,
            fail_start,
            fail_stop,
            journal: journal.clone(),
        })
    }
}

#[async_trait]
impl Service for RecordingService {
    fn name(&self) -> &str {
        self.name
    }

    async fn start(&self) -> Result<()> {
        self.journal.lock().unwrap().push(format!("start {}", self.name));
        if self.fail_start {
            bail!("{} hardware not found", self.name);
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        self.journal.lock().unwrap().push(format!("stop {}", self.name));
        if self.fail_stop {
            bail!("{} refused to stop", self.name);
        }
        Ok(())
    }
}

const NO_DEPS: [&str; 0] = [];

fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[tokio::test]
async fn start_all_runs_in_dependency_order() {
    let journal = journal();
    let orchestrator = Orchestrator::new();
    orchestrator
        .register(RecordingService::new("audio", &journal), NO_DEPS)
        .await
        .unwrap();
    orchestrator
        .register(RecordingService::new("display", &journal), NO_DEPS)
        .await
        .unwrap();
    orchestrator
        .register(RecordingService::new("video", &journal), ["audio"])
        .await
        .unwrap();

    orchestrator.start_all().await.unwrap();

    assert_eq!(
        entries(&journal),
        vec!["start audio", "start video", "start display"]
    );
    for status in orchestrator.services().await {
        assert_eq!(status.state, ServiceState::Running, "{}", status.name);
        assert!(status.error.is_none());
    }
    assert!(!orchestrator.is_shutting_down());
}

#[tokio::test]
async fn failed_start_rolls_back_started_services() {
    let journal = journal();
    let orchestrator = Orchestrator::new();
    for service in [
        RecordingService::new("audio", &journal),
        RecordingService::new("video", &journal),
        RecordingService::build("display", true, false, &journal),
        RecordingService::new("dashboard", &journal),
    ] {
        orchestrator.register(service, NO_DEPS).await.unwrap();
    }

    let err = orchestrator.start_all().await.unwrap_err();
    assert!(matches!(err, ServiceError::Start { ref name, .. } if name == "display"));

    assert_eq!(
        entries(&journal),
        vec![
            "start audio",
            "start video",
            "start display",
            "stop display",
            "stop video",
            "stop audio",
        ]
    );

    let status = orchestrator.get_status().await;
    assert_eq!(status["audio"].state, ServiceState::Stopped);
    assert_eq!(status["video"].state, ServiceState::Stopped);
    assert_eq!(status["dashboard"].state, ServiceState::Stopped);
    assert_eq!(status["display"].state, ServiceState::Stopped);
    assert!(status["display"]
        .error
        .as_deref()
        .is_some_and(|e| e.contains("hardware not found")));
    assert!(status
        .values()
        .all(|s| s.state != ServiceState::Running));
    assert!(orchestrator.is_shutting_down());
}

#[tokio::test]
async fn stop_all_isolates_failures() {
    let journal = journal();
    let orchestrator = Orchestrator::new();
    for service in [
        RecordingService::new("audio", &journal),
        RecordingService::build("video", false, true, &journal),
        RecordingService::new("display", &journal),
    ] {
        orchestrator.register(service, NO_DEPS).await.unwrap();
    }
    orchestrator.start_all().await.unwrap();

    orchestrator.stop_all().await;

    assert_eq!(
        entries(&journal)[3..],
        ["stop display", "stop video", "stop audio"]
    );
    let status = orchestrator.get_status().await;
    assert_eq!(status["audio"].state, ServiceState::Stopped);
    assert_eq!(status["display"].state, ServiceState::Stopped);
    assert_eq!(status["video"].state, ServiceState::Error);
    assert_eq!(
        status["video"].error.as_deref(),
        Some("video refused to stop")
    );

    tokio::time::timeout(Duration::from_secs(1), orchestrator.wait_for_shutdown())
        .await
        .expect("stop_all raises the shutdown signal");
}

#[tokio::test]
async fn stop_all_skips_stopped_services() {
    let journal = journal();
    let orchestrator = Orchestrator::new();
    orchestrator
        .register(RecordingService::new("audio", &journal), NO_DEPS)
        .await
        .unwrap();

    orchestrator.stop_all().await;
    assert!(entries(&journal).is_empty());
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let journal = journal();
    let orchestrator = Orchestrator::new();
    orchestrator
        .register(RecordingService::new("audio", &journal), NO_DEPS)
        .await
        .unwrap();

    let err = orchestrator
        .register(RecordingService::new("audio", &journal), NO_DEPS)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Registration(ref name) if name == "audio"));
    assert_eq!(orchestrator.order().await, vec!["audio"]);
}

#[test]
fn late_dependency_does_not_reorder() {
    let journal = journal();
    let mut registry = DependencyRegistry::new();
    registry
        .register(RecordingService::new("audio", &journal), NO_DEPS)
        .unwrap();
    registry
        .register(RecordingService::new("meeting", &journal), ["audio", "video"])
        .unwrap();
    registry
        .register(RecordingService::new("video", &journal), NO_DEPS)
        .unwrap();

    assert_eq!(registry.order(), vec!["audio", "meeting", "video"]);
    assert_eq!(
        registry.ordering_violations(),
        vec![("meeting".to_string(), "video".to_string())]
    );
}

#[test]
fn register_then_unregister_round_trips() {
    let journal = journal();
    let mut registry = DependencyRegistry::new();
    registry
        .register(RecordingService::new("audio", &journal), NO_DEPS)
        .unwrap();
    registry
        .register(RecordingService::new("display", &journal), NO_DEPS)
        .unwrap();
    let before = registry.order();

    registry
        .register(RecordingService::new("video", &journal), ["audio"])
        .unwrap();
    assert_eq!(registry.order(), vec!["audio", "video", "display"]);

    assert!(registry.unregister("video").unwrap().is_some());
    assert_eq!(registry.order(), before);
    assert_eq!(registry.len(), 2);
    assert!(!registry.contains("video"));
}

#[tokio::test]
async fn process_services_start_and_stop() {
    let orchestrator = Orchestrator::new();
    let sleeper = ProcessService::new("sleeper", "sleep", vec!["30".to_string()])
        .with_startup_grace(Duration::from_millis(50));
    orchestrator
        .register(Arc::new(sleeper), NO_DEPS)
        .await
        .unwrap();

    orchestrator.start_all().await.unwrap();
    assert_eq!(
        orchestrator.status("sleeper").await.unwrap().state,
        ServiceState::Running
    );

    orchestrator.stop_all().await;
    assert_eq!(
        orchestrator.status("sleeper").await.unwrap().state,
        ServiceState::Stopped
    );
}

#[tokio::test]
async fn process_that_exits_early_fails_start() {
    let orchestrator = Orchestrator::new();
    let quitter = ProcessService::new("quitter", "false", Vec::new())
        .with_startup_grace(Duration::from_millis(200));
    orchestrator
        .register(Arc::new(quitter), NO_DEPS)
        .await
        .unwrap();

    let err = orchestrator.start_all().await.unwrap_err();
    assert!(matches!(err, ServiceError::Start { ref name, .. } if name == "quitter"));
}
