//! Meeting sessions through the coordinator, driven by a scripted transport.

use anyhow::{bail, Result};
use async_trait::async_trait;
use roomkeeper::meeting::{
    build_provider, Admission, DriverJoin, JoinOptions, JoinRequest, JoinTimeouts,
    MeetingCoordinator, MeetingError, MeetingEvent, MeetingState, Platform, PlatformRouter,
    Provider, ProviderFactory, RoomDefaults, SessionDriver,
};
use roomkeeper::service::{Orchestrator, Service, ServiceState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

type Calls = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Default)]
struct Script {
    lobby: bool,
    never_admitted: bool,
    failing_opens: Arc<AtomicUsize>,
}

struct ScriptedDriver {
    platform: Platform,
    script: Script,
    calls: Calls,
}

impl ScriptedDriver {
    fn record(&self, call: impl std::fmt::Display) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.platform, call));
    }
}

#[async_trait]
impl SessionDriver for ScriptedDriver {
    async fn prepare(&self) -> Result<()> {
        self.record("prepare");
        Ok(())
    }

    async fn open(&self, join: &DriverJoin) -> Result<Admission> {
        self.record(format!("open {}", join.join_url));
        let failing = &self.script.failing_opens;
        if failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            bail!("page failed to load");
        }
        Ok(if self.script.lobby {
            Admission::Lobby
        } else {
            Admission::Admitted
        })
    }

    async fn await_admission(&self) -> Result<()> {
        self.record("await_admission");
        if self.script.never_admitted {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn set_camera(&self, on: bool) -> Result<()> {
        self.record(format!("camera {}", on));
        Ok(())
    }

    async fn set_microphone(&self, on: bool) -> Result<()> {
        self.record(format!("microphone {}", on));
        Ok(())
    }

    async fn participants(&self) -> Result<Vec<String>> {
        Ok(vec!["Alice".to_string(), "Bob".to_string()])
    }

    async fn close(&self) -> Result<()> {
        self.record("close");
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.record("release");
        Ok(())
    }
}

struct ScriptedFactory {
    scripts: HashMap<Platform, Script>,
    calls: Calls,
    timeouts: JoinTimeouts,
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self, platform: Platform) -> Result<Arc<dyn Provider>> {
        let driver = ScriptedDriver {
            platform,
            script: self.scripts.get(&platform).cloned().unwrap_or_default(),
            calls: self.calls.clone(),
        };
        Ok(build_provider(platform, Box::new(driver), self.timeouts))
    }
}

struct Harness {
    coordinator: Arc<MeetingCoordinator>,
    calls: Calls,
}

impl Harness {
    async fn started(scripts: HashMap<Platform, Script>) -> Self {
        Self::with_timeouts(
            scripts,
            JoinTimeouts {
                join: Duration::from_secs(2),
                lobby: Duration::from_millis(50),
            },
        )
        .await
    }

    async fn with_timeouts(scripts: HashMap<Platform, Script>, timeouts: JoinTimeouts) -> Self {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let factory = ScriptedFactory {
            scripts,
            calls: calls.clone(),
            timeouts,
        };
        let coordinator = Arc::new(MeetingCoordinator::new(
            PlatformRouter::new().unwrap(),
            Box::new(factory),
            Platform::ALL.to_vec(),
            RoomDefaults {
                display_name: "Huddle Room".to_string(),
                camera_on: true,
                mic_on: true,
            },
        ));
        coordinator.start().await.unwrap();
        Self { coordinator, calls }
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

fn drain(events: &mut broadcast::Receiver<MeetingEvent>) -> Vec<(Platform, MeetingState)> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push((event.platform, event.state));
    }
    seen
}

const ZOOM_LINK: &str = "https://us02web.zoom.us/j/1234567890?pwd=x";
const MEET_LINK: &str = "https://meet.google.com/abc-defg-hij";

#[tokio::test]
async fn switching_platforms_leaves_previous_session_first() {
    let harness = Harness::started(HashMap::new()).await;
    let coordinator = &harness.coordinator;
    let mut events = coordinator.subscribe();

    let zoom = coordinator
        .join_meeting(ZOOM_LINK, JoinOptions::default())
        .await
        .unwrap();
    assert_eq!(zoom.platform, Platform::Zoom);
    assert_eq!(zoom.url, "https://app.zoom.us/wc/join/1234567890?pwd=x");
    assert_eq!(
        drain(&mut events),
        vec![
            (Platform::Zoom, MeetingState::Joining),
            (Platform::Zoom, MeetingState::Connected),
        ]
    );
    let platforms_before = coordinator.available_platforms().await;

    let meet = coordinator
        .join_meeting(MEET_LINK, JoinOptions::default())
        .await
        .unwrap();
    assert_eq!(meet.platform, Platform::GoogleMeet);
    assert_eq!(
        drain(&mut events),
        vec![
            (Platform::Zoom, MeetingState::Leaving),
            (Platform::Zoom, MeetingState::Idle),
            (Platform::GoogleMeet, MeetingState::Joining),
            (Platform::GoogleMeet, MeetingState::Connected),
        ]
    );

    assert_eq!(coordinator.available_platforms().await, platforms_before);
    assert_eq!(coordinator.active_platform().await, Some(Platform::GoogleMeet));
    assert_eq!(coordinator.state().await, MeetingState::Connected);

    let calls = harness.calls();
    let zoom_close = calls.iter().position(|c| c == "zoom:close").unwrap();
    let meet_open = calls
        .iter()
        .position(|c| c.starts_with("google_meet:open"))
        .unwrap();
    assert!(zoom_close < meet_open);
}

#[tokio::test]
async fn toggle_mute_without_active_provider_reports_muted() {
    let harness = Harness::started(HashMap::new()).await;
    assert!(harness.coordinator.toggle_mute().await.unwrap());
    assert!(!harness.coordinator.toggle_camera().await.unwrap());
    assert!(harness.calls().iter().all(|c| c.ends_with("prepare")));
}

#[tokio::test]
async fn toggles_reach_the_driver() {
    let harness = Harness::started(HashMap::new()).await;
    let coordinator = &harness.coordinator;
    coordinator
        .join_meeting(
            "https://teams.live.com/meet/123",
            JoinOptions {
                mic_on: Some(false),
                ..JoinOptions::default()
            },
        )
        .await
        .unwrap();

    assert!(!coordinator.toggle_mute().await.unwrap());
    assert!(!coordinator.toggle_camera().await.unwrap());

    let meeting = coordinator.current_meeting().await.unwrap();
    assert!(!meeting.muted);
    assert!(!meeting.camera_on);
    assert_eq!(meeting.participants, vec!["Alice", "Bob"]);

    let calls = harness.calls();
    assert!(calls.contains(&"teams:microphone true".to_string()));
    assert!(calls.contains(&"teams:camera false".to_string()));
}

#[tokio::test]
async fn lobby_admission_passes_through_in_lobby() {
    let scripts = HashMap::from([(
        Platform::Webex,
        Script {
            lobby: true,
            ..Script::default()
        },
    )]);
    let harness = Harness::started(scripts).await;
    let mut events = harness.coordinator.subscribe();

    harness
        .coordinator
        .join_meeting("https://acme.webex.com/meet/jo", JoinOptions::default())
        .await
        .unwrap();

    assert_eq!(
        drain(&mut events),
        vec![
            (Platform::Webex, MeetingState::Joining),
            (Platform::Webex, MeetingState::InLobby),
            (Platform::Webex, MeetingState::Connected),
        ]
    );
}

#[tokio::test]
async fn lobby_timeout_leaves_error_state_and_allows_retry() {
    let scripts = HashMap::from([(
        Platform::Zoom,
        Script {
            lobby: true,
            never_admitted: true,
            ..Script::default()
        },
    )]);
    let harness = Harness::started(scripts).await;
    let coordinator = &harness.coordinator;

    let err = coordinator
        .join_meeting(ZOOM_LINK, JoinOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MeetingError::Join(ref reason) if reason.contains("lobby")));
    assert_eq!(coordinator.state().await, MeetingState::Error);
    let partial = coordinator.current_meeting().await.unwrap();
    assert_eq!(partial.meeting_id, "1234567890");
    assert!(partial.error_message.is_some());

    // The coordinator stays usable after a failed session.
    coordinator
        .join_meeting(MEET_LINK, JoinOptions::default())
        .await
        .unwrap();
    assert_eq!(coordinator.state().await, MeetingState::Connected);
}

async fn wait_for_state(
    events: &mut broadcast::Receiver<MeetingEvent>,
    platform: Platform,
    state: MeetingState,
) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = events.recv().await.unwrap();
            if event.platform == platform && event.state == state {
                break;
            }
        }
    })
    .await
    .expect("state was never reached");
}

#[tokio::test]
async fn leave_cancels_join_waiting_in_lobby() {
    let scripts = HashMap::from([(
        Platform::Zoom,
        Script {
            lobby: true,
            never_admitted: true,
            ..Script::default()
        },
    )]);
    let harness = Harness::with_timeouts(
        scripts,
        JoinTimeouts {
            join: Duration::from_secs(2),
            lobby: Duration::from_secs(300),
        },
    )
    .await;
    let coordinator = harness.coordinator.clone();
    let mut events = coordinator.subscribe();

    let join = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .join_meeting(ZOOM_LINK, JoinOptions::default())
                .await
        })
    };
    wait_for_state(&mut events, Platform::Zoom, MeetingState::InLobby).await;

    tokio::time::timeout(Duration::from_secs(2), coordinator.leave_meeting())
        .await
        .expect("leave waited on the lobby")
        .unwrap();

    let joined = join.await.unwrap();
    assert!(matches!(joined, Err(MeetingError::Cancelled)));
    assert_eq!(coordinator.state().await, MeetingState::Idle);
    assert_eq!(coordinator.active_platform().await, None);
    assert!(coordinator.current_meeting().await.is_none());
    assert!(harness.calls().contains(&"zoom:close".to_string()));

    // Nothing is left holding the session.
    coordinator
        .join_meeting(MEET_LINK, JoinOptions::default())
        .await
        .unwrap();
    assert_eq!(coordinator.state().await, MeetingState::Connected);
}

#[tokio::test]
async fn stop_does_not_wait_for_lobby_timeout() {
    let scripts = HashMap::from([(
        Platform::Webex,
        Script {
            lobby: true,
            never_admitted: true,
            ..Script::default()
        },
    )]);
    let harness = Harness::with_timeouts(
        scripts,
        JoinTimeouts {
            join: Duration::from_secs(2),
            lobby: Duration::from_secs(300),
        },
    )
    .await;
    let coordinator = harness.coordinator.clone();
    let mut events = coordinator.subscribe();

    let join = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .join_meeting("https://acme.webex.com/meet/jo", JoinOptions::default())
                .await
        })
    };
    wait_for_state(&mut events, Platform::Webex, MeetingState::InLobby).await;

    tokio::time::timeout(Duration::from_secs(2), coordinator.stop())
        .await
        .expect("stop waited on the lobby")
        .unwrap();
    assert!(matches!(join.await.unwrap(), Err(MeetingError::Cancelled)));
    assert!(!coordinator.get_status().await.running);
}

#[tokio::test]
async fn failed_join_can_be_retried_on_same_platform() {
    let failing_opens = Arc::new(AtomicUsize::new(1));
    let scripts = HashMap::from([(
        Platform::GoogleMeet,
        Script {
            failing_opens: failing_opens.clone(),
            ..Script::default()
        },
    )]);
    let harness = Harness::started(scripts).await;
    let coordinator = &harness.coordinator;

    let err = coordinator
        .join_meeting(MEET_LINK, JoinOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, MeetingError::Join(ref reason) if reason.contains("page failed")));
    assert_eq!(coordinator.state().await, MeetingState::Error);

    coordinator
        .join_meeting(MEET_LINK, JoinOptions::default())
        .await
        .unwrap();
    assert_eq!(coordinator.state().await, MeetingState::Connected);
    assert!(harness.calls().contains(&"google_meet:close".to_string()));
}

#[tokio::test]
async fn invalid_link_for_routed_platform() {
    let harness = Harness::started(HashMap::new()).await;
    let err = harness
        .coordinator
        .join_meeting("https://zoom.us/j/not-a-number", JoinOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MeetingError::InvalidUrl {
            platform: Platform::Zoom,
            ..
        }
    ));
}

#[tokio::test]
async fn failing_listeners_do_not_block_transitions() {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let provider = build_provider(
        Platform::Teams,
        Box::new(ScriptedDriver {
            platform: Platform::Teams,
            script: Script::default(),
            calls,
        }),
        JoinTimeouts::default(),
    );

    let seen = Arc::new(Mutex::new(Vec::new()));
    provider.add_state_callback(Arc::new(|_: &MeetingEvent| -> Result<()> {
        bail!("listener broke")
    }));
    provider.add_state_callback(Arc::new(|_: &MeetingEvent| -> Result<()> {
        panic!("listener panicked")
    }));
    {
        let seen = seen.clone();
        provider.add_state_callback(Arc::new(move |event: &MeetingEvent| -> Result<()> {
            seen.lock().unwrap().push(event.state);
            Ok(())
        }));
    }

    provider
        .join_meeting(&JoinRequest::new("https://teams.live.com/meet/123", "Room"))
        .await
        .unwrap();
    provider.leave_meeting().await.unwrap();

    assert_eq!(
        *seen.lock().unwrap(),
        vec![
            MeetingState::Joining,
            MeetingState::Connected,
            MeetingState::Leaving,
            MeetingState::Idle,
        ]
    );
    assert_eq!(provider.state().await, MeetingState::Idle);
    assert!(provider.current_meeting().await.is_none());
}

#[tokio::test]
async fn provider_guards_session_operations() {
    let provider = build_provider(
        Platform::Zoom,
        Box::new(ScriptedDriver {
            platform: Platform::Zoom,
            script: Script::default(),
            calls: Arc::new(Mutex::new(Vec::new())),
        }),
        JoinTimeouts::default(),
    );

    provider.leave_meeting().await.unwrap();
    assert!(matches!(
        provider.toggle_camera().await,
        Err(MeetingError::InvalidState {
            state: MeetingState::Idle,
            ..
        })
    ));

    provider
        .join_meeting(&JoinRequest::new("https://zoom.us/j/42", "Room"))
        .await
        .unwrap();
    assert!(matches!(
        provider
            .join_meeting(&JoinRequest::new("https://zoom.us/j/43", "Room"))
            .await,
        Err(MeetingError::InvalidState {
            state: MeetingState::Connected,
            ..
        })
    ));
}

#[tokio::test]
async fn coordinator_runs_as_a_service() {
    let calls: Calls = Arc::new(Mutex::new(Vec::new()));
    let coordinator = Arc::new(MeetingCoordinator::new(
        PlatformRouter::new().unwrap(),
        Box::new(ScriptedFactory {
            scripts: HashMap::new(),
            calls: calls.clone(),
            timeouts: JoinTimeouts::default(),
        }),
        vec![Platform::Zoom, Platform::Webex],
        RoomDefaults::default(),
    ));

    let orchestrator = Orchestrator::new();
    orchestrator
        .register(coordinator.clone(), [] as [&str; 0])
        .await
        .unwrap();
    orchestrator.start_all().await.unwrap();
    assert_eq!(
        orchestrator.status("meeting").await.unwrap().state,
        ServiceState::Running
    );
    assert_eq!(
        coordinator.available_platforms().await,
        vec![Platform::Zoom, Platform::Webex]
    );

    coordinator
        .join_meeting("https://zoom.us/j/42", JoinOptions::default())
        .await
        .unwrap();

    orchestrator.stop_all().await;
    assert_eq!(coordinator.state().await, MeetingState::Idle);
    assert!(coordinator.available_platforms().await.is_empty());

    let calls = calls.lock().unwrap().clone();
    assert!(calls.contains(&"zoom:close".to_string()));
    assert!(calls.contains(&"zoom:release".to_string()));
    assert!(calls.contains(&"webex:release".to_string()));
}
