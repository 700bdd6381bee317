//! Meeting session types and the shared session handle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::Platform;

/// Phase of a meeting session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingState {
    Idle,
    Joining,
    InLobby,
    Connected,
    Leaving,
    Error,
}

impl MeetingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Joining => "joining",
            Self::InLobby => "in_lobby",
            Self::Connected => "connected",
            Self::Leaving => "leaving",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MeetingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar metadata attached to a join, when the caller knows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeetingDetails {
    pub title: Option<String>,
    pub organizer: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
}

/// Fully resolved join parameters handed to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinRequest {
    pub url: String,
    pub display_name: String,
    pub camera_on: bool,
    pub mic_on: bool,
    pub details: MeetingDetails,
}

impl JoinRequest {
    pub fn new(url: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            display_name: display_name.into(),
            camera_on: true,
            mic_on: true,
            details: MeetingDetails::default(),
        }
    }
}

/// The meeting owned by the active provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingInfo {
    pub platform: Platform,
    pub meeting_id: String,
    pub url: String,
    pub title: Option<String>,
    pub organizer: Option<String>,
    pub scheduled_start: Option<DateTime<Utc>>,
    pub scheduled_end: Option<DateTime<Utc>>,
    pub participants: Vec<String>,
    pub camera_on: bool,
    pub muted: bool,
    pub error_message: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl MeetingInfo {
    pub fn new(platform: Platform, meeting_id: String, url: String, request: &JoinRequest) -> Self {
        Self {
            platform,
            meeting_id,
            url,
            title: request.details.title.clone(),
            organizer: request.details.organizer.clone(),
            scheduled_start: request.details.scheduled_start,
            scheduled_end: request.details.scheduled_end,
            participants: Vec::new(),
            camera_on: request.camera_on,
            muted: !request.mic_on,
            error_message: None,
            joined_at: None,
        }
    }
}

/// A provider state transition, as delivered to listeners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeetingEvent {
    pub platform: Platform,
    pub state: MeetingState,
    pub meeting: Option<MeetingInfo>,
    pub at: DateTime<Utc>,
}

/// Listener invoked synchronously on every transition.
pub type StateCallback = Arc<dyn Fn(&MeetingEvent) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone)]
struct SessionState {
    state: MeetingState,
    meeting: Option<MeetingInfo>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            state: MeetingState::Idle,
            meeting: None,
        }
    }
}

/// Shared session state for one provider plus its registered listeners.
///
/// Every transition notifies listeners in registration order. A listener
/// that fails or panics is logged and skipped; the transition and the
/// remaining listeners are unaffected.
#[derive(Clone)]
pub struct SessionHandle {
    platform: Platform,
    inner: Arc<Mutex<SessionState>>,
    callbacks: Arc<StdMutex<Vec<StateCallback>>>,
}

impl SessionHandle {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            inner: Arc::new(Mutex::new(SessionState::default())),
            callbacks: Arc::new(StdMutex::new(Vec::new())),
        }
    }

    pub fn add_callback(&self, callback: StateCallback) {
        self.callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(callback);
    }

    pub async fn state(&self) -> MeetingState {
        self.inner.lock().await.state
    }

    pub async fn meeting(&self) -> Option<MeetingInfo> {
        self.inner.lock().await.meeting.clone()
    }

    /// Replace the meeting wholesale and enter `Joining`.
    pub async fn begin(&self, meeting: MeetingInfo) {
        self.apply(|session| {
            session.state = MeetingState::Joining;
            session.meeting = Some(meeting);
        })
        .await;
    }

    pub async fn set_state(&self, state: MeetingState) {
        self.apply(|session| {
            session.state = state;
            if state == MeetingState::Connected {
                if let Some(meeting) = session.meeting.as_mut() {
                    meeting.joined_at = Some(Utc::now());
                }
            }
        })
        .await;
    }

    /// Enter `Error`, keeping the last known meeting info.
    pub async fn fail(&self, message: String) {
        self.apply(|session| {
            session.state = MeetingState::Error;
            if let Some(meeting) = session.meeting.as_mut() {
                meeting.error_message = Some(message);
            }
        })
        .await;
    }

    /// Discard the meeting and return to `Idle`.
    pub async fn clear(&self) {
        self.apply(|session| *session = SessionState::default())
            .await;
    }

    /// Update live meeting fields without a state transition.
    pub async fn update_meeting<F>(&self, update: F) -> Option<MeetingInfo>
    where
        F: FnOnce(&mut MeetingInfo),
    {
        let mut session = self.inner.lock().await;
        let meeting = session.meeting.as_mut()?;
        update(meeting);
        Some(meeting.clone())
    }

    async fn apply<F>(&self, change: F)
    where
        F: FnOnce(&mut SessionState),
    {
        let event = {
            let mut session = self.inner.lock().await;
            change(&mut session);
            MeetingEvent {
                platform: self.platform,
                state: session.state,
                meeting: session.meeting.clone(),
                at: Utc::now(),
            }
        };

        debug!("{} session is now {}", self.platform, event.state);
        self.dispatch(&event);
    }

    fn dispatch(&self, event: &MeetingEvent) {
        let callbacks: Vec<StateCallback> = self
            .callbacks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, callback) in callbacks.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(
                    "State callback {} failed on {} transition: {:#}",
                    index, event.state, e
                ),
                Err(_) => warn!(
                    "State callback {} panicked on {} transition",
                    index, event.state
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;

    fn meeting() -> MeetingInfo {
        let request = JoinRequest::new("https://meet.google.com/abc-defg-hij", "Room");
        MeetingInfo::new(
            Platform::GoogleMeet,
            "abc-defg-hij".to_string(),
            request.url.clone(),
            &request,
        )
    }

    fn recorder(handle: &SessionHandle) -> Arc<StdMutex<Vec<MeetingState>>> {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let sink = seen.clone();
        handle.add_callback(Arc::new(move |event: &MeetingEvent| -> anyhow::Result<()> {
            sink.lock().unwrap().push(event.state);
            Ok(())
        }));
        seen
    }

    #[test]
    fn test_meeting_state_as_str() {
        assert_eq!(MeetingState::Idle.as_str(), "idle");
        assert_eq!(MeetingState::Joining.as_str(), "joining");
        assert_eq!(MeetingState::InLobby.as_str(), "in_lobby");
        assert_eq!(MeetingState::Connected.as_str(), "connected");
        assert_eq!(MeetingState::Leaving.as_str(), "leaving");
        assert_eq!(MeetingState::Error.as_str(), "error");
        assert_eq!(
            serde_json::to_string(&MeetingState::InLobby).unwrap(),
            "\"in_lobby\""
        );
    }

    #[test]
    fn test_meeting_info_from_request() {
        let mut request = JoinRequest::new("https://zoom.us/j/1", "Room");
        request.mic_on = false;
        request.camera_on = false;
        request.details.title = Some("Standup".to_string());

        let info = MeetingInfo::new(Platform::Zoom, "1".to_string(), request.url.clone(), &request);
        assert!(info.muted);
        assert!(!info.camera_on);
        assert_eq!(info.title.as_deref(), Some("Standup"));
        assert!(info.participants.is_empty());
    }

    #[tokio::test]
    async fn test_handle_lifecycle_notifies_in_order() {
        let handle = SessionHandle::new(Platform::GoogleMeet);
        let seen = recorder(&handle);

        handle.begin(meeting()).await;
        handle.set_state(MeetingState::InLobby).await;
        handle.set_state(MeetingState::Connected).await;
        assert!(handle.meeting().await.unwrap().joined_at.is_some());
        handle.set_state(MeetingState::Leaving).await;
        handle.clear().await;

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                MeetingState::Joining,
                MeetingState::InLobby,
                MeetingState::Connected,
                MeetingState::Leaving,
                MeetingState::Idle,
            ]
        );
        assert!(handle.meeting().await.is_none());
    }

    #[tokio::test]
    async fn test_fail_keeps_partial_meeting() {
        let handle = SessionHandle::new(Platform::GoogleMeet);
        handle.begin(meeting()).await;
        handle.fail("page did not load".to_string()).await;

        assert_eq!(handle.state().await, MeetingState::Error);
        let info = handle.meeting().await.unwrap();
        assert_eq!(info.meeting_id, "abc-defg-hij");
        assert_eq!(info.error_message.as_deref(), Some("page did not load"));
    }

    #[tokio::test]
    async fn test_failing_callbacks_are_isolated() {
        let handle = SessionHandle::new(Platform::Teams);
        handle.add_callback(Arc::new(|_: &MeetingEvent| -> anyhow::Result<()> {
            bail!("listener offline")
        }));
        handle.add_callback(Arc::new(|_: &MeetingEvent| -> anyhow::Result<()> {
            panic!("listener bug")
        }));
        let seen = recorder(&handle);

        handle.begin(meeting()).await;
        handle.set_state(MeetingState::Connected).await;

        assert_eq!(handle.state().await, MeetingState::Connected);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![MeetingState::Joining, MeetingState::Connected]
        );
    }

    #[tokio::test]
    async fn test_update_meeting_without_meeting() {
        let handle = SessionHandle::new(Platform::Zoom);
        assert!(handle.update_meeting(|m| m.camera_on = true).await.is_none());
    }
}
