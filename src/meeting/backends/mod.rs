//! Platform backends.
//!
//! Each platform module knows how to recognise its links, pull out the
//! meeting id and build the URL a session driver should open. The shared
//! [`SessionProvider`] turns any backend plus a [`SessionDriver`] into a
//! full [`Provider`].

pub mod google_meet;
pub mod teams;
pub mod webex;
pub mod zoom;

pub use google_meet::GoogleMeet;
pub use teams::Teams;
pub use webex::Webex;
pub use zoom::Zoom;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::driver::{Admission, DriverJoin, LauncherDriver, SessionDriver};
use super::{
    JoinRequest, MeetingError, MeetingInfo, MeetingState, Platform, Provider, ProviderFactory,
    SessionHandle, StateCallback,
};
use crate::config::MeetingConfig;

/// Link handling for one platform. All functions are usable without an instance.
pub trait PlatformBackend: Send + Sync + 'static {
    const PLATFORM: Platform;

    fn can_handle_url(url: &str) -> bool;

    fn extract_meeting_id(url: &str) -> Option<String>;

    /// URL the driver should open for a link this backend handles.
    fn join_url(url: &str, meeting_id: &str) -> String;
}

#[derive(Debug, Clone, Copy)]
pub struct JoinTimeouts {
    pub join: Duration,
    pub lobby: Duration,
}

impl Default for JoinTimeouts {
    fn default() -> Self {
        Self {
            join: Duration::from_secs(60),
            lobby: Duration::from_secs(300),
        }
    }
}

impl From<&MeetingConfig> for JoinTimeouts {
    fn from(config: &MeetingConfig) -> Self {
        Self {
            join: Duration::from_secs(config.join_timeout_seconds),
            lobby: Duration::from_secs(config.lobby_timeout_seconds),
        }
    }
}

pub struct SessionProvider<B: PlatformBackend> {
    driver: Box<dyn SessionDriver>,
    session: SessionHandle,
    timeouts: JoinTimeouts,
    /// Held while a join attempt or a leave runs.
    attempt: Mutex<()>,
    /// Cancels the join attempt in flight.
    pending: Mutex<Option<CancellationToken>>,
    _backend: PhantomData<fn() -> B>,
}

impl<B: PlatformBackend> SessionProvider<B> {
    pub fn new(driver: Box<dyn SessionDriver>, timeouts: JoinTimeouts) -> Self {
        Self {
            driver,
            session: SessionHandle::new(B::PLATFORM),
            timeouts,
            attempt: Mutex::new(()),
            pending: Mutex::new(None),
            _backend: PhantomData,
        }
    }

    async fn attempt_join(
        &self,
        request: &JoinRequest,
        cancel: &CancellationToken,
    ) -> Result<MeetingInfo, MeetingError> {
        let _attempt = self.attempt.lock().await;
        if cancel.is_cancelled() {
            return Err(MeetingError::Cancelled);
        }

        let state = self.session.state().await;
        if !matches!(state, MeetingState::Idle | MeetingState::Error) {
            return Err(MeetingError::InvalidState {
                operation: "join",
                state,
            });
        }

        let url = request.url.trim();
        let meeting_id = B::extract_meeting_id(url).ok_or_else(|| MeetingError::InvalidUrl {
            platform: B::PLATFORM,
            url: url.to_string(),
        })?;
        let join_url = B::join_url(url, &meeting_id);

        // A failed earlier attempt may have left the transport half open.
        if state == MeetingState::Error {
            if let Err(e) = self.driver.close().await {
                warn!("Failed to clean up previous {} session: {:#}", B::PLATFORM, e);
            }
        }

        info!("Joining {} meeting {}", B::PLATFORM.display_name(), meeting_id);
        self.session
            .begin(MeetingInfo::new(
                B::PLATFORM,
                meeting_id.clone(),
                join_url.clone(),
                request,
            ))
            .await;

        let join = DriverJoin {
            meeting_id,
            join_url,
            display_name: request.display_name.clone(),
            camera_on: request.camera_on,
            mic_on: request.mic_on,
        };

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(MeetingError::Cancelled),
            result = self.connect(&join) => result,
        };

        match outcome {
            Ok(()) => {
                self.session.set_state(MeetingState::Connected).await;
                info!("Connected to {} meeting {}", B::PLATFORM, join.meeting_id);
                self.session
                    .meeting()
                    .await
                    .ok_or_else(|| MeetingError::Join("session was reset while joining".to_string()))
            }
            // The leave that cancelled us takes over the session.
            Err(MeetingError::Cancelled) => {
                info!("{} join abandoned before completion", B::PLATFORM);
                Err(MeetingError::Cancelled)
            }
            Err(e) => {
                warn!("{} join failed: {}", B::PLATFORM, e);
                self.session.fail(e.to_string()).await;
                Err(e)
            }
        }
    }

    async fn connect(&self, join: &DriverJoin) -> Result<(), MeetingError> {
        let admission = tokio::time::timeout(self.timeouts.join, self.driver.open(join))
            .await
            .map_err(|_| {
                MeetingError::Join(format!(
                    "timed out after {}s opening the meeting",
                    self.timeouts.join.as_secs()
                ))
            })?
            .map_err(|e| MeetingError::Join(format!("{e:#}")))?;

        if admission == Admission::Lobby {
            self.session.set_state(MeetingState::InLobby).await;
            info!("{} is waiting in the lobby", B::PLATFORM);

            tokio::time::timeout(self.timeouts.lobby, self.driver.await_admission())
                .await
                .map_err(|_| {
                    MeetingError::Join(format!(
                        "not admitted from the lobby within {}s",
                        self.timeouts.lobby.as_secs()
                    ))
                })?
                .map_err(|e| MeetingError::Join(format!("{e:#}")))?;
        }

        match self.driver.participants().await {
            Ok(participants) => {
                self.session
                    .update_meeting(|meeting| meeting.participants = participants)
                    .await;
            }
            Err(e) => warn!("Could not read {} participants: {:#}", B::PLATFORM, e),
        }

        Ok(())
    }

    async fn require_connected(&self, operation: &'static str) -> Result<(), MeetingError> {
        match self.session.state().await {
            MeetingState::Connected => Ok(()),
            state => Err(MeetingError::InvalidState { operation, state }),
        }
    }
}

#[async_trait]
impl<B: PlatformBackend> Provider for SessionProvider<B> {
    fn platform(&self) -> Platform {
        B::PLATFORM
    }

    fn can_handle_url(&self, url: &str) -> bool {
        B::can_handle_url(url)
    }

    fn extract_meeting_id(&self, url: &str) -> Option<String> {
        B::extract_meeting_id(url)
    }

    async fn initialize(&self) -> Result<(), MeetingError> {
        self.driver
            .prepare()
            .await
            .map_err(|e| MeetingError::Initialize(format!("{e:#}")))?;
        info!("{} provider ready", B::PLATFORM.display_name());
        Ok(())
    }

    async fn shutdown(&self) {
        if self.session.state().await != MeetingState::Idle {
            if let Err(e) = self.leave_meeting().await {
                warn!("Failed to leave {} meeting on shutdown: {}", B::PLATFORM, e);
            }
        }
        if let Err(e) = self.driver.release().await {
            warn!("Failed to release {} driver: {:#}", B::PLATFORM, e);
        }
    }

    async fn join_meeting(&self, request: &JoinRequest) -> Result<MeetingInfo, MeetingError> {
        // Registered before waiting on `attempt` so a leave can always reach it.
        let cancel = CancellationToken::new();
        *self.pending.lock().await = Some(cancel.clone());

        let result = self.attempt_join(request, &cancel).await;
        self.pending.lock().await.take();
        result
    }

    /// Cancels a join still opening or waiting in the lobby, then leaves.
    async fn leave_meeting(&self) -> Result<(), MeetingError> {
        if let Some(cancel) = self.pending.lock().await.as_ref() {
            cancel.cancel();
        }
        let _attempt = self.attempt.lock().await;

        let state = self.session.state().await;
        match state {
            MeetingState::Idle => return Ok(()),
            MeetingState::Leaving => {
                return Err(MeetingError::InvalidState {
                    operation: "leave",
                    state,
                })
            }
            MeetingState::Joining
            | MeetingState::InLobby
            | MeetingState::Connected
            | MeetingState::Error => {}
        }

        self.session.set_state(MeetingState::Leaving).await;
        if let Err(e) = self.driver.close().await {
            warn!("Failed to close {} session cleanly: {:#}", B::PLATFORM, e);
        }
        self.session.clear().await;
        info!("Left {} meeting", B::PLATFORM);
        Ok(())
    }

    async fn toggle_camera(&self) -> Result<bool, MeetingError> {
        self.require_connected("toggle camera").await?;
        let camera_on = !self
            .session
            .meeting()
            .await
            .map(|meeting| meeting.camera_on)
            .unwrap_or(false);

        self.driver
            .set_camera(camera_on)
            .await
            .map_err(|e| MeetingError::Transport(format!("{e:#}")))?;
        self.session
            .update_meeting(|meeting| meeting.camera_on = camera_on)
            .await;
        Ok(camera_on)
    }

    async fn toggle_mute(&self) -> Result<bool, MeetingError> {
        self.require_connected("toggle mute").await?;
        let muted = !self
            .session
            .meeting()
            .await
            .map(|meeting| meeting.muted)
            .unwrap_or(true);

        self.driver
            .set_microphone(!muted)
            .await
            .map_err(|e| MeetingError::Transport(format!("{e:#}")))?;
        self.session
            .update_meeting(|meeting| meeting.muted = muted)
            .await;
        Ok(muted)
    }

    async fn state(&self) -> MeetingState {
        self.session.state().await
    }

    async fn current_meeting(&self) -> Option<MeetingInfo> {
        self.session.meeting().await
    }

    fn add_state_callback(&self, callback: StateCallback) {
        self.session.add_callback(callback);
    }
}

/// Build the provider for `platform` on top of `driver`.
pub fn build_provider(
    platform: Platform,
    driver: Box<dyn SessionDriver>,
    timeouts: JoinTimeouts,
) -> Arc<dyn Provider> {
    match platform {
        Platform::GoogleMeet => Arc::new(SessionProvider::<GoogleMeet>::new(driver, timeouts)),
        Platform::Teams => Arc::new(SessionProvider::<Teams>::new(driver, timeouts)),
        Platform::Zoom => Arc::new(SessionProvider::<Zoom>::new(driver, timeouts)),
        Platform::Webex => Arc::new(SessionProvider::<Webex>::new(driver, timeouts)),
    }
}

/// Static link matcher for `platform`, usable without a provider.
pub fn can_handle_url(platform: Platform, url: &str) -> bool {
    match platform {
        Platform::GoogleMeet => GoogleMeet::can_handle_url(url),
        Platform::Teams => Teams::can_handle_url(url),
        Platform::Zoom => Zoom::can_handle_url(url),
        Platform::Webex => Webex::can_handle_url(url),
    }
}

/// Builds launcher-driven providers from the `[meeting]` config section.
pub struct LauncherProviderFactory {
    config: MeetingConfig,
}

impl LauncherProviderFactory {
    pub fn new(config: MeetingConfig) -> Self {
        Self { config }
    }
}

impl ProviderFactory for LauncherProviderFactory {
    fn create(&self, platform: Platform) -> Result<Arc<dyn Provider>> {
        let driver = LauncherDriver::from_config(platform, &self.config);
        Ok(build_provider(
            platform,
            Box::new(driver),
            JoinTimeouts::from(&self.config),
        ))
    }
}

/// Parse a link, assuming https when the scheme is missing.
pub(crate) fn parse_link(url: &str) -> Option<Url> {
    let url = url.trim();
    if url.is_empty() {
        return None;
    }
    Url::parse(url)
        .ok()
        .filter(|parsed| parsed.has_host())
        .or_else(|| Url::parse(&format!("https://{url}")).ok())
        .filter(|parsed| parsed.has_host())
}

/// Lowercased host of a parsed link.
pub(crate) fn host_of(url: &Url) -> String {
    url.host_str().unwrap_or_default().to_ascii_lowercase()
}

/// Whether `host` is `domain` or one of its subdomains.
pub(crate) fn host_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

pub(crate) fn path_segments(url: &Url) -> Vec<String> {
    url.path_segments()
        .map(|segments| {
            segments
                .filter(|segment| !segment.is_empty())
                .map(decode_segment)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn query_value(url: &Url, key: &str) -> Option<String> {
    url.query_pairs()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.into_owned())
        .filter(|v| !v.is_empty())
}

/// Percent-decode a path segment, keeping malformed escapes as written.
fn decode_segment(segment: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(segment.as_bytes())).into_owned()
}
