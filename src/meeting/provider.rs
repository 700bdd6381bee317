//! Provider contract implemented by each meeting platform backend.

use async_trait::async_trait;
use std::sync::Arc;

use super::{JoinRequest, MeetingError, MeetingInfo, MeetingState, Platform, StateCallback};

/// One videoconferencing backend, owning its own session state.
///
/// Session flow: `Idle → Joining → (InLobby) → Connected → Leaving → Idle`,
/// with `Error` reachable from any in-flight step. Every transition is
/// delivered to the callbacks registered through [`Provider::add_state_callback`].
#[async_trait]
pub trait Provider: Send + Sync {
    fn platform(&self) -> Platform;

    fn name(&self) -> &'static str {
        self.platform().as_str()
    }

    fn display_name(&self) -> &'static str {
        self.platform().display_name()
    }

    fn can_handle_url(&self, url: &str) -> bool;

    fn extract_meeting_id(&self, url: &str) -> Option<String>;

    /// Acquire provider-level resources. Must not be called twice without
    /// an intervening [`Provider::shutdown`].
    async fn initialize(&self) -> Result<(), MeetingError>;

    /// Release provider-level resources, leaving any live session first.
    async fn shutdown(&self);

    /// Join from `Idle` or `Error`. On failure the session is left in
    /// `Error` with the partial meeting info retained.
    async fn join_meeting(&self, request: &JoinRequest) -> Result<MeetingInfo, MeetingError>;

    /// Leave from `Connected`, `InLobby` or `Error`. A no-op when idle.
    async fn leave_meeting(&self) -> Result<(), MeetingError>;

    /// Flip the camera while `Connected`, returning the new camera state.
    async fn toggle_camera(&self) -> Result<bool, MeetingError>;

    /// Flip the microphone while `Connected`, returning whether it is now muted.
    async fn toggle_mute(&self) -> Result<bool, MeetingError>;

    async fn state(&self) -> MeetingState;

    async fn current_meeting(&self) -> Option<MeetingInfo>;

    fn add_state_callback(&self, callback: StateCallback);
}

/// Builds providers for the platforms enabled in configuration.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, platform: Platform) -> anyhow::Result<Arc<dyn Provider>>;
}
