//! Meeting session coordinator.
//!
//! Presents a single meeting session regardless of which provider is
//! active. At most one provider is active at a time: joining through any
//! provider first leaves whatever session the active one still holds.
//! Join, leave and shutdown are serialized on one session lock. A leave
//! first goes straight to the active provider, which cancels a join still
//! opening or waiting in the lobby and so releases that lock.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use super::backends;
use super::{
    JoinRequest, LauncherProviderFactory, MeetingDetails, MeetingError, MeetingEvent, MeetingInfo,
    MeetingState, Platform, PlatformRouter, Provider, ProviderFactory,
};
use crate::config::{Config, RoomConfig};
use crate::service::Service;

pub const SERVICE_NAME: &str = "meeting";

const EVENT_CAPACITY: usize = 64;

/// Room-level values used for join parameters the caller leaves unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomDefaults {
    pub display_name: String,
    pub camera_on: bool,
    pub mic_on: bool,
}

impl Default for RoomDefaults {
    fn default() -> Self {
        Self::from(&RoomConfig::default())
    }
}

impl From<&RoomConfig> for RoomDefaults {
    fn from(room: &RoomConfig) -> Self {
        let display_name = if room.display_name.trim().is_empty() {
            room.name.clone()
        } else {
            room.display_name.clone()
        };
        Self {
            display_name,
            camera_on: room.camera_on,
            mic_on: room.mic_on,
        }
    }
}

/// Optional per-join overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinOptions {
    pub display_name: Option<String>,
    pub camera_on: Option<bool>,
    pub mic_on: Option<bool>,
    pub details: MeetingDetails,
}

impl JoinOptions {
    fn into_request(self, url: &str, defaults: &RoomDefaults) -> JoinRequest {
        JoinRequest {
            url: url.trim().to_string(),
            display_name: self
                .display_name
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| defaults.display_name.clone()),
            camera_on: self.camera_on.unwrap_or(defaults.camera_on),
            mic_on: self.mic_on.unwrap_or(defaults.mic_on),
            details: self.details,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatorStatus {
    pub running: bool,
    pub state: MeetingState,
    pub meeting: Option<MeetingInfo>,
    pub available_platforms: Vec<Platform>,
}

pub struct MeetingCoordinator {
    router: PlatformRouter,
    factory: Box<dyn ProviderFactory>,
    /// Enabled platforms in preference order.
    platforms: Vec<Platform>,
    defaults: RoomDefaults,
    providers: RwLock<BTreeMap<Platform, Arc<dyn Provider>>>,
    active: RwLock<Option<Platform>>,
    /// Providers already forwarding their transitions to `events`.
    wired: Mutex<HashSet<Platform>>,
    session: Mutex<()>,
    events: broadcast::Sender<MeetingEvent>,
    running: AtomicBool,
}

impl MeetingCoordinator {
    pub fn new(
        router: PlatformRouter,
        factory: Box<dyn ProviderFactory>,
        mut platforms: Vec<Platform>,
        defaults: RoomDefaults,
    ) -> Self {
        let mut seen = HashSet::new();
        platforms.retain(|platform| seen.insert(*platform));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            router,
            factory,
            platforms,
            defaults,
            providers: RwLock::new(BTreeMap::new()),
            active: RwLock::new(None),
            wired: Mutex::new(HashSet::new()),
            session: Mutex::new(()),
            events,
            running: AtomicBool::new(false),
        }
    }

    /// Coordinator with launcher-driven providers for every enabled platform.
    pub fn from_config(config: &Config) -> Result<Self> {
        let router = PlatformRouter::new().context("Failed to build platform router")?;
        Ok(Self::new(
            router,
            Box::new(LauncherProviderFactory::new(config.meeting.clone())),
            config.meeting.platforms.clone(),
            RoomDefaults::from(&config.room),
        ))
    }

    pub fn router(&self) -> &PlatformRouter {
        &self.router
    }

    /// Router first, then the link matchers of the enabled platforms.
    /// Needs no loaded provider.
    pub fn classify(&self, url: &str) -> Option<Platform> {
        self.router.classify(url).or_else(|| {
            self.platforms
                .iter()
                .copied()
                .find(|platform| backends::can_handle_url(*platform, url))
        })
    }

    /// Receive every provider transition from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<MeetingEvent> {
        self.events.subscribe()
    }

    pub async fn join_meeting(
        &self,
        url: &str,
        options: JoinOptions,
    ) -> Result<MeetingInfo, MeetingError> {
        let _session = self.session.lock().await;

        let (platform, provider) = self.resolve(url).await?;
        self.leave_active().await?;

        self.wire(platform, &provider).await;
        *self.active.write().await = Some(platform);

        let request = options.into_request(url, &self.defaults);
        info!(
            "Joining via {} as '{}'",
            platform.display_name(),
            request.display_name
        );
        provider.join_meeting(&request).await
    }

    /// Leave the active session. Succeeds without doing anything when no
    /// provider is active.
    pub async fn leave_meeting(&self) -> Result<(), MeetingError> {
        self.interrupt_join().await?;
        let _session = self.session.lock().await;
        self.leave_active().await
    }

    /// Returns the new camera state, or `false` when nothing is active.
    pub async fn toggle_camera(&self) -> Result<bool, MeetingError> {
        match self.active_provider().await {
            Some(provider) => provider.toggle_camera().await,
            None => Ok(false),
        }
    }

    /// Returns whether the microphone is now muted, or `true` when nothing
    /// is active.
    pub async fn toggle_mute(&self) -> Result<bool, MeetingError> {
        match self.active_provider().await {
            Some(provider) => provider.toggle_mute().await,
            None => Ok(true),
        }
    }

    pub async fn state(&self) -> MeetingState {
        match self.active_provider().await {
            Some(provider) => provider.state().await,
            None => MeetingState::Idle,
        }
    }

    pub async fn current_meeting(&self) -> Option<MeetingInfo> {
        self.active_provider().await?.current_meeting().await
    }

    pub async fn active_platform(&self) -> Option<Platform> {
        *self.active.read().await
    }

    /// Loaded platforms, in preference order.
    pub async fn available_platforms(&self) -> Vec<Platform> {
        let providers = self.providers.read().await;
        self.platforms
            .iter()
            .copied()
            .filter(|platform| providers.contains_key(platform))
            .collect()
    }

    pub async fn get_status(&self) -> CoordinatorStatus {
        CoordinatorStatus {
            running: self.running.load(Ordering::SeqCst),
            state: self.state().await,
            meeting: self.current_meeting().await,
            available_platforms: self.available_platforms().await,
        }
    }

    /// Router first, then each loaded provider's own matcher.
    async fn resolve(&self, url: &str) -> Result<(Platform, Arc<dyn Provider>), MeetingError> {
        let providers = self.providers.read().await;

        let platform = match self.router.classify(url) {
            Some(platform) => platform,
            None => self
                .platforms
                .iter()
                .copied()
                .find(|platform| {
                    providers
                        .get(platform)
                        .is_some_and(|provider| provider.can_handle_url(url))
                })
                .ok_or_else(|| MeetingError::UnknownPlatform(url.trim().to_string()))?,
        };

        let provider = providers
            .get(&platform)
            .cloned()
            .ok_or(MeetingError::ProviderNotFound(platform))?;
        debug!("Resolved '{}' to {}", url.trim(), platform);
        Ok((platform, provider))
    }

    async fn active_provider(&self) -> Option<Arc<dyn Provider>> {
        let active = (*self.active.read().await)?;
        self.providers.read().await.get(&active).cloned()
    }

    /// Leave through the active provider without the session lock. A join
    /// in progress holds that lock until the provider cancels it.
    async fn interrupt_join(&self) -> Result<(), MeetingError> {
        match self.active_provider().await {
            Some(provider) => provider.leave_meeting().await,
            None => Ok(()),
        }
    }

    /// Caller must hold the session lock.
    async fn leave_active(&self) -> Result<(), MeetingError> {
        let Some(provider) = self.active_provider().await else {
            return Ok(());
        };

        let state = provider.state().await;
        if state != MeetingState::Idle {
            info!(
                "Leaving {} meeting (currently {})",
                provider.display_name(),
                state
            );
            provider.leave_meeting().await?;
        }
        *self.active.write().await = None;
        Ok(())
    }

    async fn wire(&self, platform: Platform, provider: &Arc<dyn Provider>) {
        if !self.wired.lock().await.insert(platform) {
            return;
        }

        let events = self.events.clone();
        provider.add_state_callback(Arc::new(
            move |event: &MeetingEvent| -> anyhow::Result<()> {
                // Nobody listening is fine.
                let _ = events.send(event.clone());
                Ok(())
            },
        ));
    }
}

#[async_trait]
impl Service for MeetingCoordinator {
    fn name(&self) -> &str {
        SERVICE_NAME
    }

    /// Create and initialize a provider per enabled platform. A provider
    /// that fails is skipped; failing all of them fails the start.
    async fn start(&self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Ok(());
        }

        let mut providers = self.providers.write().await;
        for &platform in &self.platforms {
            let provider = match self.factory.create(platform) {
                Ok(provider) => provider,
                Err(e) => {
                    warn!("Skipping {}: {:#}", platform.display_name(), e);
                    continue;
                }
            };
            if let Err(e) = provider.initialize().await {
                warn!("Skipping {}: {}", platform.display_name(), e);
                continue;
            }
            providers.insert(platform, provider);
        }

        if providers.is_empty() && !self.platforms.is_empty() {
            bail!("no meeting provider could be initialized");
        }

        let loaded: Vec<&str> = providers.keys().map(|platform| platform.as_str()).collect();
        info!("Meeting providers loaded: {}", loaded.join(", "));
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        if let Err(e) = self.interrupt_join().await {
            warn!("Failed to interrupt meeting while stopping: {}", e);
        }
        let _session = self.session.lock().await;

        if let Err(e) = self.leave_active().await {
            warn!("Failed to leave meeting while stopping: {}", e);
        }
        *self.active.write().await = None;

        let providers = std::mem::take(&mut *self.providers.write().await);
        for (platform, provider) in providers {
            provider.shutdown().await;
            debug!("{} provider shut down", platform);
        }
        self.wired.lock().await.clear();

        self.running.store(false, Ordering::SeqCst);
        info!("Meeting coordinator stopped");
        Ok(())
    }
}
