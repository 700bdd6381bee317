//! Meeting sessions.
//!
//! Platform classification, the per-platform providers that own a session,
//! and the coordinator that presents one session across all of them.

pub mod backends;
pub mod control_hook;
pub mod coordinator;
pub mod driver;
pub mod error;
pub mod platform;
pub mod provider;
pub mod status;

pub use backends::{build_provider, JoinTimeouts, LauncherProviderFactory};
pub use control_hook::{ControlAction, ControlTarget, ShellControlHook};
pub use coordinator::{CoordinatorStatus, JoinOptions, MeetingCoordinator, RoomDefaults};
pub use driver::{Admission, DriverJoin, LauncherDriver, SessionDriver};
pub use error::MeetingError;
pub use platform::{Platform, PlatformRouter};
pub use provider::{Provider, ProviderFactory};
pub use status::{
    JoinRequest, MeetingDetails, MeetingEvent, MeetingInfo, MeetingState, SessionHandle,
    StateCallback,
};
