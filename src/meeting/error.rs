use thiserror::Error;

use super::{MeetingState, Platform};

/// Errors surfaced by providers and the meeting coordinator.
#[derive(Debug, Error)]
pub enum MeetingError {
    /// Neither the router nor any loaded provider recognises the link.
    #[error("no meeting platform recognises '{0}'")]
    UnknownPlatform(String),

    #[error("'{url}' is not a valid {platform} meeting link")]
    InvalidUrl { platform: Platform, url: String },

    /// The platform was recognised but no provider is loaded for it.
    #[error("no provider loaded for {0}")]
    ProviderNotFound(Platform),

    #[error("cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: MeetingState,
    },

    /// Joining failed (network, page or timeout fault from the transport).
    #[error("failed to join meeting: {0}")]
    Join(String),

    /// A leave request cancelled the join before it completed.
    #[error("join cancelled by a leave request")]
    Cancelled,

    /// An in-session control command failed.
    #[error("session control failed: {0}")]
    Transport(String),

    #[error("provider failed to initialize: {0}")]
    Initialize(String),
}
