//! Errors raised while registering and driving services.

use thiserror::Error;

use super::ServiceState;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// A service with the same name is already registered.
    #[error("service '{0}' is already registered")]
    Registration(String),

    /// A service failed to start. Fatal to the whole `start_all` call.
    #[error("service '{name}' failed to start: {reason}")]
    Start { name: String, reason: String },

    /// A service failed to stop. Recorded and logged, never propagated by `stop_all`.
    #[error("service '{name}' failed to stop: {reason}")]
    Stop { name: String, reason: String },

    #[error("service '{0}' not found")]
    NotFound(String),

    /// The service must be stopped before the operation is allowed.
    #[error("service '{name}' is {state}")]
    Busy { name: String, state: ServiceState },
}
