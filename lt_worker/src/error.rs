//! Error helpers.

use axum::response::IntoResponse;
use http::StatusCode;

use crate::riot::RiotError;
use crate::schedule::RunError;
use crate::store::StoreError;
use crate::webjob::FailReason;

/// Error helper type.
#[derive(Debug)]
pub enum LtError {
    /// [`StoreError`]
    Store(StoreError),
    /// [`RiotError`]
    Riot(RiotError),
    /// [`RunError`]
    Run(RunError),
    /// Missing or invalid configuration.
    Config(String),
    /// Riot API failed during a synchronous lookup.
    Upstream(String),
    /// Could not bind or serve.
    Io(std::io::Error),
    /// Requested resource does not exist. The message is shown to the client.
    NotFound(String),
    /// Malformed request. The message is shown to the client.
    BadRequest(String),
}
impl std::fmt::Display for LtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LtError::Store(e) => write!(f, "Store error: {}", e),
            LtError::Riot(e) => write!(f, "Riot API error: {}", e),
            LtError::Run(e) => write!(f, "Update error: {}", e),
            LtError::Config(msg) => write!(f, "Config error: {}", msg),
            LtError::Upstream(msg) => write!(f, "Upstream error: {}", msg),
            LtError::Io(e) => write!(f, "IO error: {}", e),
            LtError::NotFound(msg) => write!(f, "Not found: {}", msg),
            LtError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
        }
    }
}
impl std::error::Error for LtError {}
impl From<StoreError> for LtError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::NotFound(format!("No player with ID {}.", id)),
            StoreError::Duplicate(_) => Self::BadRequest("Player is already tracked.".to_owned()),
            other => Self::Store(other),
        }
    }
}
impl From<RiotError> for LtError {
    fn from(value: RiotError) -> Self {
        Self::Riot(value)
    }
}
impl From<RunError> for LtError {
    fn from(value: RunError) -> Self {
        Self::Run(value)
    }
}
impl From<FailReason> for LtError {
    fn from(value: FailReason) -> Self {
        match value {
            FailReason::NotFound => Self::NotFound("Riot account not found.".to_owned()),
            FailReason::MalformedName => {
                Self::BadRequest("Expected Riot ID `gameName#tagLine`.".to_owned())
            }
            FailReason::Upstream(msg) => Self::Upstream(msg),
            reason @ (FailReason::InvalidIdentity(_) | FailReason::InvalidUpdate(_)) => {
                Self::BadRequest(reason.to_string())
            }
        }
    }
}
impl From<std::io::Error> for LtError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
impl IntoResponse for LtError {
    fn into_response(self) -> axum::response::Response {
        match self {
            LtError::NotFound(msg) => (StatusCode::NOT_FOUND, msg).into_response(),
            LtError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            LtError::Run(RunError::AlreadyRunning) => {
                (StatusCode::CONFLICT, "An update is already running.").into_response()
            }
            other => {
                log::error!("Request failed: {}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.").into_response()
            }
        }
    }
}
