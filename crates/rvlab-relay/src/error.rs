use crate::session::SessionStatus;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no ELF artifact available for workspace '{0}'")]
    NoArtifact(String),
    #[error("relay session already started (status: {0})")]
    AlreadyStarted(SessionStatus),
    #[error("failed to connect to {url}: {message}")]
    Dial { url: String, message: String },
    #[error("websocket error: {0}")]
    Transport(String),
    #[error("malformed relay frame: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("session is not accepting input (status: {0})")]
    NotAcceptingInput(SessionStatus),
    #[error("relay session is closed")]
    Closed,
}
