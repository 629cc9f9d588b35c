//! Engine error taxonomy
//!
//! Only caller contract violations and configuration problems are errors.
//! Incomplete landmarks, degenerate geometry and unknown exercises degrade
//! the analysis instead of failing it.

use crate::types::SessionId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    #[error("session {0} has already been completed")]
    SessionCompleted(SessionId),

    #[error("out-of-order timestamp for session {session}: received {received}s after {previous}s")]
    OutOfOrderTimestamp {
        session: SessionId,
        previous: f64,
        received: f64,
    },

    #[error("timestamp must be a finite number of seconds, got {0}")]
    InvalidTimestamp(f64),

    #[error("pose must contain {expected} landmarks, got {got}")]
    InvalidPose { expected: usize, got: usize },

    #[error("invalid body profile: {0}")]
    InvalidProfile(String),

    #[error("failed to parse config: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
