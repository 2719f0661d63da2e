//! Remote client errors.

use std::time::Duration;
use thiserror::Error;

use crate::ErrorKind;

/// Failure of a single call to the remote platform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// Network failure, timeout, or a 5xx answer.
    #[error("transport error: {0}")]
    Transport(String),

    /// 401/403: credentials rejected.
    #[error("authentication rejected ({status}): {message}")]
    Auth { status: u16, message: String },

    /// 429: the platform is throttling this store.
    #[error("rate limited by remote platform")]
    RateLimit { retry_after: Option<Duration> },

    #[error("remote resource not found: {0}")]
    NotFound(String),

    /// Other 4xx: the platform refused the payload.
    #[error("remote rejected request ({status}): {message}")]
    Validation { status: u16, code: Option<String>, message: String },

    #[error("unexpected remote payload: {0}")]
    Decode(String),
}

impl RemoteError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Auth { .. } => ErrorKind::Auth,
            Self::RateLimit { .. } => ErrorKind::RateLimit,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Decode(_) => ErrorKind::Decode,
        }
    }

    /// Retrying other records with the same credentials cannot succeed.
    pub fn is_phase_fatal(&self) -> bool {
        matches!(self, Self::Auth { .. } | Self::RateLimit { .. })
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transport(format!("request timed out: {err}"))
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}
