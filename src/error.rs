//! Error types for tripscout
//!
//! Every failure leaving the crate is one of the canonical kinds below.
//! Provider status codes are translated at the adapter boundary.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlacesError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Missing credentials: no API key or provider configured")]
    MissingCredentials,

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Billing disabled: {0}")]
    BillingDisabled(String),

    #[error("Zero results")]
    ZeroResults,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request denied: {0}")]
    RequestDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Request cancelled")]
    Cancelled,

    #[error("Unknown error: {0}")]
    Unknown(#[from] anyhow::Error),
}

/// Flat discriminant of [`PlacesError`], used for logging and telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    InvalidCredentials,
    MissingCredentials,
    QuotaExceeded,
    BillingDisabled,
    ZeroResults,
    InvalidRequest,
    RequestDenied,
    NetworkError,
    Timeout,
    Cancelled,
    UnknownError,
}

impl PlacesError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidCredentials(_) => ErrorKind::InvalidCredentials,
            Self::MissingCredentials => ErrorKind::MissingCredentials,
            Self::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            Self::BillingDisabled(_) => ErrorKind::BillingDisabled,
            Self::ZeroResults => ErrorKind::ZeroResults,
            Self::InvalidRequest(_) => ErrorKind::InvalidRequest,
            Self::RequestDenied(_) => ErrorKind::RequestDenied,
            Self::Network(_) => ErrorKind::NetworkError,
            Self::Timeout => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Unknown(_) => ErrorKind::UnknownError,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<reqwest::Error> for PlacesError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Unknown(anyhow::anyhow!("Malformed provider payload: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for PlacesError {
    fn from(err: serde_json::Error) -> Self {
        Self::Unknown(anyhow::anyhow!("Malformed provider payload: {}", err))
    }
}

pub type Result<T> = std::result::Result<T, PlacesError>;
