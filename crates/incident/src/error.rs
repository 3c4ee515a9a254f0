//! Error types for the incident engine.

use std::fmt;

use thiserror::Error;

use crate::model::{IncidentId, IncidentStatus};

/// Convenience alias used across the engine.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by a storage backend.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The requested record does not exist
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// The backend rejected or failed the operation
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Build a not-found error for a record kind and key.
    pub fn not_found(kind: &'static str, key: impl fmt::Display) -> Self {
        Self::NotFound {
            kind,
            key: key.to_string(),
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Errors surfaced by the messaging platform.
#[derive(Debug, Clone, Error)]
pub enum MessagingError {
    /// The platform answered but reported a failure (e.g. `channel_not_found`)
    #[error("{method} failed: {error}")]
    Api { method: String, error: String },

    /// The request never produced a usable answer
    #[error("transport error: {0}")]
    Transport(String),

    /// Rate limited by the platform
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Client is missing credentials or settings
    #[error("messaging client not configured: {0}")]
    NotConfigured(String),
}

impl MessagingError {
    /// Platform error code, when the platform produced one.
    #[must_use]
    pub fn api_code(&self) -> Option<&str> {
        match self {
            Self::Api { error, .. } => Some(error.as_str()),
            _ => None,
        }
    }
}

/// Hard-failing steps of the creation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateStep {
    AllocateNumber,
    ProvisionChannel,
    PersistIncident,
}

impl fmt::Display for CreateStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let step = match self {
            Self::AllocateNumber => "allocate incident number",
            Self::ProvisionChannel => "create incident channel",
            Self::PersistIncident => "save incident",
        };
        f.write_str(step)
    }
}

/// Engine-level errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Input was rejected before any side effect
    #[error("invalid input: {0}")]
    Validation(String),

    /// Incident, request or user is unknown
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// Incident request exists but its window has passed
    #[error("incident request {0} has expired")]
    RequestExpired(String),

    /// Transition to the status the incident already has
    #[error("incident {id} is already {status}")]
    NoOpTransition { id: IncidentId, status: IncidentStatus },

    /// A hard step of the creation pipeline failed; nothing usable was created
    #[error("failed to {step}: {source}")]
    Create {
        step: CreateStep,
        #[source]
        source: Box<Error>,
    },

    /// The incident was saved but its audit trail could not be started
    #[error("incident {incident_id} was saved but its initial status history was not: {source}")]
    InitialHistoryMissing {
        incident_id: IncidentId,
        #[source]
        source: Box<Error>,
    },

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(String),

    /// Generated content could not be produced
    #[error("content generation failed: {0}")]
    Content(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { kind, key } => Self::NotFound { kind, key },
            other => Self::Store(other),
        }
    }
}

impl Error {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn at(step: CreateStep, source: impl Into<Error>) -> Self {
        Self::Create {
            step,
            source: Box::new(source.into()),
        }
    }

    /// Whether the caller should render "not found / expired" rather than a
    /// generic failure.
    #[must_use]
    pub fn is_missing_request(&self) -> bool {
        match self {
            Self::RequestExpired(_) => true,
            Self::NotFound { kind, .. } => *kind == crate::model::REQUEST_KIND,
            _ => false,
        }
    }
}
