//! Error types for Taiga Bridge
//!
//! Every operation exposed by the facade returns either a normalized payload or
//! exactly one [`BridgeError`]. Resolution failures abort before any write is
//! sent; transport failures bubble up unchanged except for stale-version
//! rejections, which are lifted into [`BridgeError::VersionConflict`].

use std::fmt;

use thiserror::Error;

use crate::model::{EntityKind, LookupKind};

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Failure reported by a [`Transport`](crate::transport::Transport).
///
/// `status == 0` means the request never produced an HTTP response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("HTTP {status}: {body}")]
pub struct HttpError {
    /// HTTP status code, or 0 for network-level failures
    pub status: u16,
    /// Raw response body (or the network error text)
    pub body: String,
}

impl HttpError {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Network-level failure with no HTTP response
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(0, message)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Whether the backend rejected a write because its `version` was stale.
    pub fn is_version_conflict(&self) -> bool {
        match self.status {
            409 | 412 => true,
            400 => {
                let body = self.body.to_ascii_lowercase();
                body.contains("\"version\"") || body.contains("version doesn't match")
            }
            _ => false,
        }
    }
}

/// One step of a multi-step composition that did not go through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedStep {
    pub step: String,
    pub reason: String,
}

impl fmt::Display for FailedStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.step, self.reason)
    }
}

fn join_steps(steps: &[FailedStep]) -> String {
    steps
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Main error type for bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// No user matched the supplied username through any lookup path
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    /// A project-scoped ref has no entity of that kind in the active project
    #[error("{kind} #{reference} not found in the active project")]
    UnknownReference { kind: EntityKind, reference: i64 },

    /// No sprint of the active project has this name or id
    #[error("Sprint not found in the active project: {0}")]
    UnknownSprint(String),

    /// A status/severity/priority/type/role/point label did not match
    #[error("Unknown {kind} value: {value:?}")]
    UnknownLookupValue { kind: LookupKind, value: String },

    /// The backend rejected a write made against a stale version
    #[error("{kind} #{reference} was modified concurrently; re-read it and retry")]
    VersionConflict { kind: EntityKind, reference: String },

    /// Network or HTTP failure from the transport
    #[error("Transport failure: {0}")]
    Transport(#[from] HttpError),

    /// Some steps of a multi-step operation were applied, others were not
    #[error(
        "{operation} partially applied: applied [{}], failed [{}]",
        .applied.join(", "),
        join_steps(.failed)
    )]
    PartialCompositeFailure {
        operation: String,
        applied: Vec<String>,
        failed: Vec<FailedStep>,
    },

    /// Caller input could not be interpreted
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The backend answered with a shape this layer cannot read
    #[error("Unexpected backend response: {0}")]
    UnexpectedResponse(String),

    /// Configuration is missing or malformed
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        source: Box<BridgeError>,
    },
}

impl BridgeError {
    /// Add context to an error
    pub fn context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping context wrappers
    pub fn root(&self) -> &BridgeError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether re-issuing the same call may succeed.
    ///
    /// Conflicts are never retried here; callers decide.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root(),
            Self::VersionConflict { .. } | Self::Transport(_)
        )
    }

    /// Lift a failed write into a conflict when the backend rejected the version.
    pub(crate) fn from_write(err: HttpError, kind: EntityKind, reference: impl fmt::Display) -> Self {
        if err.is_version_conflict() {
            Self::VersionConflict {
                kind,
                reference: reference.to_string(),
            }
        } else {
            Self::Transport(err)
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add lazy context to a Result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.context(f()))
    }
}
