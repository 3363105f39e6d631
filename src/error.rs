//! Error types for lead extraction

use thiserror::Error;

use crate::resilience::OperationClass;

/// Errors surfaced by the crate's fallible constructors and adapters.
///
/// Per-email problems (ambiguous detection, missing fields, failed
/// validation) are not errors at this level: they are folded into the
/// lead record's metadata or the pipeline's terminal outcome.
#[derive(Error, Debug)]
pub enum LeadError {
    /// A built-in or registered pattern failed to compile
    #[error("Invalid pattern for {owner}: {source}")]
    Pattern {
        owner: String,
        #[source]
        source: regex::Error,
    },

    /// Failed to decode the raw message
    #[error("Failed to decode email: {0}")]
    Decode(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] envconfig::Error),
}

impl LeadError {
    pub(crate) fn pattern(owner: impl Into<String>, source: regex::Error) -> Self {
        Self::Pattern {
            owner: owner.into(),
            source,
        }
    }
}

/// Failure reported by an external collaborator (object store, queue).
///
/// The collaborator decides the kind: transient errors are retried by the
/// resilience layer, permanent ones are not.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoundaryError {
    /// Timeout, throttling, 5xx and similar recoverable conditions
    #[error("transient failure: {0}")]
    Transient(String),

    /// Malformed request, missing object, access denied
    #[error("permanent failure: {0}")]
    Permanent(String),
}

impl BoundaryError {
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Aggregated failure of a protected boundary call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResilienceError {
    /// The circuit for this operation class is open; nothing was attempted
    #[error("circuit open for {operation}")]
    CircuitOpen { operation: OperationClass },

    /// Every allowed attempt failed with a retriable error
    #[error("{operation} failed after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        operation: OperationClass,
        attempts: u32,
        #[source]
        last: BoundaryError,
    },

    /// The collaborator refused the call with a non-retriable error
    #[error("{operation} rejected: {source}")]
    Rejected {
        operation: OperationClass,
        #[source]
        source: BoundaryError,
    },
}

impl ResilienceError {
    /// Whether the failure may clear up on a later invocation.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. } | Self::RetriesExhausted { .. })
    }

    #[must_use]
    pub const fn operation(&self) -> OperationClass {
        match self {
            Self::CircuitOpen { operation }
            | Self::RetriesExhausted { operation, .. }
            | Self::Rejected { operation, .. } => *operation,
        }
    }
}

/// Result type for lead extraction operations
pub type Result<T> = std::result::Result<T, LeadError>;
