//! Journal environment error types
//!
//! Two classes matter to callers of `setup()`: fatal configuration errors
//! (operator mistakes, raised immediately, never retried) and retry-budget
//! exhaustion (the last transient cause, wrapped). Everything else is
//! resolved inside the environment: retried, recovered, or absorbed.

use thiserror::Error;

use crate::provider::ProviderError;

use super::node::HostPort;

/// Result type for journal environment operations
pub type JournalResult<T> = Result<T, JournalError>;

/// Journal environment errors
#[derive(Debug, Error)]
pub enum JournalError {
    /// Invalid bootstrap configuration. Operator error; never retried.
    #[error("invalid journal configuration: {0}")]
    Configuration(String),

    /// The node's own replication port is already bound by another process.
    #[error("replication port {0} is already in use")]
    PortInUse(HostPort),

    /// The local log store records a replication group that does not contain
    /// the configured helper: the store belongs to a different group than
    /// the one the helper claims to lead.
    #[error("local log store does not recognize helper {helper} (members: {members:?})")]
    HelperMismatch {
        /// The configured helper address.
        helper: HostPort,
        /// Addresses found in the local store's membership record.
        members: Vec<String>,
    },

    /// Environment setup failed after exhausting the retry budget.
    #[error("environment setup failed after {attempts} attempts")]
    SetupExhausted {
        /// Number of attempts made.
        attempts: usize,
        /// The failure observed on the last attempt.
        #[source]
        cause: ProviderError,
    },

    /// The environment is shutting down; the operation was rejected without
    /// blocking.
    #[error("journal environment is closing")]
    Closing,

    /// A provider failure surfaced through an operation that does not retry.
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl JournalError {
    /// Check whether this error indicates operator/config error rather than
    /// transient cluster state. Fatal-configuration failures must abort
    /// startup; nothing downstream may serve metadata in that state.
    pub fn is_fatal_configuration(&self) -> bool {
        matches!(
            self,
            JournalError::Configuration(_)
                | JournalError::PortInUse(_)
                | JournalError::HelperMismatch { .. }
        )
    }
}
