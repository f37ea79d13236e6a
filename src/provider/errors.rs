//! Provider error taxonomy
//!
//! Every failure a provider can surface maps onto one of these kinds; the
//! lifecycle manager's retry and recovery decisions are driven entirely by
//! the classification helpers, never by provider-specific detail.

use thiserror::Error;

use crate::journal::node::HostPort;

/// Result type for provider operations
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Payload of an insufficient-history refusal: the peers that hold the log
/// segments this node is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientHistory {
    /// Members able to serve the missing segments.
    pub log_providers: Vec<HostPort>,
    /// Provider-specific description of the refusal.
    pub detail: String,
}

/// Failures surfaced by a replication provider
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The environment is temporarily unreachable (network partition, peer
    /// restart, disk contention). Retryable.
    #[error("environment unavailable: {0}")]
    Unavailable(String),

    /// The group has no established primary yet (an election may still be
    /// in progress). Retryable; expected for a brand-new node's first open.
    #[error("replication group has no established primary: {0}")]
    NoPrimary(String),

    /// The log store requires the environment to be reopened before it can
    /// be used again. Retryable after cleanup.
    #[error("log store requires restart: {0}")]
    RestartRequired(String),

    /// The local log history is insufficient to rejoin the group safely;
    /// repairable by a network catch-up from one of the listed peers.
    #[error("local log history insufficient to rejoin the group: {}", .0.detail)]
    InsufficientHistory(InsufficientHistory),

    /// A handle was forcibly invalidated by a replicated remove (the
    /// primary pruned a log all replicas had consumed). Expected race, not
    /// a fault.
    #[error("handle preempted by a replicated remove: {0}")]
    Preempted(String),

    /// No log (or store) with the given name exists.
    #[error("no log named '{0}' exists")]
    NotFound(String),

    /// An I/O failure inside the log store.
    #[error("log store i/o failure: {0}")]
    Io(String),
}

impl ProviderError {
    /// Whether the failure may resolve on its own and is worth another
    /// attempt from the bounded retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ProviderError::Unavailable(_)
                | ProviderError::NoPrimary(_)
                | ProviderError::RestartRequired(_)
                | ProviderError::InsufficientHistory(_)
        )
    }

    /// Whether partially opened state must be torn down before retrying.
    pub fn needs_restart(&self) -> bool {
        matches!(
            self,
            ProviderError::RestartRequired(_) | ProviderError::InsufficientHistory(_)
        )
    }

    /// The insufficient-history payload, when this failure carries one.
    pub fn insufficient_history(&self) -> Option<&InsufficientHistory> {
        match self {
            ProviderError::InsufficientHistory(refusal) => Some(refusal),
            _ => None,
        }
    }
}
