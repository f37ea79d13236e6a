//! Recovery from insufficient local history
//!
//! When an environment open is refused because the local log store lacks
//! entries the group considers required, the missing segments are fetched
//! from a reachable peer over the network and obsolete local log files are
//! discarded. This path repairs the log store only; it never reads or
//! writes catalog data. Control then returns to the setup retry loop for
//! another open attempt.

use std::path::Path;

use crate::observability::Logger;
use crate::provider::{InsufficientHistory, ReplicationProvider};

/// Coordinates network catch-up for one environment home.
#[derive(Debug)]
pub struct RecoveryCoordinator<'a, P: ReplicationProvider> {
    provider: &'a P,
    env_home: &'a Path,
}

impl<'a, P: ReplicationProvider> RecoveryCoordinator<'a, P> {
    /// Build a coordinator for the given provider and environment home.
    pub fn new(provider: &'a P, env_home: &'a Path) -> Self {
        Self { provider, env_home }
    }

    /// Pull the segments named by `refusal` from a peer.
    ///
    /// Best effort: failures are logged and absorbed, because the retry
    /// loop will surface a persistent problem on its next open attempt
    /// either way.
    pub fn catch_up(&self, refusal: &InsufficientHistory) {
        let peers = refusal
            .log_providers
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",");
        Logger::info(
            "JOURNAL_NETWORK_RESTORE_START",
            &[("peers", peers.as_str()), ("detail", &refusal.detail)],
        );

        // Obsolete local log files are discarded, not retained.
        match self
            .provider
            .restore_from_peer(self.env_home, refusal, false)
        {
            Ok(()) => {
                Logger::info("JOURNAL_NETWORK_RESTORE_COMPLETE", &[]);
            }
            Err(e) => {
                Logger::warn(
                    "JOURNAL_NETWORK_RESTORE_FAILED",
                    &[("error", &e.to_string())],
                );
            }
        }
    }
}
