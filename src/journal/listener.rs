//! Role-change notification
//!
//! The provider announces every observed role transition to a
//! `RoleChangeListener`; transitions flow over a bounded channel to the
//! surrounding HA layer, at most once per transition, in order. The
//! publisher never blocks: if the consumer lags past the channel capacity,
//! the transition is dropped with a warning. The lifecycle manager keeps a
//! `RoleWatch` on the same state to poll the current role during the
//! readiness wait.

use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

use crate::observability::Logger;

/// Capacity of the transition channel before the publisher starts dropping.
pub const ROLE_CHANNEL_CAPACITY: usize = 64;

/// Role of this node within the replication group, as last reported by the
/// provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    /// No role reported yet, or an election is in progress.
    Unknown,
    /// This node is the group's primary.
    Primary,
    /// This node is a replica following the primary.
    Replica,
    /// This node has been detached from the group.
    Detached,
}

impl GroupRole {
    /// String form for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Unknown => "unknown",
            GroupRole::Primary => "primary",
            GroupRole::Replica => "replica",
            GroupRole::Detached => "detached",
        }
    }
}

/// A single role transition observed by the provider.
#[derive(Debug, Clone)]
pub struct RoleTransition {
    /// Role before the transition.
    pub from: GroupRole,
    /// Role after the transition.
    pub to: GroupRole,
    /// When the transition was observed locally.
    pub occurred_at: DateTime<Utc>,
}

/// Publisher half, handed to the provider at environment open.
#[derive(Debug, Clone)]
pub struct RoleChangeListener {
    current: Arc<Mutex<GroupRole>>,
    tx: SyncSender<RoleTransition>,
}

impl RoleChangeListener {
    /// Record a newly observed role and publish the transition.
    ///
    /// Repeated announcements of the unchanged role are ignored; each real
    /// transition is published at most once. Never blocks.
    pub fn announce(&self, to: GroupRole) {
        let from = {
            let mut current = self.current.lock().unwrap();
            let from = *current;
            if from == to {
                return;
            }
            *current = to;
            from
        };

        let transition = RoleTransition {
            from,
            to,
            occurred_at: Utc::now(),
        };
        match self.tx.try_send(transition) {
            Ok(()) => {}
            Err(TrySendError::Full(t)) => {
                Logger::warn(
                    "ROLE_TRANSITION_DROPPED",
                    &[("from", t.from.as_str()), ("to", t.to.as_str())],
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                // The HA consumer is gone; the current-role cell still tracks.
            }
        }
    }

    /// The most recently announced role.
    pub fn current(&self) -> GroupRole {
        *self.current.lock().unwrap()
    }
}

/// Polling view of the current role, kept by the lifecycle manager.
#[derive(Debug, Clone)]
pub struct RoleWatch {
    current: Arc<Mutex<GroupRole>>,
}

impl RoleWatch {
    /// The most recently announced role.
    pub fn current(&self) -> GroupRole {
        *self.current.lock().unwrap()
    }
}

/// Create a listener, its polling view, and the consumer end of the
/// transition channel. The initial role is `Unknown`.
pub fn role_listener(
    capacity: usize,
) -> (RoleChangeListener, RoleWatch, Receiver<RoleTransition>) {
    let current = Arc::new(Mutex::new(GroupRole::Unknown));
    let (tx, rx) = sync_channel(capacity);
    (
        RoleChangeListener {
            current: Arc::clone(&current),
            tx,
        },
        RoleWatch { current },
        rx,
    )
}
