//! Consensus-provider contract
//!
//! The journal environment sits atop *some* replicated-log provider (a
//! built-in consensus log or an external replication library) and is
//! generic over these seams. The provider owns storage, elections, and
//! record-level concurrency; this crate owns lifecycle, handles, and
//! recovery orchestration. Nothing here interprets log payloads: records
//! are opaque bytes addressed by monotonically increasing log identifiers.

mod errors;

pub use errors::{InsufficientHistory, ProviderError, ProviderResult};

use std::collections::HashSet;
use std::path::Path;

use crate::journal::durability::{EnvironmentSettings, LogSettings, ReplicationSettings};
use crate::journal::listener::RoleChangeListener;
use crate::journal::node::{HostPort, NodeIdentity};

/// A node recorded in the replication group's membership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMember {
    /// Stable node name.
    pub name: String,
    /// Replication address.
    pub addr: HostPort,
}

/// Validity of a registered named-log handle.
///
/// `Stale` means the backing log was destroyed remotely (a replicated
/// remove preempted the handle): an expected race, treated exactly like
/// not-found. The registry evicts the handle without raising.
#[derive(Debug)]
pub enum HandleProbe {
    /// The handle is live; carries its reported name.
    Valid(String),
    /// The backing log no longer exists; evict silently.
    Stale,
    /// The probe itself failed; evict with a warning.
    Unknown(ProviderError),
}

/// An open handle to one named log.
///
/// Handles are shared behind `Arc` by the registry, so both operations take
/// `&self`; implementations carry their own interior mutability.
pub trait LogHandle {
    /// Check whether the handle still refers to a live log.
    fn probe(&self) -> HandleProbe;

    /// Release the handle. Called at most once per handle by this crate.
    fn close(&self) -> ProviderResult<()>;
}

/// The single open replicated-log environment of a process.
pub trait ReplicatedLogStore {
    /// Handle type for named logs within this store.
    type Handle: LogHandle;

    /// Open (or, when `settings.allow_create`, create) the named log.
    fn open_log(&self, name: &str, settings: &LogSettings) -> ProviderResult<Self::Handle>;

    /// Remove the named log. Returns `NotFound` if no such log exists.
    fn remove_log(&self, name: &str) -> ProviderResult<()>;

    /// Every log name known to the environment, in no particular order.
    fn log_names(&self) -> ProviderResult<Vec<String>>;

    /// The membership recorded in the local store. Used by the helper
    /// handshake; never cached by this crate.
    fn group_members(&self) -> ProviderResult<Vec<GroupMember>>;

    /// Install the role-change listener. The provider must call
    /// [`RoleChangeListener::announce`] for every subsequent transition, in
    /// the order observed.
    fn set_role_listener(&self, listener: RoleChangeListener) -> ProviderResult<()>;

    /// Synchronously flush the replication position index to stable
    /// storage. Used before critical checkpoints.
    fn flush_position_index(&self) -> ProviderResult<()>;

    /// Close the environment. All handles opened from it are invalidated.
    fn close(&self) -> ProviderResult<()>;
}

/// Answers group-wide queries (current primary, membership view) by asking
/// any reachable member from a configured address set.
pub trait GroupAdmin {
    /// The group's current membership view.
    fn members(&self) -> ProviderResult<Vec<GroupMember>>;

    /// The group's current primary.
    fn primary(&self) -> ProviderResult<GroupMember>;
}

/// Factory for environments, admins, and repair operations.
pub trait ReplicationProvider {
    /// Environment type.
    type Store: ReplicatedLogStore<Handle = Self::Handle>;
    /// Named-log handle type.
    type Handle: LogHandle;
    /// Group-admin type.
    type Admin: GroupAdmin;

    /// Open the replicated environment rooted at `home`.
    ///
    /// With `environment.allow_create` false, a missing store must surface
    /// as `NotFound` rather than being created.
    fn open_environment(
        &self,
        home: &Path,
        replication: &ReplicationSettings,
        environment: &EnvironmentSettings,
    ) -> ProviderResult<Self::Store>;

    /// Build a group admin that queries through the given address set.
    fn group_admin(&self, group_name: &str, admin_addrs: &HashSet<HostPort>) -> Self::Admin;

    /// Forcibly reset group membership to contain only `node`. Disaster
    /// recovery only; destroys the previous membership record.
    fn reset_group(
        &self,
        home: &Path,
        group_name: &str,
        node: &NodeIdentity,
    ) -> ProviderResult<()>;

    /// Fetch the log segments named by `refusal` from a reachable peer.
    /// With `retain_obsolete_files` false, local log files made obsolete by
    /// the transfer are deleted.
    fn restore_from_peer(
        &self,
        home: &Path,
        refusal: &InsufficientHistory,
        retain_obsolete_files: bool,
    ) -> ProviderResult<()>;
}
