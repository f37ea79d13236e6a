//! Replicated-journal core
//!
//! Node-role configuration, replicated-log environment lifecycle with
//! handshake verification and bounded retry, named-log handle registry,
//! membership administration, leader-fencing epoch log, and network
//! catch-up recovery. Journal payloads are opaque: records are byte-keyed
//! entries addressed by monotonically increasing log identifiers, and
//! nothing here interprets them.

pub mod durability;
pub mod errors;
pub mod lifecycle;
pub mod listener;
pub mod membership;
pub mod node;
pub mod recovery;
mod registry;
pub mod retry;

pub use durability::{build_settings, AckPolicy, Durability, JournalSettings, SyncPolicy};
pub use errors::{JournalError, JournalResult};
pub use lifecycle::JournalEnvironment;
pub use listener::{GroupRole, RoleChangeListener, RoleTransition, RoleWatch};
pub use membership::{admin_addresses, MembershipAdmin};
pub use node::{ensure_port_free, HostPort, NodeIdentity, NodeRole};
pub use recovery::RecoveryCoordinator;
pub use registry::NamedLog;
pub use retry::{ReadinessWait, RetryPolicy};

/// Name of the replication group every journal node joins. Fixed for the
/// whole deployment.
pub const JOURNAL_GROUP_NAME: &str = "SQL_METADATA_JOURNAL_GROUP";

/// Reserved name of the leader-fencing epoch log. Managed by a dedicated
/// accessor; never served by the generic open/list path.
pub const EPOCH_LOG_NAME: &str = "epochDB";
