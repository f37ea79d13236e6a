//! Role & durability configuration builder
//!
//! Derives the environment, replication, per-transaction, and per-log
//! settings bundles from the node's role and the bootstrap tunables. Pure
//! function of its inputs: no I/O, and unknown policy-name strings fall
//! back silently to the documented defaults rather than failing; callers
//! rely on that fallback.
//!
//! Durability is configured if and only if the node is electable; observers
//! never originate writes, so they never set a durability policy.

use crate::config::JournalConfig;

use super::node::{HostPort, NodeRole};

/// Share of process memory granted to the log store's cache.
const CACHE_PERCENT: u8 = 20;

/// Seconds an opening environment may sit in the unknown state before the
/// open call itself gives up.
const UNKNOWN_STATE_TIMEOUT_SECS: u64 = 10;

/// When a commit must reach stable storage on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Flush and fsync on every commit.
    Sync,
    /// Neither flush nor fsync; durability deferred entirely.
    NoSync,
    /// Write to the OS but do not fsync. The default.
    WriteNoSync,
}

impl SyncPolicy {
    /// Parse a policy name, case-insensitively. Unknown names silently fall
    /// back to `WriteNoSync`.
    pub fn parse_or_default(name: &str) -> Self {
        if name.eq_ignore_ascii_case("SYNC") {
            SyncPolicy::Sync
        } else if name.eq_ignore_ascii_case("NO_SYNC") {
            SyncPolicy::NoSync
        } else {
            SyncPolicy::WriteNoSync
        }
    }
}

/// How many replicas must acknowledge a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Every electable replica must acknowledge.
    All,
    /// No acknowledgement required.
    None,
    /// A simple majority of electable nodes. The default.
    SimpleMajority,
}

impl AckPolicy {
    /// Parse a policy name, case-insensitively. Unknown names silently fall
    /// back to `SimpleMajority`.
    pub fn parse_or_default(name: &str) -> Self {
        if name.eq_ignore_ascii_case("ALL") {
            AckPolicy::All
        } else if name.eq_ignore_ascii_case("NONE") {
            AckPolicy::None
        } else {
            AckPolicy::SimpleMajority
        }
    }
}

/// The durability triple applied to commits originated by this node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Durability {
    /// Sync policy on the primary.
    pub primary_sync: SyncPolicy,
    /// Sync policy on replicas.
    pub replica_sync: SyncPolicy,
    /// Replica acknowledgement policy.
    pub replica_ack: AckPolicy,
}

/// Node type as presented to the replication provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderNodeType {
    /// Full member: holds data, votes, may become primary.
    Electable,
    /// Non-voting member: holds data, never elected.
    Secondary,
}

/// Replication settings bundle handed to the provider at environment open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplicationSettings {
    /// Stable name of the local node.
    pub node_name: String,
    /// Replication address of the local node.
    pub node_addr: HostPort,
    /// Address used to locate the group on first contact.
    pub helper_addr: HostPort,
    /// Replication group name.
    pub group_name: String,
    /// Electable or secondary.
    pub node_type: ProviderNodeType,
    /// Bound on how long an open may report an unknown state.
    pub unknown_state_timeout_secs: u64,
    /// Maximum tolerated clock skew between members, in milliseconds.
    pub max_clock_delta_ms: u64,
    /// Maximum transactions that may be rolled back to rejoin the group.
    pub txn_rollback_limit: u32,
    /// Heartbeat timeout before a replica considers its feeder dead.
    pub replica_timeout_secs: u64,
    /// Heartbeat timeout before the feeder considers a replica dead.
    pub feeder_timeout_secs: u64,
    /// Replay cost budget (percent) before a network restore is preferred
    /// over log replay.
    pub replay_cost_percent: u32,
    /// How long the primary waits for replica acknowledgements. Electable
    /// nodes only.
    pub replica_ack_timeout_secs: Option<u64>,
    /// Replica-side group commit limit; zero disables batching. Electable
    /// nodes only.
    pub replica_group_commit_limit: Option<u32>,
    /// Whether joining requires the local store to be consistent with the
    /// group first. Always false here: the journal layer catches up after
    /// the handle is open.
    pub require_consistency_on_join: bool,
}

/// Environment-wide settings bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentSettings {
    /// All access is transactional.
    pub transactional: bool,
    /// Whether a missing store may be created on open.
    pub allow_create: bool,
    /// Share of memory granted to the store's cache.
    pub cache_percent: u8,
    /// Record-lock timeout.
    pub lock_timeout_secs: u64,
    /// Verbosity of the store's own file logging.
    pub file_log_level: String,
    /// Number of log-cleaner threads.
    pub cleaner_threads: u32,
    /// Durability for writes; present iff the node is electable.
    pub durability: Option<Durability>,
}

/// Per-transaction settings bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionSettings {
    /// Durability for commits; present iff the node is electable.
    pub durability: Option<Durability>,
}

/// Per-named-log settings bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// All access is transactional.
    pub transactional: bool,
    /// Whether opening a missing log creates it.
    pub allow_create: bool,
    /// Whether the log is opened read-only.
    pub read_only: bool,
}

/// The three immutable bundles plus the per-log settings derived from them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JournalSettings {
    pub environment: EnvironmentSettings,
    pub replication: ReplicationSettings,
    pub transaction: TransactionSettings,
    pub log: LogSettings,
}

/// Build every settings bundle for the given role.
///
/// The role is passed explicitly rather than read from the identity because
/// the helper handshake opens the environment as an observer regardless of
/// the node's real role.
pub fn build_settings(
    node_name: &str,
    node_addr: &HostPort,
    helper_addr: &HostPort,
    role: NodeRole,
    group_name: &str,
    config: &JournalConfig,
) -> JournalSettings {
    let electable = role.is_electable();

    let durability = if electable {
        Some(Durability {
            primary_sync: SyncPolicy::parse_or_default(&config.primary_sync_policy),
            replica_sync: SyncPolicy::parse_or_default(&config.replica_sync_policy),
            replica_ack: AckPolicy::parse_or_default(&config.replica_ack_policy),
        })
    } else {
        None
    };

    let replication = ReplicationSettings {
        node_name: node_name.to_string(),
        node_addr: node_addr.clone(),
        helper_addr: helper_addr.clone(),
        group_name: group_name.to_string(),
        node_type: if electable {
            ProviderNodeType::Electable
        } else {
            ProviderNodeType::Secondary
        },
        unknown_state_timeout_secs: UNKNOWN_STATE_TIMEOUT_SECS,
        max_clock_delta_ms: config.max_clock_delta_ms,
        txn_rollback_limit: config.txn_rollback_limit,
        replica_timeout_secs: config.heartbeat_timeout_secs,
        feeder_timeout_secs: config.heartbeat_timeout_secs,
        replay_cost_percent: config.replay_cost_percent,
        replica_ack_timeout_secs: electable.then_some(config.replica_ack_timeout_secs),
        replica_group_commit_limit: electable.then_some(0),
        require_consistency_on_join: false,
    };

    let environment = EnvironmentSettings {
        transactional: true,
        allow_create: true,
        cache_percent: CACHE_PERCENT,
        lock_timeout_secs: config.lock_timeout_secs,
        file_log_level: config.log_verbosity.clone(),
        cleaner_threads: config.cleaner_threads,
        durability,
    };

    let transaction = TransactionSettings { durability };

    let log = LogSettings {
        transactional: true,
        allow_create: electable,
        read_only: !electable,
    };

    JournalSettings {
        environment,
        replication,
        transaction,
        log,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JournalConfig {
        JournalConfig::default()
    }

    fn build(role: NodeRole) -> JournalSettings {
        let node = HostPort::new("10.0.0.1", 9010);
        let helper = HostPort::new("10.0.0.2", 9010);
        build_settings("fe-1", &node, &helper, role, "TEST_GROUP", &config())
    }

    #[test]
    fn test_sync_policy_parsing() {
        assert_eq!(SyncPolicy::parse_or_default("SYNC"), SyncPolicy::Sync);
        assert_eq!(SyncPolicy::parse_or_default("sync"), SyncPolicy::Sync);
        assert_eq!(SyncPolicy::parse_or_default("NO_SYNC"), SyncPolicy::NoSync);
        assert_eq!(
            SyncPolicy::parse_or_default("WRITE_NO_SYNC"),
            SyncPolicy::WriteNoSync
        );
    }

    #[test]
    fn test_unknown_sync_policy_falls_back_silently() {
        assert_eq!(
            SyncPolicy::parse_or_default("fsync-always"),
            SyncPolicy::WriteNoSync
        );
        assert_eq!(SyncPolicy::parse_or_default(""), SyncPolicy::WriteNoSync);
    }

    #[test]
    fn test_ack_policy_parsing() {
        assert_eq!(AckPolicy::parse_or_default("ALL"), AckPolicy::All);
        assert_eq!(AckPolicy::parse_or_default("none"), AckPolicy::None);
        assert_eq!(
            AckPolicy::parse_or_default("SIMPLE_MAJORITY"),
            AckPolicy::SimpleMajority
        );
    }

    #[test]
    fn test_unknown_ack_policy_falls_back_silently() {
        assert_eq!(
            AckPolicy::parse_or_default("quorum-ish"),
            AckPolicy::SimpleMajority
        );
        assert_eq!(AckPolicy::parse_or_default(""), AckPolicy::SimpleMajority);
    }

    #[test]
    fn test_durability_present_iff_electable() {
        for role in [NodeRole::Electable, NodeRole::Observer] {
            let settings = build(role);
            assert_eq!(
                settings.environment.durability.is_some(),
                role.is_electable()
            );
            assert_eq!(
                settings.transaction.durability.is_some(),
                role.is_electable()
            );
            assert_eq!(
                settings.replication.replica_ack_timeout_secs.is_some(),
                role.is_electable()
            );
        }
    }

    #[test]
    fn test_electable_settings() {
        let settings = build(NodeRole::Electable);
        assert_eq!(settings.replication.node_type, ProviderNodeType::Electable);
        assert!(settings.log.allow_create);
        assert!(!settings.log.read_only);
        assert_eq!(settings.replication.replica_group_commit_limit, Some(0));
    }

    #[test]
    fn test_observer_settings_are_read_only() {
        let settings = build(NodeRole::Observer);
        assert_eq!(settings.replication.node_type, ProviderNodeType::Secondary);
        assert!(!settings.log.allow_create);
        assert!(settings.log.read_only);
        assert_eq!(settings.replication.replica_group_commit_limit, None);
    }

    #[test]
    fn test_feeder_and_replica_timeouts_share_the_heartbeat() {
        let settings = build(NodeRole::Electable);
        assert_eq!(
            settings.replication.replica_timeout_secs,
            settings.replication.feeder_timeout_secs
        );
    }

    #[test]
    fn test_builder_is_pure() {
        let a = build(NodeRole::Electable);
        let b = build(NodeRole::Electable);
        assert_eq!(a, b);
    }
}
