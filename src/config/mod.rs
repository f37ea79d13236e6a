//! Bootstrap configuration surface
//!
//! Everything the surrounding service supplies before `setup()`: node and
//! helper addresses, electability, and the replication tunables. Loadable
//! from a JSON file with per-field defaults; validation catches the
//! mistakes that must abort startup before any network activity.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::journal::errors::{JournalError, JournalResult};
use crate::journal::node::HostPort;

/// Fixed subdirectory of `meta_dir` holding the replicated log store.
pub const JOURNAL_SUBDIR: &str = "journal";

/// Bootstrap configuration for the journal environment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct JournalConfig {
    /// Metadata root directory. The log store lives in its
    /// `journal/` subdirectory, created if absent.
    #[serde(default = "default_meta_dir")]
    pub meta_dir: PathBuf,

    /// This node's replication address (`host:port`).
    #[serde(default = "default_self_addr")]
    pub self_addr: String,

    /// Address used to locate the group on first contact. For the first
    /// node of a new group this is its own address.
    #[serde(default = "default_self_addr")]
    pub helper_addr: String,

    /// Whether this node participates in elections. Observers replicate
    /// but never lead.
    #[serde(default = "default_true")]
    pub electable: bool,

    /// Maximum tolerated clock skew between members, in milliseconds.
    #[serde(default = "default_max_clock_delta_ms")]
    pub max_clock_delta_ms: u64,

    /// Maximum transactions that may be rolled back to rejoin the group.
    #[serde(default = "default_txn_rollback_limit")]
    pub txn_rollback_limit: u32,

    /// Heartbeat timeout, in seconds, applied to both directions of the
    /// feeder/replica connection.
    #[serde(default = "default_heartbeat_timeout_secs")]
    pub heartbeat_timeout_secs: u64,

    /// Replay cost budget (percent) above which a network restore is
    /// preferred over local log replay.
    #[serde(default = "default_replay_cost_percent")]
    pub replay_cost_percent: u32,

    /// How long the primary waits for replica acknowledgements, in seconds.
    #[serde(default = "default_replica_ack_timeout_secs")]
    pub replica_ack_timeout_secs: u64,

    /// Record-lock timeout, in seconds.
    #[serde(default = "default_lock_timeout_secs")]
    pub lock_timeout_secs: u64,

    /// Number of log-cleaner threads in the store.
    #[serde(default = "default_cleaner_threads")]
    pub cleaner_threads: u32,

    /// Verbosity of the log store's own file logging.
    #[serde(default = "default_log_verbosity")]
    pub log_verbosity: String,

    /// Sync policy name on the primary. Unknown names fall back to
    /// WRITE_NO_SYNC.
    #[serde(default = "default_sync_policy")]
    pub primary_sync_policy: String,

    /// Sync policy name on replicas. Unknown names fall back to
    /// WRITE_NO_SYNC.
    #[serde(default = "default_sync_policy")]
    pub replica_sync_policy: String,

    /// Replica acknowledgement policy name. Unknown names fall back to
    /// SIMPLE_MAJORITY.
    #[serde(default = "default_ack_policy")]
    pub replica_ack_policy: String,

    /// Forcibly reset group membership to this node before setup. Manual
    /// recovery only, for when quorum is permanently lost; requires an
    /// electable node.
    #[serde(default)]
    pub disaster_recovery: bool,
}

fn default_meta_dir() -> PathBuf {
    PathBuf::from("./meta")
}
fn default_self_addr() -> String {
    "127.0.0.1:9010".to_string()
}
fn default_true() -> bool {
    true
}
fn default_max_clock_delta_ms() -> u64 {
    5000
}
fn default_txn_rollback_limit() -> u32 {
    100
}
fn default_heartbeat_timeout_secs() -> u64 {
    30
}
fn default_replay_cost_percent() -> u32 {
    150
}
fn default_replica_ack_timeout_secs() -> u64 {
    10
}
fn default_lock_timeout_secs() -> u64 {
    1
}
fn default_cleaner_threads() -> u32 {
    1
}
fn default_log_verbosity() -> String {
    "INFO".to_string()
}
fn default_sync_policy() -> String {
    "SYNC".to_string()
}
fn default_ack_policy() -> String {
    "SIMPLE_MAJORITY".to_string()
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            meta_dir: default_meta_dir(),
            self_addr: default_self_addr(),
            helper_addr: default_self_addr(),
            electable: true,
            max_clock_delta_ms: default_max_clock_delta_ms(),
            txn_rollback_limit: default_txn_rollback_limit(),
            heartbeat_timeout_secs: default_heartbeat_timeout_secs(),
            replay_cost_percent: default_replay_cost_percent(),
            replica_ack_timeout_secs: default_replica_ack_timeout_secs(),
            lock_timeout_secs: default_lock_timeout_secs(),
            cleaner_threads: default_cleaner_threads(),
            log_verbosity: default_log_verbosity(),
            primary_sync_policy: default_sync_policy(),
            replica_sync_policy: default_sync_policy(),
            replica_ack_policy: default_ack_policy(),
            disaster_recovery: false,
        }
    }
}

impl JournalConfig {
    /// Load configuration from a JSON file and validate it.
    pub fn load(path: &Path) -> JournalResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            JournalError::Configuration(format!("failed to read config {}: {}", path.display(), e))
        })?;
        let config: JournalConfig = serde_json::from_str(&content)
            .map_err(|e| JournalError::Configuration(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate fatal-configuration constraints.
    pub fn validate(&self) -> JournalResult<()> {
        self.self_host_port()?;
        self.helper_host_port()?;
        if self.heartbeat_timeout_secs == 0 {
            return Err(JournalError::Configuration(
                "heartbeat_timeout_secs must be > 0".to_string(),
            ));
        }
        if self.cleaner_threads == 0 {
            return Err(JournalError::Configuration(
                "cleaner_threads must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// This node's parsed replication address.
    pub fn self_host_port(&self) -> JournalResult<HostPort> {
        self.self_addr.parse()
    }

    /// The helper's parsed replication address.
    pub fn helper_host_port(&self) -> JournalResult<HostPort> {
        self.helper_addr.parse()
    }

    /// Directory holding the replicated log store.
    pub fn journal_dir(&self) -> PathBuf {
        self.meta_dir.join(JOURNAL_SUBDIR)
    }
}
