//! Environment lifecycle manager
//!
//! Owns the single replicated-log environment of the process: startup
//! (helper handshake, environment open with a bounded retry budget, group
//! admin construction, role-listener registration, epoch-log open),
//! steady-state handle and membership operations, and the one teardown
//! path. A process-wide closing flag makes every mutating or
//! handle-returning operation fail fast, not block, while teardown is in
//! flight.
//!
//! Lock discipline: one environment-wide read/write lock guards the handle
//! registry and all lifecycle state. The closing flag is an atomic checked
//! before the lock so rejected callers do not queue behind a closing
//! thread.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, RwLock};

use crate::config::JournalConfig;
use crate::observability::Logger;
use crate::provider::{ProviderError, ReplicatedLogStore, ReplicationProvider};

use super::durability::{build_settings, JournalSettings, LogSettings};
use super::errors::{JournalError, JournalResult};
use super::listener::{role_listener, GroupRole, RoleTransition, RoleWatch, ROLE_CHANNEL_CAPACITY};
use super::membership::{admin_addresses, MembershipAdmin};
use super::node::{ensure_port_free, HostPort, NodeIdentity, NodeRole};
use super::recovery::RecoveryCoordinator;
use super::registry::{HandleRegistry, NamedLog};
use super::retry::{ReadinessWait, RetryPolicy};
use super::{EPOCH_LOG_NAME, JOURNAL_GROUP_NAME};

/// State owned by the environment-wide lock.
struct EnvState<P: ReplicationProvider> {
    store: Option<P::Store>,
    epoch_log: Option<Arc<NamedLog<P::Handle>>>,
    registry: HandleRegistry<P::Handle>,
    admin: Option<Arc<MembershipAdmin<P::Admin>>>,
    role_watch: Option<RoleWatch>,
    transitions: Option<Receiver<RoleTransition>>,
    log_settings: Option<LogSettings>,
}

impl<P: ReplicationProvider> EnvState<P> {
    fn empty() -> Self {
        Self {
            store: None,
            epoch_log: None,
            registry: HandleRegistry::new(),
            admin: None,
            role_watch: None,
            transitions: None,
            log_settings: None,
        }
    }
}

/// The replicated-journal environment of this process.
///
/// At most one environment is open per process; every named-log handle is
/// a child of it and is invalidated when it closes. `setup()` and
/// `close()` bracket the usable lifetime; after a successful `close()` a
/// fresh `setup()` may reuse the same object.
pub struct JournalEnvironment<P: ReplicationProvider> {
    provider: P,
    env_home: PathBuf,
    identity: NodeIdentity,
    helper: HostPort,
    config: JournalConfig,
    retry: RetryPolicy,
    readiness: ReadinessWait,
    // Checked before the lock by every operation; true for the whole
    // duration of close(). Stores happen while the write guard is held, so
    // no operation observes `false` mid-teardown.
    closing: AtomicBool,
    state: RwLock<EnvState<P>>,
}

impl<P: ReplicationProvider> fmt::Debug for JournalEnvironment<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JournalEnvironment")
            .field("env_home", &self.env_home)
            .field("identity", &self.identity)
            .field("helper", &self.helper)
            .field("closing", &self.closing)
            .finish_non_exhaustive()
    }
}

impl<P: ReplicationProvider> JournalEnvironment<P> {
    /// Build an environment without running setup. The log store will live
    /// in the fixed journal subdirectory of the configured metadata root.
    pub fn new(
        identity: NodeIdentity,
        helper: HostPort,
        config: JournalConfig,
        provider: P,
    ) -> Self {
        let env_home = config.journal_dir();
        Self {
            provider,
            env_home,
            identity,
            helper,
            config,
            retry: RetryPolicy::default(),
            readiness: ReadinessWait::default(),
            closing: AtomicBool::new(false),
            state: RwLock::new(EnvState::empty()),
        }
    }

    /// Replace the retry and readiness policies. Tests inject zero-delay
    /// policies here.
    pub fn with_timing(mut self, retry: RetryPolicy, readiness: ReadinessWait) -> Self {
        self.retry = retry;
        self.readiness = readiness;
        self
    }

    /// Bootstrap entry point: verify the replication port is free, create
    /// the journal directory if absent, then run [`setup`](Self::setup).
    pub fn initialize(
        node_name: &str,
        config: JournalConfig,
        provider: P,
    ) -> JournalResult<Self> {
        config.validate()?;
        let self_addr = config.self_host_port()?;
        let helper = config.helper_host_port()?;

        ensure_port_free(&self_addr)?;

        let env_home = config.journal_dir();
        fs::create_dir_all(&env_home).map_err(|e| {
            JournalError::Configuration(format!(
                "failed to create journal directory {}: {}",
                env_home.display(),
                e
            ))
        })?;

        let role = if config.electable {
            NodeRole::Electable
        } else {
            NodeRole::Observer
        };
        let identity = NodeIdentity::new(node_name, self_addr, role);

        let environment = Self::new(identity, helper, config, provider);
        environment.setup()?;
        Ok(environment)
    }

    /// Open the environment.
    ///
    /// Runs the helper handshake (or the disaster-recovery reset), then
    /// attempts the environment open up to the retry budget. Recoverable
    /// failures clean up partial state and retry; insufficient-history
    /// refusals additionally run a network catch-up first. Exhausting the
    /// budget surfaces the last cause; fatal configuration mismatches
    /// surface immediately.
    pub fn setup(&self) -> JournalResult<()> {
        self.closing.store(false, Ordering::SeqCst);

        {
            let state = self.state.read().unwrap();
            if state.store.is_some() {
                return Err(JournalError::Configuration(
                    "environment is already set up".to_string(),
                ));
            }
        }

        if self.config.disaster_recovery {
            self.reset_group_membership()?;
        } else {
            self.verify_helper_in_local()?;
        }

        let settings = self.build_role_settings(self.identity.role);

        let mut last: Option<ProviderError> = None;
        for attempt in 0..self.retry.attempts {
            self.retry.pause_before(attempt);
            let shown = (attempt + 1).to_string();
            Logger::info("JOURNAL_SETUP_ATTEMPT", &[("attempt", shown.as_str())]);

            match self.try_open(&settings) {
                Ok(role) => {
                    Logger::info(
                        "JOURNAL_SETUP_COMPLETE",
                        &[("attempt", shown.as_str()), ("role", role.as_str())],
                    );
                    return Ok(());
                }
                Err(e) => {
                    if e.needs_restart() {
                        Logger::warn(
                            "JOURNAL_SETUP_RESTART_REQUIRED",
                            &[("attempt", shown.as_str()), ("error", &e.to_string())],
                        );
                        if let Some(refusal) = e.insufficient_history() {
                            RecoveryCoordinator::new(&self.provider, &self.env_home)
                                .catch_up(refusal);
                        }
                        // Tear down whatever the failed attempt left behind.
                        self.close();
                    } else if attempt == 0 && matches!(e, ProviderError::NoPrimary(_)) {
                        // A brand-new node may open before the group has
                        // elected; expected on the first attempt.
                        Logger::warn(
                            "JOURNAL_SETUP_NO_PRIMARY_YET",
                            &[("error", &e.to_string())],
                        );
                    } else {
                        Logger::error(
                            "JOURNAL_SETUP_ATTEMPT_FAILED",
                            &[("attempt", shown.as_str()), ("error", &e.to_string())],
                        );
                    }
                    last = Some(e);
                }
            }
        }

        Err(JournalError::SetupExhausted {
            attempts: self.retry.attempts,
            cause: last.unwrap_or_else(|| {
                ProviderError::Unavailable("retry budget was zero".to_string())
            }),
        })
    }

    /// One environment-open attempt: open, wire the membership admin and
    /// role listener, wait (best effort) for a first role report, open the
    /// epoch log, then publish the whole set atomically.
    fn try_open(&self, settings: &JournalSettings) -> Result<GroupRole, ProviderError> {
        let store = self.provider.open_environment(
            &self.env_home,
            &settings.replication,
            &settings.environment,
        )?;

        let addrs = admin_addresses(&self.identity.addr, &self.helper, self.identity.role);
        let admin = MembershipAdmin::new(
            JOURNAL_GROUP_NAME,
            addrs.clone(),
            self.provider.group_admin(JOURNAL_GROUP_NAME, &addrs),
        );

        let (listener, watch, transitions) = role_listener(ROLE_CHANNEL_CAPACITY);
        if let Err(e) = store.set_role_listener(listener) {
            let _ = store.close();
            return Err(e);
        }

        // Best-effort readiness wait; a still-unknown role is not a
        // failure, downstream tolerates it.
        let observed = self
            .readiness
            .wait_until(|| watch.current() != GroupRole::Unknown);
        let role = watch.current();
        if observed {
            Logger::info("JOURNAL_ROLE_OBSERVED", &[("role", role.as_str())]);
        } else {
            Logger::info("JOURNAL_ROLE_WAIT_TIMEOUT", &[("role", role.as_str())]);
        }

        let epoch = match store.open_log(EPOCH_LOG_NAME, &settings.log) {
            Ok(handle) => Arc::new(NamedLog::new(EPOCH_LOG_NAME, handle)),
            Err(e) => {
                let _ = store.close();
                return Err(e);
            }
        };

        let mut state = self.state.write().unwrap();
        state.store = Some(store);
        state.epoch_log = Some(epoch);
        state.admin = Some(Arc::new(admin));
        state.role_watch = Some(watch);
        state.transitions = Some(transitions);
        state.log_settings = Some(settings.log.clone());
        Ok(role)
    }

    /// Check that the local log store belongs to the group the helper
    /// claims to lead.
    ///
    /// A follower once started without its helper will have recorded a
    /// standalone group; letting it rejoin under a different helper can
    /// crash the real primary. The check opens the environment transiently
    /// as an observer (read-only, no create) purely to enumerate the
    /// membership recorded locally: an empty or absent store has nothing to
    /// validate, a store that does not list the helper is a fatal
    /// configuration mismatch.
    fn verify_helper_in_local(&self) -> JournalResult<()> {
        if !self.identity.role.is_electable() {
            Logger::info("JOURNAL_HANDSHAKE_SKIP", &[("reason", "observer")]);
            return Ok(());
        }
        if self.identity.addr == self.helper {
            Logger::info("JOURNAL_HANDSHAKE_SKIP", &[("reason", "self is helper")]);
            return Ok(());
        }

        let helper_shown = self.helper.to_string();
        let home_shown = self.env_home.display().to_string();
        Logger::info(
            "JOURNAL_HANDSHAKE_START",
            &[("helper", helper_shown.as_str()), ("home", home_shown.as_str())],
        );

        let mut settings = self.build_role_settings(NodeRole::Observer);
        // The probe must never create a store where none exists.
        settings.environment.allow_create = false;

        let mut last: Option<ProviderError> = None;
        for attempt in 0..self.retry.attempts {
            self.retry.pause_before(attempt);

            match self.provider.open_environment(
                &self.env_home,
                &settings.replication,
                &settings.environment,
            ) {
                Ok(store) => {
                    let members = store.group_members();
                    // The transient environment is always closed, success
                    // or failure.
                    let _ = store.close();

                    match members {
                        Ok(members) if members.is_empty() => {
                            Logger::info(
                                "JOURNAL_HANDSHAKE_SKIP",
                                &[("reason", "empty local store")],
                            );
                            return Ok(());
                        }
                        Ok(members) => {
                            if members.iter().any(|m| m.addr == self.helper) {
                                Logger::info(
                                    "JOURNAL_HANDSHAKE_OK",
                                    &[("helper", helper_shown.as_str())],
                                );
                                return Ok(());
                            }
                            return Err(JournalError::HelperMismatch {
                                helper: self.helper.clone(),
                                members: members
                                    .iter()
                                    .map(|m| m.addr.to_string())
                                    .collect(),
                            });
                        }
                        Err(e) => {
                            Logger::warn(
                                "JOURNAL_HANDSHAKE_MEMBER_QUERY_FAILED",
                                &[("error", &e.to_string())],
                            );
                            last = Some(e);
                        }
                    }
                }
                Err(ProviderError::NotFound(_)) => {
                    Logger::info(
                        "JOURNAL_HANDSHAKE_SKIP",
                        &[("reason", "no local store")],
                    );
                    return Ok(());
                }
                Err(e) => {
                    if e.needs_restart() {
                        Logger::warn(
                            "JOURNAL_HANDSHAKE_RESTART_REQUIRED",
                            &[("error", &e.to_string())],
                        );
                        if let Some(refusal) = e.insufficient_history() {
                            RecoveryCoordinator::new(&self.provider, &self.env_home)
                                .catch_up(refusal);
                        }
                    } else if attempt == 0 && matches!(e, ProviderError::NoPrimary(_)) {
                        Logger::warn(
                            "JOURNAL_HANDSHAKE_NO_PRIMARY_YET",
                            &[("error", &e.to_string())],
                        );
                    } else {
                        Logger::error(
                            "JOURNAL_HANDSHAKE_ATTEMPT_FAILED",
                            &[("error", &e.to_string())],
                        );
                    }
                    last = Some(e);
                }
            }
        }

        Err(JournalError::SetupExhausted {
            attempts: self.retry.attempts,
            cause: last.unwrap_or_else(|| {
                ProviderError::Unavailable("retry budget was zero".to_string())
            }),
        })
    }

    /// Forcibly reset group membership to this node. Manual recovery for
    /// permanently lost quorum; destroys the previous membership record.
    fn reset_group_membership(&self) -> JournalResult<()> {
        if !self.identity.role.is_electable() {
            return Err(JournalError::Configuration(
                "disaster recovery requires an electable node".to_string(),
            ));
        }
        self.provider
            .reset_group(&self.env_home, JOURNAL_GROUP_NAME, &self.identity)?;
        Logger::warn(
            "JOURNAL_GROUP_RESET",
            &[("node", self.identity.name.as_str())],
        );
        Ok(())
    }

    fn build_role_settings(&self, role: NodeRole) -> JournalSettings {
        build_settings(
            &self.identity.name,
            &self.identity.addr,
            &self.helper,
            role,
            JOURNAL_GROUP_NAME,
            &self.config,
        )
    }

    /// Close the environment: every registered handle, the epoch log, then
    /// the store, best effort throughout. Returns false if any individual
    /// close failed; every resource gets a close attempt regardless. The
    /// closing flag is raised for the whole teardown and cleared at the
    /// end so a later `setup()` can reuse this object.
    pub fn close(&self) -> bool {
        let mut state = self.state.write().unwrap();
        // Never call a process-termination primitive from inside this
        // critical section: exit hooks call close() themselves, and
        // termination waiting on a hook that waits on this lock is a
        // deadlock.
        self.closing.store(true, Ordering::SeqCst);
        let mut success = true;

        Logger::info("JOURNAL_CLOSE_START", &[]);

        success &= state.registry.close_all();

        if let Some(epoch) = state.epoch_log.take() {
            if let Err(e) = epoch.close() {
                Logger::error(
                    "JOURNAL_EPOCH_CLOSE_FAILED",
                    &[("error", &e.to_string())],
                );
                success = false;
            }
        }

        state.admin = None;
        state.role_watch = None;
        state.transitions = None;
        state.log_settings = None;

        if let Some(store) = state.store.take() {
            if let Err(e) = store.close() {
                Logger::error("JOURNAL_ENV_CLOSE_FAILED", &[("error", &e.to_string())]);
                success = false;
            }
        }

        Logger::info(
            "JOURNAL_CLOSE_COMPLETE",
            &[("success", if success { "true" } else { "false" })],
        );
        self.closing.store(false, Ordering::SeqCst);
        success
    }

    /// Open (or create, per the role's settings) the named log, returning
    /// the registered handle.
    ///
    /// Returns the already-registered handle when a live one exists;
    /// handles invalidated by remote preemption are evicted on the way.
    /// Fails fast with `None` while closing, and open failures are logged
    /// and surfaced as `None` so the caller decides whether to retry. The
    /// reserved epoch-log name is never served here.
    pub fn open_named_log(&self, name: &str) -> Option<Arc<NamedLog<P::Handle>>> {
        if self.closing.load(Ordering::SeqCst) {
            return None;
        }
        if name == EPOCH_LOG_NAME {
            Logger::warn("JOURNAL_RESERVED_NAME", &[("name", name)]);
            return None;
        }

        let mut state = self.state.write().unwrap();
        let settings = state.log_settings.clone()?;

        if let Some(found) = state.registry.find_live(name) {
            return Some(found);
        }

        let opened = match state.store.as_ref() {
            Some(store) => store.open_log(name, &settings),
            None => return None,
        };
        match opened {
            Ok(handle) => {
                let log = Arc::new(NamedLog::new(name, handle));
                state.registry.register(Arc::clone(&log));
                Logger::info("JOURNAL_LOG_OPENED", &[("name", name)]);
                Some(log)
            }
            Err(e) => {
                Logger::warn(
                    "JOURNAL_LOG_OPEN_FAILED",
                    &[("name", name), ("error", &e.to_string())],
                );
                None
            }
        }
    }

    /// Close and remove the named log.
    ///
    /// The registered handle (if any) is closed and dropped first, then the
    /// log is removed from the environment. A not-found outcome from the
    /// environment is tolerated: a concurrent remove may have won.
    pub fn remove_named_log(&self, name: &str) {
        if self.closing.load(Ordering::SeqCst) {
            return;
        }
        if name == EPOCH_LOG_NAME {
            Logger::warn("JOURNAL_RESERVED_NAME", &[("name", name)]);
            return;
        }

        let mut state = self.state.write().unwrap();

        if let Some(log) = state.registry.take(name) {
            if let Err(e) = log.close() {
                Logger::warn(
                    "JOURNAL_LOG_CLOSE_FAILED",
                    &[("name", name), ("error", &e.to_string())],
                );
            }
            Logger::info("JOURNAL_LOG_CLOSED", &[("name", name)]);
        }

        if let Some(store) = state.store.as_ref() {
            match store.remove_log(name) {
                Ok(()) => {
                    Logger::info("JOURNAL_LOG_REMOVED", &[("name", name)]);
                }
                Err(ProviderError::NotFound(_)) => {
                    Logger::warn("JOURNAL_LOG_ALREADY_ABSENT", &[("name", name)]);
                }
                Err(e) => {
                    Logger::warn(
                        "JOURNAL_LOG_REMOVE_FAILED",
                        &[("name", name), ("error", &e.to_string())],
                    );
                }
            }
        }
    }

    /// The numeric identifiers of every journal log, sorted ascending.
    ///
    /// The reserved epoch-log name is excluded; names that do not parse as
    /// integers are skipped with a warning. Returns `None` when the
    /// environment is unavailable (closing, not set up, or the enumeration
    /// failed); the caller retries from outside.
    pub fn list_log_ids(&self) -> Option<Vec<u64>> {
        if self.closing.load(Ordering::SeqCst) {
            return None;
        }

        let state = self.state.read().unwrap();
        let store = state.store.as_ref()?;
        let names = match store.log_names() {
            Ok(names) => names,
            Err(e) => {
                Logger::warn("JOURNAL_LIST_FAILED", &[("error", &e.to_string())]);
                return None;
            }
        };

        let mut ids = Vec::with_capacity(names.len());
        for name in names {
            if name == EPOCH_LOG_NAME {
                continue;
            }
            match name.parse::<u64>() {
                Ok(id) => ids.push(id),
                Err(_) => {
                    Logger::warn("JOURNAL_UNEXPECTED_LOG_NAME", &[("name", name.as_str())]);
                }
            }
        }
        ids.sort_unstable();
        Some(ids)
    }

    /// The reserved epoch log used for leader-fencing tokens.
    pub fn epoch_log(&self) -> Option<Arc<NamedLog<P::Handle>>> {
        if self.closing.load(Ordering::SeqCst) {
            return None;
        }
        self.state.read().unwrap().epoch_log.clone()
    }

    /// The current membership admin.
    pub fn membership_admin(&self) -> Option<Arc<MembershipAdmin<P::Admin>>> {
        if self.closing.load(Ordering::SeqCst) {
            return None;
        }
        self.state.read().unwrap().admin.clone()
    }

    /// Rebuild the membership admin around a new address set, after a
    /// planned change to the helper topology.
    pub fn rebuild_membership_admin(&self, addrs: HashSet<HostPort>) {
        if self.closing.load(Ordering::SeqCst) {
            return;
        }
        let admin = MembershipAdmin::new(
            JOURNAL_GROUP_NAME,
            addrs.clone(),
            self.provider.group_admin(JOURNAL_GROUP_NAME, &addrs),
        );
        let count = addrs.len().to_string();
        self.state.write().unwrap().admin = Some(Arc::new(admin));
        Logger::info("JOURNAL_ADMIN_REBUILT", &[("addresses", count.as_str())]);
    }

    /// Take the consumer end of the role-transition channel. The HA layer
    /// calls this once per setup; every transition is delivered to it at
    /// most once, in order.
    pub fn take_role_transitions(&self) -> Option<Receiver<RoleTransition>> {
        self.state.write().unwrap().transitions.take()
    }

    /// The role most recently reported by the provider.
    pub fn current_role(&self) -> GroupRole {
        self.state
            .read()
            .unwrap()
            .role_watch
            .as_ref()
            .map(RoleWatch::current)
            .unwrap_or(GroupRole::Unknown)
    }

    /// Synchronously flush the replication position index. Used before
    /// critical checkpoints.
    pub fn flush_durable_index(&self) -> JournalResult<()> {
        if self.closing.load(Ordering::SeqCst) {
            return Err(JournalError::Closing);
        }
        let state = self.state.read().unwrap();
        let store = state.store.as_ref().ok_or(JournalError::Closing)?;
        store.flush_position_index().map_err(JournalError::from)
    }

    /// Whether a close is currently in flight.
    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// This node's identity.
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// The environment home directory.
    pub fn env_home(&self) -> &Path {
        &self.env_home
    }
}
