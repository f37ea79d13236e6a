//! Scripted mock replication provider shared by the integration tests.
//!
//! The provider consumes a script of per-open outcomes (an empty script
//! means every open succeeds) and counts every interesting call so tests
//! can assert on attempt budgets, restores, and resets.

use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use quorumlog::journal::durability::{EnvironmentSettings, LogSettings, ReplicationSettings};
use quorumlog::journal::listener::RoleChangeListener;
use quorumlog::journal::{GroupRole, HostPort, NodeIdentity};
use quorumlog::provider::{
    GroupAdmin, GroupMember, HandleProbe, InsufficientHistory, LogHandle, ProviderError,
    ProviderResult, ReplicatedLogStore, ReplicationProvider,
};

/// Outcome scripted for one `open_environment` call.
#[allow(dead_code)]
pub enum OpenOutcome {
    Succeed,
    Unavailable,
    NoPrimary,
    RestartRequired,
    InsufficientHistory,
    NotFound,
}

#[derive(Default)]
pub struct MockState {
    /// Names existing in the simulated store.
    pub logs: Mutex<HashSet<String>>,
    /// Names whose handles probe stale (remotely destroyed).
    pub stale: Mutex<HashSet<String>>,
    /// Names whose open fails.
    pub open_log_failures: Mutex<HashSet<String>>,
    /// Membership recorded in the local store, served to the handshake.
    pub members: Mutex<Vec<GroupMember>>,
    /// Role announced immediately when a listener is installed.
    pub announce_on_listen: Mutex<Option<GroupRole>>,
    /// The installed listener, kept so tests can announce later.
    pub listener: Mutex<Option<RoleChangeListener>>,
    /// Script of outcomes consumed per `open_environment` call.
    pub script: Mutex<VecDeque<OpenOutcome>>,

    pub opens: AtomicUsize,
    pub restores: AtomicUsize,
    pub resets: AtomicUsize,
    pub env_closes: AtomicUsize,
    pub flushes: AtomicUsize,
}

pub struct MockProvider {
    pub state: Arc<MockState>,
}

#[allow(dead_code)]
impl MockProvider {
    /// Provider whose opens always succeed and which reports `Primary` as
    /// soon as a listener is installed.
    pub fn new() -> Self {
        let state = MockState::default();
        *state.announce_on_listen.lock().unwrap() = Some(GroupRole::Primary);
        Self {
            state: Arc::new(state),
        }
    }

    /// Provider consuming the given outcomes, one per open.
    pub fn with_script(outcomes: Vec<OpenOutcome>) -> Self {
        let provider = Self::new();
        *provider.state.script.lock().unwrap() = outcomes.into();
        provider
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }
}

pub struct MockStore {
    state: Arc<MockState>,
}

pub struct MockHandle {
    name: String,
    state: Arc<MockState>,
    closed: AtomicUsize,
}

impl LogHandle for MockHandle {
    fn probe(&self) -> HandleProbe {
        if self.state.stale.lock().unwrap().contains(&self.name) {
            HandleProbe::Stale
        } else {
            HandleProbe::Valid(self.name.clone())
        }
    }

    fn close(&self) -> ProviderResult<()> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ReplicatedLogStore for MockStore {
    type Handle = MockHandle;

    fn open_log(&self, name: &str, settings: &LogSettings) -> ProviderResult<MockHandle> {
        if self.state.open_log_failures.lock().unwrap().contains(name) {
            return Err(ProviderError::Io(format!("injected open failure: {}", name)));
        }
        let mut logs = self.state.logs.lock().unwrap();
        if !logs.contains(name) {
            if !settings.allow_create {
                return Err(ProviderError::NotFound(name.to_string()));
            }
            logs.insert(name.to_string());
        }
        Ok(MockHandle {
            name: name.to_string(),
            state: Arc::clone(&self.state),
            closed: AtomicUsize::new(0),
        })
    }

    fn remove_log(&self, name: &str) -> ProviderResult<()> {
        if self.state.logs.lock().unwrap().remove(name) {
            Ok(())
        } else {
            Err(ProviderError::NotFound(name.to_string()))
        }
    }

    fn log_names(&self) -> ProviderResult<Vec<String>> {
        Ok(self.state.logs.lock().unwrap().iter().cloned().collect())
    }

    fn group_members(&self) -> ProviderResult<Vec<GroupMember>> {
        Ok(self.state.members.lock().unwrap().clone())
    }

    fn set_role_listener(&self, listener: RoleChangeListener) -> ProviderResult<()> {
        if let Some(role) = *self.state.announce_on_listen.lock().unwrap() {
            listener.announce(role);
        }
        *self.state.listener.lock().unwrap() = Some(listener);
        Ok(())
    }

    fn flush_position_index(&self) -> ProviderResult<()> {
        self.state.flushes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> ProviderResult<()> {
        self.state.env_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockAdmin {
    state: Arc<MockState>,
}

impl GroupAdmin for MockAdmin {
    fn members(&self) -> ProviderResult<Vec<GroupMember>> {
        Ok(self.state.members.lock().unwrap().clone())
    }

    fn primary(&self) -> ProviderResult<GroupMember> {
        self.state
            .members
            .lock()
            .unwrap()
            .first()
            .cloned()
            .ok_or_else(|| ProviderError::NoPrimary("no members".into()))
    }
}

impl ReplicationProvider for MockProvider {
    type Store = MockStore;
    type Handle = MockHandle;
    type Admin = MockAdmin;

    fn open_environment(
        &self,
        _home: &Path,
        _replication: &ReplicationSettings,
        _environment: &EnvironmentSettings,
    ) -> ProviderResult<MockStore> {
        self.state.opens.fetch_add(1, Ordering::SeqCst);
        let outcome = self
            .state
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OpenOutcome::Succeed);
        match outcome {
            OpenOutcome::Succeed => Ok(MockStore {
                state: Arc::clone(&self.state),
            }),
            OpenOutcome::Unavailable => {
                Err(ProviderError::Unavailable("injected: unreachable".into()))
            }
            OpenOutcome::NoPrimary => {
                Err(ProviderError::NoPrimary("injected: election pending".into()))
            }
            OpenOutcome::RestartRequired => {
                Err(ProviderError::RestartRequired("injected: reopen".into()))
            }
            OpenOutcome::InsufficientHistory => Err(ProviderError::InsufficientHistory(
                InsufficientHistory {
                    log_providers: vec![HostPort::new("10.0.0.2", 9010)],
                    detail: "injected: missing segments".into(),
                },
            )),
            OpenOutcome::NotFound => Err(ProviderError::NotFound("no local store".into())),
        }
    }

    fn group_admin(&self, _group_name: &str, _admin_addrs: &HashSet<HostPort>) -> MockAdmin {
        MockAdmin {
            state: Arc::clone(&self.state),
        }
    }

    fn reset_group(
        &self,
        _home: &Path,
        _group_name: &str,
        node: &NodeIdentity,
    ) -> ProviderResult<()> {
        self.state.resets.fetch_add(1, Ordering::SeqCst);
        *self.state.members.lock().unwrap() = vec![GroupMember {
            name: node.name.clone(),
            addr: node.addr.clone(),
        }];
        Ok(())
    }

    fn restore_from_peer(
        &self,
        _home: &Path,
        _refusal: &InsufficientHistory,
        _retain_obsolete_files: bool,
    ) -> ProviderResult<()> {
        self.state.restores.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
