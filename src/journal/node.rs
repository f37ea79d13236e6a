//! Node identity for the replication group
//!
//! A node is identified by a stable name and a `host:port` replication
//! address, and is either electable (may become primary) or an observer
//! (replicates but never leads). Identity is immutable for the process
//! lifetime; the address must be unique within the group.

use std::fmt;
use std::net::{TcpStream, ToSocketAddrs};
use std::str::FromStr;
use std::time::Duration;

use super::errors::{JournalError, JournalResult};

/// How long the port-in-use probe waits for a connection.
const PORT_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// A `host:port` replication address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostPort {
    host: String,
    port: u16,
}

impl HostPort {
    /// Build an address from parts.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The host component.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port component.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl FromStr for HostPort {
    type Err = JournalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s.rsplit_once(':').ok_or_else(|| {
            JournalError::Configuration(format!("address '{}' is not host:port", s))
        })?;
        if host.is_empty() {
            return Err(JournalError::Configuration(format!(
                "address '{}' has an empty host",
                s
            )));
        }
        let port = port.parse::<u16>().map_err(|_| {
            JournalError::Configuration(format!("address '{}' has an invalid port", s))
        })?;
        Ok(Self {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Replication role of a node, configured externally and never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    /// Participates in elections and can become primary.
    Electable,
    /// Replicates data but never becomes primary; read-only log store.
    Observer,
}

impl NodeRole {
    /// Check whether this role may originate writes.
    pub fn is_electable(&self) -> bool {
        matches!(self, NodeRole::Electable)
    }
}

/// Identity of the local node, fixed for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Stable node name within the group.
    pub name: String,
    /// Replication address; unique within the group.
    pub addr: HostPort,
    /// Electable or observer.
    pub role: NodeRole,
}

impl NodeIdentity {
    /// Build a node identity.
    pub fn new(name: impl Into<String>, addr: HostPort, role: NodeRole) -> Self {
        Self {
            name: name.into(),
            addr,
            role,
        }
    }
}

/// Verify that nothing is already listening on the node's replication port.
///
/// A connect that succeeds means another process owns the port, which is an
/// operator error, not transient cluster state.
pub fn ensure_port_free(addr: &HostPort) -> JournalResult<()> {
    let resolved = format!("{}", addr)
        .to_socket_addrs()
        .map_err(|e| {
            JournalError::Configuration(format!("failed to resolve address {}: {}", addr, e))
        })?
        .next()
        .ok_or_else(|| {
            JournalError::Configuration(format!("address {} resolved to nothing", addr))
        })?;

    match TcpStream::connect_timeout(&resolved, PORT_PROBE_TIMEOUT) {
        Ok(_) => Err(JournalError::PortInUse(addr.clone())),
        Err(_) => Ok(()),
    }
}
