//! Named-log handle registry
//!
//! Owns every open named-log handle of the environment. A name appears at
//! most once; lookups lazily evict handles whose backing log was destroyed
//! by a remote preemption (an expected race after the primary prunes a log
//! all replicas have consumed, never a fault). The registry itself is
//! plain data; the lifecycle manager drives it under the environment-wide
//! lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::observability::Logger;
use crate::provider::{HandleProbe, LogHandle, ProviderResult};

/// A named log with close-once semantics.
///
/// External readers and writers hold this behind `Arc`; its validity is
/// bounded by `is_closed()`. Closing twice is a cheap no-op, so the
/// registry's shutdown sweep and late external closes cannot double-close
/// the underlying handle.
#[derive(Debug)]
pub struct NamedLog<H: LogHandle> {
    name: String,
    handle: H,
    closed: AtomicBool,
}

impl<H: LogHandle> NamedLog<H> {
    /// Wrap a freshly opened handle.
    pub fn new(name: impl Into<String>, handle: H) -> Self {
        Self {
            name: name.into(),
            handle,
            closed: AtomicBool::new(false),
        }
    }

    /// The name this handle was opened under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The underlying provider handle.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Whether this wrapper has been closed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Close the underlying handle exactly once.
    pub fn close(&self) -> ProviderResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.handle.close()
    }
}

/// Registry of open named-log handles. One entry per name.
#[derive(Debug)]
pub(crate) struct HandleRegistry<H: LogHandle> {
    handles: Vec<Arc<NamedLog<H>>>,
}

impl<H: LogHandle> HandleRegistry<H> {
    pub(crate) fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Find the live handle registered under `name`.
    ///
    /// Scans every entry, evicting those whose backing log is gone (stale),
    /// whose probe fails, or whose reported name is empty. Eviction closes
    /// the handle best-effort.
    pub(crate) fn find_live(&mut self, name: &str) -> Option<Arc<NamedLog<H>>> {
        let mut found = None;
        self.handles.retain(|entry| {
            if found.is_some() {
                return true;
            }
            match entry.handle().probe() {
                HandleProbe::Valid(reported) if reported.is_empty() => {
                    let _ = entry.close();
                    false
                }
                HandleProbe::Valid(reported) => {
                    if reported == name {
                        found = Some(Arc::clone(entry));
                    }
                    true
                }
                HandleProbe::Stale => {
                    let _ = entry.close();
                    false
                }
                HandleProbe::Unknown(e) => {
                    Logger::warn(
                        "JOURNAL_HANDLE_EVICTED",
                        &[("name", entry.name()), ("error", &e.to_string())],
                    );
                    let _ = entry.close();
                    false
                }
            }
        });
        found
    }

    /// Register a freshly opened handle.
    pub(crate) fn register(&mut self, log: Arc<NamedLog<H>>) {
        self.handles.push(log);
    }

    /// Remove and return the handle registered under `name`, if any.
    pub(crate) fn take(&mut self, name: &str) -> Option<Arc<NamedLog<H>>> {
        let index = self.handles.iter().position(|h| h.name() == name)?;
        Some(self.handles.remove(index))
    }

    /// Close every registered handle, best effort, and clear the registry.
    /// Returns false if any individual close failed; every handle gets a
    /// close attempt regardless.
    pub(crate) fn close_all(&mut self) -> bool {
        let mut success = true;
        for entry in self.handles.drain(..) {
            if let Err(e) = entry.close() {
                Logger::error(
                    "JOURNAL_HANDLE_CLOSE_FAILED",
                    &[("name", entry.name()), ("error", &e.to_string())],
                );
                success = false;
            }
        }
        success
    }

    /// Number of registered handles.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum ProbeMode {
        Live,
        EmptyName,
        Stale,
        Broken,
    }

    #[derive(Debug)]
    struct MockHandle {
        name: String,
        mode: Mutex<ProbeMode>,
        close_failure: bool,
        closed: AtomicBool,
    }

    impl MockHandle {
        fn live(name: &str) -> Self {
            Self::with_mode(name, ProbeMode::Live)
        }

        fn with_mode(name: &str, mode: ProbeMode) -> Self {
            Self {
                name: name.to_string(),
                mode: Mutex::new(mode),
                close_failure: false,
                closed: AtomicBool::new(false),
            }
        }

        fn failing_close(name: &str) -> Self {
            Self {
                name: name.to_string(),
                mode: Mutex::new(ProbeMode::Live),
                close_failure: true,
                closed: AtomicBool::new(false),
            }
        }
    }

    impl LogHandle for MockHandle {
        fn probe(&self) -> HandleProbe {
            match *self.mode.lock().unwrap() {
                ProbeMode::Live => HandleProbe::Valid(self.name.clone()),
                ProbeMode::EmptyName => HandleProbe::Valid(String::new()),
                ProbeMode::Stale => HandleProbe::Stale,
                ProbeMode::Broken => {
                    HandleProbe::Unknown(ProviderError::Io("probe failed".into()))
                }
            }
        }

        fn close(&self) -> ProviderResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            if self.close_failure {
                Err(ProviderError::Io("close failed".into()))
            } else {
                Ok(())
            }
        }
    }

    fn registered(registry: &mut HandleRegistry<MockHandle>, handle: MockHandle) -> Arc<NamedLog<MockHandle>> {
        let log = Arc::new(NamedLog::new(handle.name.clone(), handle));
        registry.register(Arc::clone(&log));
        log
    }

    #[test]
    fn test_find_returns_registered_handle() {
        let mut registry = HandleRegistry::new();
        let log = registered(&mut registry, MockHandle::live("7"));

        let found = registry.find_live("7").unwrap();
        assert!(Arc::ptr_eq(&found, &log));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_find_misses_unregistered_name() {
        let mut registry = HandleRegistry::new();
        registered(&mut registry, MockHandle::live("7"));
        assert!(registry.find_live("8").is_none());
    }

    #[test]
    fn test_stale_handle_is_evicted_and_closed() {
        let mut registry = HandleRegistry::new();
        let log = registered(&mut registry, MockHandle::with_mode("7", ProbeMode::Stale));

        assert!(registry.find_live("7").is_none());
        assert_eq!(registry.len(), 0);
        assert!(log.is_closed());
    }

    #[test]
    fn test_broken_probe_is_evicted() {
        let mut registry = HandleRegistry::new();
        registered(&mut registry, MockHandle::with_mode("7", ProbeMode::Broken));

        assert!(registry.find_live("7").is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_empty_name_is_evicted() {
        let mut registry = HandleRegistry::new();
        registered(&mut registry, MockHandle::with_mode("7", ProbeMode::EmptyName));

        assert!(registry.find_live("7").is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_eviction_does_not_disturb_live_entries() {
        let mut registry = HandleRegistry::new();
        registered(&mut registry, MockHandle::with_mode("4", ProbeMode::Stale));
        let live = registered(&mut registry, MockHandle::live("5"));

        let found = registry.find_live("5").unwrap();
        assert!(Arc::ptr_eq(&found, &live));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_take_removes_entry() {
        let mut registry = HandleRegistry::new();
        let log = registered(&mut registry, MockHandle::live("7"));

        let taken = registry.take("7").unwrap();
        assert!(Arc::ptr_eq(&taken, &log));
        assert_eq!(registry.len(), 0);
        assert!(registry.take("7").is_none());
    }

    #[test]
    fn test_close_all_is_best_effort() {
        let mut registry = HandleRegistry::new();
        let bad = registered(&mut registry, MockHandle::failing_close("1"));
        let good = registered(&mut registry, MockHandle::live("2"));

        assert!(!registry.close_all());
        assert_eq!(registry.len(), 0);
        // Both received a close attempt despite the first failing.
        assert!(bad.is_closed());
        assert!(good.is_closed());
    }

    #[test]
    fn test_named_log_close_is_idempotent() {
        let log = NamedLog::new("7", MockHandle::failing_close("7"));

        assert!(log.close().is_err());
        assert!(log.is_closed());
        // Second close does not reach the underlying handle again.
        assert!(log.close().is_ok());
    }
}
