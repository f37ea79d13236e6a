//! Timing policies for setup
//!
//! Both the environment open and the helper handshake retry on transient
//! failures with a fixed budget and a fixed inter-attempt delay; the
//! readiness wait after listener registration is a bounded poll. Both are
//! explicit values injected into the lifecycle manager so tests run with
//! zero delays.

use std::thread;
use std::time::Duration;

/// Fixed-budget, fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: usize,
    /// Delay before every attempt after the first.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Build a policy.
    pub fn new(attempts: usize, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// The given number of attempts with no delay between them. Test use.
    pub fn immediate(attempts: usize) -> Self {
        Self {
            attempts,
            delay: Duration::ZERO,
        }
    }

    /// Sleep before attempt `index` (zero-based). The first attempt never
    /// waits.
    pub fn pause_before(&self, index: usize) {
        if index > 0 && !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

impl Default for RetryPolicy {
    /// Three attempts, five seconds apart.
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

/// Bounded poll for the post-listener readiness wait. Best effort: setup
/// proceeds whether or not a role was reported within the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessWait {
    /// Total wait window.
    pub window: Duration,
    /// Poll granularity.
    pub poll: Duration,
}

impl ReadinessWait {
    /// Build a wait policy.
    pub fn new(window: Duration, poll: Duration) -> Self {
        Self { window, poll }
    }

    /// No waiting at all. Test use.
    pub fn none() -> Self {
        Self {
            window: Duration::ZERO,
            poll: Duration::ZERO,
        }
    }

    /// Poll `ready` until it returns true or the window elapses. Returns
    /// whether readiness was observed.
    pub fn wait_until(&self, mut ready: impl FnMut() -> bool) -> bool {
        if ready() {
            return true;
        }
        if self.window.is_zero() || self.poll.is_zero() {
            return false;
        }
        let mut waited = Duration::ZERO;
        while waited < self.window {
            thread::sleep(self.poll);
            waited += self.poll;
            if ready() {
                return true;
            }
        }
        false
    }
}

impl Default for ReadinessWait {
    /// Ten-second window polled at one-second granularity.
    fn default() -> Self {
        Self {
            window: Duration::from_secs(10),
            poll: Duration::from_secs(1),
        }
    }
}
