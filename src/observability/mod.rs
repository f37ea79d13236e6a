//! Observability for the journal environment
//!
//! Structured JSON logging, synchronous and deterministic:
//!
//! 1. One log line = one event
//! 2. Deterministic field ordering
//! 3. No buffering, no background threads
//! 4. Observability failure must never affect the journal itself

mod logger;

pub use logger::{Logger, Severity};
