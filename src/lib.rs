//! quorumlog - replicated-journal environment manager for distributed SQL
//! metadata
//!
//! Owns the lifecycle of a quorum-replicated durable log across a small
//! fixed set of frontend nodes (one elected primary, electable replicas,
//! non-voting observers), on top of a pluggable consensus provider.

pub mod config;
pub mod journal;
pub mod observability;
pub mod provider;
