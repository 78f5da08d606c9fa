//! Membership & Liveness Module
//!
//! The cluster is a fixed, totally ordered list of nodes known to everyone at
//! startup. This module names those nodes and tracks which of them are
//! currently believed unreachable.
//!
//! ## Core Mechanisms
//! - **Static identity**: a node is identified by its listening port (`NodeId`).
//! - **Piggybacked failure detection**: send failures mark a peer offline, send
//!   successes mark it online again. No heartbeats are exchanged.

pub mod liveness;
pub mod types;

#[cfg(test)]
mod tests;
