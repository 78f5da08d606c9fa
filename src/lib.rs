//! Replicated Key-Value Store Library
//!
//! Each process is one member of a small, fixed cluster. Keys are placed on a
//! consistent-hash ring and kept on three consecutive nodes; any node accepts
//! any client operation and routes it to the right replicas.
//! The binary (`main.rs`) wires these modules into a node.
//!
//! ## Architecture Modules
//! - **`api`**: The client HTTP surface (axum) over a node's operations.
//! - **`config`**: Cluster membership, replication factor and timeouts.
//! - **`dynamo`**: The replication protocol: coordinator/replica roles,
//!   versioned writes, read-repair, deletes and startup recovery.
//! - **`membership`**: Node identity and piggybacked liveness tracking.
//! - **`ring`**: SHA-256 consistent hashing, preference lists and recovery peers.
//! - **`session`**: Request/reply correlation and bounded completion gates.
//! - **`storage`**: The local versioned row store.
//! - **`transport`**: Peer message delivery over TCP, plus an in-process
//!   network for multi-node tests.

pub mod api;
pub mod config;
pub mod dynamo;
pub mod error;
pub mod membership;
pub mod ring;
pub mod session;
pub mod storage;
pub mod transport;
