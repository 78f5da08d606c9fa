//! Replication Protocol Module
//!
//! The core of the store: decides for every operation whether this node acts
//! as coordinator, replica or observer, applies local effects, fans messages
//! out to peers and decides what to do when peers stay silent.
//!
//! ## Core Flows
//! - **Write**: the coordinator versions and persists the write, then pushes it
//!   to both replicas and waits for one designated replica's ACK. Other nodes
//!   forward to the coordinator and fall back to writing the replicas directly
//!   if it does not acknowledge in time.
//! - **Read**: the whole preference list is queried in parallel; the highest
//!   version wins and is written back to every member (read-repair).
//! - **Delete**: mirrors the write roles without versions.
//! - **Recovery**: on start, stale local rows are dropped and rebuilt from
//!   ring neighbours; every other operation waits for that to settle.
//!
//! ## Submodules
//! - **`engine`**: `Dynamo`, the node itself and its client operations.
//! - **`handlers`**: `(message type, role)` dispatch table for inbound messages.
//! - **`recovery`**: the startup recovery gate.
//! - **`protocol`**: the wire message and key sentinels.

pub mod engine;
pub mod handlers;
pub mod protocol;
pub mod recovery;
