//! Session & Completion Module
//!
//! Request/reply correlation for the replication protocol.
//!
//! - **`gate`**: `CompletionGate`, a counting signal with a bounded wait.
//! - **`registry`**: `SessionRegistry`, mapping session ids to a gate plus an
//!   accumulator of per-key replies, with scoped release via `SessionGuard`.

pub mod gate;
pub mod registry;
