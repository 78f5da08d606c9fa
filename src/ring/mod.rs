//! Consistent-Hash Partitioning Module
//!
//! Maps keys and node identities onto a SHA-256 ring so that every node can
//! independently agree on who coordinates a key and who replicates it.
//!
//! ## Core Concepts
//! - **Ring**: member tokens hashed and sorted; arithmetic wraps modulo the
//!   membership size, so dead nodes still occupy their slot.
//! - **Coordinator**: first node whose position is >= the key hash (wrapping).
//! - **Preference list**: coordinator plus its `N - 1` successors.
//! - **Recovery peers**: `N - 1` successors and `N - 1` predecessors of a node.

pub mod partitioner;

#[cfg(test)]
mod tests;
