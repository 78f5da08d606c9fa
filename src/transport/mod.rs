//! Point-to-Point Transport Module
//!
//! Moves single `Message`s between nodes. The replication engine only depends
//! on the two traits defined here:
//!
//! - **`Transport`**: bounded-time send of one message to one peer.
//! - **`MessageHandler`**: upcall for every decoded inbound message.
//!
//! ## Implementations
//! - **`tcp`**: one TCP connection per message, newline-terminated JSON.
//! - **`memory`**: an in-process network for running whole clusters inside
//!   one test, with switches to take nodes off the network.

pub mod memory;
pub mod tcp;

use async_trait::async_trait;
use thiserror::Error;

use crate::dynamo::protocol::{CodecError, Message};
use crate::membership::types::NodeId;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("node {0} unreachable")]
    Unreachable(NodeId),

    #[error("timed out sending to node {0}")]
    Timeout(NodeId),

    #[error("I/O error sending to node {node}: {source}")]
    Io {
        node: NodeId,
        #[source]
        source: std::io::Error,
    },

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Delivers `message` to `to`. `Ok` means the bytes were handed to the
    /// peer, not that it processed them.
    async fn send(&self, to: NodeId, message: &Message) -> Result<(), TransportError>;
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn on_message(&self, message: Message);
}
