use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::{MessageHandler, Transport, TransportError};
use crate::dynamo::protocol::Message;
use crate::membership::types::NodeId;

/// In-process network connecting any number of nodes.
///
/// Messages are encoded and decoded exactly as on the wire, then delivered on
/// a fresh task. A node taken down can neither send nor receive; sends to it
/// fail at once, like a refused connect.
pub struct SimNetwork {
    nodes: DashMap<NodeId, Weak<dyn MessageHandler>>,
    down: DashSet<NodeId>,
    sent: DashMap<NodeId, usize>,
    latency: DashMap<NodeId, Duration>,
}

impl SimNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            nodes: DashMap::new(),
            down: DashSet::new(),
            sent: DashMap::new(),
            latency: DashMap::new(),
        })
    }

    pub fn register(&self, node: NodeId, handler: Weak<dyn MessageHandler>) {
        self.nodes.insert(node, handler);
    }

    pub fn transport(self: &Arc<Self>, from: NodeId) -> Arc<SimTransport> {
        Arc::new(SimTransport {
            network: self.clone(),
            from,
        })
    }

    pub fn take_down(&self, node: NodeId) {
        self.down.insert(node);
    }

    pub fn bring_up(&self, node: NodeId) {
        self.down.remove(&node);
    }

    /// Delays delivery of every message sent by `node`.
    pub fn set_latency(&self, node: NodeId, latency: Duration) {
        self.latency.insert(node, latency);
    }

    pub fn is_down(&self, node: NodeId) -> bool {
        self.down.contains(&node)
    }

    /// Send attempts made by `node`, successful or not.
    pub fn sent_by(&self, node: NodeId) -> usize {
        self.sent.get(&node).map(|count| *count.value()).unwrap_or(0)
    }
}

pub struct SimTransport {
    network: Arc<SimNetwork>,
    from: NodeId,
}

#[async_trait]
impl Transport for SimTransport {
    async fn send(&self, to: NodeId, message: &Message) -> Result<(), TransportError> {
        *self.network.sent.entry(self.from).or_insert(0) += 1;

        if self.network.is_down(self.from) || self.network.is_down(to) {
            return Err(TransportError::Unreachable(to));
        }
        let handler = self
            .network
            .nodes
            .get(&to)
            .and_then(|entry| entry.value().upgrade())
            .ok_or(TransportError::Unreachable(to))?;

        let delivered = Message::decode(&message.encode()?)?;
        let latency = self
            .network
            .latency
            .get(&self.from)
            .map(|entry| *entry.value());
        tokio::spawn(async move {
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            handler.on_message(delivered).await;
        });
        Ok(())
    }
}
