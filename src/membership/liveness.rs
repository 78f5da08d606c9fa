//! Passive failure detector.
//!
//! There is no probing: every outbound send reports its outcome here, and the
//! protocol reads the resulting offline set to size broadcast thresholds.

use dashmap::DashSet;
use std::sync::Arc;

use super::types::NodeId;

pub struct LivenessTracker {
    offline: DashSet<NodeId>,
}

impl LivenessTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            offline: DashSet::new(),
        })
    }

    pub fn mark_offline(&self, node: NodeId) {
        if self.offline.insert(node) {
            tracing::warn!("OFFLINE: node {}", node);
        }
    }

    pub fn mark_online(&self, node: NodeId) {
        if self.offline.remove(&node).is_some() {
            tracing::info!("ONLINE: node {}", node);
        }
    }

    pub fn is_offline(&self, node: NodeId) -> bool {
        self.offline.contains(&node)
    }

    /// Splits `nodes` into `(live, offline)` against one view of the offline
    /// set, preserving order.
    pub fn split_live(&self, nodes: &[NodeId]) -> (Vec<NodeId>, Vec<NodeId>) {
        nodes.iter().copied().partition(|node| !self.is_offline(*node))
    }

    pub fn offline_nodes(&self) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self.offline.iter().map(|entry| *entry.key()).collect();
        nodes.sort();
        nodes
    }
}

impl Default for LivenessTracker {
    fn default() -> Self {
        Self {
            offline: DashSet::new(),
        }
    }
}
