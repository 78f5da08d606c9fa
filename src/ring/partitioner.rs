use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

use crate::error::DynamoError;
use crate::membership::types::NodeId;

pub type Position = [u8; 32];

pub fn hash_position(input: &str) -> Position {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.finalize().into()
}

/// Consistent-hash ring over a fixed membership.
///
/// Pure: every node that builds a `Ring` from the same member list and
/// replication factor computes identical coordinators and preference lists.
#[derive(Clone)]
pub struct Ring {
    /// Ring slots sorted by position. Offline nodes keep their slot.
    slots: Vec<(Position, NodeId)>,
    members: Vec<NodeId>,
    replication: usize,
}

impl Ring {
    pub fn new(members: Vec<NodeId>, replication: usize) -> Result<Self, DynamoError> {
        if members.is_empty() {
            return Err(DynamoError::Config("ring needs at least one member".into()));
        }
        if replication == 0 {
            return Err(DynamoError::Config("replication factor must be >= 1".into()));
        }
        let unique: HashSet<NodeId> = members.iter().copied().collect();
        if unique.len() != members.len() {
            return Err(DynamoError::Config(format!(
                "duplicate node in member list {:?}",
                members
            )));
        }

        let mut slots: Vec<(Position, NodeId)> = members
            .iter()
            .map(|node| (hash_position(&node.ring_token()), *node))
            .collect();
        slots.sort_by(|a, b| a.0.cmp(&b.0));

        let ring = Self {
            slots,
            members,
            replication,
        };
        tracing::debug!("Dynamo ring: {:?}", ring);
        Ok(ring)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Nodes in ring order, starting from the smallest position.
    pub fn ring_order(&self) -> Vec<NodeId> {
        self.slots.iter().map(|(_, node)| *node).collect()
    }

    /// Size of a preference list; never larger than the membership.
    pub fn preference_size(&self) -> usize {
        self.replication.min(self.slots.len())
    }

    pub fn coordinator_for_key(&self, key: &str) -> NodeId {
        let key_hash = hash_position(key);
        let idx = self.slots.partition_point(|(pos, _)| *pos < key_hash);
        if idx == self.slots.len() {
            self.slots[0].1
        } else {
            self.slots[idx].1
        }
    }

    /// The `N - 1` ring successors of `coordinator`, in ring order.
    pub fn replicas_for_coordinator(&self, coordinator: NodeId) -> Vec<NodeId> {
        match self.index_of(coordinator) {
            Some(idx) => (1..self.preference_size())
                .map(|offset| self.at(idx as isize + offset as isize))
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn preference_list_for_key(&self, key: &str) -> Vec<NodeId> {
        self.preference_list_for_node(self.coordinator_for_key(key))
    }

    pub fn preference_list_for_node(&self, node: NodeId) -> Vec<NodeId> {
        let mut list = vec![node];
        list.extend(self.replicas_for_coordinator(node));
        list
    }

    /// Nodes that may hold data this node is responsible for: the `N - 1`
    /// successors (its replicas) and the `N - 1` predecessors (the
    /// coordinators it replicates for).
    pub fn recovery_peers(&self, node: NodeId) -> Vec<NodeId> {
        let Some(idx) = self.index_of(node) else {
            return Vec::new();
        };
        let reach = self.preference_size() as isize - 1;
        let mut peers = Vec::with_capacity((reach * 2) as usize);

        let successors = (1..=reach).map(|i| self.at(idx as isize + i));
        let predecessors = (1..=reach).rev().map(|i| self.at(idx as isize - i));
        for peer in successors.chain(predecessors) {
            if peer != node && !peers.contains(&peer) {
                peers.push(peer);
            }
        }
        peers
    }

    pub fn all_other_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.members
            .iter()
            .copied()
            .filter(|member| *member != node)
            .collect()
    }

    fn index_of(&self, node: NodeId) -> Option<usize> {
        self.slots.iter().position(|(_, n)| *n == node)
    }

    fn at(&self, index: isize) -> NodeId {
        let len = self.slots.len() as isize;
        self.slots[index.rem_euclid(len) as usize].1
    }
}

impl fmt::Debug for Ring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let order: Vec<String> = self
            .slots
            .iter()
            .map(|(pos, node)| format!("{}@{}", node, &hex::encode(pos)[..8]))
            .collect();
        write!(f, "[{}]", order.join(" -> "))
    }
}
