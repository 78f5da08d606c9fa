//! Ring Module Tests
//!
//! Validates the partitioning rules every node relies on to agree about key
//! ownership without communicating.
//!
//! ## Test Scopes
//! - **Determinism**: independently built rings produce identical answers.
//! - **Coordinator lookup**: first position >= key hash, with wraparound.
//! - **Replica / recovery sets**: sizes, distinctness and modulo arithmetic.

#[cfg(test)]
mod tests {
    use crate::config::DEFAULT_MEMBERS;
    use crate::membership::types::NodeId;
    use crate::ring::partitioner::{hash_position, Ring};
    use std::collections::{HashMap, HashSet};

    fn five_node_ring() -> Ring {
        Ring::new(DEFAULT_MEMBERS.iter().copied().map(NodeId).collect(), 3).unwrap()
    }

    // ============================================================
    // CONSTRUCTION TESTS
    // ============================================================

    #[test]
    fn test_rejects_empty_membership() {
        assert!(Ring::new(vec![], 3).is_err());
    }

    #[test]
    fn test_rejects_duplicate_members() {
        assert!(Ring::new(vec![NodeId(1), NodeId(2), NodeId(1)], 3).is_err());
    }

    #[test]
    fn test_ring_order_sorted_by_hash() {
        let ring = five_node_ring();
        let order = ring.ring_order();
        assert_eq!(order.len(), 5);

        let positions: Vec<_> = order
            .iter()
            .map(|node| hash_position(&node.ring_token()))
            .collect();
        let mut sorted = positions.clone();
        sorted.sort();
        assert_eq!(positions, sorted);
    }

    // ============================================================
    // DETERMINISM TESTS
    // ============================================================

    #[test]
    fn test_same_answers_regardless_of_member_order() {
        let a = five_node_ring();
        let mut reversed: Vec<NodeId> = DEFAULT_MEMBERS.iter().copied().map(NodeId).collect();
        reversed.reverse();
        let b = Ring::new(reversed, 3).unwrap();

        for i in 0..500 {
            let key = format!("key-{}", i);
            assert_eq!(a.coordinator_for_key(&key), b.coordinator_for_key(&key));
            assert_eq!(
                a.preference_list_for_key(&key),
                b.preference_list_for_key(&key)
            );
        }
    }

    // ============================================================
    // COORDINATOR TESTS
    // ============================================================

    #[test]
    fn test_coordinator_is_first_position_at_or_after_key() {
        let ring = five_node_ring();
        let order = ring.ring_order();

        for i in 0..200 {
            let key = format!("k{}", i);
            let key_hash = hash_position(&key);
            let expected = order
                .iter()
                .copied()
                .find(|node| hash_position(&node.ring_token()) >= key_hash)
                .unwrap_or(order[0]);
            assert_eq!(ring.coordinator_for_key(&key), expected);
        }
    }

    #[test]
    fn test_key_hashing_exactly_onto_node_position() {
        let ring = five_node_ring();
        // A key equal to a node's token hashes onto that node's own slot
        for node in ring.ring_order() {
            assert_eq!(ring.coordinator_for_key(&node.ring_token()), node);
        }
    }

    #[test]
    fn test_every_node_coordinates_some_keys() {
        let ring = five_node_ring();
        let mut counts: HashMap<NodeId, usize> = HashMap::new();
        for i in 0..5000 {
            *counts
                .entry(ring.coordinator_for_key(&format!("book_{}", i)))
                .or_insert(0) += 1;
        }
        assert_eq!(counts.len(), 5, "distribution: {:?}", counts);
    }

    // ============================================================
    // REPLICA & PREFERENCE LIST TESTS
    // ============================================================

    #[test]
    fn test_replicas_are_two_distinct_successors() {
        let ring = five_node_ring();
        let order = ring.ring_order();

        for (idx, node) in order.iter().enumerate() {
            let replicas = ring.replicas_for_coordinator(*node);
            assert_eq!(replicas.len(), 2);
            assert_ne!(replicas[0], replicas[1]);
            assert!(!replicas.contains(node));
            assert_eq!(replicas[0], order[(idx + 1) % 5]);
            assert_eq!(replicas[1], order[(idx + 2) % 5]);
        }
    }

    #[test]
    fn test_preference_list_has_three_distinct_nodes() {
        let ring = five_node_ring();
        for i in 0..300 {
            let key = format!("pref-{}", i);
            let list = ring.preference_list_for_key(&key);
            assert_eq!(list.len(), 3);
            assert_eq!(list[0], ring.coordinator_for_key(&key));
            let unique: HashSet<_> = list.iter().collect();
            assert_eq!(unique.len(), 3);
        }
    }

    #[test]
    fn test_small_ring_caps_preference_size() {
        let ring = Ring::new(vec![NodeId(1), NodeId(2)], 3).unwrap();
        assert_eq!(ring.preference_size(), 2);
        assert_eq!(ring.replicas_for_coordinator(NodeId(1)), vec![NodeId(2)]);
        assert_eq!(ring.preference_list_for_key("x").len(), 2);
    }

    #[test]
    fn test_unknown_node_has_no_replicas() {
        let ring = five_node_ring();
        assert!(ring.replicas_for_coordinator(NodeId(1)).is_empty());
        assert!(ring.recovery_peers(NodeId(1)).is_empty());
    }

    // ============================================================
    // RECOVERY PEERS / OTHER NODES TESTS
    // ============================================================

    #[test]
    fn test_recovery_peers_are_two_successors_and_two_predecessors() {
        let ring = five_node_ring();
        let order = ring.ring_order();

        for (idx, node) in order.iter().enumerate() {
            let peers = ring.recovery_peers(*node);
            assert_eq!(peers.len(), 4);
            assert!(!peers.contains(node));
            assert_eq!(peers[0], order[(idx + 1) % 5]);
            assert_eq!(peers[1], order[(idx + 2) % 5]);
            assert_eq!(peers[2], order[(idx + 3) % 5]);
            assert_eq!(peers[3], order[(idx + 4) % 5]);
        }
    }

    #[test]
    fn test_recovery_peers_cover_every_overlapping_preference_list() {
        let ring = five_node_ring();
        for node in ring.ring_order() {
            let peers: HashSet<_> = ring.recovery_peers(node).into_iter().collect();
            for i in 0..300 {
                let list = ring.preference_list_for_key(&format!("r{}", i));
                if list.contains(&node) {
                    for other in list.iter().filter(|n| **n != node) {
                        assert!(peers.contains(other));
                    }
                }
            }
        }
    }

    #[test]
    fn test_recovery_peers_deduplicated_on_small_ring() {
        let ring = Ring::new(vec![NodeId(1), NodeId(2), NodeId(3)], 3).unwrap();
        let peers = ring.recovery_peers(NodeId(1));
        assert_eq!(peers.len(), 2);
        assert!(!peers.contains(&NodeId(1)));
    }

    #[test]
    fn test_all_other_nodes_keeps_membership_order() {
        let ring = five_node_ring();
        assert_eq!(
            ring.all_other_nodes(NodeId(11116)),
            vec![NodeId(11108), NodeId(11112), NodeId(11120), NodeId(11124)]
        );
    }
}
