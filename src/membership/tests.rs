//! Membership Module Tests
//!
//! ## Test Scopes
//! - **Node identity**: equality, ordering and wire representation of `NodeId`.
//! - **Liveness**: offline/online transitions and live counting over a target set.

#[cfg(test)]
mod tests {
    use crate::membership::liveness::LivenessTracker;
    use crate::membership::types::NodeId;
    use std::sync::Arc;

    // ============================================================
    // NODE ID TESTS
    // ============================================================

    #[test]
    fn test_node_id_serializes_as_bare_port() {
        let json = serde_json::to_string(&NodeId(11108)).unwrap();
        assert_eq!(json, "11108");

        let back: NodeId = serde_json::from_str("11112").unwrap();
        assert_eq!(back, NodeId(11112));
    }

    #[test]
    fn test_ring_token_differs_from_raw_id() {
        let node = NodeId(11108);
        assert_eq!(node.ring_token(), "node:11108");
        assert_ne!(node.ring_token(), node.to_string());
    }

    #[test]
    fn test_socket_addr_uses_port() {
        let addr = NodeId(11116).socket_addr("127.0.0.1".parse().unwrap());
        assert_eq!(addr.to_string(), "127.0.0.1:11116");
    }

    // ============================================================
    // LIVENESS TESTS
    // ============================================================

    #[test]
    fn test_new_tracker_has_everyone_online() {
        let tracker = LivenessTracker::new();
        assert!(!tracker.is_offline(NodeId(1)));
        assert!(tracker.offline_nodes().is_empty());
    }

    #[test]
    fn test_mark_offline_then_online() {
        let tracker = LivenessTracker::new();

        tracker.mark_offline(NodeId(2));
        assert!(tracker.is_offline(NodeId(2)));

        // Marking twice keeps a single entry
        tracker.mark_offline(NodeId(2));
        assert_eq!(tracker.offline_nodes(), vec![NodeId(2)]);

        tracker.mark_online(NodeId(2));
        assert!(!tracker.is_offline(NodeId(2)));
    }

    #[test]
    fn test_mark_online_unknown_node_is_noop() {
        let tracker = LivenessTracker::new();
        tracker.mark_online(NodeId(9));
        assert!(tracker.offline_nodes().is_empty());
    }

    #[test]
    fn test_split_live_only_considers_target_set() {
        let tracker = LivenessTracker::new();
        tracker.mark_offline(NodeId(1));
        tracker.mark_offline(NodeId(7));

        let targets = [NodeId(3), NodeId(1), NodeId(2)];
        let (live, offline) = tracker.split_live(&targets);
        assert_eq!(live, vec![NodeId(3), NodeId(2)]);
        assert_eq!(offline, vec![NodeId(1)]);
    }

    #[test]
    fn test_offline_nodes_sorted() {
        let tracker = LivenessTracker::new();
        tracker.mark_offline(NodeId(5));
        tracker.mark_offline(NodeId(3));
        tracker.mark_offline(NodeId(4));

        assert_eq!(
            tracker.offline_nodes(),
            vec![NodeId(3), NodeId(4), NodeId(5)]
        );
    }

    #[tokio::test]
    async fn test_concurrent_updates_do_not_corrupt_set() {
        let tracker = LivenessTracker::new();
        let mut handles = Vec::new();

        for i in 0..64u16 {
            let tracker: Arc<LivenessTracker> = tracker.clone();
            handles.push(tokio::spawn(async move {
                let node = NodeId(i % 4);
                if i % 2 == 0 {
                    tracker.mark_offline(node);
                } else {
                    tracker.mark_online(node);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        // Whatever the interleaving, only ids from the touched range remain
        for node in tracker.offline_nodes() {
            assert!(node.0 < 4);
        }
    }
}
