//! Cluster configuration.
//!
//! Every node must run with the same member list and replication factor,
//! otherwise rings diverge and nodes disagree on key ownership.

use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::time::Duration;

use crate::error::DynamoError;
use crate::membership::types::NodeId;

pub const DEFAULT_MEMBERS: [u16; 5] = [11108, 11112, 11116, 11120, 11124];
pub const DEFAULT_REPLICATION: usize = 3;

const DEFAULT_BASE_MS: u64 = 500;
const DEFAULT_QUERY_ALL_MS: u64 = 5_000;
const DEFAULT_RECOVERY_MS: u64 = 5_000;
const DEFAULT_CONNECT_MS: u64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub members: Vec<u16>,
    pub host: IpAddr,
    pub replication: usize,
    pub timeouts: Timeouts,
}

/// Upper bounds for every wait in the protocol, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub base_ms: u64,
    pub query_all_ms: u64,
    pub recovery_ms: u64,
    pub connect_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            members: DEFAULT_MEMBERS.to_vec(),
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            replication: DEFAULT_REPLICATION,
            timeouts: Timeouts::default(),
        }
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            base_ms: DEFAULT_BASE_MS,
            query_all_ms: DEFAULT_QUERY_ALL_MS,
            recovery_ms: DEFAULT_RECOVERY_MS,
            connect_ms: DEFAULT_CONNECT_MS,
        }
    }
}

impl Timeouts {
    /// Scales every bound down to `base`; used by in-process clusters.
    pub fn uniform(base: Duration) -> Self {
        let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        Self {
            base_ms,
            query_all_ms: base_ms.saturating_mul(4),
            recovery_ms: base_ms.saturating_mul(4),
            connect_ms: base_ms,
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.base_ms.saturating_mul(2))
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_millis(self.base_ms)
    }

    pub fn query_all_timeout(&self) -> Duration {
        Duration::from_millis(self.query_all_ms)
    }

    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_millis(self.recovery_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
}

impl ClusterConfig {
    pub fn load(path: &Path) -> Result<Self, DynamoError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            DynamoError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw)
            .map_err(|e| DynamoError::Config(format!("invalid config {}: {}", path.display(), e)))
    }

    pub fn node_ids(&self) -> Vec<NodeId> {
        self.members.iter().copied().map(NodeId).collect()
    }

    pub fn validate_member(&self, node: NodeId) -> Result<(), DynamoError> {
        if self.members.contains(&node.0) {
            Ok(())
        } else {
            Err(DynamoError::Config(format!(
                "node {} is not in the member list {:?}",
                node, self.members
            )))
        }
    }
}
