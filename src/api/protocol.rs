//! Client API Protocol
//!
//! Routes and Data Transfer Objects for the HTTP CRUD surface. Keys in the
//! path accept the `*` (whole cluster) and `@` (this node) sentinels.

use serde::{Deserialize, Serialize};

use crate::dynamo::engine::WriteOutcome;
use crate::dynamo::recovery::RecoveryState;
use crate::membership::types::NodeId;
use crate::storage::Record;

// --- API Endpoints ---

/// Write a single key.
pub const ENDPOINT_PUT: &str = "/kv";
/// Read or delete by key or sentinel.
pub const ENDPOINT_KEY: &str = "/kv/:key";
/// Node introspection.
pub const ENDPOINT_STATUS: &str = "/status";

// --- Data Transfer Objects ---

#[derive(Debug, Serialize, Deserialize)]
pub struct PutRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct PutResponse {
    pub key: String,
    #[serde(flatten)]
    pub outcome: WriteOutcome,
}

/// Rows matched by a read, sorted by key. Empty when the key is unknown.
#[derive(Debug, Serialize, Deserialize)]
pub struct RowsResponse {
    pub rows: Vec<Record>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RemoveResponse {
    /// Rows removed from this node's store by the call.
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub node: NodeId,
    /// Members in ring order, starting at the lowest position.
    pub ring: Vec<NodeId>,
    pub offline: Vec<NodeId>,
    pub recovery: RecoveryState,
    pub local_rows: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
