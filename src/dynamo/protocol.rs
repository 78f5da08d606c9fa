//! Wire Protocol Definitions
//!
//! Every peer exchange is a single `Message`, serialized as one line of JSON
//! and sent over its own connection. Fields that do not apply to a message
//! type are omitted on the wire and defaulted on decode.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use uuid::Uuid;

use crate::membership::types::NodeId;
use crate::session::registry::SessionId;
use crate::storage::Versioned;

/// Key sentinel: every key in the cluster.
pub const ALL_KEYS: &str = "*";
/// Key sentinel: this node's store only, no network fan-out.
pub const LOCAL_KEYS: &str = "@";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MessageType {
    Ack,
    Insert,
    Delete,
    QueryRequest,
    QueryReply,
    RecoveryRequest,
    RecoveryReply,
}

/// Role the receiver plays for the message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Coordinator,
    #[default]
    Replica,
    All,
    /// Read-repair write carrying an already-resolved version.
    Update,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub session_id: SessionId,
    pub from_node: NodeId,
    pub message_type: MessageType,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ack_requested: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub version: u64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub results: HashMap<String, Versioned>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

fn is_zero(version: &u64) -> bool {
    *version == 0
}

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("empty message")]
    Empty,
}

impl Message {
    fn new(from: NodeId, message_type: MessageType, role: Role, key: &str) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            from_node: from,
            message_type,
            role,
            ack_requested: false,
            key: key.to_string(),
            value: String::new(),
            version: 0,
            results: HashMap::new(),
        }
    }

    pub fn insert(from: NodeId, key: &str, value: &str, role: Role, version: u64) -> Self {
        let mut message = Self::new(from, MessageType::Insert, role, key);
        message.value = value.to_string();
        message.version = version;
        message
    }

    pub fn delete(from: NodeId, key: &str, role: Role) -> Self {
        Self::new(from, MessageType::Delete, role, key)
    }

    pub fn query_request(from: NodeId, key: &str, role: Role) -> Self {
        Self::new(from, MessageType::QueryRequest, role, key)
    }

    pub fn recovery_request(from: NodeId) -> Self {
        Self::new(from, MessageType::RecoveryRequest, Role::All, ALL_KEYS)
    }

    /// Ties the message to an open session so replies can be correlated.
    pub fn in_session(mut self, session_id: SessionId) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_ack(mut self, ack_requested: bool) -> Self {
        self.ack_requested = ack_requested;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Builds a response in the same session, sent by `from`.
    pub fn reply(&self, from: NodeId, message_type: MessageType) -> Self {
        Self {
            session_id: self.session_id,
            from_node: from,
            message_type,
            role: self.role,
            ack_requested: false,
            key: self.key.clone(),
            value: String::new(),
            version: self.version,
            results: HashMap::new(),
        }
    }

    pub fn selector(&self) -> Selector {
        Selector::parse(&self.key)
    }

    /// Encodes as a single newline-terminated JSON line.
    pub fn encode(&self) -> Result<String, CodecError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }

    pub fn decode(line: &str) -> Result<Self, CodecError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(CodecError::Empty);
        }
        Ok(serde_json::from_str(trimmed)?)
    }
}

/// Parsed key argument of a client operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    All,
    Local,
    Key(String),
}

impl Selector {
    pub fn parse(raw: &str) -> Self {
        match raw {
            ALL_KEYS => Selector::All,
            LOCAL_KEYS => Selector::Local,
            key => Selector::Key(key.to_string()),
        }
    }
}
