use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};

/// Identity of a cluster member: the TCP port its peer listener is bound to.
///
/// Membership is fixed at startup, so the port doubles as a stable id that
/// every node agrees on without any discovery round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NodeId(pub u16);

impl NodeId {
    /// Token hashed onto the ring. Kept distinct from the raw id so that
    /// adjacent ports do not land on correlated positions.
    pub fn ring_token(&self) -> String {
        format!("node:{}", self.0)
    }

    pub fn socket_addr(&self, host: IpAddr) -> SocketAddr {
        SocketAddr::new(host, self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for NodeId {
    fn from(port: u16) -> Self {
        Self(port)
    }
}
