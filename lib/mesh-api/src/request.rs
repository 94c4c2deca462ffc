//! Inputs of the node control operations

use serde::{Deserialize, Serialize};

/// A peer address to connect to
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub address: String,
}

impl From<&str> for PeerAddress {
    fn from(address: &str) -> Self {
        Self {
            address: address.to_string(),
        }
    }
}

/// Connect the node to additional peers
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectRequest {
    #[serde(default)]
    pub nodes: Vec<PeerAddress>,
}

impl ConnectRequest {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: addresses
                .into_iter()
                .map(|a| PeerAddress { address: a.into() })
                .collect(),
        }
    }

    pub fn addresses(&self) -> Vec<String> {
        self.nodes.iter().map(|n| n.address.clone()).collect()
    }
}

/// Request a depth-bounded topology tree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphRequest {
    /// Requested depth, clamped to `MAX_DEPTH` (0 means maximum)
    #[serde(default)]
    pub depth: usize,
}

impl GraphRequest {
    pub fn new(depth: usize) -> Self {
        Self { depth }
    }
}
