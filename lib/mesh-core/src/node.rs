//! Node/Link model and the node registry
//!
//! Nodes refer to their peers by id only. The [`NodeRegistry`] is the single
//! owner of node lifetimes; adjacency entries are resolved through it, so a
//! cyclic peer graph never forms an ownership cycle.

use mesh_api::NodeView;
use parking_lot::RwLock;
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Opaque unique identifier of a network participant
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Directed edge from a node to one of its peers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Link {
    pub peer: NodeId,
    /// Link cost, refreshed by the transport's liveness checks
    pub metric: i64,
}

impl Link {
    pub fn new(peer: impl Into<NodeId>, metric: i64) -> Self {
        Self {
            peer: peer.into(),
            metric,
        }
    }
}

#[derive(Debug)]
struct Endpoint {
    address: String,
    metadata: BTreeMap<String, String>,
}

/// A network participant with an identity, an address and its adjacency
///
/// The address and metadata can be refreshed in place, so every holder of
/// the node's `Arc` keeps seeing one adjacency set.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    endpoint: RwLock<Endpoint>,
    peers: RwLock<BTreeMap<NodeId, i64>>,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: RwLock::new(Endpoint {
                address: address.into(),
                metadata: BTreeMap::new(),
            }),
            peers: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_metadata(self, metadata: BTreeMap<String, String>) -> Self {
        self.endpoint.write().metadata = metadata;
        self
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn address(&self) -> String {
        self.endpoint.read().address.clone()
    }

    pub fn metadata(&self) -> BTreeMap<String, String> {
        self.endpoint.read().metadata.clone()
    }

    /// Replace the address and metadata, leaving the adjacency untouched
    fn refresh(&self, address: String, metadata: BTreeMap<String, String>) {
        let mut endpoint = self.endpoint.write();
        endpoint.address = address;
        endpoint.metadata = metadata;
    }

    /// Merge a link into the adjacency set.
    ///
    /// Returns true if the peer was not adjacent before. Re-adding an existing
    /// peer only refreshes its metric.
    pub fn add_peer(&self, link: Link) -> bool {
        let mut peers = self.peers.write();
        peers.insert(link.peer, link.metric).is_none()
    }

    /// Detach the edge to `id`. The peer's own adjacency is untouched.
    pub fn remove_peer(&self, id: &str) -> bool {
        self.peers.write().remove(id).is_some()
    }

    /// Refresh the metric of an existing edge
    pub fn update_link_metric(&self, id: &str, metric: i64) -> bool {
        match self.peers.write().get_mut(id) {
            Some(m) => {
                *m = metric;
                true
            }
            None => false,
        }
    }

    /// Copy of the current adjacency, ordered by peer id
    pub fn peers(&self) -> Vec<Link> {
        self.peers
            .read()
            .iter()
            .map(|(peer, metric)| Link {
                peer: peer.clone(),
                metric: *metric,
            })
            .collect()
    }

    pub fn has_peer(&self, id: &str) -> bool {
        self.peers.read().contains_key(id)
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    pub fn view(&self) -> NodeView {
        NodeView {
            id: self.id.to_string(),
            address: self.address(),
        }
    }
}

/// Arena of nodes keyed by id
pub struct NodeRegistry {
    nodes: RwLock<HashMap<NodeId, Arc<Node>>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
        }
    }

    /// Register a node, or refresh the address and metadata of an already
    /// registered id in place. The registered instance is returned.
    pub fn insert(&self, node: Node) -> Arc<Node> {
        let mut nodes = self.nodes.write();
        if let Some(existing) = nodes.get(node.id()) {
            let Endpoint { address, metadata } = node.endpoint.into_inner();
            debug!("Refreshed node {} at {}", existing.id(), address);
            existing.refresh(address, metadata);
            return existing.clone();
        }

        let node = Arc::new(node);
        debug!("Registered node {} at {}", node.id(), node.address());
        nodes.insert(node.id().clone(), node.clone());
        node
    }

    pub fn get(&self, id: &str) -> Option<Arc<Node>> {
        self.nodes.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.read().contains_key(id)
    }

    /// Remove a node and detach it from every remaining node's adjacency
    pub fn remove(&self, id: &str) -> Option<Arc<Node>> {
        let (removed, remaining) = {
            let mut nodes = self.nodes.write();
            let removed = nodes.remove(id)?;
            let remaining: Vec<Arc<Node>> = nodes.values().cloned().collect();
            (removed, remaining)
        };

        for node in remaining {
            node.remove_peer(id);
        }

        debug!("Removed node {}", id);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }

    /// Registered ids in sorted order
    pub fn ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.nodes.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
