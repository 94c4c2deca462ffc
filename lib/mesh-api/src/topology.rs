//! Topology snapshots of the node graph

use serde::{Deserialize, Serialize};

/// Ceiling on traversal depth for bounded topology queries
pub const MAX_DEPTH: usize = 3;

/// Clamp a requested traversal depth.
///
/// Zero and anything above [`MAX_DEPTH`] both mean "as deep as allowed".
pub fn clamp_depth(depth: usize) -> usize {
    if depth == 0 || depth > MAX_DEPTH {
        MAX_DEPTH
    } else {
        depth
    }
}

/// A node in a flat topology snapshot
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeView {
    pub id: String,
    pub address: String,
}

/// A node in a rooted, depth-bounded topology tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<GraphNode>,
}

impl GraphNode {
    pub fn leaf(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            children: Vec::new(),
        }
    }

    /// Number of nodes in this tree, root included
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(GraphNode::len).sum::<usize>()
    }

    /// Number of hops from the root to the deepest node
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.depth())
            .max()
            .unwrap_or(0)
    }

    /// Pre-order list of node ids in this tree
    pub fn ids(&self) -> Vec<String> {
        let mut out = vec![self.id.clone()];
        for child in &self.children {
            out.extend(child.ids());
        }
        out
    }
}
