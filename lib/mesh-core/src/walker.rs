//! Cycle-safe traversal of the peer graph
//!
//! Walks resolve peers through the [`NodeRegistry`] and read each node's
//! adjacency under its own short lock. A mutation racing with a long walk may
//! show up in part of the snapshot; the result is still well formed.

use crate::node::{Node, NodeId, NodeRegistry};
use mesh_api::{clamp_depth, GraphNode, NodeView};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A directed edge observed during a walk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeId,
    pub to: NodeId,
    pub metric: i64,
}

pub struct TopologyWalker<'a> {
    registry: &'a NodeRegistry,
}

impl<'a> TopologyWalker<'a> {
    pub fn new(registry: &'a NodeRegistry) -> Self {
        Self { registry }
    }

    /// Every node reachable from `root`, root first, each id exactly once
    pub fn flatten(&self, root: &str) -> Vec<NodeView> {
        self.walk(root).0
    }

    /// Every edge reachable from `root`, each exactly once
    pub fn edges(&self, root: &str) -> Vec<Edge> {
        self.walk(root).1
    }

    /// Depth-first walk with an id-keyed visited set.
    ///
    /// Every edge of every reached node is inspected, but a node is appended
    /// and expanded only on its first visit.
    fn walk(&self, root: &str) -> (Vec<NodeView>, Vec<Edge>) {
        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        let Some(root) = self.registry.get(root) else {
            return (nodes, edges);
        };

        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(root.id().clone());
        nodes.push(root.view());
        let mut stack = vec![root];

        while let Some(node) = stack.pop() {
            let mut unvisited = Vec::new();
            for link in node.peers() {
                // Edges to removed nodes are dangling, skip them
                let Some(peer) = self.registry.get(link.peer.as_str()) else {
                    continue;
                };
                edges.push(Edge {
                    from: node.id().clone(),
                    to: link.peer.clone(),
                    metric: link.metric,
                });
                if visited.insert(link.peer) {
                    nodes.push(peer.view());
                    unvisited.push(peer);
                }
            }
            // Reverse so the lowest peer id is expanded first
            stack.extend(unvisited.into_iter().rev());
        }

        (nodes, edges)
    }

    /// Rooted tree of the nodes within `depth` hops of `root`.
    ///
    /// Depth is clamped to `MAX_DEPTH`. Each node is placed once, under the
    /// parent that reaches it in the fewest hops.
    pub fn tree(&self, root: &str, depth: usize) -> Option<GraphNode> {
        let root = self.registry.get(root)?;
        let depth = clamp_depth(depth);

        let mut visited: HashSet<NodeId> = HashSet::new();
        visited.insert(root.id().clone());
        let mut children: HashMap<NodeId, Vec<Arc<Node>>> = HashMap::new();
        let mut frontier = vec![root.clone()];

        for _ in 0..depth {
            let mut next = Vec::new();
            for node in &frontier {
                for link in node.peers() {
                    if visited.contains(&link.peer) {
                        continue;
                    }
                    let Some(peer) = self.registry.get(link.peer.as_str()) else {
                        continue;
                    };
                    visited.insert(link.peer);
                    children
                        .entry(node.id().clone())
                        .or_default()
                        .push(peer.clone());
                    next.push(peer);
                }
            }
            if next.is_empty() {
                break;
            }
            frontier = next;
        }

        Some(build(&root, &mut children, depth))
    }
}

fn build(
    node: &Node,
    children: &mut HashMap<NodeId, Vec<Arc<Node>>>,
    remaining: usize,
) -> GraphNode {
    let mut view = GraphNode::leaf(node.id().to_string(), node.address());
    if remaining == 0 {
        return view;
    }
    if let Some(peers) = children.remove(node.id()) {
        view.children = peers
            .iter()
            .map(|peer| build(peer, children, remaining - 1))
            .collect();
    }
    view
}
