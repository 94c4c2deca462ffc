//! Core peer graph and routing functionality
//!
//! This library provides:
//! - Node/Link model and the node registry that owns node lifetimes
//! - Routing table mapping service names to advertised routes
//! - Cycle-safe topology walks over the peer graph

pub mod error;
pub mod event;
pub mod node;
pub mod table;
pub mod walker;

pub use error::{CoreError, Result};
pub use event::{EventKind, TableEvent};
pub use node::{Link, Node, NodeId, NodeRegistry};
pub use table::RoutingTable;
pub use walker::{Edge, TopologyWalker};
