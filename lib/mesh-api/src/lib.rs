//! Mesh network API types
//!
//! This library defines the data exchanged with the control surface of a mesh node:
//! - Route: an advertised path to a service
//! - RouteQuery: filter for route lookups
//! - NodeView / GraphNode: topology snapshots
//! - ConnectRequest / GraphRequest: control operation inputs
//! - ErrorEnvelope: the generic error envelope

pub mod error;
pub mod request;
pub mod route;
pub mod topology;

pub use error::{ErrorCode, ErrorEnvelope};
pub use request::{ConnectRequest, GraphRequest, PeerAddress};
pub use route::{Route, RouteOrder, RouteQuery, WILDCARD_SERVICE};
pub use topology::{clamp_depth, GraphNode, NodeView, MAX_DEPTH};
