//! Mesh network controller
//!
//! Composes the node registry, the routing table and the topology walker
//! behind the control operations consumed by the RPC layer:
//! Connect, Nodes, Graph, Routes and Services.

pub mod advert;
pub mod config;
pub mod controller;
pub mod metrics;
pub mod transport;

pub use advert::Advert;
pub use config::NodeConfig;
pub use controller::{ControllerState, NetworkController, SERVICE_NAME};
pub use metrics::NetworkMetrics;
pub use transport::{PeerEvent, TcpTransport, Transport, TransportError};
