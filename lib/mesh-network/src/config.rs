//! Node configuration loaded from the environment

use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Configuration of a mesh node
#[derive(Clone, Debug)]
pub struct NodeConfig {
    /// Unique id of this node
    pub id: String,
    /// Address peers reach this node at
    pub address: String,
    /// Network this node routes for
    pub network: String,
    /// Peer addresses to connect to at startup
    pub peers: Vec<String>,
    /// Timeout for a single peer dial
    pub dial_timeout: Duration,
    /// Interval between topology log lines
    pub topology_interval: Duration,
    /// Listen address for /healthz and /metrics
    pub http_addr: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            address: "0.0.0.0:8085".to_string(),
            network: "mesh".to_string(),
            peers: Vec::new(),
            dial_timeout: Duration::from_millis(5000),
            topology_interval: Duration::from_secs(30),
            http_addr: "0.0.0.0:9090".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load configuration from `MESH_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            id: lookup("MESH_NODE_ID")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.id),
            address: lookup("MESH_ADDRESS").unwrap_or(defaults.address),
            network: lookup("MESH_NETWORK").unwrap_or(defaults.network),
            peers: lookup("MESH_PEERS")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            dial_timeout: parse_or("MESH_DIAL_TIMEOUT_MS", lookup("MESH_DIAL_TIMEOUT_MS"))
                .map(Duration::from_millis)
                .unwrap_or(defaults.dial_timeout),
            topology_interval: parse_or(
                "MESH_TOPOLOGY_INTERVAL_SECS",
                lookup("MESH_TOPOLOGY_INTERVAL_SECS"),
            )
            .map(Duration::from_secs)
            .unwrap_or(defaults.topology_interval),
            http_addr: lookup("MESH_HTTP_ADDR").unwrap_or(defaults.http_addr),
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>) -> Option<T> {
    let value = value?;
    match value.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring invalid value {:?} for {}, using default", value, key);
            None
        }
    }
}
