//! Network controller owning the local node, the node registry, the routing
//! table and the configured peer-address set

use crate::{Advert, NetworkMetrics, Transport};
use mesh_api::{
    ConnectRequest, ErrorEnvelope, GraphNode, GraphRequest, NodeView, Route, RouteQuery,
};
use mesh_core::{
    CoreError, EventKind, Link, Node, NodeId, NodeRegistry, Result, RoutingTable, TopologyWalker,
};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Originating service reported in error envelopes
pub const SERVICE_NAME: &str = "mesh.network";

/// Connection state of the controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Connecting,
    Connected,
}

struct PeerSet {
    state: ControllerState,
    addresses: BTreeSet<String>,
}

/// NetworkController serves the control operations of a mesh node
pub struct NetworkController {
    local: NodeId,
    registry: Arc<NodeRegistry>,
    table: RoutingTable,
    peers: Mutex<PeerSet>,
    transport: Arc<dyn Transport>,
    metrics: NetworkMetrics,
}

impl NetworkController {
    /// Create a controller with a fresh routing table and the local node registered
    pub fn new(
        id: impl Into<NodeId>,
        address: impl Into<String>,
        transport: Arc<dyn Transport>,
        metrics: NetworkMetrics,
    ) -> Self {
        let registry = Arc::new(NodeRegistry::new());
        let local = registry.insert(Node::new(id, address)).id().clone();
        metrics.nodes.set(registry.len() as i64);

        info!("Network controller for node {} using {} transport", local, transport.name());

        Self {
            local,
            registry,
            table: RoutingTable::new(),
            peers: Mutex::new(PeerSet {
                state: ControllerState::Idle,
                addresses: BTreeSet::new(),
            }),
            transport,
            metrics,
        }
    }

    pub fn local(&self) -> &NodeId {
        &self.local
    }

    /// Shared handle to the routing table
    pub fn table(&self) -> RoutingTable {
        self.table.clone()
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn metrics(&self) -> &NetworkMetrics {
        &self.metrics
    }

    pub fn state(&self) -> ControllerState {
        self.peers.lock().state
    }

    /// Wrap an operation error in the envelope handed back to callers
    pub fn envelope(&self, err: &CoreError) -> ErrorEnvelope {
        err.to_envelope(SERVICE_NAME)
    }

    /// Configured peer addresses, sorted
    pub fn configured_peers(&self) -> Vec<String> {
        self.peers.lock().addresses.iter().cloned().collect()
    }

    /// Merge addresses into the configured peer set and trigger the transport.
    ///
    /// The merge is kept even when the transport fails.
    pub async fn connect(&self, request: &ConnectRequest) -> Result<()> {
        let (merged, previous) = {
            let mut peers = self.peers.lock();
            for peer in &request.nodes {
                let address = peer.address.trim();
                if address.is_empty() {
                    continue;
                }
                if peers.addresses.insert(address.to_string()) {
                    info!("Added peer address {}", address);
                }
            }
            let previous = peers.state;
            if previous == ControllerState::Idle {
                peers.state = ControllerState::Connecting;
            }
            (peers.addresses.iter().cloned().collect::<Vec<_>>(), previous)
        };

        self.metrics.connect_total.inc();
        debug!("Dispatching connect for {} peer addresses", merged.len());

        match self.transport.connect(&merged).await {
            Ok(()) => {
                let mut peers = self.peers.lock();
                if peers.state != ControllerState::Connected {
                    info!("Node {} connected", self.local);
                }
                peers.state = ControllerState::Connected;
                Ok(())
            }
            Err(e) => {
                self.metrics.connect_errors_total.inc();
                let mut peers = self.peers.lock();
                if peers.state == ControllerState::Connecting && previous == ControllerState::Idle {
                    peers.state = ControllerState::Idle;
                }
                warn!("Connect failed for node {}: {}", self.local, e);
                Err(CoreError::Unavailable(e.to_string()))
            }
        }
    }

    /// Every node reachable from the local node, each once
    pub fn nodes(&self) -> Vec<NodeView> {
        TopologyWalker::new(&self.registry).flatten(self.local.as_str())
    }

    /// Depth-bounded topology tree rooted at the local node
    pub fn graph(&self, request: GraphRequest) -> Result<GraphNode> {
        TopologyWalker::new(&self.registry)
            .tree(self.local.as_str(), request.depth)
            .ok_or_else(|| CoreError::Internal(format!("local node {} is not registered", self.local)))
    }

    pub async fn routes(&self, query: &RouteQuery) -> Result<Vec<Route>> {
        self.table.query(query).await
    }

    pub async fn services(&self) -> Result<Vec<String>> {
        self.table.services().await
    }

    /// Best next hop for a service
    pub async fn lookup(&self, service: &str) -> Option<Route> {
        self.table.lookup(service).await
    }

    /// Register a node reached over a link from the local node
    pub fn register_node(
        &self,
        id: &str,
        address: &str,
        metadata: BTreeMap<String, String>,
        metric: i64,
    ) -> Result<()> {
        if id.is_empty() {
            return Err(CoreError::InvalidArgument("node id must not be empty".to_string()));
        }
        if id == self.local.as_str() {
            return Err(CoreError::InvalidArgument(format!(
                "node {} is the local node",
                id
            )));
        }

        self.registry
            .insert(Node::new(id, address).with_metadata(metadata));
        self.link(self.local.as_str(), id, metric)?;
        self.metrics.nodes.set(self.registry.len() as i64);
        info!("Node {} registered at {}", id, address);
        Ok(())
    }

    /// Add or refresh the edge `from -> to`
    pub fn link(&self, from: &str, to: &str, metric: i64) -> Result<()> {
        let node = self.registry.get(from).ok_or_else(|| {
            CoreError::InvalidArgument(format!("node {} is not registered", from))
        })?;
        if node.add_peer(Link::new(to, metric)) {
            debug!("Linked {} -> {} (metric {})", from, to, metric);
        }
        Ok(())
    }

    /// Remove a node and every route it advertised
    pub async fn remove_node(&self, id: &str) -> Result<Vec<Route>> {
        if id == self.local.as_str() {
            return Err(CoreError::InvalidArgument(
                "the local node cannot be removed".to_string(),
            ));
        }

        if self.registry.remove(id).is_some() {
            info!("Node {} removed", id);
        }
        let removed = self.table.delete_by_router(id).await;
        if !removed.is_empty() {
            info!("Invalidated {} routes of node {}", removed.len(), id);
        }

        self.metrics.nodes.set(self.registry.len() as i64);
        self.metrics.routes.set(self.table.len().await as i64);
        Ok(removed)
    }

    /// Apply the events of a route advertisement.
    ///
    /// Adverts from routers that are not registered are rejected whole. Events
    /// for routes not owned by the advertising router are rejected; the
    /// remaining events are still applied and the first error is returned.
    pub async fn process_advert(&self, advert: &Advert) -> Result<()> {
        if advert.id == self.local.as_str() {
            debug!("Ignoring own advert");
            return Ok(());
        }
        if !self.registry.contains(&advert.id) {
            warn!("Rejected advert from unregistered router {}", advert.id);
            return Err(CoreError::InvalidArgument(format!(
                "router {} is not registered",
                advert.id
            )));
        }

        let mut first_error = None;
        for event in &advert.events {
            let result = if event.route.router != advert.id {
                Err(CoreError::InvalidArgument(format!(
                    "route {} not owned by advertising router {}",
                    event.route, advert.id
                )))
            } else {
                match event.kind {
                    EventKind::Create | EventKind::Update => self.table.create(event.route.clone()).await,
                    EventKind::Delete => self.table.delete(&event.route).await,
                }
            };

            if let Err(e) = result {
                warn!("Rejected advert event from {}: {}", advert.id, e);
                first_error.get_or_insert(e);
            }
        }

        // A disconnect racing with this advert may have cascaded before the
        // events landed
        if !self.registry.contains(&advert.id) {
            let removed = self.table.delete_by_router(&advert.id).await;
            debug!("Dropped {} routes of router {} removed mid-advert", removed.len(), advert.id);
        }

        self.metrics.routes.set(self.table.len().await as i64);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Feed routing table events into the metrics for the lifetime of the controller
    pub async fn track_table_events(self: Arc<Self>) {
        let mut events = self.table.watch();
        loop {
            match events.recv().await {
                Ok(event) => {
                    self.metrics.record_event(event.kind);
                    self.metrics.routes.set(self.table.len().await as i64);
                }
                Err(RecvError::Lagged(n)) => {
                    warn!("Table event tracker lagged by {} events", n);
                    self.metrics.routes.set(self.table.len().await as i64);
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportError;
    use async_trait::async_trait;
    use mesh_api::ErrorCode;
    use mesh_core::TableEvent;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct StubTransport {
        fail: AtomicBool,
        calls: Mutex<Vec<Vec<String>>>,
    }

    #[async_trait]
    impl Transport for StubTransport {
        fn name(&self) -> &'static str {
            "stub"
        }

        async fn connect(&self, addresses: &[String]) -> std::result::Result<(), TransportError> {
            self.calls.lock().push(addresses.to_vec());
            if self.fail.load(Ordering::SeqCst) {
                Err(TransportError::Other("link down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn controller() -> (NetworkController, Arc<StubTransport>) {
        let transport = Arc::new(StubTransport::default());
        let metrics = NetworkMetrics::new().expect("Failed to create metrics");
        let controller = NetworkController::new("local", "local:8085", transport.clone(), metrics);
        (controller, transport)
    }

    #[tokio::test]
    async fn test_connect_merges_addresses() {
        let (controller, transport) = controller();
        assert_eq!(controller.state(), ControllerState::Idle);

        controller.connect(&ConnectRequest::new(["x:1"])).await.unwrap();
        controller.connect(&ConnectRequest::new(["y:2", "x:1", " "])).await.unwrap();

        assert_eq!(controller.configured_peers(), vec!["x:1", "y:2"]);
        assert_eq!(controller.state(), ControllerState::Connected);
        assert_eq!(transport.calls.lock().last().unwrap(), &vec!["x:1", "y:2"]);
    }

    #[tokio::test]
    async fn test_failed_connect_keeps_merge() {
        let (controller, transport) = controller();
        transport.fail.store(true, Ordering::SeqCst);

        let err = controller.connect(&ConnectRequest::new(["x:1"])).await.unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
        let envelope = controller.envelope(&err);
        assert_eq!(envelope.code, ErrorCode::Unavailable);
        assert_eq!(envelope.id, SERVICE_NAME);
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(controller.configured_peers(), vec!["x:1"]);

        transport.fail.store(false, Ordering::SeqCst);
        controller.connect(&ConnectRequest::new(["y:2"])).await.unwrap();
        assert_eq!(controller.state(), ControllerState::Connected);
        assert_eq!(transport.calls.lock().last().unwrap(), &vec!["x:1", "y:2"]);
    }

    #[tokio::test]
    async fn test_failed_reconnect_stays_connected() {
        let (controller, transport) = controller();
        controller.connect(&ConnectRequest::new(["x:1"])).await.unwrap();

        transport.fail.store(true, Ordering::SeqCst);
        assert!(controller.connect(&ConnectRequest::new(["y:2"])).await.is_err());
        assert_eq!(controller.state(), ControllerState::Connected);
    }

    #[tokio::test]
    async fn test_register_and_remove_node() {
        let (controller, _) = controller();
        controller
            .register_node("peer", "peer:8085", BTreeMap::new(), 5)
            .unwrap();
        controller
            .table()
            .create(Route::new("svc1", "10.0.0.1").with_router("peer"))
            .await
            .unwrap();

        let ids: Vec<_> = controller.nodes().into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec!["local", "peer"]);

        let removed = controller.remove_node("peer").await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(controller.routes(&RouteQuery::new()).await.unwrap().is_empty());
        assert_eq!(controller.nodes().len(), 1);
    }

    #[tokio::test]
    async fn test_register_rejects_local_and_empty() {
        let (controller, _) = controller();
        assert!(controller.register_node("local", "x:1", BTreeMap::new(), 1).is_err());
        assert!(controller.register_node("", "x:1", BTreeMap::new(), 1).is_err());
        assert!(controller.remove_node("local").await.is_err());
        assert!(controller.link("ghost", "local", 1).is_err());
    }

    #[tokio::test]
    async fn test_graph_from_local() {
        let (controller, _) = controller();
        controller.register_node("a", "a:1", BTreeMap::new(), 1).unwrap();
        controller.register_node("b", "b:1", BTreeMap::new(), 1).unwrap();
        controller.link("a", "local", 1).unwrap();

        let graph = controller.graph(GraphRequest::default()).unwrap();
        assert_eq!(graph.id, "local");
        assert_eq!(graph.ids(), vec!["local", "a", "b"]);
    }

    #[tokio::test]
    async fn test_process_advert() {
        let (controller, _) = controller();
        controller.register_node("r1", "r1:8085", BTreeMap::new(), 1).unwrap();
        let good = Route::new("svc1", "10.0.0.1").with_router("r1").with_metric(3);
        let foreign = Route::new("svc2", "10.0.0.2").with_router("r2");

        let advert = Advert::new(
            "r1",
            vec![TableEvent::create(good.clone()), TableEvent::create(foreign)],
        );
        let err = controller.process_advert(&advert).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert_eq!(controller.services().await.unwrap(), vec!["svc1"]);

        let withdraw = Advert::new("r1", vec![TableEvent::delete(good)]);
        controller.process_advert(&withdraw).await.unwrap();
        assert!(controller.services().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_advert_from_removed_router_rejected() {
        let (controller, _) = controller();
        controller.register_node("r1", "r1:8085", BTreeMap::new(), 1).unwrap();
        controller.remove_node("r1").await.unwrap();

        let late = Advert::new(
            "r1",
            vec![TableEvent::create(Route::new("svc1", "10.0.0.1").with_router("r1"))],
        );
        let err = controller.process_advert(&late).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
        assert!(controller
            .routes(&RouteQuery::new().router("r1"))
            .await
            .unwrap()
            .is_empty());
        assert!(controller.services().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_own_advert_ignored() {
        let (controller, _) = controller();
        let advert = Advert::new(
            "local",
            vec![TableEvent::create(Route::new("svc1", "10.0.0.1").with_router("local"))],
        );
        controller.process_advert(&advert).await.unwrap();
        assert!(controller.services().await.unwrap().is_empty());
    }
}
