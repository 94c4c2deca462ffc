//! End-to-end checks of the control operations on a controller with a
//! recording transport.

use async_trait::async_trait;
use mesh_api::{ConnectRequest, GraphRequest, Route, RouteQuery, MAX_DEPTH, WILDCARD_SERVICE};
use mesh_core::{CoreError, TableEvent};
use mesh_network::{Advert, NetworkController, NetworkMetrics, Transport, TransportError};
use std::collections::BTreeMap;
use std::sync::Arc;

struct RecordingTransport {
    calls: parking_lot::Mutex<Vec<Vec<String>>>,
}

#[async_trait]
impl Transport for RecordingTransport {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn connect(&self, addresses: &[String]) -> Result<(), TransportError> {
        tokio::task::yield_now().await;
        self.calls.lock().push(addresses.to_vec());
        Ok(())
    }
}

fn controller() -> Arc<NetworkController> {
    let transport = Arc::new(RecordingTransport {
        calls: parking_lot::Mutex::new(Vec::new()),
    });
    let metrics = NetworkMetrics::new().expect("Failed to create metrics");
    Arc::new(NetworkController::new("a", "a:8085", transport, metrics))
}

fn route(address: &str, metric: i64) -> Route {
    Route::new("svc1", address)
        .with_gateway("gw1")
        .with_network("netA")
        .with_router("r1")
        .with_metric(metric)
}

#[tokio::test]
async fn test_same_key_create_keeps_one_route_with_latest_metric() {
    let network = controller();
    let table = network.table();
    table.create(route("10.0.0.1", 10)).await.unwrap();
    table.create(route("10.0.0.1", 42)).await.unwrap();

    let routes = network.routes(&RouteQuery::new()).await.unwrap();
    assert_eq!(routes.len(), 1);
    assert_eq!(routes[0].metric, 42);
}

#[tokio::test]
async fn test_delete_then_query() {
    let network = controller();
    let table = network.table();
    let r = route("10.0.0.1", 10);
    table.create(r.clone()).await.unwrap();
    table.delete(&r).await.unwrap();

    let routes = network
        .routes(&RouteQuery::new().service(r.service.clone()))
        .await
        .unwrap();
    assert!(!routes.contains(&r));
    assert!(table.delete(&r).await.is_ok());
}

#[tokio::test]
async fn test_query_by_service_only_returns_that_service() {
    let network = controller();
    assert!(network.routes(&RouteQuery::new().service("svc1")).await.unwrap().is_empty());

    let table = network.table();
    table.create(route("10.0.0.1", 1)).await.unwrap();
    table.create(Route::new("svc2", "10.0.0.2")).await.unwrap();
    table.create(Route::new(WILDCARD_SERVICE, "10.0.0.3")).await.unwrap();

    for service in ["svc1", "svc2", WILDCARD_SERVICE, "svc3"] {
        let routes = network.routes(&RouteQuery::new().service(service)).await.unwrap();
        assert!(routes.iter().all(|r| r.service == service));
    }
}

#[tokio::test]
async fn test_metric_ordering_scenario() {
    let network = controller();
    let table = network.table();
    table.create(route("10.0.0.1", 10)).await.unwrap();
    table.create(route("10.0.0.2", 5)).await.unwrap();

    let routes = network
        .routes(&RouteQuery::new().service("svc1").by_metric())
        .await
        .unwrap();
    assert_eq!(routes[0].address, "10.0.0.2");
    assert_eq!(routes[1].address, "10.0.0.1");
}

#[tokio::test]
async fn test_cyclic_graph_terminates() {
    let network = controller();
    network.register_node("b", "b:8085", BTreeMap::new(), 1).unwrap();
    network.registry().insert(mesh_core::Node::new("c", "c:8085"));
    network.link("b", "c", 1).unwrap();
    network.link("c", "a", 1).unwrap();

    let nodes = network.nodes();
    let mut ids: Vec<_> = nodes.iter().map(|n| n.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c"]);

    let graph = network.graph(GraphRequest::new(5)).unwrap();
    let mut tree_ids = graph.ids();
    let total = tree_ids.len();
    tree_ids.sort();
    tree_ids.dedup();
    assert_eq!(tree_ids.len(), total);
    assert_eq!(tree_ids, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn test_graph_depth_clamped() {
    let network = controller();
    let mut prev = "a".to_string();
    for i in 0..6 {
        let id = format!("n{}", i);
        network.registry().insert(mesh_core::Node::new(id.as_str(), "n:1"));
        network.link(&prev, &id, 1).unwrap();
        prev = id;
    }

    let max = network.graph(GraphRequest::new(MAX_DEPTH)).unwrap();
    assert_eq!(network.graph(GraphRequest::new(0)).unwrap(), max);
    assert_eq!(network.graph(GraphRequest::new(MAX_DEPTH + 1)).unwrap(), max);
    assert_eq!(max.depth(), MAX_DEPTH);
}

#[tokio::test]
async fn test_diamond_flatten() {
    let network = controller();
    network.register_node("c", "c:1", BTreeMap::new(), 1).unwrap();
    network.register_node("b", "b:1", BTreeMap::new(), 1).unwrap();
    network.registry().insert(mesh_core::Node::new("d", "d:1"));
    network.link("b", "d", 1).unwrap();
    network.link("c", "d", 1).unwrap();

    let mut ids: Vec<_> = network.nodes().into_iter().map(|n| n.id).collect();
    ids.sort();
    assert_eq!(ids, vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn test_sequential_connects_accumulate() {
    let network = controller();
    network.connect(&ConnectRequest::new(["x:1"])).await.unwrap();
    network.connect(&ConnectRequest::new(["y:2"])).await.unwrap();

    let peers = network.configured_peers();
    assert!(peers.contains(&"x:1".to_string()));
    assert!(peers.contains(&"y:2".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_connects_lose_nothing() {
    let network = controller();
    let mut handles = Vec::new();
    for i in 0..32 {
        let network = network.clone();
        handles.push(tokio::spawn(async move {
            network.connect(&ConnectRequest::new([format!("peer-{}:8085", i)])).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    assert_eq!(network.configured_peers().len(), 32);
}

#[tokio::test]
async fn test_disconnect_invalidates_routes() {
    let network = controller();
    network.register_node("r1", "r1:8085", BTreeMap::new(), 1).unwrap();

    let advert = Advert::new(
        "r1",
        vec![
            TableEvent::create(route("10.0.0.1", 1)),
            TableEvent::create(route("10.0.0.2", 2)),
        ],
    );
    network.process_advert(&advert).await.unwrap();
    assert_eq!(network.lookup("svc1").await.unwrap().address, "10.0.0.1");

    network.remove_node("r1").await.unwrap();
    assert!(network.routes(&RouteQuery::new().router("r1")).await.unwrap().is_empty());
    assert!(network.lookup("svc1").await.is_none());
    assert_eq!(network.nodes().len(), 1);
}

#[tokio::test]
async fn test_invalid_route_leaves_table_unchanged() {
    let network = controller();
    network.table().create(route("10.0.0.1", 1)).await.unwrap();

    let err = network.table().create(Route::new("", "10.0.0.9")).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidArgument(_)));
    assert_eq!(network.routes(&RouteQuery::new()).await.unwrap(), vec![route("10.0.0.1", 1)]);
}

#[tokio::test]
async fn test_late_advert_after_disconnect_leaves_no_routes() {
    let network = controller();
    network.register_node("r1", "r1:8085", BTreeMap::new(), 1).unwrap();
    network.remove_node("r1").await.unwrap();

    let advert = Advert::new("r1", vec![TableEvent::create(route("10.0.0.1", 1))]);
    assert!(network.process_advert(&advert).await.is_err());
    assert!(!network.registry().contains("r1"));
    assert!(network.routes(&RouteQuery::new().router("r1")).await.unwrap().is_empty());
    assert!(network.lookup("svc1").await.is_none());
}
