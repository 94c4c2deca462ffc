use anyhow::Result;
use http_body_util::Full;
use hyper::{body::Bytes, server::conn::http1, service::service_fn, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use mesh_api::{ConnectRequest, GraphRequest, RouteQuery, MAX_DEPTH};
use mesh_network::{NetworkController, NetworkMetrics, NodeConfig, PeerEvent, TcpTransport};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting mesh-node...");

    let config = NodeConfig::from_env();
    info!("Node {} on network {} at {}", config.id, config.network, config.address);

    let metrics = NetworkMetrics::new()?;
    let (transport, peer_events) = TcpTransport::spawn(config.dial_timeout);
    let network = Arc::new(NetworkController::new(
        config.id.clone(),
        config.address.clone(),
        Arc::new(transport),
        metrics,
    ));
    info!("Network controller initialized");

    tokio::spawn(network.clone().track_table_events());
    tokio::spawn(handle_peer_events(network.clone(), peer_events));

    if !config.peers.is_empty() {
        if let Err(e) = network.connect(&ConnectRequest::new(&config.peers)).await {
            warn!("Initial connect failed: {}", network.envelope(&e));
        }
    }

    tokio::spawn(refresh_topology(network.clone(), config.clone()));

    let listener = TcpListener::bind(&config.http_addr).await?;
    info!("HTTP server listening on {}", config.http_addr);

    tokio::select! {
        res = serve(listener, network) => res?,
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("Shutdown signal received, exiting...");
        }
    }

    Ok(())
}

/// Register nodes whose links come up and invalidate nodes whose links go down
async fn handle_peer_events(
    network: Arc<NetworkController>,
    mut events: mpsc::UnboundedReceiver<PeerEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            PeerEvent::Up { address, latency } => {
                let metric = latency.as_millis().min(i64::MAX as u128) as i64;
                if let Err(e) = network.register_node(&address, &address, BTreeMap::new(), metric) {
                    warn!("Failed to register peer {}: {}", address, network.envelope(&e));
                }
            }
            PeerEvent::Down { address, reason } => {
                if !network.registry().contains(&address) {
                    debug!("Peer {} unreachable: {}", address, reason);
                    continue;
                }
                match network.remove_node(&address).await {
                    Ok(routes) => info!(
                        "Peer {} down ({}), {} routes invalidated",
                        address,
                        reason,
                        routes.len()
                    ),
                    Err(e) => error!("Failed to remove peer {}: {}", address, network.envelope(&e)),
                }
            }
        }
    }
}

/// Periodically re-dial configured peers and log the topology
async fn refresh_topology(network: Arc<NetworkController>, config: NodeConfig) {
    let mut interval = tokio::time::interval(config.topology_interval);
    interval.tick().await;

    loop {
        interval.tick().await;

        if let Err(e) = network.connect(&ConnectRequest::default()).await {
            warn!("Peer refresh failed: {}", network.envelope(&e));
        }

        let nodes = network.nodes();
        let routes = network
            .routes(&RouteQuery::new())
            .await
            .map(|r| r.len())
            .unwrap_or_default();
        let services = network.services().await.map(|s| s.len()).unwrap_or_default();
        info!(
            "Topology: {} nodes, {} routes, {} services ({:?})",
            nodes.len(),
            routes,
            services,
            network.state()
        );

        match network.graph(GraphRequest::new(MAX_DEPTH)) {
            Ok(graph) => match serde_json::to_string(&graph) {
                Ok(json) => debug!("Graph: {}", json),
                Err(e) => debug!("Failed to encode graph: {}", e),
            },
            Err(e) => error!("Failed to build graph: {}", network.envelope(&e)),
        }
    }
}

async fn serve(listener: TcpListener, network: Arc<NetworkController>) -> Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let network = network.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req| handle_request(req, network.clone()));

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Error serving HTTP connection from {}: {}", peer_addr, e);
            }
        });
    }
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    network: Arc<NetworkController>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    let path = req.uri().path();
    debug!("{} {}", req.method(), path);

    let (status, body) = match path {
        "/healthz" => (StatusCode::OK, "OK\n".to_string()),
        "/metrics" => match network.metrics().gather() {
            Ok(text) => (StatusCode::OK, text),
            Err(e) => {
                warn!("Failed to gather metrics: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Failed to gather metrics\n".to_string())
            }
        },
        _ => (StatusCode::NOT_FOUND, "Not Found\n".to_string()),
    };

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    Ok(response)
}
