//! Prometheus metrics for the routing table and peer graph

use mesh_core::EventKind;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Prometheus metrics collector for a mesh node
#[derive(Clone)]
pub struct NetworkMetrics {
    /// Routes currently stored in the routing table
    pub routes: IntGauge,
    /// Nodes currently registered
    pub nodes: IntGauge,
    /// Routing table events by kind
    pub route_events_total: IntCounterVec,
    /// Connect operations dispatched
    pub connect_total: IntCounter,
    /// Connect operations that failed in the transport
    pub connect_errors_total: IntCounter,
    /// Prometheus registry for metrics
    pub registry: Arc<Registry>,
}

impl NetworkMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let routes = IntGauge::new("mesh_routes", "Routes stored in the routing table")?;
        let nodes = IntGauge::new("mesh_nodes", "Nodes registered in the peer graph")?;
        let route_events_total = IntCounterVec::new(
            Opts::new("mesh_route_events_total", "Routing table events by kind"),
            &["event"],
        )?;
        let connect_total = IntCounter::new("mesh_connect_total", "Connect operations dispatched")?;
        let connect_errors_total = IntCounter::new(
            "mesh_connect_errors_total",
            "Connect operations that failed in the transport",
        )?;

        registry.register(Box::new(routes.clone()))?;
        registry.register(Box::new(nodes.clone()))?;
        registry.register(Box::new(route_events_total.clone()))?;
        registry.register(Box::new(connect_total.clone()))?;
        registry.register(Box::new(connect_errors_total.clone()))?;

        Ok(Self {
            routes,
            nodes,
            route_events_total,
            connect_total,
            connect_errors_total,
            registry,
        })
    }

    pub fn record_event(&self, kind: EventKind) {
        self.route_events_total
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> prometheus::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
