//! Routing table mapping service names to advertised routes

use crate::{CoreError, Result, TableEvent};
use mesh_api::{Route, RouteOrder, RouteQuery, WILDCARD_SERVICE};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, warn};

/// Buffered events per watcher before the oldest are dropped
const EVENT_BUFFER: usize = 256;

/// RoutingTable stores every advertised route, bucketed by service name
///
/// Reads share one lock, writes are fully serialized. Results are always
/// copied out before the lock is released.
#[derive(Clone)]
pub struct RoutingTable {
    // Map of service name to routes in insertion order
    routes: Arc<RwLock<BTreeMap<String, Vec<Route>>>>,
    events: broadcast::Sender<TableEvent>,
}

impl RoutingTable {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            routes: Arc::new(RwLock::new(BTreeMap::new())),
            events,
        }
    }

    /// Insert a route, or replace the stored route with the same key
    pub async fn create(&self, route: Route) -> Result<()> {
        if route.service.is_empty() {
            warn!("Rejected route with empty service: {}", route);
            return Err(CoreError::InvalidArgument(
                "route service must not be empty".to_string(),
            ));
        }

        let mut routes = self.routes.write().await;
        let bucket = routes.entry(route.service.clone()).or_default();

        let mut matching = bucket
            .iter()
            .enumerate()
            .filter(|(_, r)| r.same_key(&route))
            .map(|(i, _)| i);
        let position = matching.next();
        if matching.next().is_some() {
            error!("Duplicate key stored for route {}", route);
            return Err(CoreError::Internal(format!(
                "duplicate routes stored for key of {}",
                route
            )));
        }

        let event = match position {
            Some(i) if bucket[i] == route => {
                debug!("Route unchanged: {}", route);
                return Ok(());
            }
            Some(i) => {
                bucket[i] = route.clone();
                debug!("Updated route: {}", route);
                TableEvent::update(route)
            }
            None => {
                bucket.push(route.clone());
                debug!("Created route: {}", route);
                TableEvent::create(route)
            }
        };

        // Sent under the write lock so watchers observe mutation order
        let _ = self.events.send(event);
        Ok(())
    }

    /// Remove the route stored under the key of `route`. Absent routes are a no-op.
    pub async fn delete(&self, route: &Route) -> Result<()> {
        let mut routes = self.routes.write().await;

        let removed = match routes.get_mut(&route.service) {
            Some(bucket) => {
                let removed = bucket
                    .iter()
                    .position(|r| r.same_key(route))
                    .map(|i| bucket.remove(i));
                if bucket.is_empty() {
                    routes.remove(&route.service);
                }
                removed
            }
            None => None,
        };

        match removed {
            Some(removed) => {
                debug!("Deleted route: {}", removed);
                let _ = self.events.send(TableEvent::delete(removed));
            }
            None => debug!("Delete of absent route ignored: {}", route),
        }

        Ok(())
    }

    /// Remove every route advertised by `router`, returning the removed routes
    pub async fn delete_by_router(&self, router: &str) -> Vec<Route> {
        let mut routes = self.routes.write().await;
        let mut removed = Vec::new();

        routes.retain(|_, bucket| {
            bucket.retain(|r| {
                if r.router == router {
                    removed.push(r.clone());
                    false
                } else {
                    true
                }
            });
            !bucket.is_empty()
        });

        for route in &removed {
            let _ = self.events.send(TableEvent::delete(route.clone()));
        }

        if !removed.is_empty() {
            debug!("Deleted {} routes advertised by {}", removed.len(), router);
        }
        removed
    }

    /// All routes matching every populated field of the query
    pub async fn query(&self, query: &RouteQuery) -> Result<Vec<Route>> {
        let mut results: Vec<Route> = {
            let routes = self.routes.read().await;
            match &query.service {
                Some(service) => routes
                    .get(service)
                    .map(|bucket| bucket.iter().filter(|r| query.matches(r)).cloned().collect::<Vec<_>>())
                    .unwrap_or_default(),
                None => routes
                    .values()
                    .flatten()
                    .filter(|r| query.matches(r))
                    .cloned()
                    .collect(),
            }
        };

        if query.order == RouteOrder::Metric {
            sort_by_metric(&mut results);
        }
        Ok(results)
    }

    /// Distinct service names, excluding the wildcard service
    pub async fn services(&self) -> Result<Vec<String>> {
        let routes = self.routes.read().await;
        Ok(routes
            .keys()
            .filter(|s| s.as_str() != WILDCARD_SERVICE)
            .cloned()
            .collect())
    }

    /// Best next hop for a service, falling back to the wildcard routes
    pub async fn lookup(&self, service: &str) -> Option<Route> {
        let routes = self.routes.read().await;
        routes
            .get(service)
            .and_then(|bucket| best(bucket))
            .or_else(|| routes.get(WILDCARD_SERVICE).and_then(|bucket| best(bucket)))
            .cloned()
    }

    /// Subscribe to table changes
    pub fn watch(&self) -> broadcast::Receiver<TableEvent> {
        self.events.subscribe()
    }

    /// Number of stored routes
    pub async fn len(&self) -> usize {
        let routes = self.routes.read().await;
        routes.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Ascending metric, ties broken by address
fn sort_by_metric(routes: &mut [Route]) {
    routes.sort_by(|a, b| a.metric.cmp(&b.metric).then_with(|| a.address.cmp(&b.address)));
}

fn best(bucket: &[Route]) -> Option<&Route> {
    bucket
        .iter()
        .min_by(|a, b| a.metric.cmp(&b.metric).then_with(|| a.address.cmp(&b.address)))
}
