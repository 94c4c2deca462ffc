//! Routes advertised across the mesh and the filters used to query them

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved service name for default/fallback routes.
///
/// Wildcard routes can be queried directly but are never listed as a distinct service.
pub const WILDCARD_SERVICE: &str = "*";

/// An advertised path to a service via a given gateway, network, router and link
///
/// Routes are keyed by (service, address, gateway, network, router). At most
/// one route is stored per key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Route {
    /// Name of the destination service
    pub service: String,

    /// Address of the service instance
    pub address: String,

    /// Gateway used to reach the address (empty when directly reachable)
    #[serde(default)]
    pub gateway: String,

    /// Network the route belongs to
    #[serde(default)]
    pub network: String,

    /// Id of the router that advertised this route
    #[serde(default)]
    pub router: String,

    /// Link the route travels over
    #[serde(default)]
    pub link: String,

    /// Route cost, lower is better
    #[serde(default)]
    pub metric: i64,
}

impl Route {
    /// Create a route to `service` at `address` with no gateway
    pub fn new(service: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            address: address.into(),
            ..Default::default()
        }
    }

    pub fn with_gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = gateway.into();
        self
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = network.into();
        self
    }

    pub fn with_router(mut self, router: impl Into<String>) -> Self {
        self.router = router.into();
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    pub fn with_metric(mut self, metric: i64) -> Self {
        self.metric = metric;
        self
    }

    /// Whether `other` is stored under the same key as this route
    pub fn same_key(&self, other: &Route) -> bool {
        self.service == other.service
            && self.address == other.address
            && self.gateway == other.gateway
            && self.network == other.network
            && self.router == other.router
    }

    /// Whether this is a default/fallback route
    pub fn is_wildcard(&self) -> bool {
        self.service == WILDCARD_SERVICE
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} via {} ({}/{}) metric={}",
            self.service,
            self.address,
            if self.gateway.is_empty() { "-" } else { self.gateway.as_str() },
            self.network,
            self.router,
            self.metric
        )
    }
}

/// Ordering applied to query results
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteOrder {
    /// Insertion order within each service bucket
    #[default]
    Insertion,
    /// Ascending metric, ties broken by address
    Metric,
}

/// Route query filter
///
/// Every field defaults to unconstrained. A route matches when every populated
/// field equals the corresponding route field.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub router: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    #[serde(default)]
    pub order: RouteOrder,
}

impl RouteQuery {
    /// A query matching every route
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }

    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn gateway(mut self, gateway: impl Into<String>) -> Self {
        self.gateway = Some(gateway.into());
        self
    }

    pub fn router(mut self, router: impl Into<String>) -> Self {
        self.router = Some(router.into());
        self
    }

    pub fn network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    /// Sort results by ascending metric
    pub fn by_metric(mut self) -> Self {
        self.order = RouteOrder::Metric;
        self
    }

    /// Check a route against every populated field
    pub fn matches(&self, route: &Route) -> bool {
        fn field(want: &Option<String>, have: &str) -> bool {
            want.as_deref().map_or(true, |w| w == have)
        }

        field(&self.service, &route.service)
            && field(&self.address, &route.address)
            && field(&self.gateway, &route.gateway)
            && field(&self.router, &route.router)
            && field(&self.network, &route.network)
    }
}
