//! Routing table change events

use mesh_api::Route;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Create,
    Update,
    Delete,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Create => "create",
            EventKind::Update => "update",
            EventKind::Delete => "delete",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single change applied to the routing table
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableEvent {
    pub kind: EventKind,
    pub route: Route,
}

impl TableEvent {
    pub fn create(route: Route) -> Self {
        Self { kind: EventKind::Create, route }
    }

    pub fn update(route: Route) -> Self {
        Self { kind: EventKind::Update, route }
    }

    pub fn delete(route: Route) -> Self {
        Self { kind: EventKind::Delete, route }
    }
}
