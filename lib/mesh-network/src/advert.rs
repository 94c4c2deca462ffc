//! Route advertisements exchanged between routers

use mesh_core::{CoreError, Result, TableEvent};
use serde::{Deserialize, Serialize};

/// A batch of routing table events advertised by one router
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advert {
    /// Id of the advertising router
    pub id: String,
    pub events: Vec<TableEvent>,
}

impl Advert {
    pub fn new(id: impl Into<String>, events: Vec<TableEvent>) -> Self {
        Self {
            id: id.into(),
            events,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CoreError::Internal(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| CoreError::InvalidArgument(format!("malformed advert: {}", e)))
    }
}
