//! Generic error envelope returned by control operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error class carried in an [`ErrorEnvelope`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidArgument,
    Internal,
    Unavailable,
}

impl ErrorCode {
    /// HTTP-style numeric status for this code
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::InvalidArgument => 400,
            ErrorCode::Internal => 500,
            ErrorCode::Unavailable => 503,
        }
    }
}

/// Error envelope: {code, originating service, message}
#[derive(Error, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[error("{id}: {detail} ({})", .code.status())]
pub struct ErrorEnvelope {
    pub code: ErrorCode,
    /// Service the error originated in
    pub id: String,
    pub detail: String,
}

impl ErrorEnvelope {
    pub fn new(code: ErrorCode, id: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            code,
            id: id.into(),
            detail: detail.into(),
        }
    }
}
