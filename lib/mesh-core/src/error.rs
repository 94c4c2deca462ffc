use mesh_api::{ErrorCode, ErrorEnvelope};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CoreError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            CoreError::Unavailable(_) => ErrorCode::Unavailable,
            CoreError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Wrap this error in the generic envelope, tagged with the originating service
    pub fn to_envelope(&self, service: &str) -> ErrorEnvelope {
        ErrorEnvelope::new(self.code(), service, self.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope() {
        let err = CoreError::InvalidArgument("route service is empty".to_string());
        let env = err.to_envelope("mesh.network");
        assert_eq!(env.code, ErrorCode::InvalidArgument);
        assert_eq!(env.id, "mesh.network");
        assert_eq!(env.detail, "Invalid argument: route service is empty");
        assert_eq!(env.code.status(), 400);
    }

    #[test]
    fn test_codes() {
        assert_eq!(CoreError::Unavailable("x".into()).code(), ErrorCode::Unavailable);
        assert_eq!(CoreError::Internal("x".into()).code(), ErrorCode::Internal);
    }
}
