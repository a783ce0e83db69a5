use thiserror::Error;

use crate::domain::RegistryError;
use crate::infra::error::InfraError;

/// Top-level failure of the service lifecycle. Request-path errors never
/// surface here; they are degraded to cached negatives or status codes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Infra(#[from] InfraError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("{0}")]
    Unexpected(String),
}

impl AppError {
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::Unexpected(message.into())
    }
}
