//! Error types for the refresh cache
//!
//! Provides unified error handling using thiserror.

use std::sync::Arc;

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the refresh cache.
///
/// Cloneable so one failed load can be handed to every caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Configuration rejected at construction time
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The loader returned an error; displayed exactly as the loader reported it
    #[error("{0}")]
    Load(Arc<anyhow::Error>),

    /// The loader panicked or its task was cancelled before producing a value
    #[error("Loader panicked: {0}")]
    LoadPanicked(String),
}

impl CacheError {
    /// Returns the loader's original error, if this is a load failure.
    pub fn loader_error(&self) -> Option<&anyhow::Error> {
        match self {
            CacheError::Load(err) => Some(err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for CacheError {
    fn from(err: anyhow::Error) -> Self {
        CacheError::Load(Arc::new(err))
    }
}

// == Result Type Alias ==
/// Convenience Result type for the refresh cache.
pub type Result<T> = std::result::Result<T, CacheError>;
