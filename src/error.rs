//! Error types
//!
//! Each layer has its own error enum; [`Error`] wraps them for callers that
//! deal with more than one layer.

use crate::buffer::BufferError;
use crate::registry::RegistryError;
use crate::upstream::UpstreamError;

/// Result type alias using the crate's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A cursor fell behind the buffer
    Buffer(BufferError),
    /// Upstream connection or client setup failed
    Upstream(UpstreamError),
    /// Registry lookup or descriptor validation failed
    Registry(RegistryError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Buffer(e) => write!(f, "Buffer error: {}", e),
            Error::Upstream(e) => write!(f, "Upstream error: {}", e),
            Error::Registry(e) => write!(f, "Registry error: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Buffer(e) => Some(e),
            Error::Upstream(e) => Some(e),
            Error::Registry(e) => Some(e),
        }
    }
}

impl From<BufferError> for Error {
    fn from(e: BufferError) -> Self {
        Error::Buffer(e)
    }
}

impl From<UpstreamError> for Error {
    fn from(e: UpstreamError) -> Self {
        Error::Upstream(e)
    }
}

impl From<RegistryError> for Error {
    fn from(e: RegistryError) -> Self {
        Error::Registry(e)
    }
}
