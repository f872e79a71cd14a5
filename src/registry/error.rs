//! Registry error types
//!
//! Error types for stream registry operations.

use super::key::StreamKey;

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Stream key is empty or cannot be used as a path segment
    InvalidKey(String),
    /// Descriptor is missing its upstream URL or the URL is unusable
    InvalidDescriptor(String),
    /// No restream exists for the key
    StreamNotFound(StreamKey),
    /// The restream gave up on its upstream and is closed
    StreamUnavailable(StreamKey),
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::InvalidKey(reason) => write!(f, "Invalid stream key: {}", reason),
            RegistryError::InvalidDescriptor(reason) => {
                write!(f, "Invalid stream descriptor: {}", reason)
            }
            RegistryError::StreamNotFound(key) => write!(f, "Stream not found: {}", key),
            RegistryError::StreamUnavailable(key) => write!(f, "Stream unavailable: {}", key),
        }
    }
}

impl std::error::Error for RegistryError {}
