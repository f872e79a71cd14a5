//! Upstream error types
//!
//! Failures opening or reading the upstream connection. These are retried
//! inside the fetcher and only ever logged.

use std::time::Duration;

/// Error type for upstream connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamError {
    /// Connection or protocol failure while opening the request
    Connect(String),
    /// Upstream answered with a non-success HTTP status
    Status(u16),
    /// Opening the connection took longer than the connect timeout
    ConnectTimeout(Duration),
    /// No bytes arrived within the read timeout
    Stalled(Duration),
    /// The response body failed mid-stream
    Body(String),
    /// Upstream ended the body; live sources do this when they drop a client
    Ended,
    /// The HTTP client could not be built
    Client(String),
}

impl std::fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamError::Connect(reason) => write!(f, "Upstream connect failed: {}", reason),
            UpstreamError::Status(status) => write!(f, "Upstream returned HTTP {}", status),
            UpstreamError::ConnectTimeout(timeout) => {
                write!(f, "Upstream connect timed out after {:?}", timeout)
            }
            UpstreamError::Stalled(timeout) => {
                write!(f, "Upstream sent no data for {:?}", timeout)
            }
            UpstreamError::Body(reason) => write!(f, "Upstream body error: {}", reason),
            UpstreamError::Ended => write!(f, "Upstream closed the connection"),
            UpstreamError::Client(reason) => write!(f, "HTTP client error: {}", reason),
        }
    }
}

impl std::error::Error for UpstreamError {}
