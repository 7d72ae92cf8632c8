//! Endpoint error types

use std::path::PathBuf;

use contracts::EndpointKind;
use thiserror::Error;

/// Endpoint-specific errors
#[derive(Debug, Error)]
pub enum EndpointError {
    /// Loopback connection failed
    #[error("connect to 127.0.0.1:{port} failed: {source}")]
    Connect {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    /// Anonymous pipe allocation failed
    #[error("pipe allocation failed: {0}")]
    Pipe(#[source] std::io::Error),

    /// Named pipe creation or handshake failed
    #[error("named pipe '{}' failed: {source}", path.display())]
    NamedPipe {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Operation not available on this endpoint
    #[error("{op} is not supported on a {kind:?} endpoint")]
    Unsupported { op: &'static str, kind: EndpointKind },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EndpointError {
    pub fn unsupported(op: &'static str, kind: EndpointKind) -> Self {
        Self::Unsupported { op, kind }
    }
}
