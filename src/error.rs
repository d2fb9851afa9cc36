/// Error types shared by the sampler, viewers and the manager

use std::net::SocketAddr;

use thiserror::Error;

use crate::render::TemplateError;

/// Fatal setup and serving errors
#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to build client script for viewer '{viewer}': {source}")]
    Template {
        viewer: String,
        #[source]
        source: TemplateError,
    },

    #[error("failed to render page: {0}")]
    Render(#[from] TemplateError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read local address of listener: {0}")]
    LocalAddr(#[source] std::io::Error),

    #[error("HTTP server on {address} failed: {source}")]
    Serve {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

impl DashboardError {
    pub fn config(msg: impl Into<String>) -> Self {
        DashboardError::Config(msg.into())
    }
}

/// Failure to encode a viewer's payload
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("value #{index} is not finite ({value})")]
    NonFinite { index: usize, value: f64 },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure of a metric source to produce a sample
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("process {0} not found")]
    ProcessNotFound(u32),

    #[error("source produced {actual} values for {expected} series")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = DashboardError> = std::result::Result<T, E>;
