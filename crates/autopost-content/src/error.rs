//! Error types for content handling.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the publish transport.
///
/// Concrete transports map their underlying failures into these; the
/// upload executor treats every variant as a retryable attempt failure.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Request could not be sent or the connection failed.
    #[error("transport request failed: {0}")]
    Request(String),

    /// The transport answered with something we could not decode.
    #[error("invalid transport response: {0}")]
    InvalidResponse(String),
}

/// Errors that can occur in content operations.
#[derive(Debug, Error)]
pub enum ContentError {
    /// Listing a content pool directory failed.
    #[error("failed to scan pool {path}: {source}")]
    PoolScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Moving an item into the archive failed.
    #[error("failed to archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Caption generation failed.
    #[error("caption generation failed: {0}")]
    Caption(String),

    /// On-demand video rendering failed.
    #[error("video rendering failed: {0}")]
    Render(String),
}
