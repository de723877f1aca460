//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Result type alias using HydroError.
pub type HydroResult<T> = Result<T, HydroError>;

/// Primary error type for ingestion operations.
///
/// Boundary errors keep their originating cause as a `source` so callers
/// can render a single summarized message without losing the underlying
/// failure.
#[derive(Debug, Error)]
pub enum HydroError {
    #[error("failed to read import file: {0}")]
    Io(#[from] std::io::Error),

    #[error("web service request failed: {context}")]
    Fetch {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to parse observation document: {context}")]
    Parse {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("observation document contained no data series")]
    NoSeries,

    #[error("database operation failed: {context}")]
    Persistence {
        context: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("unknown overwrite policy: {0}")]
    UnknownPolicy(String),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl HydroError {
    /// Wrap a transport or remote-service failure.
    pub fn fetch(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        HydroError::Fetch {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Wrap a document parse failure.
    pub fn parse(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        HydroError::Parse {
            context: context.into(),
            source: source.into(),
        }
    }

    /// Wrap a storage-layer failure.
    pub fn persistence(context: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        HydroError::Persistence {
            context: context.into(),
            source: source.into(),
        }
    }
}
