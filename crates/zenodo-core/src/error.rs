//! Error types for the Zenodo client
//!
//! This module defines the error handling for the crate, using thiserror for
//! ergonomic definitions and anyhow for flexible source contexts.
//!
//! The request core only ever surfaces three of these variants to callers:
//! [`Error::Request`] for an upstream status that was not retried (or ran out
//! of retries), [`Error::Network`] for a transport fault that exhausted the
//! retry budget, and [`Error::Rejected`] for a request the transport refused
//! outright.

use thiserror::Error;

use crate::http::error::RequestFailure;

/// Boxed error carried by transport faults
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Main error type for Zenodo client operations
#[derive(Error, Debug)]
pub enum Error {
    /// Upstream answered with a status other than the expected one
    #[error("{0}")]
    Request(Box<RequestFailure>),

    /// Transport-level fault (DNS, connection reset, timeout)
    ///
    /// The original error is carried untouched so its message and type
    /// survive the retry loop.
    #[error(transparent)]
    Network(BoxError),

    /// The transport refused the request before it reached the network
    #[error(transparent)]
    Rejected(BoxError),

    /// The response body could not be read
    #[error("Failed to read response body: {message}")]
    ResponseBody {
        message: String,
        status_code: Option<u16>,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// A response did not match the expected shape
    #[error("Schema validation failed: {message}")]
    SchemaValidation {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// JSON parsing and serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// Archive creation errors
    #[error("Archive error: {message}")]
    Archive {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic internal error with context
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a configuration error without a source
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// The structured failure, when this error came from an upstream status
    pub fn failure(&self) -> Option<&RequestFailure> {
        match self {
            Error::Request(failure) => Some(failure),
            _ => None,
        }
    }

    /// HTTP status associated with this error, if any
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Request(failure) => Some(failure.status),
            Error::ResponseBody { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

impl From<RequestFailure> for Error {
    fn from(failure: RequestFailure) -> Self {
        Error::Request(Box::new(failure))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Internal {
            message: err.to_string(),
            source: err,
        }
    }
}
