//! Lookup layer errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    /// The backing source failed while fetching reference data.
    #[error("lookup '{lookup}' source error: {message}")]
    Source { lookup: String, message: String },

    /// The lookup was asked to refresh in a mode it does not support.
    #[error("lookup '{lookup}' does not support {operation}")]
    Unsupported { lookup: String, operation: String },

    /// A notification referenced a cache that is not registered.
    #[error("no cache registered under '{0}'")]
    UnknownCache(String),

    /// A refresh notification could not be decoded.
    #[error("malformed refresh notification: {0}")]
    Malformed(String),
}

impl LookupError {
    pub fn source(lookup: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            lookup: lookup.into(),
            message: message.into(),
        }
    }

    pub fn unsupported(lookup: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::Unsupported {
            lookup: lookup.into(),
            operation: operation.into(),
        }
    }
}
