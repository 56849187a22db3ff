//! Error types shared by the retrieval pipeline.

use std::path::PathBuf;

use reqwest::StatusCode;

/// Startup configuration problems. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required credential or resource name was not supplied.
    #[error("missing required setting {0}")]
    Missing(&'static str),

    /// A configured endpoint could not be parsed.
    #[error("invalid URL for {name}: {reason}")]
    InvalidUrl {
        /// Setting that held the URL.
        name: &'static str,
        /// Parser message.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client for {service}: {reason}")]
    Client {
        /// Service the client was for.
        service: &'static str,
        /// Builder failure.
        reason: String,
    },

    /// Resolving the index host through the control plane failed.
    #[error("failed to resolve index host: {0}")]
    HostLookup(#[from] IndexError),
}

/// Failures while loading the experience corpus.
#[derive(Debug, thiserror::Error)]
pub enum CorpusError {
    /// The corpus file could not be read.
    #[error("failed to read corpus {path:?}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// The file is not a `{ "experiences": [...] }` document.
    #[error("malformed corpus: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures from the embedding provider.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    /// Blank text was passed in; no request is made.
    #[error("cannot embed empty text")]
    EmptyInput,

    /// The provider answered with a non-success status.
    #[error("embedding request failed ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The request never produced a response.
    #[error("embedding transport error: {0}")]
    Transport(String),

    /// A success response whose body could not be turned into a vector.
    #[error("malformed embedding response: {0}")]
    Malformed(String),
}

/// Failures from the vector store.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The store answered with a non-success status.
    #[error("vector store request failed ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The request never produced a response.
    #[error("vector store transport error: {0}")]
    Transport(String),

    /// A success response the client could not interpret.
    #[error("malformed vector store response: {0}")]
    Malformed(String),

    /// A vector's length differs from the index dimension.
    #[error("vector dimension {actual} does not match index dimension {expected}")]
    DimensionMismatch {
        /// Dimension the index holds.
        expected: usize,
        /// Length of the offending vector.
        actual: usize,
    },

    /// More records than one upsert call accepts.
    #[error("batch of {len} records exceeds the store limit of {max}")]
    BatchTooLarge {
        /// Records passed in.
        len: usize,
        /// Per-call limit.
        max: usize,
    },
}

/// Failures that abort an indexing run.
///
/// Batches flushed before the failure stay in the store.
#[derive(Debug, thiserror::Error)]
pub enum IndexingError {
    /// Embedding one chunk failed.
    #[error("failed to embed chunk {chunk_id}: {source}")]
    Embedding {
        /// Chunk whose text was being embedded.
        chunk_id: usize,
        /// Provider failure.
        source: EmbeddingError,
    },

    /// An upsert failed.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// A chunk embedded to a different length than earlier chunks.
    #[error("chunk {chunk_id} embedded to {actual} dimensions, expected {expected}")]
    DimensionMismatch {
        /// Offending chunk.
        chunk_id: usize,
        /// Dimension fixed earlier in the run.
        expected: usize,
        /// Length this chunk produced.
        actual: usize,
    },
}

/// Query-time failures, passed through to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// Embedding the query failed.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// The similarity query failed.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Failures from the question-generation model.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The model endpoint answered with a non-success status.
    #[error("completion request failed ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The request never produced a response.
    #[error("completion transport error: {0}")]
    Transport(String),

    /// A success response whose body is not a completion.
    #[error("malformed completion response: {0}")]
    Malformed(String),

    /// The reply carried no usable text.
    #[error("completion response missing text content")]
    EmptyCompletion,

    /// Context retrieval failed before the model was called.
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] RetrievalError),
}

/// Classifies failures that may succeed when the same call is repeated.
pub trait Transient {
    /// Whether retrying the call could help.
    fn is_transient(&self) -> bool;
}

fn is_transient_status(status: u16) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS.as_u16() || (500..600).contains(&status)
}

impl Transient for EmbeddingError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => is_transient_status(*status),
            Self::Transport(_) => true,
            Self::EmptyInput | Self::Malformed(_) => false,
        }
    }
}

impl Transient for IndexError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => is_transient_status(*status),
            Self::Transport(_) => true,
            _ => false,
        }
    }
}

impl Transient for GenerationError {
    fn is_transient(&self) -> bool {
        match self {
            Self::Api { status, .. } => is_transient_status(*status),
            Self::Transport(_) => true,
            Self::Malformed(_) | Self::EmptyCompletion | Self::Retrieval(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        for status in [429, 500, 503] {
            let err = EmbeddingError::Api {
                status,
                body: String::new(),
            };
            assert!(err.is_transient(), "{status} should retry");
        }
        assert!(IndexError::Transport("reset".into()).is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [400, 401, 403, 404] {
            let err = IndexError::Api {
                status,
                body: String::new(),
            };
            assert!(!err.is_transient(), "{status} should not retry");
        }
        assert!(!EmbeddingError::EmptyInput.is_transient());
        assert!(!GenerationError::Malformed("<html>".into()).is_transient());
        assert!(!IndexError::DimensionMismatch {
            expected: 3,
            actual: 2
        }
        .is_transient());
    }
}
