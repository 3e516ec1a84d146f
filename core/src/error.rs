//! Error types for askapi.
//!
//! # Design
//! Only configuration problems are `Error`s: an unknown API id, a missing
//! credential, a catalog that does not validate. They are fatal and surface
//! at startup. Failures of the external collaborators (completion endpoint,
//! target API, embedding service) have their own small error types; the
//! pipeline stages convert them into user-facing outcomes and log the
//! detail instead of propagating it.

use thiserror::Error;

/// Result type for fatal configuration errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Fatal configuration and startup errors.
#[derive(Debug, Error)]
pub enum Error {
    /// An API id that no profile in the catalog defines.
    #[error("unknown API id: {0}")]
    UnknownApi(String),

    /// A required environment variable is not set.
    #[error("environment variable not set: {0}")]
    MissingEnv(String),

    /// The catalog parsed but failed validation.
    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    /// The route utterances could not be embedded.
    #[error("encoder failed: {0}")]
    Encoder(#[from] EncoderError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure to execute an HTTP request or to read its response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection, TLS, timeout or other transport-level failure.
    #[error("transport failed: {0}")]
    Io(String),

    /// The response body was not what the caller expected.
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl From<ureq::Error> for TransportError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => TransportError::Status {
                status,
                body: String::new(),
            },
            other => TransportError::Io(other.to_string()),
        }
    }
}

/// Failure of the chat completion endpoint.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The endpoint answered but without an assistant message.
    #[error("completion response had no assistant message")]
    EmptyChoice,
}

/// Failure of an embedding backend.
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend returned a different number of vectors than inputs.
    #[error("expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}
