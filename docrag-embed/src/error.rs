//! Error types for the embedding system

/// Result type for embedding operations.
///
/// This is a convenience type alias that uses [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers the ways a call to an external embedding service can fail, from a
/// bad configuration that never reaches the network to a response that does
/// not line up with the request.
///
/// # Error Categories
///
/// - **Configuration Errors**: missing API key, zero batch size
/// - **Transport Errors**: connection refused, timeouts, TLS failures
/// - **API Errors**: non-success HTTP status returned by the service
/// - **Response Errors**: bodies that cannot be parsed or have the wrong shape
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when the provider configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// Error while sending the request or reading the response
    #[error("Embedding request failed: {source}")]
    Http {
        #[from]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status
    #[error("Embedding service returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The response could not be interpreted
    #[error("Malformed embedding response: {message}")]
    MalformedResponse { message: String },

    /// The service returned a different number of vectors than inputs
    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },
}

impl EmbedError {
    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a malformed response error with a custom message.
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedResponse {
            message: message.into(),
        }
    }

    /// Whether the error came from reaching the service rather than from its answer.
    pub fn is_connectivity(&self) -> bool {
        match self {
            Self::Http { source } => source.is_connect() || source.is_timeout(),
            _ => false,
        }
    }
}
