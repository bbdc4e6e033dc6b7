//! Error types for the document question-answering backend.

use thiserror::Error;

use crate::utils::retry::Retryable;

/// Deterministic message surfaced when no generation provider can serve a
/// request. The transport layer must see this exact string every time.
pub const NO_PROVIDER_MESSAGE: &str =
    "no generation provider is available; please try again later";

/// Errors related to collection access validation.
#[derive(Debug, Error)]
pub enum AccessError {
    /// The requested collection lies outside the caller's namespace. The
    /// message is intentionally identical whether or not the collection
    /// exists.
    #[error("access denied to this collection")]
    Denied { collection: String },

    #[error("user_id is required")]
    InvalidUser,

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding API key not found; set {0}")]
    MissingApiKey(String),

    #[error("failed to connect to embedding provider: {0}")]
    ConnectionError(String),

    #[error("embedding provider error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("embedding request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    #[error("embedding request timed out")]
    Timeout,
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::ConnectionError(_) | EmbeddingError::Timeout => true,
            EmbeddingError::ApiError { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            EmbeddingError::RequestError(e) => e.is_timeout() || e.is_connect(),
            // Missing credentials and malformed bodies will not heal on retry
            EmbeddingError::MissingApiKey(_) | EmbeddingError::InvalidResponse(_) => false,
        }
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("failed to connect to vector store: {0}")]
    ConnectionError(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("collection error: {0}")]
    CollectionError(String),

    #[error("append error: {0}")]
    AppendError(String),

    #[error("search error: {0}")]
    SearchError(String),

    #[error("delete error: {0}")]
    DeleteError(String),
}

impl Retryable for VectorStoreError {
    fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::ConnectionError(_) => true,
            VectorStoreError::CollectionNotFound(_) => false,
            VectorStoreError::CollectionError(msg)
            | VectorStoreError::AppendError(msg)
            | VectorStoreError::SearchError(msg)
            | VectorStoreError::DeleteError(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("timeout")
                    || msg.contains("connection")
                    || msg.contains("unavailable")
                    || msg.contains("too many")
            }
        }
    }
}

/// Errors related to answer generation providers.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation API key not found; set {0}")]
    MissingApiKey(String),

    #[error("failed to connect to generation provider: {0}")]
    ConnectionError(String),

    #[error("generation provider error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),

    #[error("generation request timed out")]
    Timeout,

    #[error("{NO_PROVIDER_MESSAGE}")]
    NoProviderAvailable,
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        match self {
            GenerationError::ConnectionError(_) | GenerationError::Timeout => true,
            GenerationError::ApiError { status, .. } => {
                matches!(status, 429 | 500 | 502 | 503 | 504)
            }
            GenerationError::MissingApiKey(_)
            | GenerationError::InvalidResponse(_)
            | GenerationError::NoProviderAvailable => false,
        }
    }
}

/// Errors related to retrieval operations.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The resolved scope holds zero collections. Distinct from a search
    /// that matched nothing, which is a valid empty result.
    #[error("no document collections exist for user {user_id}")]
    EmptyScope { user_id: String },

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),
}

/// Errors related to document indexing.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("user_id is required")]
    InvalidUser,

    #[error("document contains no indexable text")]
    EmptyDocument,

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),
}

/// Errors related to chat history and feedback.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("chat not found")]
    ChatNotFound,

    #[error("feedback already submitted for this chat")]
    FeedbackAlreadySubmitted,

    #[error("chat storage error: {0}")]
    Storage(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    Store(#[from] VectorStoreError),
}

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("path error: {0}")]
    PathError(String),
}
