mod chat;
mod config;
mod document;
mod retrieval;

pub use chat::{ChatRecord, FeedbackState};
pub use config::{
    Config, DEFAULT_EMBEDDING_ENDPOINT, DEFAULT_QDRANT_URL, EmbeddingConfig, IndexingConfig,
    ProviderConfig, RetrievalConfig, StoreDriver, VectorStoreConfig,
};
pub use document::{Chunk, CollectionInfo, IndexReceipt};
pub use retrieval::{AskResponse, OutputFormat, RetrievalResult, RetrievedChunk, SourceRef};
