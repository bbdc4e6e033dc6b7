mod agent;
mod chunker;
mod embedding;
mod generation;
mod history;
mod indexer;
mod retriever;
pub mod store;

pub use agent::{
    COLLECTION_NOT_FOUND_MESSAGE, EMBEDDING_UNAVAILABLE_MESSAGE, GENERATION_FAILED_MESSAGE,
    Orchestrator, SEARCH_UNAVAILABLE_MESSAGE,
};
pub use chunker::TextChunker;
pub use embedding::{Embedder, EmbeddingClient};
pub use generation::{Generated, GenerationProvider, HttpGenerationProvider, ProviderChain};
pub use history::{ChatStore, FEEDBACK_COLLECTION, FeedbackIndex, JsonlChatStore, MemoryChatStore};
pub use indexer::ChunkIndexer;
pub use retriever::Retriever;
