//! Collection store abstraction.
//!
//! Per-user document collections live behind the [`CollectionStore`] trait
//! so the backend can be swapped by configuration: Qdrant in production, a
//! process-local store for tests and offline development. All collection
//! names reaching this layer have already passed the access guard.

mod memory;
mod qdrant;

pub use memory::MemoryStore;
pub use qdrant::QdrantStore;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::VectorStoreError;
use crate::models::{Chunk, StoreDriver, VectorStoreConfig};

/// A chunk returned from a similarity search, with its score. Higher score
/// means closer (cosine similarity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub text: String,
    pub filename: String,
    pub page: u32,
    pub chunk_index: u32,
    pub score: f32,
}

/// Namespaced vector collections: CRUD plus similarity search primitives.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Check that the backend is reachable.
    async fn health_check(&self) -> Result<bool, VectorStoreError>;

    /// Create a collection; succeeds if it already exists.
    async fn create(&self, name: &str) -> Result<(), VectorStoreError>;

    async fn exists(&self, name: &str) -> Result<bool, VectorStoreError>;

    /// Append chunks to an existing collection. Chunks are immutable once
    /// written.
    async fn append(&self, name: &str, chunks: Vec<Chunk>) -> Result<(), VectorStoreError>;

    /// Similarity search within one collection, best matches first, at most
    /// `top_n` results.
    async fn search(
        &self,
        name: &str,
        query_vector: &[f32],
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError>;

    /// List collection names starting with `prefix`, sorted ascending.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, VectorStoreError>;

    async fn count(&self, name: &str) -> Result<u64, VectorStoreError>;

    async fn delete(&self, name: &str) -> Result<(), VectorStoreError>;
}

/// Create a store backend from configuration.
pub fn create_store(
    config: &VectorStoreConfig,
    embedding_dim: u64,
) -> Result<Arc<dyn CollectionStore>, VectorStoreError> {
    match config.driver {
        StoreDriver::Qdrant => Ok(Arc::new(QdrantStore::new(config, embedding_dim)?)),
        StoreDriver::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
