//! In-memory collection store.
//!
//! Brute-force cosine similarity over a `RwLock<HashMap>`; used by tests
//! and by local development without a running Qdrant.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use super::{CollectionStore, ScoredChunk};
use crate::error::VectorStoreError;
use crate::models::Chunk;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Vec<Chunk>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Test helper: register an empty collection without going through the
    /// async trait.
    pub fn insert_empty(&self, name: &str) {
        self.collections
            .write()
            .expect("store lock")
            .entry(name.to_string())
            .or_default();
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a < f32::EPSILON || norm_b < f32::EPSILON {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[async_trait]
impl CollectionStore for MemoryStore {
    async fn health_check(&self) -> Result<bool, VectorStoreError> {
        Ok(true)
    }

    async fn create(&self, name: &str) -> Result<(), VectorStoreError> {
        self.insert_empty(name);
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool, VectorStoreError> {
        Ok(self
            .collections
            .read()
            .expect("store lock")
            .contains_key(name))
    }

    async fn append(&self, name: &str, chunks: Vec<Chunk>) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().expect("store lock");
        let stored = collections
            .get_mut(name)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(name.to_string()))?;
        stored.extend(chunks);
        Ok(())
    }

    async fn search(
        &self,
        name: &str,
        query_vector: &[f32],
        top_n: usize,
    ) -> Result<Vec<ScoredChunk>, VectorStoreError> {
        let collections = self.collections.read().expect("store lock");
        let stored = collections
            .get(name)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(name.to_string()))?;

        let mut scored: Vec<ScoredChunk> = stored
            .iter()
            .map(|chunk| ScoredChunk {
                text: chunk.text.clone(),
                filename: chunk.filename.clone(),
                page: chunk.page,
                chunk_index: chunk.chunk_index,
                score: cosine_similarity(query_vector, &chunk.embedding),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk_index.cmp(&b.chunk_index))
        });
        scored.truncate(top_n);
        Ok(scored)
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, VectorStoreError> {
        let mut names: Vec<String> = self
            .collections
            .read()
            .expect("store lock")
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }

    async fn count(&self, name: &str) -> Result<u64, VectorStoreError> {
        let collections = self.collections.read().expect("store lock");
        let stored = collections
            .get(name)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(name.to_string()))?;
        Ok(stored.len() as u64)
    }

    async fn delete(&self, name: &str) -> Result<(), VectorStoreError> {
        let mut collections = self.collections.write().expect("store lock");
        collections
            .remove(name)
            .ok_or_else(|| VectorStoreError::CollectionNotFound(name.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: u32, embedding: Vec<f32>) -> Chunk {
        Chunk {
            text: format!("chunk {}", index),
            filename: "test.pdf".to_string(),
            page: 1,
            chunk_index: index,
            start_offset: 0,
            end_offset: 0,
            embedding,
        }
    }

    #[tokio::test]
    async fn test_append_requires_collection() {
        let store = MemoryStore::new();
        let err = store
            .append("missing", vec![chunk(0, vec![1.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_search_orders_by_similarity() {
        let store = MemoryStore::new();
        store.create("c").await.unwrap();
        store
            .append(
                "c",
                vec![
                    chunk(0, vec![0.0, 1.0]),
                    chunk(1, vec![1.0, 0.0]),
                    chunk(2, vec![0.7, 0.7]),
                ],
            )
            .await
            .unwrap();

        let results = store.search("c", &[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].chunk_index, 1);
        assert_eq!(results[1].chunk_index, 2);
    }

    #[tokio::test]
    async fn test_search_missing_collection_distinct_from_empty() {
        let store = MemoryStore::new();
        store.create("empty").await.unwrap();

        let hits = store.search("empty", &[1.0], 5).await.unwrap();
        assert!(hits.is_empty());

        let err = store.search("missing", &[1.0], 5).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix_sorted() {
        let store = MemoryStore::new();
        for name in ["user_b_doc_x", "user_a_doc_y", "user_a_doc_x", "feedback"] {
            store.create(name).await.unwrap();
        }
        let names = store.list("user_a_").await.unwrap();
        assert_eq!(names, vec!["user_a_doc_x", "user_a_doc_y"]);
    }

    #[tokio::test]
    async fn test_delete_removes_chunks_with_collection() {
        let store = MemoryStore::new();
        store.create("c").await.unwrap();
        store.append("c", vec![chunk(0, vec![1.0])]).await.unwrap();
        store.delete("c").await.unwrap();
        assert!(!store.exists("c").await.unwrap());
        let err = store.delete("c").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::CollectionNotFound(_)));
    }
}
