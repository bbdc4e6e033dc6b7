//! Retrieval over access-validated scopes.

use std::cmp::Ordering;
use std::sync::Arc;

use crate::access::Scope;
use crate::error::{RetrievalError, VectorStoreError};
use crate::models::{RetrievalResult, RetrievedChunk};
use crate::services::embedding::Embedder;
use crate::services::store::CollectionStore;
use crate::utils::retry::{RetryConfig, with_retry};

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn CollectionStore>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn CollectionStore>) -> Self {
        Self { embedder, store }
    }

    /// Retrieve up to `top_n` chunks for the query within the scope.
    ///
    /// Cross-collection scopes are searched per collection and merged by a
    /// global re-rank on the shared similarity metric, so a chunk's position
    /// never depends on collection enumeration order. Ties are broken by
    /// `(collection_name, chunk_index)` ascending.
    pub async fn retrieve(
        &self,
        scope: &Scope,
        query: &str,
        top_n: usize,
    ) -> Result<RetrievalResult, RetrievalError> {
        let query_vector = with_retry(&RetryConfig::new(2), || self.embedder.embed_query(query))
            .await
            .into_result()?;

        match scope {
            Scope::Single(name) => {
                let hits = self.search_collection(name, &query_vector, top_n).await?;
                let chunks = ranked(hits);
                tracing::debug!(collection = %name, results = chunks.len(), "retrieval done");
                Ok(RetrievalResult {
                    query: query.to_string(),
                    chunks,
                    collections_searched: 1,
                })
            }
            Scope::All {
                user_id,
                collections,
            } => {
                if collections.is_empty() {
                    return Err(RetrievalError::EmptyScope {
                        user_id: user_id.clone(),
                    });
                }

                let searches = collections
                    .iter()
                    .map(|name| self.search_collection(name, &query_vector, top_n));
                let per_collection = futures::future::try_join_all(searches).await?;

                let mut merged: Vec<RetrievedChunk> =
                    per_collection.into_iter().flatten().collect();
                merged.sort_by(compare_chunks);
                merged.truncate(top_n);
                let chunks = rerank(merged);

                tracing::debug!(
                    user_id = %user_id,
                    collections = collections.len(),
                    results = chunks.len(),
                    "cross-collection retrieval done"
                );
                Ok(RetrievalResult {
                    query: query.to_string(),
                    chunks,
                    collections_searched: collections.len(),
                })
            }
        }
    }

    async fn search_collection(
        &self,
        name: &str,
        query_vector: &[f32],
        top_n: usize,
    ) -> Result<Vec<RetrievedChunk>, RetrievalError> {
        let hits = self
            .store
            .search(name, query_vector, top_n)
            .await
            .map_err(|e| match e {
                VectorStoreError::CollectionNotFound(name) => {
                    RetrievalError::CollectionNotFound(name)
                }
                other => RetrievalError::Store(other),
            })?;

        Ok(hits
            .into_iter()
            .map(|hit| RetrievedChunk {
                collection_name: name.to_string(),
                text: hit.text,
                filename: hit.filename,
                page: hit.page,
                chunk_index: hit.chunk_index,
                score: hit.score,
                rank: 0,
            })
            .collect())
    }
}

/// Descending score; ties by `(collection_name, chunk_index)` ascending so
/// merged output is deterministic.
fn compare_chunks(a: &RetrievedChunk, b: &RetrievedChunk) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.collection_name.cmp(&b.collection_name))
        .then_with(|| a.chunk_index.cmp(&b.chunk_index))
}

fn ranked(mut chunks: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
    chunks.sort_by(compare_chunks);
    rerank(chunks)
}

fn rerank(mut chunks: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.rank = (i + 1) as u32;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::models::Chunk;
    use crate::services::store::MemoryStore;
    use async_trait::async_trait;

    /// Maps a few known words onto fixed unit vectors so similarity is
    /// predictable in tests.
    struct VocabEmbedder;

    fn vector_for(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        if text.contains("budget") {
            vec![1.0, 0.0]
        } else if text.contains("schedule") {
            vec![0.0, 1.0]
        } else {
            vec![0.5, 0.5]
        }
    }

    #[async_trait]
    impl Embedder for VocabEmbedder {
        async fn embed_documents(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Ok(texts.iter().map(|t| vector_for(t)).collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            Ok(vector_for(text))
        }
    }

    fn chunk(index: u32, text: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            text: text.to_string(),
            filename: "doc.pdf".to_string(),
            page: 1,
            chunk_index: index,
            start_offset: 0,
            end_offset: 0,
            embedding,
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.create("user_a_doc_finance").await.unwrap();
        store
            .append(
                "user_a_doc_finance",
                vec![
                    chunk(0, "budget totals", vec![1.0, 0.0]),
                    chunk(1, "mixed notes", vec![0.6, 0.4]),
                ],
            )
            .await
            .unwrap();
        store.create("user_a_doc_planning").await.unwrap();
        store
            .append(
                "user_a_doc_planning",
                vec![
                    chunk(0, "budget draft", vec![0.9, 0.1]),
                    chunk(1, "meeting schedule", vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        store
    }

    fn all_scope(collections: Vec<&str>) -> Scope {
        Scope::All {
            user_id: "a".to_string(),
            collections: collections.into_iter().map(str::to_string).collect(),
        }
    }

    #[tokio::test]
    async fn test_single_collection_ranked() {
        let store = seeded_store().await;
        let retriever = Retriever::new(Arc::new(VocabEmbedder), store);

        let result = retriever
            .retrieve(
                &Scope::Single("user_a_doc_finance".to_string()),
                "budget",
                5,
            )
            .await
            .unwrap();

        assert_eq!(result.collections_searched, 1);
        assert_eq!(result.chunks.len(), 2);
        assert_eq!(result.chunks[0].text, "budget totals");
        assert_eq!(result.chunks[0].rank, 1);
        assert_eq!(result.chunks[1].rank, 2);
        assert!(result.chunks[0].score >= result.chunks[1].score);
    }

    #[tokio::test]
    async fn test_cross_collection_merge_independent_of_order() {
        let store = seeded_store().await;
        let retriever = Retriever::new(Arc::new(VocabEmbedder), store);

        let forward = retriever
            .retrieve(
                &all_scope(vec!["user_a_doc_finance", "user_a_doc_planning"]),
                "budget",
                3,
            )
            .await
            .unwrap();
        let reversed = retriever
            .retrieve(
                &all_scope(vec!["user_a_doc_planning", "user_a_doc_finance"]),
                "budget",
                3,
            )
            .await
            .unwrap();

        assert_eq!(forward.chunks.len(), 3);
        let forward_keys: Vec<_> = forward
            .chunks
            .iter()
            .map(|c| (c.collection_name.clone(), c.chunk_index, c.rank))
            .collect();
        let reversed_keys: Vec<_> = reversed
            .chunks
            .iter()
            .map(|c| (c.collection_name.clone(), c.chunk_index, c.rank))
            .collect();
        assert_eq!(forward_keys, reversed_keys);

        // Best match globally wins, regardless of source collection
        assert_eq!(forward.chunks[0].text, "budget totals");
        assert_eq!(forward.chunks[1].text, "budget draft");
        // Scores never increase down the list
        for pair in forward.chunks.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    async fn test_truncates_to_top_n() {
        let store = seeded_store().await;
        let retriever = Retriever::new(Arc::new(VocabEmbedder), store);

        let result = retriever
            .retrieve(
                &all_scope(vec!["user_a_doc_finance", "user_a_doc_planning"]),
                "budget",
                2,
            )
            .await
            .unwrap();
        assert_eq!(result.chunks.len(), 2);
        assert_eq!(result.chunks[1].rank, 2);
    }

    #[tokio::test]
    async fn test_empty_scope_is_an_error() {
        let store = Arc::new(MemoryStore::new());
        let retriever = Retriever::new(Arc::new(VocabEmbedder), store);

        let err = retriever
            .retrieve(&all_scope(vec![]), "budget", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::EmptyScope { .. }));
    }

    #[tokio::test]
    async fn test_zero_matches_is_valid_empty_result() {
        let store = Arc::new(MemoryStore::new());
        store.create("user_a_doc_empty").await.unwrap();
        let retriever = Retriever::new(Arc::new(VocabEmbedder), store);

        let result = retriever
            .retrieve(&all_scope(vec!["user_a_doc_empty"]), "budget", 5)
            .await
            .unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_missing_single_collection_not_found() {
        let store = Arc::new(MemoryStore::new());
        let retriever = Retriever::new(Arc::new(VocabEmbedder), store);

        let err = retriever
            .retrieve(
                &Scope::Single("user_a_doc_missing".to_string()),
                "budget",
                5,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RetrievalError::CollectionNotFound(_)));
    }

    #[tokio::test]
    async fn test_equal_scores_tie_break_deterministic() {
        let store = Arc::new(MemoryStore::new());
        for name in ["user_a_doc_one", "user_a_doc_two"] {
            store.create(name).await.unwrap();
            store
                .append(
                    name,
                    vec![
                        chunk(0, "identical", vec![1.0, 0.0]),
                        chunk(1, "identical", vec![1.0, 0.0]),
                    ],
                )
                .await
                .unwrap();
        }
        let retriever = Retriever::new(Arc::new(VocabEmbedder), store);

        let result = retriever
            .retrieve(
                &all_scope(vec!["user_a_doc_two", "user_a_doc_one"]),
                "budget",
                4,
            )
            .await
            .unwrap();

        let keys: Vec<_> = result
            .chunks
            .iter()
            .map(|c| (c.collection_name.as_str(), c.chunk_index))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("user_a_doc_one", 0),
                ("user_a_doc_one", 1),
                ("user_a_doc_two", 0),
                ("user_a_doc_two", 1),
            ]
        );
    }
}
