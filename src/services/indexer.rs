//! Document indexing: chunk, embed, and append into a user's collection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::access::{document_collection_name, safe_filename};
use crate::error::IndexError;
use crate::models::{Chunk, IndexReceipt, IndexingConfig};
use crate::services::chunker::TextChunker;
use crate::services::embedding::Embedder;
use crate::services::generation::ProviderChain;
use crate::services::store::CollectionStore;
use crate::utils::calculate_checksum;
use crate::utils::retry::{RetryConfig, with_retry};

const SUMMARY_SYSTEM: &str = "You are an expert document summarizer. Read the provided \
document text and write a concise, factual summary in one to three short paragraphs. \
Capture the main ideas and the document's purpose; do not copy large portions verbatim.";

pub struct ChunkIndexer {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn CollectionStore>,
    chunker: TextChunker,
    config: IndexingConfig,
    batch_size: usize,
    /// Serializes concurrent uploads targeting the same base collection so
    /// version allocation and appends never interleave.
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    summarizer: Option<Arc<ProviderChain>>,
}

impl ChunkIndexer {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn CollectionStore>,
        config: IndexingConfig,
        batch_size: usize,
        summarizer: Option<Arc<ProviderChain>>,
    ) -> Self {
        Self {
            embedder,
            store,
            chunker: TextChunker::new(&config),
            config,
            batch_size: batch_size.max(1),
            locks: Mutex::new(HashMap::new()),
            summarizer,
        }
    }

    /// Index an uploaded document into `user_{userId}_doc_{safeFilename}`.
    ///
    /// Re-uploading a filename never touches earlier uploads: when the base
    /// collection exists, the indexer allocates the first free
    /// `{base}_v{n}` slot (n starting at 2). Embeddings are computed and
    /// written batch by batch; a failing batch aborts the upload and leaves
    /// the collection holding a consistent prefix of the document.
    pub async fn index_document(
        &self,
        user_id: &str,
        filename: &str,
        full_text: &str,
    ) -> Result<IndexReceipt, IndexError> {
        if user_id.trim().is_empty() {
            return Err(IndexError::InvalidUser);
        }

        let chunks = self.chunker.chunk(full_text, filename);
        if chunks.is_empty() {
            return Err(IndexError::EmptyDocument);
        }
        let pages = TextChunker::page_count(full_text);

        let base = document_collection_name(user_id.trim(), &safe_filename(filename));
        let lock = self.lock_for(&base);
        let _guard = lock.lock().await;

        let collection_name = self.allocate_collection_name(&base).await?;
        tracing::info!(
            user_id,
            filename,
            collection = %collection_name,
            chunks = chunks.len(),
            pages,
            "indexing document"
        );

        self.store.create(&collection_name).await?;
        let chunk_count = self.embed_and_append(&collection_name, chunks).await?;

        let summary = self.summarize(full_text, filename).await;

        Ok(IndexReceipt {
            collection_name,
            chunk_count,
            pages,
            checksum: calculate_checksum(full_text),
            summary,
        })
    }

    fn lock_for(&self, base: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().expect("lock registry");
        locks
            .entry(base.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// First free name in `base`, `base_v2`, `base_v3`, … given the
    /// collections that currently exist under the base prefix.
    async fn allocate_collection_name(&self, base: &str) -> Result<String, IndexError> {
        let existing = self.store.list(base).await?;
        if !existing.iter().any(|name| name == base) {
            return Ok(base.to_string());
        }
        let mut version = 2u32;
        loop {
            let candidate = format!("{}_v{}", base, version);
            if !existing.iter().any(|name| name == &candidate) {
                return Ok(candidate);
            }
            version += 1;
        }
    }

    async fn embed_and_append(
        &self,
        collection_name: &str,
        chunks: Vec<Chunk>,
    ) -> Result<usize, IndexError> {
        let mut written = 0usize;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();

            let embeddings = with_retry(&RetryConfig::new(2), || {
                self.embedder.embed_documents(&texts)
            })
            .await
            .into_result()?;

            let mut embedded: Vec<Chunk> = batch.to_vec();
            for (chunk, embedding) in embedded.iter_mut().zip(embeddings.into_iter()) {
                chunk.embedding = embedding;
            }

            self.store.append(collection_name, embedded).await?;
            written += batch.len();
        }

        Ok(written)
    }

    /// Best-effort document summary; never fails the upload.
    async fn summarize(&self, full_text: &str, filename: &str) -> Option<String> {
        if !self.config.summarize {
            return None;
        }
        let chain = self.summarizer.as_ref()?;
        if chain.is_empty() {
            return None;
        }

        let head: String = self
            .chunker
            .chunk(full_text, filename)
            .into_iter()
            .take(self.config.summary_chunks as usize)
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join(" ");

        let prompt = format!("Text to summarize:\n\"\"\"{}\"\"\"\n\nSummary:", head);
        match chain.generate(SUMMARY_SYSTEM, &prompt).await {
            Ok(generated) => Some(generated.text),
            Err(e) => {
                tracing::warn!(filename, error = %e, "document summary skipped");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::services::embedding::Embedder;
    use crate::services::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Embeds every text as a unit vector derived from its length.
    struct StubEmbedder {
        fail: bool,
        calls: AtomicU32,
    }

    impl StubEmbedder {
        fn working() -> Self {
            Self {
                fail: false,
                calls: AtomicU32::new(0),
            }
        }

        fn broken() -> Self {
            Self {
                fail: true,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Embedder for StubEmbedder {
        async fn embed_documents(
            &self,
            texts: &[String],
        ) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EmbeddingError::ConnectionError("down".to_string()));
            }
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }

        async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            if self.fail {
                return Err(EmbeddingError::ConnectionError("down".to_string()));
            }
            Ok(vec![text.len() as f32, 1.0])
        }
    }

    fn indexer_with(
        embedder: StubEmbedder,
        store: Arc<MemoryStore>,
    ) -> ChunkIndexer {
        ChunkIndexer::new(
            Arc::new(embedder),
            store,
            IndexingConfig {
                chunk_size: 50,
                chunk_overlap: 10,
                summarize: false,
                ..Default::default()
            },
            8,
            None,
        )
    }

    #[tokio::test]
    async fn test_index_creates_collection_with_chunks() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer_with(StubEmbedder::working(), store.clone());

        let text = "budget numbers for the third quarter. ".repeat(10);
        let receipt = indexer
            .index_document("userA", "report.pdf", &text)
            .await
            .unwrap();

        assert_eq!(receipt.collection_name, "user_userA_doc_report");
        assert!(receipt.chunk_count > 1);
        assert_eq!(receipt.pages, 1);
        assert_eq!(
            store.count("user_userA_doc_report").await.unwrap(),
            receipt.chunk_count as u64
        );
    }

    #[tokio::test]
    async fn test_reupload_allocates_version_suffix() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer_with(StubEmbedder::working(), store.clone());

        let text = "the same report text, uploaded twice. ".repeat(5);
        let first = indexer
            .index_document("userA", "report.pdf", &text)
            .await
            .unwrap();
        let second = indexer
            .index_document("userA", "report.pdf", &text)
            .await
            .unwrap();
        let third = indexer
            .index_document("userA", "report.pdf", &text)
            .await
            .unwrap();

        assert_eq!(first.collection_name, "user_userA_doc_report");
        assert_eq!(second.collection_name, "user_userA_doc_report_v2");
        assert_eq!(third.collection_name, "user_userA_doc_report_v3");
        // Earlier uploads are untouched
        assert_eq!(
            store.count("user_userA_doc_report").await.unwrap(),
            first.chunk_count as u64
        );
    }

    #[tokio::test]
    async fn test_empty_document_rejected() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer_with(StubEmbedder::working(), store);

        let err = indexer
            .index_document("userA", "empty.pdf", "   \n ")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::EmptyDocument));
    }

    #[tokio::test]
    async fn test_empty_user_rejected() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer_with(StubEmbedder::working(), store);

        let err = indexer
            .index_document("", "doc.pdf", "some text")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidUser));
    }

    #[tokio::test]
    async fn test_embedding_failure_aborts_upload() {
        let store = Arc::new(MemoryStore::new());
        let indexer = indexer_with(StubEmbedder::broken(), store.clone());

        let err = indexer
            .index_document("userA", "report.pdf", "short text")
            .await
            .unwrap_err();
        assert!(matches!(err, IndexError::Embedding(_)));
        // The created collection holds no partial batch
        assert_eq!(store.count("user_userA_doc_report").await.unwrap(), 0);
    }
}
