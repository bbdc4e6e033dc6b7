use serde::{Deserialize, Serialize};

/// A bounded slice of document text plus positional metadata and, once
/// computed, its embedding vector. Immutable after it is written to a
/// collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub filename: String,
    /// 1-based page number in the source document.
    pub page: u32,
    /// 0-based position within the document, assigned across all pages.
    pub chunk_index: u32,
    /// Character offsets within the page, so coverage is checkable.
    pub start_offset: u64,
    pub end_offset: u64,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub embedding: Vec<f32>,
}

impl Chunk {
    /// Deterministic point id for a chunk within its collection.
    pub fn point_id(collection: &str, chunk_index: u32) -> String {
        use uuid::Uuid;
        let name = format!("{}:{}", collection, chunk_index);
        Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
    }
}

/// Result of a successful document upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexReceipt {
    pub collection_name: String,
    pub chunk_count: usize,
    pub pages: usize,
    /// SHA-256 of the uploaded text.
    pub checksum: String,
    /// LLM-written summary; absent when no provider was available.
    pub summary: Option<String>,
}

/// Listing entry for one of a user's collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub name: String,
    /// Collection name with the `user_{id}_doc_` prefix stripped.
    pub document_name: String,
    pub chunk_count: u64,
}
