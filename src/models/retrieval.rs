//! Retrieval results and the ask/search response envelope.

use serde::{Deserialize, Serialize};

/// Output format for CLI results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// One retrieved chunk with its provenance and rank.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedChunk {
    pub collection_name: String,
    pub text: String,
    pub filename: String,
    pub page: u32,
    pub chunk_index: u32,
    /// Similarity score; higher is closer.
    pub score: f32,
    /// 1-based, ascending by distance.
    pub rank: u32,
}

/// Ordered retrieval output, produced fresh per query and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query: String,
    pub chunks: Vec<RetrievedChunk>,
    /// How many collections were searched to produce the result.
    pub collections_searched: usize,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }
}

/// Compact provenance reference kept in chat records and answers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    pub collection_name: String,
    pub filename: String,
    pub page: u32,
    pub chunk_index: u32,
    pub score: f32,
}

impl From<&RetrievedChunk> for SourceRef {
    fn from(chunk: &RetrievedChunk) -> Self {
        Self {
            collection_name: chunk.collection_name.clone(),
            filename: chunk.filename.clone(),
            page: chunk.page,
            chunk_index: chunk.chunk_index,
            score: chunk.score,
        }
    }
}

/// Response envelope for ask requests. Provider and retrieval failures land
/// in `error` with a user-safe message; they are not transport failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AskResponse {
    pub query: String,
    pub answer: Option<String>,
    pub error: Option<String>,
    pub sources: Vec<SourceRef>,
    /// The single collection that was searched, if the question was scoped.
    pub collection_name: Option<String>,
    /// Identifier of the recorded chat, for later feedback.
    pub chat_id: Option<String>,
}

impl AskResponse {
    pub fn failed(query: &str, collection_name: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            query: query.to_string(),
            answer: None,
            error: Some(message.into()),
            sources: Vec::new(),
            collection_name: collection_name.map(str::to_string),
            chat_id: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
