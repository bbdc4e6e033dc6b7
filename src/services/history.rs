//! Chat history and feedback.
//!
//! The production chat database is an external collaborator; the core only
//! needs the narrow [`ChatStore`] surface below — write one record per
//! answered question, find the feedback target, flip its feedback state.
//! Submitted feedback is additionally embedded into an internal `feedback`
//! collection so later prompts can retrieve similar feedback.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::HistoryError;
use crate::models::{ChatRecord, Chunk, FeedbackState};
use crate::services::embedding::Embedder;
use crate::services::store::CollectionStore;

/// Internal collection holding embedded feedback entries. Not part of any
/// user namespace; reachable only through the feedback APIs.
pub const FEEDBACK_COLLECTION: &str = "feedback";

/// Persistence surface for chat records.
#[async_trait]
pub trait ChatStore: Send + Sync {
    /// Persist a record, returning its id.
    async fn record(&self, record: ChatRecord) -> Result<String, HistoryError>;

    /// Latest chat for a user; when `query` is given, the latest chat with
    /// that exact query.
    async fn latest(
        &self,
        user_id: &str,
        query: Option<&str>,
    ) -> Result<Option<ChatRecord>, HistoryError>;

    /// Transition a record's feedback from `Pending` to `Submitted`.
    async fn set_feedback(
        &self,
        chat_id: &str,
        positive: Option<bool>,
        comments: Option<String>,
    ) -> Result<(), HistoryError>;
}

/// In-memory chat store for tests and local development.
#[derive(Default)]
pub struct MemoryChatStore {
    records: RwLock<Vec<ChatRecord>>,
}

impl MemoryChatStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, chat_id: &str) -> Option<ChatRecord> {
        self.records
            .read()
            .await
            .iter()
            .find(|r| r.id == chat_id)
            .cloned()
    }
}

#[async_trait]
impl ChatStore for MemoryChatStore {
    async fn record(&self, record: ChatRecord) -> Result<String, HistoryError> {
        let id = record.id.clone();
        self.records.write().await.push(record);
        Ok(id)
    }

    async fn latest(
        &self,
        user_id: &str,
        query: Option<&str>,
    ) -> Result<Option<ChatRecord>, HistoryError> {
        let records = self.records.read().await;
        Ok(records
            .iter()
            .rev()
            .find(|r| r.user_id == user_id && query.is_none_or(|q| r.query == q))
            .cloned())
    }

    async fn set_feedback(
        &self,
        chat_id: &str,
        positive: Option<bool>,
        comments: Option<String>,
    ) -> Result<(), HistoryError> {
        let mut records = self.records.write().await;
        let record = records
            .iter_mut()
            .find(|r| r.id == chat_id)
            .ok_or(HistoryError::ChatNotFound)?;

        if record.feedback.is_submitted() {
            return Err(HistoryError::FeedbackAlreadySubmitted);
        }
        record.feedback = FeedbackState::Submitted { positive, comments };
        Ok(())
    }
}

/// Append-only JSONL chat store, one record per line. Backs the CLI so
/// feedback can target answers from earlier invocations; a server
/// deployment plugs its own database behind [`ChatStore`] instead.
pub struct JsonlChatStore {
    path: std::path::PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl JsonlChatStore {
    pub fn new(path: std::path::PathBuf) -> Self {
        Self {
            path,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn default_path() -> Option<std::path::PathBuf> {
        dirs::data_dir().map(|p| p.join("docqa").join("chats.jsonl"))
    }

    async fn read_all(&self) -> Result<Vec<ChatRecord>, HistoryError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(|line| {
                    serde_json::from_str(line).map_err(|e| HistoryError::Storage(e.to_string()))
                })
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(HistoryError::Storage(e.to_string())),
        }
    }

    async fn write_all(&self, records: &[ChatRecord]) -> Result<(), HistoryError> {
        let mut content = String::new();
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| HistoryError::Storage(e.to_string()))?;
            content.push_str(&line);
            content.push('\n');
        }
        tokio::fs::write(&self.path, content)
            .await
            .map_err(|e| HistoryError::Storage(e.to_string()))
    }
}

#[async_trait]
impl ChatStore for JsonlChatStore {
    async fn record(&self, record: ChatRecord) -> Result<String, HistoryError> {
        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| HistoryError::Storage(e.to_string()))?;
        }

        let id = record.id.clone();
        let mut line =
            serde_json::to_string(&record).map_err(|e| HistoryError::Storage(e.to_string()))?;
        line.push('\n');

        use tokio::io::AsyncWriteExt;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| HistoryError::Storage(e.to_string()))?;
        Ok(id)
    }

    async fn latest(
        &self,
        user_id: &str,
        query: Option<&str>,
    ) -> Result<Option<ChatRecord>, HistoryError> {
        let _guard = self.lock.lock().await;
        let records = self.read_all().await?;
        Ok(records
            .into_iter()
            .rev()
            .find(|r| r.user_id == user_id && query.is_none_or(|q| r.query == q)))
    }

    async fn set_feedback(
        &self,
        chat_id: &str,
        positive: Option<bool>,
        comments: Option<String>,
    ) -> Result<(), HistoryError> {
        let _guard = self.lock.lock().await;
        let mut records = self.read_all().await?;
        let record = records
            .iter_mut()
            .find(|r| r.id == chat_id)
            .ok_or(HistoryError::ChatNotFound)?;

        if record.feedback.is_submitted() {
            return Err(HistoryError::FeedbackAlreadySubmitted);
        }
        record.feedback = FeedbackState::Submitted { positive, comments };
        self.write_all(&records).await
    }
}

/// Feedback intake: marks the chat record and indexes the feedback text for
/// similarity lookup on later questions.
pub struct FeedbackIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn CollectionStore>,
    chats: Arc<dyn ChatStore>,
}

impl FeedbackIndex {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn CollectionStore>,
        chats: Arc<dyn ChatStore>,
    ) -> Self {
        Self {
            embedder,
            store,
            chats,
        }
    }

    /// Attach feedback to the user's latest chat (or latest chat matching
    /// `query`). Returns the id of the chat the feedback landed on.
    pub async fn submit(
        &self,
        user_id: &str,
        query: Option<&str>,
        positive: Option<bool>,
        comments: Option<String>,
    ) -> Result<String, HistoryError> {
        let record = self
            .chats
            .latest(user_id, query)
            .await?
            .ok_or(HistoryError::ChatNotFound)?;

        self.chats
            .set_feedback(&record.id, positive, comments.clone())
            .await?;

        let document = render_feedback(&record, positive, comments.as_deref());
        self.index_feedback_text(&document).await?;

        tracing::info!(user_id, chat_id = %record.id, "feedback recorded");
        Ok(record.id)
    }

    /// Nearest feedback entries for a query; degrades to empty on any
    /// provider or store failure so asks never fail on feedback lookup.
    pub async fn similar(&self, query: &str, n: usize) -> Vec<String> {
        let vector = match self.embedder.embed_query(query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "feedback lookup skipped: embedding failed");
                return Vec::new();
            }
        };

        match self.store.search(FEEDBACK_COLLECTION, &vector, n).await {
            Ok(hits) => hits.into_iter().map(|h| h.text).collect(),
            Err(e) => {
                tracing::debug!(error = %e, "no feedback context available");
                Vec::new()
            }
        }
    }

    async fn index_feedback_text(&self, document: &str) -> Result<(), HistoryError> {
        let embedding = self
            .embedder
            .embed_documents(&[document.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        self.store.create(FEEDBACK_COLLECTION).await?;
        let next_index = self.store.count(FEEDBACK_COLLECTION).await? as u32;

        self.store
            .append(
                FEEDBACK_COLLECTION,
                vec![Chunk {
                    text: document.to_string(),
                    filename: String::new(),
                    page: 0,
                    chunk_index: next_index,
                    start_offset: 0,
                    end_offset: document.chars().count() as u64,
                    embedding,
                }],
            )
            .await?;
        Ok(())
    }
}

fn render_feedback(record: &ChatRecord, positive: Option<bool>, comments: Option<&str>) -> String {
    format!(
        "User ID: {}\nInput: {}\nOutput: {}\nIs Feedback Positive: {}\nComments: {}",
        record.user_id,
        record.query,
        record.answer,
        positive.map_or("unknown".to_string(), |p| p.to_string()),
        comments.unwrap_or("")
    )
}
