//! Chat records and feedback state.

use serde::{Deserialize, Serialize};

use super::retrieval::SourceRef;

/// Feedback lifecycle of a chat record: `Pending` until the user submits
/// feedback, then `Submitted` exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum FeedbackState {
    Pending,
    Submitted {
        positive: Option<bool>,
        comments: Option<String>,
    },
}

impl FeedbackState {
    pub fn is_submitted(&self) -> bool {
        matches!(self, FeedbackState::Submitted { .. })
    }
}

/// One answered question. Written after every successful answer; mutated
/// only by the feedback transition; never deleted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRecord {
    pub id: String,
    pub user_id: String,
    pub query: String,
    pub answer: String,
    /// `None` means the question was answered across all of the user's
    /// collections.
    pub collection_name: Option<String>,
    pub sources: Vec<SourceRef>,
    pub feedback: FeedbackState,
    pub created_at: String,
}

impl ChatRecord {
    pub fn new(
        user_id: impl Into<String>,
        query: impl Into<String>,
        answer: impl Into<String>,
        collection_name: Option<String>,
        sources: Vec<SourceRef>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            query: query.into(),
            answer: answer.into(),
            collection_name,
            sources,
            feedback: FeedbackState::Pending,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
