//! The retrieval-and-answer orchestrator.
//!
//! One orchestration run per question, driven as a bounded state machine:
//! `Start → ScopeResolved → Retrieving → Retrieved → Generating →
//! Done | Failed`. Tool selection is a fixed enumeration, retrieval runs at
//! most once per question, and provider failures degrade to a user-safe
//! envelope error rather than a transport failure.

use std::sync::Arc;

use crate::access::{AccessGuard, Scope};
use crate::error::{AccessError, NO_PROVIDER_MESSAGE, RetrievalError};
use crate::models::{AskResponse, ChatRecord, RetrievalConfig, RetrievedChunk, SourceRef};
use crate::services::generation::ProviderChain;
use crate::services::history::{ChatStore, FeedbackIndex};
use crate::services::retriever::Retriever;

/// Envelope message when the embedding provider stays down after a retry.
pub const EMBEDDING_UNAVAILABLE_MESSAGE: &str =
    "the embedding service is unavailable; please try again later";

/// Envelope message for vector store trouble during a question.
pub const SEARCH_UNAVAILABLE_MESSAGE: &str =
    "document search is temporarily unavailable; please try again later";

/// Envelope message when a scoped collection does not exist. Distinct from
/// the access-denied rejection.
pub const COLLECTION_NOT_FOUND_MESSAGE: &str = "collection not found";

/// Envelope message for a malformed or failed generation that is not a
/// provider-availability problem.
pub const GENERATION_FAILED_MESSAGE: &str =
    "answer generation failed; please try again later";

/// Phases of one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentPhase {
    Start,
    ScopeResolved,
    Retrieving,
    Retrieved,
    Generating,
    Done,
    Failed,
}

/// The fixed set of tools the agent may invoke.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ToolCall {
    SearchCollection(String),
    SearchAllCollections,
    AnswerDirectly,
}

/// Ephemeral per-question state; created at request start, discarded at
/// request end.
struct AgentSession {
    phase: AgentPhase,
    tool_calls: Vec<ToolCall>,
}

impl AgentSession {
    fn new() -> Self {
        Self {
            phase: AgentPhase::Start,
            tool_calls: Vec::new(),
        }
    }

    fn advance(&mut self, phase: AgentPhase) {
        tracing::debug!(from = ?self.phase, to = ?phase, "agent transition");
        self.phase = phase;
    }
}

pub struct Orchestrator {
    guard: AccessGuard,
    retriever: Arc<Retriever>,
    chain: Arc<ProviderChain>,
    chats: Arc<dyn ChatStore>,
    feedback: Arc<FeedbackIndex>,
    config: RetrievalConfig,
}

impl Orchestrator {
    pub fn new(
        guard: AccessGuard,
        retriever: Arc<Retriever>,
        chain: Arc<ProviderChain>,
        chats: Arc<dyn ChatStore>,
        feedback: Arc<FeedbackIndex>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            guard,
            retriever,
            chain,
            chats,
            feedback,
            config,
        }
    }

    /// Answer a question against the user's documents.
    ///
    /// Returns `Err` only for rejections (`AccessDenied`, missing user id);
    /// every other failure lands in the response envelope's `error` field
    /// with a user-safe message.
    pub async fn ask(
        &self,
        user_id: &str,
        query: &str,
        collection_name: Option<&str>,
    ) -> Result<AskResponse, AccessError> {
        let mut session = AgentSession::new();

        let scope = match self.guard.authorize(user_id, collection_name).await {
            Ok(scope) => scope,
            Err(AccessError::Store(e)) => {
                tracing::warn!(user_id, error = %e, "scope resolution failed");
                return Ok(AskResponse::failed(
                    query,
                    collection_name,
                    SEARCH_UNAVAILABLE_MESSAGE,
                ));
            }
            Err(rejection) => return Err(rejection),
        };
        session.advance(AgentPhase::ScopeResolved);

        let tool = plan_tool(&scope);
        session.tool_calls.push(tool.clone());
        tracing::info!(user_id, ?tool, "agent plan");

        let retrieved = match &tool {
            ToolCall::AnswerDirectly => Vec::new(),
            ToolCall::SearchCollection(_) | ToolCall::SearchAllCollections => {
                session.advance(AgentPhase::Retrieving);
                match self
                    .retriever
                    .retrieve(&scope, query, self.config.top_n as usize)
                    .await
                {
                    Ok(result) => {
                        session.advance(AgentPhase::Retrieved);
                        self.enforce_scope(&scope, result.chunks)
                    }
                    Err(e) => {
                        session.advance(AgentPhase::Failed);
                        return Ok(AskResponse::failed(
                            query,
                            collection_name,
                            retrieval_failure_message(&e),
                        ));
                    }
                }
            }
        };

        let feedback_notes = self
            .feedback
            .similar(query, self.config.feedback_results as usize)
            .await;

        let system = build_system_context(user_id, &scope, &feedback_notes);
        let prompt = build_user_prompt(query, &retrieved);

        session.advance(AgentPhase::Generating);
        match self.chain.generate(&system, &prompt).await {
            Ok(generated) => {
                session.advance(AgentPhase::Done);
                tracing::debug!(
                    provider = %generated.provider,
                    tool_calls = session.tool_calls.len(),
                    "question answered"
                );
                let sources: Vec<SourceRef> = retrieved.iter().map(SourceRef::from).collect();
                let chat_id = self
                    .record_chat(user_id, query, &generated.text, &scope, &sources)
                    .await;

                Ok(AskResponse {
                    query: query.to_string(),
                    answer: Some(generated.text),
                    error: None,
                    sources,
                    collection_name: scope.single().map(str::to_string),
                    chat_id,
                })
            }
            Err(e) => {
                session.advance(AgentPhase::Failed);
                let message = match e {
                    crate::error::GenerationError::NoProviderAvailable => NO_PROVIDER_MESSAGE,
                    _ => GENERATION_FAILED_MESSAGE,
                };
                Ok(AskResponse::failed(query, collection_name, message))
            }
        }
    }

    /// Drop any chunk whose collection is outside the validated scope.
    /// Nothing smuggled past the access guard reaches the prompt.
    fn enforce_scope(&self, scope: &Scope, chunks: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
        chunks
            .into_iter()
            .filter(|chunk| {
                let inside = scope.contains(&chunk.collection_name);
                if !inside {
                    tracing::warn!(
                        collection = %chunk.collection_name,
                        "discarding out-of-scope chunk"
                    );
                }
                inside
            })
            .collect()
    }

    /// One chat record per completed answer; storage trouble is logged, not
    /// surfaced.
    async fn record_chat(
        &self,
        user_id: &str,
        query: &str,
        answer: &str,
        scope: &Scope,
        sources: &[SourceRef],
    ) -> Option<String> {
        let record = ChatRecord::new(
            user_id,
            query,
            answer,
            scope.single().map(str::to_string),
            sources.to_vec(),
        );
        match self.chats.record(record).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(user_id, error = %e, "failed to persist chat record");
                None
            }
        }
    }
}

fn plan_tool(scope: &Scope) -> ToolCall {
    match scope {
        Scope::Single(name) => ToolCall::SearchCollection(name.clone()),
        Scope::All { collections, .. } if collections.is_empty() => ToolCall::AnswerDirectly,
        Scope::All { .. } => ToolCall::SearchAllCollections,
    }
}

fn retrieval_failure_message(error: &RetrievalError) -> &'static str {
    match error {
        RetrievalError::CollectionNotFound(_) => COLLECTION_NOT_FOUND_MESSAGE,
        RetrievalError::Embedding(_) => EMBEDDING_UNAVAILABLE_MESSAGE,
        RetrievalError::EmptyScope { .. } | RetrievalError::Store(_) => SEARCH_UNAVAILABLE_MESSAGE,
    }
}

fn build_system_context(user_id: &str, scope: &Scope, feedback_notes: &[String]) -> String {
    let scope_instruction = match scope {
        Scope::Single(name) => format!(
            "- Answer ONLY from the document collection named `{}`.\n\
             - Do not reference or speculate about the user's other documents.\n\
             - If the question concerns a different document, explain that this \
             conversation is restricted to `{}`.",
            name, name
        ),
        Scope::All { collections, .. } if collections.is_empty() => {
            "- The user has not uploaded any documents yet. Say so, answer only \
             from general knowledge when appropriate, and suggest uploading \
             relevant material."
                .to_string()
        }
        Scope::All { .. } => "- Use the retrieved passages from across the user's document \
             collections and cite each source clearly."
            .to_string(),
    };

    let mut context = format!(
        "You are a document assistant answering questions for user `{}` from \
         their personal document collections.\n\n\
         Search scope rules:\n{}\n\n\
         Guidelines:\n\
         - Cite the source document (and page when available) for every claim.\n\
         - Quote or summarize the most relevant passages; do not reproduce large blocks.\n\
         - If the retrieved passages cannot answer the question, say so transparently.\n\
         - Do not speculate beyond the provided material.",
        user_id, scope_instruction
    );

    if !feedback_notes.is_empty() {
        context.push_str(
            "\n\nConsider this past user feedback and improve the response accordingly:\n",
        );
        for note in feedback_notes {
            context.push_str("Feedback: ");
            context.push_str(note);
            context.push('\n');
        }
    }

    context
}

fn build_user_prompt(query: &str, retrieved: &[RetrievedChunk]) -> String {
    if retrieved.is_empty() {
        return format!(
            "Question: {}\n\nNo document passages were retrieved for this question.",
            query
        );
    }

    let mut prompt = format!("Question: {}\n\nRetrieved passages:\n", query);
    for chunk in retrieved {
        prompt.push_str(&format!(
            "\n[{} p.{} | {}]\n{}\n",
            chunk.filename, chunk.page, chunk.collection_name, chunk.text
        ));
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::models::{Chunk, FeedbackState, IndexingConfig};
    use crate::services::embedding::Embedder;
    use crate::services::generation::testing::ScriptedProvider;
    use crate::services::history::MemoryChatStore;
    use crate::services::indexer::ChunkIndexer;
    use crate::services::store::{CollectionStore, MemoryStore};
    use crate::utils::retry::RetryConfig;
    use async_trait::async_trait;
    use std::time::Duration;

    struct KeywordEmbedder;

    fn vector_for(text: &str) -> Vec<f32> {
        let text = text.to_lowercase();
        if text.contains("budget") {
            vec![1.0, 0.0]
        } else {
            vec![0.0, 1.0]
        }
    }

    #[async_trait]
    impl Embedder for KeywordEmbedder {
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

    struct Harness {
        store: Arc<MemoryStore>,
        chats: Arc<MemoryChatStore>,
        orchestrator: Orchestrator,
    }

    fn harness(providers: Vec<Arc<ScriptedProvider>>) -> Harness {
        let store = Arc::new(MemoryStore::new());
        let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);
        let chats = Arc::new(MemoryChatStore::new());
        let chain = Arc::new(
            ProviderChain::new(
                providers
                    .into_iter()
                    .map(|p| p as Arc<dyn crate::services::generation::GenerationProvider>)
                    .collect(),
            )
            .with_retry_config(RetryConfig::new(2).with_initial_delay(Duration::from_millis(1))),
        );
        let feedback = Arc::new(FeedbackIndex::new(
            embedder.clone(),
            store.clone(),
            chats.clone(),
        ));
        let orchestrator = Orchestrator::new(
            AccessGuard::new(store.clone()),
            Arc::new(Retriever::new(embedder, store.clone())),
            chain,
            chats.clone(),
            feedback,
            RetrievalConfig::default(),
        );
        Harness {
            store,
            chats,
            orchestrator,
        }
    }

    async fn seed_collection(store: &MemoryStore, name: &str, texts: &[&str]) {
        store.create(name).await.unwrap();
        let chunks: Vec<Chunk> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Chunk {
                text: text.to_string(),
                filename: "report.pdf".to_string(),
                page: 1,
                chunk_index: i as u32,
                start_offset: 0,
                end_offset: 0,
                embedding: vector_for(text),
            })
            .collect();
        store.append(name, chunks).await.unwrap();
    }

    #[tokio::test]
    async fn test_no_provider_is_deterministic() {
        let h = harness(vec![]);
        let first = h.orchestrator.ask("userA", "budget?", None).await.unwrap();
        let second = h.orchestrator.ask("userA", "budget?", None).await.unwrap();

        assert_eq!(first.error.as_deref(), Some(NO_PROVIDER_MESSAGE));
        assert_eq!(first.error, second.error);
        assert!(first.answer.is_none());
    }

    #[tokio::test]
    async fn test_fallback_answer_comes_from_secondary() {
        let primary = Arc::new(ScriptedProvider::failing("primary"));
        let secondary = Arc::new(ScriptedProvider::answering("secondary", "secondary answer"));
        let h = harness(vec![primary.clone(), secondary]);

        let response = h.orchestrator.ask("userA", "budget?", None).await.unwrap();
        assert_eq!(response.answer.as_deref(), Some("secondary answer"));
        assert!(response.error.is_none());
        assert!(primary.calls() >= 2);
    }

    #[tokio::test]
    async fn test_denied_collection_is_a_rejection_not_an_envelope() {
        let h = harness(vec![Arc::new(ScriptedProvider::answering("p", "a"))]);
        let err = h
            .orchestrator
            .ask("userA", "q", Some("user_userB_doc_secret"))
            .await
            .unwrap_err();
        assert!(matches!(err, AccessError::Denied { .. }));
    }

    #[tokio::test]
    async fn test_missing_own_collection_is_not_found_envelope() {
        let h = harness(vec![Arc::new(ScriptedProvider::answering("p", "a"))]);
        let response = h
            .orchestrator
            .ask("userA", "q", Some("user_userA_doc_missing"))
            .await
            .unwrap();
        assert_eq!(response.error.as_deref(), Some(COLLECTION_NOT_FOUND_MESSAGE));
    }

    #[tokio::test]
    async fn test_answer_uses_retrieved_context_and_records_chat() {
        let provider = Arc::new(ScriptedProvider::answering("p", "grounded answer"));
        let h = harness(vec![provider.clone()]);
        seed_collection(
            &h.store,
            "user_userA_doc_report",
            &["the budget is 42", "unrelated section"],
        )
        .await;

        let response = h.orchestrator.ask("userA", "budget?", None).await.unwrap();

        assert_eq!(response.answer.as_deref(), Some("grounded answer"));
        assert!(!response.sources.is_empty());
        assert_eq!(response.sources[0].collection_name, "user_userA_doc_report");
        assert!(response.collection_name.is_none());

        // Prompt carried the retrieved text with attribution
        let (_system, prompt) = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("the budget is 42"));
        assert!(prompt.contains("[report.pdf p.1 | user_userA_doc_report]"));

        // One chat record, pending feedback
        let chat_id = response.chat_id.unwrap();
        let record = h.chats.get(&chat_id).await.unwrap();
        assert_eq!(record.feedback, FeedbackState::Pending);
        assert_eq!(record.answer, "grounded answer");
        assert!(record.collection_name.is_none());
    }

    #[tokio::test]
    async fn test_user_without_documents_answers_directly() {
        let provider = Arc::new(ScriptedProvider::answering("p", "no docs answer"));
        let h = harness(vec![provider.clone()]);
        // Another user's documents exist but are out of scope
        seed_collection(&h.store, "user_userA_doc_report", &["the budget is 42"]).await;

        let response = h.orchestrator.ask("userB", "budget?", None).await.unwrap();

        assert_eq!(response.answer.as_deref(), Some("no docs answer"));
        assert!(response.sources.is_empty());
        let (system, prompt) = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(system.contains("has not uploaded any documents"));
        assert!(prompt.contains("No document passages were retrieved"));
        // Nothing from userA leaked into userB's prompt
        assert!(!prompt.contains("the budget is 42"));
    }

    #[tokio::test]
    async fn test_scoped_ask_reports_collection_name() {
        let provider = Arc::new(ScriptedProvider::answering("p", "scoped answer"));
        let h = harness(vec![provider]);
        seed_collection(&h.store, "user_userA_doc_report", &["the budget is 42"]).await;

        let response = h
            .orchestrator
            .ask("userA", "budget?", Some("user_userA_doc_report"))
            .await
            .unwrap();

        assert_eq!(
            response.collection_name.as_deref(),
            Some("user_userA_doc_report")
        );
        let record = h.chats.latest("userA", None).await.unwrap().unwrap();
        assert_eq!(
            record.collection_name.as_deref(),
            Some("user_userA_doc_report")
        );
    }

    #[tokio::test]
    async fn test_feedback_enriches_later_prompts() {
        let provider = Arc::new(ScriptedProvider::answering("p", "answer"));
        let h = harness(vec![provider.clone()]);
        seed_collection(&h.store, "user_userA_doc_report", &["the budget is 42"]).await;

        h.orchestrator.ask("userA", "budget?", None).await.unwrap();
        let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);
        let feedback = FeedbackIndex::new(embedder, h.store.clone(), h.chats.clone());
        feedback
            .submit("userA", None, Some(false), Some("cite pages".to_string()))
            .await
            .unwrap();

        h.orchestrator.ask("userA", "budget?", None).await.unwrap();
        let (system, _prompt) = provider.last_prompt.lock().unwrap().clone().unwrap();
        assert!(system.contains("past user feedback"));
        assert!(system.contains("cite pages"));
    }

    #[tokio::test]
    async fn test_out_of_scope_chunks_are_discarded() {
        let h = harness(vec![]);
        let scope = Scope::All {
            user_id: "userA".to_string(),
            collections: vec!["user_userA_doc_report".to_string()],
        };

        let make = |collection: &str| RetrievedChunk {
            collection_name: collection.to_string(),
            text: "text".to_string(),
            filename: "report.pdf".to_string(),
            page: 1,
            chunk_index: 0,
            score: 1.0,
            rank: 1,
        };
        let kept = h.orchestrator.enforce_scope(
            &scope,
            vec![
                make("user_userA_doc_report"),
                make("user_userB_doc_secret"),
                make("feedback"),
            ],
        );

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].collection_name, "user_userA_doc_report");
    }

    #[tokio::test]
    async fn test_end_to_end_upload_then_ask_isolates_users() {
        let provider = Arc::new(ScriptedProvider::answering("p", "answer"));
        let h = harness(vec![provider.clone()]);

        let indexer = ChunkIndexer::new(
            Arc::new(KeywordEmbedder),
            h.store.clone(),
            IndexingConfig {
                chunk_size: 40,
                chunk_overlap: 10,
                summarize: false,
                ..Default::default()
            },
            8,
            None,
        );
        indexer
            .index_document(
                "userA",
                "report.pdf",
                "budget one. budget two. budget three. budget four. budget five.",
            )
            .await
            .unwrap();

        let response = h.orchestrator.ask("userA", "budget?", None).await.unwrap();
        assert!(
            response
                .sources
                .iter()
                .all(|s| s.collection_name.starts_with("user_userA_"))
        );
        assert!(!response.sources.is_empty());

        let other = h.orchestrator.ask("userB", "budget?", None).await.unwrap();
        assert!(other.sources.is_empty());
    }
}
