mod ask;
mod collections;
mod config;
mod feedback;
mod search;
mod status;
mod upload;

pub use ask::{AskArgs, handle_ask};
pub use collections::{CollectionsCommand, handle_collections};
pub use config::{ConfigCommand, handle_config};
pub use feedback::{FeedbackArgs, handle_feedback};
pub use search::{SearchArgs, handle_search};
pub use status::handle_status;
pub use upload::{UploadArgs, handle_upload};

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::models::Config;
use crate::services::store::{CollectionStore, create_store};
use crate::services::{
    ChatStore, Embedder, EmbeddingClient, JsonlChatStore, ProviderChain,
};

/// Wire up the shared service clients from configuration.
pub(crate) fn embedder(config: &Config) -> Result<Arc<dyn Embedder>> {
    let client = EmbeddingClient::new(&config.embedding)
        .context("failed to create embedding client")?;
    Ok(Arc::new(client))
}

pub(crate) fn store(config: &Config) -> Result<Arc<dyn CollectionStore>> {
    create_store(
        &config.vector_store,
        u64::from(config.embedding.dimension),
    )
    .context("failed to create vector store backend")
}

pub(crate) fn provider_chain(config: &Config) -> Result<Arc<ProviderChain>> {
    let chain = ProviderChain::from_configs(&config.providers)
        .context("failed to create generation providers")?;
    Ok(Arc::new(chain))
}

pub(crate) fn chat_store() -> Result<Arc<dyn ChatStore>> {
    let path = JsonlChatStore::default_path()
        .context("could not determine data directory for chat history")?;
    Ok(Arc::new(JsonlChatStore::new(path)))
}
