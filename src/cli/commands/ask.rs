use anyhow::Result;
use clap::Args;
use std::sync::Arc;

use crate::access::AccessGuard;
use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::{FeedbackIndex, Orchestrator, Retriever};

#[derive(Debug, Args)]
pub struct AskArgs {
    #[arg(required = true, help = "The question to answer")]
    pub query: String,

    #[arg(long, short = 'u', help = "User whose documents are consulted")]
    pub user: String,

    #[arg(
        long,
        short = 'c',
        help = "Restrict the answer to one collection (defaults to all of the user's collections)"
    )]
    pub collection: Option<String>,
}

pub async fn handle_ask(args: AskArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("question cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);

    let embedder = super::embedder(&config)?;
    let store = super::store(&config)?;
    let chain = super::provider_chain(&config)?;
    let chats = super::chat_store()?;

    if verbose {
        eprintln!("Question: \"{query}\"");
        eprintln!("  Providers: {:?}", chain.provider_names());
    }

    let orchestrator = Orchestrator::new(
        AccessGuard::new(store.clone()),
        Arc::new(Retriever::new(embedder.clone(), store.clone())),
        chain,
        chats.clone(),
        Arc::new(FeedbackIndex::new(embedder, store, chats)),
        config.retrieval.clone(),
    );

    // Access rejections propagate as command failures; provider and
    // retrieval trouble lands in the response envelope instead.
    let response = orchestrator
        .ask(&args.user, query, args.collection.as_deref())
        .await?;

    print!("{}", formatter.format_ask(&response));
    Ok(())
}
