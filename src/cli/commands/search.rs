use anyhow::Result;
use clap::Args;

use crate::access::AccessGuard;
use crate::cli::output::get_formatter;
use crate::error::RetrievalError;
use crate::models::{Config, OutputFormat};
use crate::services::Retriever;

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(long, short = 'u', help = "User whose documents are searched")]
    pub user: String,

    #[arg(
        long,
        short = 'c',
        help = "Restrict the search to one collection (defaults to all of the user's collections)"
    )]
    pub collection: Option<String>,

    #[arg(long, short = 'n', help = "Maximum number of results to return")]
    pub limit: Option<u32>,
}

pub async fn handle_search(args: SearchArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }

    let config = Config::load()?;
    let formatter = get_formatter(format);

    let limit = args.limit.unwrap_or(config.retrieval.top_n);
    if limit == 0 {
        anyhow::bail!("limit must be at least 1");
    }

    let embedder = super::embedder(&config)?;
    let store = super::store(&config)?;
    let guard = AccessGuard::new(store.clone());

    // Access rejections surface as command failures, distinguishable from
    // the not-found and empty-scope messages below.
    let scope = guard
        .authorize(&args.user, args.collection.as_deref())
        .await?;

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Scope: {} collection(s)", scope.collection_count());
        eprintln!("  Limit: {limit}");
    }

    let retriever = Retriever::new(embedder, store);
    match retriever.retrieve(&scope, query, limit as usize).await {
        Ok(result) => {
            print!("{}", formatter.format_retrieval(&result));
        }
        Err(RetrievalError::EmptyScope { .. }) => {
            print!(
                "{}",
                formatter.format_message("no documents uploaded yet for this user")
            );
        }
        Err(RetrievalError::CollectionNotFound(name)) => {
            print!(
                "{}",
                formatter.format_error(&format!("collection not found: {}", name))
            );
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
