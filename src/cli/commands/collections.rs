use anyhow::Result;
use clap::{Args, Subcommand};

use crate::access::{self, AccessGuard};
use crate::cli::output::get_formatter;
use crate::error::VectorStoreError;
use crate::models::{CollectionInfo, Config, OutputFormat};
use crate::services::store::CollectionStore;

#[derive(Debug, Subcommand)]
pub enum CollectionsCommand {
    /// List a user's document collections
    List(ListArgs),

    /// Delete one of a user's collections and all its chunks
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long, short = 'u', help = "Owner of the collections")]
    pub user: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    #[arg(required = true, help = "Full collection name to delete")]
    pub collection: String,

    #[arg(long, short = 'u', help = "Owner of the collection")]
    pub user: String,
}

pub async fn handle_collections(
    command: CollectionsCommand,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);
    let store = super::store(&config)?;
    let guard = AccessGuard::new(store.clone());

    match command {
        CollectionsCommand::List(args) => {
            let names = store.list(&access::user_prefix(&args.user)).await?;

            let mut collections = Vec::with_capacity(names.len());
            for name in names {
                let chunk_count = store.count(&name).await.unwrap_or(0);
                collections.push(CollectionInfo {
                    document_name: access::document_name(&args.user, &name),
                    name,
                    chunk_count,
                });
            }

            print!("{}", formatter.format_collections(&collections));
        }
        CollectionsCommand::Delete(args) => {
            // Rejection first; existence is only revealed inside the
            // caller's own namespace.
            guard.check(&args.user, &args.collection)?;

            match store.delete(&args.collection).await {
                Ok(()) => {
                    print!(
                        "{}",
                        formatter
                            .format_message(&format!("deleted collection {}", args.collection))
                    );
                }
                Err(VectorStoreError::CollectionNotFound(name)) => {
                    print!(
                        "{}",
                        formatter.format_error(&format!("collection not found: {}", name))
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    Ok(())
}
