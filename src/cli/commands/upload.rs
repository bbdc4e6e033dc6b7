use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};
use crate::services::ChunkIndexer;

#[derive(Debug, Args)]
pub struct UploadArgs {
    #[arg(required = true, help = "Path to the extracted document text")]
    pub file: PathBuf,

    #[arg(long, short = 'u', help = "Owner of the document")]
    pub user: String,

    #[arg(
        long,
        help = "Filename to record for the document (defaults to the file's name)"
    )]
    pub filename: Option<String>,
}

pub async fn handle_upload(args: UploadArgs, format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let filename = args.filename.clone().unwrap_or_else(|| {
        args.file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string())
    });

    let full_text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    if verbose {
        eprintln!("Uploading \"{}\" for user {}", filename, args.user);
        eprintln!("  {} characters of extracted text", full_text.chars().count());
    }

    let embedder = super::embedder(&config)?;
    let store = super::store(&config)?;
    let chain = super::provider_chain(&config)?;

    let indexer = ChunkIndexer::new(
        embedder,
        store,
        config.indexing.clone(),
        config.embedding.batch_size as usize,
        Some(chain),
    );

    let receipt = indexer
        .index_document(&args.user, &filename, &full_text)
        .await
        .context("failed to index document")?;

    print!("{}", formatter.format_receipt(&receipt));
    Ok(())
}
