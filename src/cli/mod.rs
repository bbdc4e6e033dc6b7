//! CLI for the document question-answering backend.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Retrieval-augmented question answering over uploaded documents.
#[derive(Debug, Parser)]
#[command(name = "docqa")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(long, short = 'f', global = true, help = "Output format: text or json")]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check infrastructure status (vector store, providers)
    Status,

    /// Upload a document (extracted text) into a user's collection
    Upload(commands::UploadArgs),

    /// Search a user's documents without generating an answer
    Search(commands::SearchArgs),

    /// Ask a question against a user's documents
    Ask(commands::AskArgs),

    /// Manage a user's document collections
    #[command(subcommand)]
    Collections(commands::CollectionsCommand),

    /// Attach feedback to a previous answer
    Feedback(commands::FeedbackArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}
