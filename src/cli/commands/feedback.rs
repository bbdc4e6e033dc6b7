use anyhow::Result;
use clap::Args;

use crate::cli::output::get_formatter;
use crate::error::HistoryError;
use crate::models::{Config, OutputFormat};
use crate::services::FeedbackIndex;

#[derive(Debug, Args)]
pub struct FeedbackArgs {
    #[arg(long, short = 'u', help = "User the feedback belongs to")]
    pub user: String,

    #[arg(
        long,
        short = 'q',
        help = "Target the latest answer to this exact question (defaults to the latest answer)"
    )]
    pub query: Option<String>,

    #[arg(long, conflicts_with = "negative", help = "Mark the answer as helpful")]
    pub positive: bool,

    #[arg(long, conflicts_with = "positive", help = "Mark the answer as unhelpful")]
    pub negative: bool,

    #[arg(long, help = "Free-form comments")]
    pub comments: Option<String>,
}

pub async fn handle_feedback(args: FeedbackArgs, format: OutputFormat, _verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let embedder = super::embedder(&config)?;
    let store = super::store(&config)?;
    let chats = super::chat_store()?;
    let index = FeedbackIndex::new(embedder, store, chats);

    let positive = match (args.positive, args.negative) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };

    match index
        .submit(&args.user, args.query.as_deref(), positive, args.comments)
        .await
    {
        Ok(chat_id) => {
            print!(
                "{}",
                formatter.format_message(&format!("feedback saved for chat {}", chat_id))
            );
        }
        Err(HistoryError::ChatNotFound) => {
            print!("{}", formatter.format_error("chat not found"));
        }
        Err(HistoryError::FeedbackAlreadySubmitted) => {
            print!(
                "{}",
                formatter.format_error("feedback already submitted for this chat")
            );
        }
        Err(e) => return Err(e.into()),
    }

    Ok(())
}
