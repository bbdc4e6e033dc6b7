use std::fmt::Write as FmtWrite;

use serde::Serialize;

use crate::models::{AskResponse, CollectionInfo, IndexReceipt, OutputFormat, RetrievalResult};

pub trait Formatter {
    fn format_receipt(&self, receipt: &IndexReceipt) -> String;
    fn format_retrieval(&self, result: &RetrievalResult) -> String;
    fn format_ask(&self, response: &AskResponse) -> String;
    fn format_collections(&self, collections: &[CollectionInfo]) -> String;
    fn format_status(&self, status: &StatusInfo) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusInfo {
    pub store_driver: String,
    pub store_url: String,
    pub store_connected: bool,
    pub embedding_endpoint: String,
    pub embedding_model: String,
    pub embedding_key_present: bool,
    /// Provider name and whether its credentials are present, in fallback
    /// order.
    pub providers: Vec<ProviderStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProviderStatus {
    pub name: String,
    pub model: String,
    pub key_present: bool,
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_receipt(&self, receipt: &IndexReceipt) -> String {
        let mut output = String::new();
        writeln!(output, "Indexed into: {}", receipt.collection_name).unwrap();
        writeln!(
            output,
            "Chunks: {}  Pages: {}",
            receipt.chunk_count, receipt.pages
        )
        .unwrap();
        writeln!(output, "Checksum: {}", receipt.checksum).unwrap();
        if let Some(ref summary) = receipt.summary {
            writeln!(output, "\nSummary:\n{}", summary).unwrap();
        }
        output
    }

    fn format_retrieval(&self, result: &RetrievalResult) -> String {
        if result.is_empty() {
            return format!("No results found for: {}\n", result.query);
        }

        let mut output = String::new();
        writeln!(output, "Results for: \"{}\"", result.query).unwrap();
        writeln!(
            output,
            "Found {} chunks across {} collection(s)\n",
            result.len(),
            result.collections_searched
        )
        .unwrap();

        for chunk in &result.chunks {
            writeln!(
                output,
                "{}. [score {:.3}] {} p.{} ({})",
                chunk.rank, chunk.score, chunk.filename, chunk.page, chunk.collection_name
            )
            .unwrap();

            let preview: String = chunk.text.chars().take(200).collect();
            let preview = if chunk.text.chars().count() > 200 {
                format!("{}...", preview)
            } else {
                preview
            };
            for line in preview.lines() {
                writeln!(output, "   {}", line).unwrap();
            }
            writeln!(output).unwrap();
        }

        output
    }

    fn format_ask(&self, response: &AskResponse) -> String {
        if let Some(ref error) = response.error {
            return format!("Error: {}\n", error);
        }

        let mut output = String::new();
        if let Some(ref answer) = response.answer {
            writeln!(output, "{}", answer).unwrap();
        }
        if !response.sources.is_empty() {
            writeln!(output, "\nSources:").unwrap();
            for source in &response.sources {
                writeln!(
                    output,
                    "  - {} p.{} ({}, score {:.3})",
                    source.filename, source.page, source.collection_name, source.score
                )
                .unwrap();
            }
        }
        if let Some(ref chat_id) = response.chat_id {
            writeln!(output, "\nChat id: {}", chat_id).unwrap();
        }
        output
    }

    fn format_collections(&self, collections: &[CollectionInfo]) -> String {
        if collections.is_empty() {
            return "No collections found.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "Collections ({})", collections.len()).unwrap();
        for info in collections {
            writeln!(
                output,
                "  {}  [{} chunks]  ({})",
                info.document_name, info.chunk_count, info.name
            )
            .unwrap();
        }
        output
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();

        let store_state = if status.store_connected {
            "[CONNECTED]"
        } else {
            "[UNREACHABLE]"
        };
        writeln!(
            output,
            "Vector store:  {} {} ({})",
            store_state, status.store_url, status.store_driver
        )
        .unwrap();

        let key_state = if status.embedding_key_present {
            "key present"
        } else {
            "KEY MISSING"
        };
        writeln!(
            output,
            "Embedding:     {} @ {} ({})",
            status.embedding_model, status.embedding_endpoint, key_state
        )
        .unwrap();

        if status.providers.is_empty() {
            writeln!(output, "Providers:     none configured").unwrap();
        } else {
            writeln!(output, "Providers (fallback order):").unwrap();
            for provider in &status.providers {
                let key_state = if provider.key_present {
                    "key present"
                } else {
                    "KEY MISSING"
                };
                writeln!(
                    output,
                    "  {} ({}) - {}",
                    provider.name, provider.model, key_state
                )
                .unwrap();
            }
        }

        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{}\n", message)
    }

    fn format_error(&self, error: &str) -> String {
        format!("Error: {}\n", error)
    }
}

pub struct JsonFormatter;

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .map(|s| format!("{}\n", s))
        .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}\n", e))
}

impl Formatter for JsonFormatter {
    fn format_receipt(&self, receipt: &IndexReceipt) -> String {
        to_json(receipt)
    }

    fn format_retrieval(&self, result: &RetrievalResult) -> String {
        to_json(result)
    }

    fn format_ask(&self, response: &AskResponse) -> String {
        to_json(response)
    }

    fn format_collections(&self, collections: &[CollectionInfo]) -> String {
        to_json(&collections)
    }

    fn format_status(&self, status: &StatusInfo) -> String {
        to_json(status)
    }

    fn format_message(&self, message: &str) -> String {
        to_json(&serde_json::json!({ "message": message }))
    }

    fn format_error(&self, error: &str) -> String {
        to_json(&serde_json::json!({ "error": error }))
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter),
    }
}
