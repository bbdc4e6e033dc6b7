use anyhow::Result;
use clap::Subcommand;

use crate::cli::output::get_formatter;
use crate::models::{Config, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the resolved configuration
    Show,

    /// Print the configuration file path
    Path,

    /// Write a default configuration file
    Init,
}

pub async fn handle_config(
    command: ConfigCommand,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let formatter = get_formatter(format);

    match command {
        ConfigCommand::Show => {
            let config = Config::load()?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                }
                OutputFormat::Text => {
                    print!("{}", toml::to_string_pretty(&config)?);
                }
            }
        }
        ConfigCommand::Path => {
            let path = Config::config_path()
                .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
            print!("{}", formatter.format_message(&path.display().to_string()));
        }
        ConfigCommand::Init => {
            let config = Config::default();
            config.save()?;
            let path = Config::config_path()
                .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
            print!(
                "{}",
                formatter.format_message(&format!("wrote default config to {}", path.display()))
            );
        }
    }

    Ok(())
}
