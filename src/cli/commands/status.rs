use anyhow::Result;

use crate::cli::output::{ProviderStatus, StatusInfo, get_formatter};
use crate::models::{Config, OutputFormat, StoreDriver};
use crate::services::HttpGenerationProvider;
use crate::services::store::CollectionStore;

pub async fn handle_status(format: OutputFormat, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let formatter = get_formatter(format);

    let store = super::store(&config)?;
    let store_connected = store.health_check().await.unwrap_or(false);

    if verbose && !store_connected {
        eprintln!("vector store at {} did not respond", config.vector_store.url);
    }

    let embedding_key_present = std::env::var(&config.embedding.api_key_env).is_ok();

    let providers = config
        .providers
        .iter()
        .map(|provider_config| {
            let key_present = HttpGenerationProvider::new(provider_config)
                .map(|p| p.has_credentials())
                .unwrap_or(false);
            ProviderStatus {
                name: provider_config.name.clone(),
                model: provider_config.model.clone(),
                key_present,
            }
        })
        .collect();

    let status = StatusInfo {
        store_driver: match config.vector_store.driver {
            StoreDriver::Qdrant => "qdrant".to_string(),
            StoreDriver::Memory => "memory".to_string(),
        },
        store_url: config.vector_store.url.clone(),
        store_connected,
        embedding_endpoint: config.embedding.endpoint.clone(),
        embedding_model: config.embedding.model.clone(),
        embedding_key_present,
        providers,
    };

    print!("{}", formatter.format_status(&status));
    Ok(())
}
