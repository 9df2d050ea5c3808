use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use microsub_core::{Adapter, AdapterError, Grant, TokenTable};

pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 900;

#[derive(Deserialize)]
pub struct Config {
    /// Seconds between background refreshes; 0 refreshes only at startup
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    #[serde(default)]
    pub token: Vec<TokenConfig>,
    #[serde(default)]
    pub adapter: Vec<AdapterConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            refresh_interval_secs: DEFAULT_REFRESH_INTERVAL_SECS,
            token: Vec::new(),
            adapter: Vec::new(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

#[derive(Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub user: String,
    #[serde(default)]
    pub scopes: Vec<String>,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
pub enum AdapterConfig {
    #[cfg(feature = "adapter-feeds")]
    #[serde(rename = "feeds")]
    Feeds {
        id: String,
        name: Option<String>,
        preview_limit: Option<usize>,
        channels: Option<Vec<microsub_core::Channel>>,
    },
}

/// Build adapters in file order, which becomes registration order.
pub fn create_adapters(config: &Config) -> Result<Vec<Arc<dyn Adapter>>, AdapterError> {
    let mut adapters: Vec<Arc<dyn Adapter>> = Vec::new();

    for adapter_config in &config.adapter {
        #[cfg(not(feature = "adapter-feeds"))]
        match *adapter_config {}

        #[cfg(feature = "adapter-feeds")]
        match adapter_config {
            #[cfg(feature = "adapter-feeds")]
            AdapterConfig::Feeds { id, name, preview_limit, channels } => {
                info!(adapter = %id, "Creating feed adapter");
                let discovery = microsub_core::HttpDiscovery::new()?;
                let mut adapter = microsub_core::FeedAdapter::new(
                    id.clone(),
                    name.clone().unwrap_or_else(|| id.clone()),
                    microsub_core::FeedStore::new(),
                    Arc::new(discovery),
                );
                if let Some(channels) = channels {
                    if channels.is_empty() {
                        return Err(AdapterError::Config(format!(
                            "Adapter {id} must declare at least one channel"
                        )));
                    }
                    adapter = adapter.with_channels(channels.clone());
                }
                if let Some(limit) = preview_limit {
                    adapter = adapter.with_preview_limit(*limit);
                }
                adapters.push(Arc::new(adapter));
            }
        }
    }

    Ok(adapters)
}

pub fn token_table(config: &Config) -> TokenTable {
    let mut table = TokenTable::new();
    for entry in &config.token {
        table.insert(
            entry.token.clone(),
            Grant {
                user_id: entry.user.clone(),
                scopes: entry.scopes.clone(),
            },
        );
    }
    table
}

pub fn load_config(path: &Path) -> Result<Config, anyhow::Error> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}
