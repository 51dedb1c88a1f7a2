//! Configuration management for Sightline server

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Search-engine connection and index layout.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Base URL of the Elasticsearch-compatible cluster.
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Per-request timeout applied by the HTTP client.
    pub request_timeout_secs: u64,
    /// Flat per-user observation index.
    pub user_observation_index: String,
    /// Processed observation index (nested recorded-by documents).
    pub processed_observation_index: String,
    /// Composite aggregation page size (buckets per request).
    #[serde(default = "default_composite_page_size")]
    pub composite_page_size: usize,
}

fn default_composite_page_size() -> usize {
    crate::search::DEFAULT_COMPOSITE_PAGE_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub search: SearchConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let config = Config::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default"))
            // Layer on the environment-specific file
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Add environment variables (with prefix SIGHTLINE_)
            .add_source(
                Environment::with_prefix("SIGHTLINE")
                    .separator("_")
                    .try_parsing(true),
            )
            // Override search cluster URL from SEARCH_URL env var if present
            .set_override_option("search.url", env::var("SEARCH_URL").ok())?
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            request_timeout_secs: 60,
            user_observation_index: "user-observation".to_string(),
            processed_observation_index: "observation".to_string(),
            composite_page_size: default_composite_page_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}
