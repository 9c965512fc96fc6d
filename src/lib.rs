//! Catalog-Harvest: a rendered catalog image harvester
//!
//! This crate crawls paginated search-result pages through a headless browser,
//! follows the product pages they link to, and downloads the product images
//! found there. Each stage runs through a bounded worker pool with per-URL
//! retry, and per-item failures never abort the batch.

pub mod config;
pub mod crawler;
pub mod output;

use thiserror::Error;

/// Main error type for Catalog-Harvest operations
///
/// Only conditions that stop the whole harvest end up here. Per-item
/// failures are reported through [`crawler::TaskOutcome`] and
/// [`output::DownloadError`] instead.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Catalog-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_harvest, Coordinator, StageReport, TaskOutcome};
pub use output::{artifact_file_name, HarvestSummary};
