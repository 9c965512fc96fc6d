use crate::config::types::{
    Config, DownloadConfig, ProductStageConfig, SearchStageConfig, SiteConfig,
};
use crate::{ConfigError, ConfigResult};
use url::Url;

const MAX_WORKERS: usize = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> ConfigResult<()> {
    validate_site_config(&config.site)?;
    validate_search_config(&config.search)?;
    validate_product_config(&config.product)?;
    validate_download_config(&config.download)?;
    Ok(())
}

/// Validates the catalog location and image filter
fn validate_site_config(config: &SiteConfig) -> ConfigResult<()> {
    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base-url: {}", e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base-url must use http or https, got '{}'",
            config.base_url
        )));
    }

    if !config.search_path_template.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "search-path-template must contain '{{page}}', got '{}'",
            config.search_path_template
        )));
    }

    validate_mime_type(&config.image_mime_type)?;

    Ok(())
}

/// Validates search stage configuration
fn validate_search_config(config: &SearchStageConfig) -> ConfigResult<()> {
    if config.page_start > config.page_end {
        return Err(ConfigError::Validation(format!(
            "page-start ({}) must not exceed page-end ({})",
            config.page_start, config.page_end
        )));
    }

    validate_workers("search", config.workers)?;
    validate_attempts("search", config.max_attempts)?;
    validate_timeout("search", config.attempt_timeout_ms)?;

    Ok(())
}

/// Validates product stage configuration
fn validate_product_config(config: &ProductStageConfig) -> ConfigResult<()> {
    validate_workers("product", config.workers)?;
    validate_attempts("product", config.max_attempts)?;
    validate_timeout("product", config.attempt_timeout_ms)?;

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "product max-pages must be >= 1 when set".to_string(),
        ));
    }

    Ok(())
}

/// Validates download configuration
fn validate_download_config(config: &DownloadConfig) -> ConfigResult<()> {
    validate_workers("download", config.workers)?;

    if config.output_root.is_empty() {
        return Err(ConfigError::Validation(
            "output-root cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "download timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_workers(stage: &str, workers: usize) -> ConfigResult<()> {
    if workers < 1 || workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "{} workers must be between 1 and {}, got {}",
            stage, MAX_WORKERS, workers
        )));
    }
    Ok(())
}

fn validate_attempts(stage: &str, max_attempts: u32) -> ConfigResult<()> {
    if max_attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "{} max-attempts must be >= 1, got {}",
            stage, max_attempts
        )));
    }
    Ok(())
}

fn validate_timeout(stage: &str, timeout_ms: Option<u64>) -> ConfigResult<()> {
    if timeout_ms == Some(0) {
        return Err(ConfigError::Validation(format!(
            "{} attempt-timeout-ms must be >= 1 when set",
            stage
        )));
    }
    Ok(())
}

/// Checks for a `type/subtype` shape with a filename-safe subtype
fn validate_mime_type(mime: &str) -> ConfigResult<()> {
    let Some((kind, subtype)) = mime.split_once('/') else {
        return Err(ConfigError::Validation(format!(
            "image-mime-type must look like 'type/subtype', got '{}'",
            mime
        )));
    };

    if kind.is_empty() || subtype.is_empty() {
        return Err(ConfigError::Validation(format!(
            "image-mime-type must look like 'type/subtype', got '{}'",
            mime
        )));
    }

    if !subtype
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '+' || c == '.')
    {
        return Err(ConfigError::Validation(format!(
            "image-mime-type subtype '{}' contains invalid characters",
            subtype
        )));
    }

    Ok(())
}
