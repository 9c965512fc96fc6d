use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Catalog-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub site: SiteConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    pub search: SearchStageConfig,
    pub product: ProductStageConfig,
    pub download: DownloadConfig,
}

/// Target catalog configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Origin of the catalog, also used to absolutize product links
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Search path appended to the base URL; `{page}` is replaced by the page number
    #[serde(rename = "search-path-template")]
    pub search_path_template: String,

    /// MIME type of the `<source>` elements to harvest
    #[serde(rename = "image-mime-type", default = "default_image_mime_type")]
    pub image_mime_type: String,
}

/// Rendering agent configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserConfig {
    /// Run the browser without a window
    #[serde(default = "default_true")]
    pub headless: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self { headless: true }
    }
}

/// Search-result page stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchStageConfig {
    /// First page number (inclusive)
    #[serde(rename = "page-start")]
    pub page_start: u32,

    /// Last page number (exclusive)
    #[serde(rename = "page-end")]
    pub page_end: u32,

    pub workers: usize,

    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    /// Wait after navigation before the markup is read
    #[serde(rename = "settle-delay-ms")]
    pub settle_delay_ms: u64,

    /// Minimum product links for a search page to count as rendered
    #[serde(rename = "min-links", default = "default_min_links")]
    pub min_links: usize,

    #[serde(rename = "attempt-timeout-ms", default)]
    pub attempt_timeout_ms: Option<u64>,
}

/// Product page stage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProductStageConfig {
    pub workers: usize,

    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    #[serde(rename = "retry-delay-ms")]
    pub retry_delay_ms: u64,

    #[serde(rename = "settle-delay-ms")]
    pub settle_delay_ms: u64,

    /// Minimum images for a product page to count as rendered
    #[serde(rename = "min-images", default = "default_min_images")]
    pub min_images: usize,

    /// Upper bound of the random pause before each product page (milliseconds)
    #[serde(rename = "start-jitter-ms", default = "default_product_jitter_ms")]
    pub start_jitter_ms: u64,

    /// Visit at most this many product pages
    #[serde(rename = "max-pages", default)]
    pub max_pages: Option<usize>,

    #[serde(rename = "attempt-timeout-ms", default)]
    pub attempt_timeout_ms: Option<u64>,
}

/// Image download configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadConfig {
    pub workers: usize,

    /// Directory under which the per-run image folder is created
    #[serde(rename = "output-root", default = "default_output_root")]
    pub output_root: String,

    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(rename = "start-jitter-ms", default)]
    pub start_jitter_ms: u64,

    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,
}

impl SearchStageConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

impl ProductStageConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn attempt_timeout(&self) -> Option<Duration> {
        self.attempt_timeout_ms.map(Duration::from_millis)
    }
}

impl SiteConfig {
    /// File extension derived from the MIME subtype (`image/jpeg` -> `jpeg`)
    pub fn image_extension(&self) -> &str {
        self.image_mime_type
            .split_once('/')
            .map(|(_, subtype)| subtype)
            .unwrap_or(self.image_mime_type.as_str())
    }
}

fn default_image_mime_type() -> String {
    "image/jpeg".to_string()
}

fn default_true() -> bool {
    true
}

fn default_min_links() -> usize {
    20
}

fn default_min_images() -> usize {
    1
}

fn default_product_jitter_ms() -> u64 {
    90
}

fn default_output_root() -> String {
    ".".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}
