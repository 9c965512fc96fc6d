//! Harvest coordinator - sequences the three pipeline stages
//!
//! The coordinator wires the stages together:
//! - Builds one search URL per page number in `[page-start, page-end)`
//! - Runs the search stage to collect product page URLs
//! - Runs the product stage over those URLs to collect image URLs
//! - Downloads every image into the run's output folder
//!
//! Each stage starts only after the previous one has returned its complete
//! report, so no stage ever sees a partially collected input set.

use crate::config::{Config, SiteConfig};
use crate::crawler::fetcher::{build_http_client, ChromiumFetcher, RenderedFetcher};
use crate::crawler::parser::{extract_image_sources, extract_product_links};
use crate::crawler::retry::{Extractor, RetryPolicy};
use crate::crawler::stage::{StageReport, StageRunner};
use crate::output::{ensure_dir, HarvestSummary, ImageDownloader};
use crate::Result;
use chrono::Utc;
use reqwest::Client;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main harvest coordinator
pub struct Coordinator {
    config: Arc<Config>,
    search_fetcher: Arc<dyn RenderedFetcher>,
    product_fetcher: Arc<dyn RenderedFetcher>,
    client: Client,
}

impl Coordinator {
    /// Creates a coordinator that renders pages with headless Chrome
    ///
    /// # Arguments
    ///
    /// * `config` - The harvest configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to build the HTTP client
    pub fn new(config: Config) -> Result<Self> {
        let search_fetcher = Arc::new(ChromiumFetcher::new(
            &config.browser,
            config.search.settle_delay(),
        ));
        let product_fetcher = Arc::new(ChromiumFetcher::new(
            &config.browser,
            config.product.settle_delay(),
        ));

        Self::with_fetchers(config, search_fetcher, product_fetcher)
    }

    /// Creates a coordinator with caller-supplied rendering agents
    pub fn with_fetchers(
        config: Config,
        search_fetcher: Arc<dyn RenderedFetcher>,
        product_fetcher: Arc<dyn RenderedFetcher>,
    ) -> Result<Self> {
        let client = build_http_client(&config.download)?;

        Ok(Self {
            config: Arc::new(config),
            search_fetcher,
            product_fetcher,
            client,
        })
    }

    /// Search-result page URLs for the configured page range
    pub fn search_page_urls(&self) -> Vec<String> {
        (self.config.search.page_start..self.config.search.page_end)
            .map(|page| build_search_url(&self.config.site, page))
            .collect()
    }

    /// Folder the images of this run are written to
    ///
    /// Named after the inclusive page range, e.g. `downloaded_images_1_4`
    /// for pages `[1, 5)`.
    pub fn output_dir(&self) -> PathBuf {
        let search = &self.config.search;
        PathBuf::from(&self.config.download.output_root).join(format!(
            "downloaded_images_{}_{}",
            search.page_start,
            search.page_end.saturating_sub(1)
        ))
    }

    /// Runs the search stage over every search page
    pub async fn collect_product_links(&self) -> StageReport {
        let search = &self.config.search;
        let base_url = self.config.site.base_url.clone();
        let extractor: Extractor = Arc::new(move |html: &str| extract_product_links(html, &base_url));

        let runner = StageRunner::new(
            "search",
            Arc::clone(&self.search_fetcher),
            extractor,
            RetryPolicy {
                max_attempts: search.max_attempts,
                retry_delay: search.retry_delay(),
                min_results: search.min_links,
                attempt_timeout: search.attempt_timeout(),
            },
            search.workers,
        );

        let report = runner.run(self.search_page_urls()).await;
        tracing::info!("Number of search pages fetched: {}", report.processed());
        tracing::info!("Product links found: {}", report.output().len());
        report
    }

    /// Runs the product stage over the given product page URLs
    ///
    /// When `max-pages` is configured only that many URLs (in sorted order)
    /// are visited.
    pub async fn collect_image_links(&self, product_urls: BTreeSet<String>) -> StageReport {
        let product = &self.config.product;
        let mime_type = self.config.site.image_mime_type.clone();
        let extractor: Extractor = Arc::new(move |html: &str| extract_image_sources(html, &mime_type));

        let selected: Vec<String> = match product.max_pages {
            Some(limit) if limit < product_urls.len() => {
                tracing::info!(
                    "Visiting {} of {} product pages (max-pages)",
                    limit,
                    product_urls.len()
                );
                product_urls.into_iter().take(limit).collect()
            }
            _ => product_urls.into_iter().collect(),
        };

        let runner = StageRunner::new(
            "product",
            Arc::clone(&self.product_fetcher),
            extractor,
            RetryPolicy {
                max_attempts: product.max_attempts,
                retry_delay: product.retry_delay(),
                min_results: product.min_images,
                attempt_timeout: product.attempt_timeout(),
            },
            product.workers,
        )
        .with_start_jitter(Duration::from_millis(product.start_jitter_ms));

        let report = runner.run(selected).await;
        tracing::info!("Number of product pages fetched: {}", report.processed());
        tracing::info!("Image links found: {}", report.output().len());
        report
    }

    /// Runs the full harvest
    ///
    /// The output folder is created before any stage starts; failing to
    /// create it is the only error this returns. Everything else is
    /// reported through the summary counts.
    pub async fn run(&self) -> Result<HarvestSummary> {
        let started_at = Utc::now();
        let start_time = Instant::now();

        let output_dir = self.output_dir();
        ensure_dir(&output_dir).await?;

        let search_report = self.collect_product_links().await;
        let product_links = search_report.output();

        let product_report = self.collect_image_links(product_links.clone()).await;
        let image_links = product_report.output();

        let download = &self.config.download;
        let downloader = ImageDownloader::new(
            self.client.clone(),
            download.workers,
            self.config.site.image_extension(),
        )
        .with_start_jitter(Duration::from_millis(download.start_jitter_ms));

        let download_report = downloader
            .download_all(image_links.iter().cloned(), &output_dir)
            .await?;

        let summary = HarvestSummary {
            started_at,
            elapsed: start_time.elapsed(),
            search_pages: search_report.processed(),
            search_failures: search_report.failures.len(),
            product_links: product_links.len(),
            product_pages: product_report.processed(),
            product_failures: product_report.failures.len(),
            image_links: image_links.len(),
            images_downloaded: download_report.written.len(),
            download_failures: download_report.failures.len(),
            output_dir,
        };

        tracing::info!(
            "Harvest completed in {:?}: {} images downloaded",
            summary.elapsed,
            summary.images_downloaded
        );

        Ok(summary)
    }
}

/// Builds the search-result URL for one page number
///
/// # Example
///
/// ```
/// use catalog_harvest::config::SiteConfig;
/// use catalog_harvest::crawler::build_search_url;
///
/// let site = SiteConfig {
///     base_url: "https://shop.example.com".to_string(),
///     search_path_template: "search/category-lamp/?has_selling_stock=1&page={page}".to_string(),
///     image_mime_type: "image/jpeg".to_string(),
/// };
/// assert_eq!(
///     build_search_url(&site, 3),
///     "https://shop.example.com/search/category-lamp/?has_selling_stock=1&page=3"
/// );
/// ```
pub fn build_search_url(site: &SiteConfig, page: u32) -> String {
    format!(
        "{}/{}",
        site.base_url.trim_end_matches('/'),
        site.search_path_template
            .trim_start_matches('/')
            .replace("{page}", &page.to_string())
    )
}

/// Runs a complete harvest with headless Chrome
///
/// # Example
///
/// ```no_run
/// use catalog_harvest::config::load_config;
/// use catalog_harvest::crawler::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let summary = run_harvest(config).await?;
/// println!("{} images", summary.images_downloaded);
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config) -> Result<HarvestSummary> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run().await
}
