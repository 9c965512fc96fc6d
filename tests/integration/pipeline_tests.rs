//! Integration tests for the harvest pipeline
//!
//! These tests drive the full search → product → download sequence with an
//! in-memory rendering agent and a wiremock image server.

use async_trait::async_trait;
use catalog_harvest::config::{
    BrowserConfig, Config, DownloadConfig, ProductStageConfig, SearchStageConfig, SiteConfig,
};
use catalog_harvest::crawler::{Coordinator, FetchError, RenderedFetcher};
use catalog_harvest::output::{artifact_file_name, DownloadError, ImageDownloader};
use catalog_harvest::HarvestError;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

const BASE_URL: &str = "https://shop.example.com";

/// Creates a test configuration for a single search page
fn create_test_config(output_root: &Path) -> Config {
    Config {
        site: SiteConfig {
            base_url: BASE_URL.to_string(),
            search_path_template: "search/category-lamp/?has_selling_stock=1&page={page}"
                .to_string(),
            image_mime_type: "image/jpeg".to_string(),
        },
        browser: BrowserConfig::default(),
        search: SearchStageConfig {
            page_start: 1,
            page_end: 2,
            workers: 4,
            max_attempts: 3,
            retry_delay_ms: 1,
            settle_delay_ms: 0,
            min_links: 20,
            attempt_timeout_ms: None,
        },
        product: ProductStageConfig {
            workers: 8,
            max_attempts: 3,
            retry_delay_ms: 1,
            settle_delay_ms: 0,
            min_images: 1,
            start_jitter_ms: 5,
            max_pages: None,
            attempt_timeout_ms: None,
        },
        download: DownloadConfig {
            workers: 4,
            output_root: output_root.display().to_string(),
            timeout_secs: 5,
            start_jitter_ms: 0,
            user_agent: None,
        },
    }
}

fn search_url(page: u32) -> String {
    format!(
        "{}/search/category-lamp/?has_selling_stock=1&page={}",
        BASE_URL, page
    )
}

fn product_href(n: usize) -> String {
    format!("/product/dkp-{}/lamp-{}/", n, n)
}

fn search_page_html(products: std::ops::Range<usize>) -> String {
    let anchors: String = products
        .map(|n| format!(r#"<div class="card"><a href="{}">Lamp {}</a></div>"#, product_href(n), n))
        .collect();
    format!("<html><body><div>{}</div></body></html>", anchors)
}

fn product_page_html(images: &[String]) -> String {
    let pictures: String = images
        .iter()
        .map(|src| {
            format!(
                r#"<picture><source type="image/webp" srcset="{0}.webp"><source type="image/jpeg" srcset="{0}"></picture>"#,
                src
            )
        })
        .collect();
    format!("<html><body>{}</body></html>", pictures)
}

/// In-memory rendering agent
///
/// Serves pre-rendered markup per URL; a URL can be scripted to come back
/// empty for its first N attempts. Every call is appended to a shared event log.
struct FakeBrowser {
    label: &'static str,
    pages: HashMap<String, String>,
    thin_attempts: HashMap<String, usize>,
    calls: Mutex<HashMap<String, usize>>,
    events: Arc<Mutex<Vec<(&'static str, String)>>>,
}

impl FakeBrowser {
    fn new(label: &'static str, events: Arc<Mutex<Vec<(&'static str, String)>>>) -> Self {
        Self {
            label,
            pages: HashMap::new(),
            thin_attempts: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            events,
        }
    }

    fn page(mut self, url: impl Into<String>, html: String) -> Self {
        self.pages.insert(url.into(), html);
        self
    }

    fn thin_for(mut self, url: impl Into<String>, attempts: usize) -> Self {
        self.thin_attempts.insert(url.into(), attempts);
        self
    }

    fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    fn fetched_urls(&self) -> BTreeSet<String> {
        self.calls.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl RenderedFetcher for FakeBrowser {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.events
            .lock()
            .unwrap()
            .push((self.label, format!("start {}", url)));
        tokio::time::sleep(Duration::from_millis(2)).await;

        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            let count = calls.entry(url.to_string()).or_insert(0);
            *count += 1;
            *count
        };

        let result = match self.pages.get(url) {
            Some(_) if attempt <= self.thin_attempts.get(url).copied().unwrap_or(0) => {
                Ok("<html><body></body></html>".to_string())
            }
            Some(html) => Ok(html.clone()),
            None => Err(FetchError::Navigation(format!("net::ERR_FAILED {}", url))),
        };

        self.events
            .lock()
            .unwrap()
            .push((self.label, format!("end {}", url)));
        result
    }
}

async fn image_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/.*\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"\xFF\xD8\xFFjpeg".to_vec()))
        .mount(&server)
        .await;
    server
}

fn count_files(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}

#[tokio::test]
async fn test_full_harvest_single_search_page() {
    let server = image_server().await;
    let root = tempfile::tempdir().unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));

    // 25 products, each with its own image plus one shared banner image
    let search = FakeBrowser::new("search", events.clone()).page(search_url(1), search_page_html(0..25));
    let mut product = FakeBrowser::new("product", events.clone());
    for n in 0..25 {
        let images = vec![
            format!("{}/img/{}.jpg", server.uri(), n),
            format!("{}/img/banner.jpg", server.uri()),
        ];
        product = product.page(format!("{}{}", BASE_URL, product_href(n)), product_page_html(&images));
    }

    let search = Arc::new(search);
    let product = Arc::new(product);
    let coordinator =
        Coordinator::with_fetchers(create_test_config(root.path()), search.clone(), product.clone())
            .expect("Failed to create coordinator");

    let summary = coordinator.run().await.expect("Harvest failed");

    assert_eq!(summary.search_pages, 1);
    assert_eq!(summary.search_failures, 0);
    assert_eq!(summary.product_links, 25);
    assert_eq!(summary.product_pages, 25);
    assert_eq!(summary.product_failures, 0);
    assert_eq!(summary.image_links, 26);
    assert_eq!(summary.images_downloaded, 26);
    assert_eq!(summary.download_failures, 0);

    let output_dir = root.path().join("downloaded_images_1_1");
    assert_eq!(summary.output_dir, output_dir);
    assert_eq!(count_files(&output_dir), 26);

    let banner = format!("{}/img/banner.jpg", server.uri());
    assert!(output_dir.join(artifact_file_name(&banner, "jpeg")).is_file());

    assert_eq!(search.calls_for(&search_url(1)), 1);
}

#[tokio::test]
async fn test_product_page_succeeds_on_third_attempt() {
    let server = image_server().await;
    let root = tempfile::tempdir().unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));

    let product_url = format!("{}{}", BASE_URL, product_href(7));
    let images: Vec<String> = (0..3).map(|n| format!("{}/img/p7-{}.jpg", server.uri(), n)).collect();

    let search = FakeBrowser::new("search", events.clone()).page(search_url(1), search_page_html(0..20));
    let product = FakeBrowser::new("product", events.clone())
        .page(product_url.clone(), product_page_html(&images))
        .thin_for(product_url.clone(), 2);
    let product = Arc::new(product);

    let coordinator =
        Coordinator::with_fetchers(create_test_config(root.path()), Arc::new(search), product.clone())
            .unwrap();

    let report = coordinator
        .collect_image_links(BTreeSet::from([product_url.clone()]))
        .await;

    assert_eq!(product.calls_for(&product_url), 3);
    assert!(report.failures.is_empty());
    assert_eq!(report.output().len(), 3);
}

#[tokio::test]
async fn test_zero_product_links_is_not_an_error() {
    let root = tempfile::tempdir().unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));

    // Only 5 products per page, below the threshold of 20 on every attempt
    let search = Arc::new(
        FakeBrowser::new("search", events.clone()).page(search_url(1), search_page_html(0..5)),
    );
    let product = Arc::new(FakeBrowser::new("product", events.clone()));

    let coordinator =
        Coordinator::with_fetchers(create_test_config(root.path()), search.clone(), product.clone())
            .unwrap();
    let summary = coordinator.run().await.expect("Harvest should complete");

    assert_eq!(search.calls_for(&search_url(1)), 3);
    assert_eq!(summary.search_pages, 1);
    assert_eq!(summary.search_failures, 1);
    assert_eq!(summary.product_links, 0);
    assert_eq!(summary.product_pages, 0);
    assert_eq!(summary.image_links, 0);
    assert_eq!(summary.images_downloaded, 0);
    assert!(product.fetched_urls().is_empty());
    assert!(summary.output_dir.is_dir());
}

#[tokio::test]
async fn test_product_stage_waits_for_complete_search_output() {
    let server = image_server().await;
    let root = tempfile::tempdir().unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));

    let mut config = create_test_config(root.path());
    config.search.page_end = 4;
    config.search.min_links = 10;

    // Page 2 needs a retry, so it finishes last
    let search = FakeBrowser::new("search", events.clone())
        .page(search_url(1), search_page_html(0..10))
        .page(search_url(2), search_page_html(10..20))
        .page(search_url(3), search_page_html(20..30))
        .thin_for(search_url(2), 1);
    let mut product = FakeBrowser::new("product", events.clone());
    for n in 0..30 {
        let image = format!("{}/img/{}.jpg", server.uri(), n);
        product = product.page(format!("{}{}", BASE_URL, product_href(n)), product_page_html(&[image]));
    }

    let search = Arc::new(search);
    let product = Arc::new(product);
    let coordinator = Coordinator::with_fetchers(config, search.clone(), product.clone()).unwrap();
    let summary = coordinator.run().await.unwrap();

    let events = events.lock().unwrap();
    let last_search_end = events
        .iter()
        .rposition(|(label, event)| *label == "search" && event.starts_with("end"))
        .unwrap();
    let first_product = events
        .iter()
        .position(|(label, _)| *label == "product")
        .unwrap();
    assert!(last_search_end < first_product);
    assert_eq!(search.calls_for(&search_url(2)), 2);

    // Every product page visited came out of the finished search stage
    let search_output: BTreeSet<String> = (0..30)
        .map(|n| format!("{}{}", BASE_URL, product_href(n)))
        .collect();
    assert_eq!(product.fetched_urls(), search_output);
    assert_eq!(summary.product_pages, 30);
    assert_eq!(summary.images_downloaded, 30);
}

#[tokio::test]
async fn test_max_pages_caps_product_stage() {
    let server = image_server().await;
    let root = tempfile::tempdir().unwrap();
    let events = Arc::new(Mutex::new(Vec::new()));

    let mut config = create_test_config(root.path());
    config.product.max_pages = Some(5);

    let search = FakeBrowser::new("search", events.clone()).page(search_url(1), search_page_html(0..25));
    let mut product = FakeBrowser::new("product", events.clone());
    for n in 0..25 {
        let image = format!("{}/img/{}.jpg", server.uri(), n);
        product = product.page(format!("{}{}", BASE_URL, product_href(n)), product_page_html(&[image]));
    }
    let product = Arc::new(product);

    let coordinator = Coordinator::with_fetchers(config, Arc::new(search), product.clone()).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.product_links, 25);
    assert_eq!(summary.product_pages, 5);
    assert_eq!(product.fetched_urls().len(), 5);
    assert_eq!(summary.images_downloaded, 5);
}

#[tokio::test]
async fn test_download_batch_with_one_missing_image() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/3.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/img/[0-9]+\.jpg$"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"jpeg".to_vec()))
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let destination = root.path().join("downloaded_images_1_1");
    let urls: Vec<String> = (1..=5).map(|n| format!("{}/img/{}.jpg", server.uri(), n)).collect();

    let downloader = ImageDownloader::new(reqwest::Client::new(), 3, "jpeg");
    let report = downloader
        .download_all(urls.clone(), &destination)
        .await
        .expect("Batch should complete");

    assert_eq!(report.written.len(), 4);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(
        report.failures.get(&urls[2]),
        Some(&DownloadError::Status {
            url: urls[2].clone(),
            status: 404
        })
    );
    assert_eq!(count_files(&destination), 4);
    assert!(!destination.join(artifact_file_name(&urls[2], "jpeg")).exists());
}

#[tokio::test]
async fn test_download_concurrency_is_bounded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"jpeg".to_vec())
                .set_delay(Duration::from_millis(30)),
        )
        .mount(&server)
        .await;

    let root = tempfile::tempdir().unwrap();
    let urls: Vec<String> = (0..8).map(|n| format!("{}/img/{}.jpg", server.uri(), n)).collect();

    let started = std::time::Instant::now();
    let report = ImageDownloader::new(reqwest::Client::new(), 2, "jpeg")
        .download_all(urls, root.path())
        .await
        .unwrap();

    // 8 downloads, 2 at a time, 30ms each: at least 4 sequential rounds
    assert_eq!(report.written.len(), 8);
    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_unwritable_output_root_fails_before_rendering() {
    let root = tempfile::tempdir().unwrap();
    let blocker = root.path().join("file-not-dir");
    std::fs::write(&blocker, b"x").unwrap();

    let events = Arc::new(Mutex::new(Vec::new()));
    let search = Arc::new(
        FakeBrowser::new("search", events.clone()).page(search_url(1), search_page_html(0..25)),
    );
    let product = Arc::new(FakeBrowser::new("product", events.clone()));

    let coordinator =
        Coordinator::with_fetchers(create_test_config(&blocker), search.clone(), product).unwrap();

    let err = coordinator.run().await.unwrap_err();
    assert!(matches!(err, HarvestError::Io { .. }));
    assert!(search.fetched_urls().is_empty());
    assert!(events.lock().unwrap().is_empty());
}
