//! Crawler module for rendered page fetching and extraction
//!
//! This module contains the core harvesting logic, including:
//! - Rendering pages through a headless browser
//! - Extracting product links and image URLs from rendered markup
//! - Fetch-then-extract with bounded retry and a success threshold
//! - Bounded worker pools and per-stage result aggregation
//! - Overall stage sequencing

mod coordinator;
mod fetcher;
mod parser;
mod retry;
mod scheduler;
mod stage;

pub use coordinator::{build_search_url, run_harvest, Coordinator};
pub use fetcher::{build_http_client, ChromiumFetcher, FetchError, RenderedFetcher};
pub use parser::{extract_image_sources, extract_product_links};
pub use retry::{
    fetch_with_retry, AttemptError, Extractor, RetryExhausted, RetryPolicy, TaskOutcome,
};
pub use scheduler::{jitter, run_bounded};
pub use stage::{StageReport, StageRunner};
