//! End-of-run harvest summary
//!
//! Collects the headline counts of each stage so the binary can print them
//! once the pipeline has finished.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

/// Headline numbers for one harvest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSummary {
    /// When the pipeline started
    pub started_at: DateTime<Utc>,

    /// Wall-clock time for all three stages
    pub elapsed: Duration,

    /// Search-result pages visited
    pub search_pages: usize,

    /// Search-result pages that exhausted their retries
    pub search_failures: usize,

    /// Distinct product pages discovered
    pub product_links: usize,

    /// Product pages visited (may be capped below `product_links`)
    pub product_pages: usize,

    /// Product pages that exhausted their retries
    pub product_failures: usize,

    /// Distinct image URLs discovered
    pub image_links: usize,

    /// Images written to disk
    pub images_downloaded: usize,

    /// Images skipped after a download or write failure
    pub download_failures: usize,

    /// Folder the images were written to
    pub output_dir: PathBuf,
}

impl HarvestSummary {
    /// Share of discovered images that made it to disk, in percent
    pub fn download_rate(&self) -> f64 {
        if self.image_links == 0 {
            return 0.0;
        }
        (self.images_downloaded as f64 / self.image_links as f64) * 100.0
    }
}

/// Prints the summary to stdout in a formatted manner
pub fn print_summary(summary: &HarvestSummary) {
    println!("=== Harvest Summary ===\n");

    println!("Started: {}", summary.started_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!("Execution Time: {:.2} seconds", summary.elapsed.as_secs_f64());
    println!();

    println!("Search pages:");
    println!("  Visited: {}", summary.search_pages);
    println!("  Failed: {}", summary.search_failures);
    println!("  Product links found: {}", summary.product_links);
    println!();

    println!("Product pages:");
    println!("  Visited: {}", summary.product_pages);
    println!("  Failed: {}", summary.product_failures);
    println!("  Image links found: {}", summary.image_links);
    println!();

    println!("Downloads:");
    println!("  Written: {}", summary.images_downloaded);
    println!("  Failed: {}", summary.download_failures);
    println!("  Folder: {}", summary.output_dir.display());
    println!();

    println!(
        "Success Rate: {:.1}% ({} / {} images downloaded)",
        summary.download_rate(),
        summary.images_downloaded,
        summary.image_links
    );
}
