//! Output module for persisting harvested images and reporting results
//!
//! This module handles:
//! - Deriving deterministic file names for downloaded images
//! - Downloading and writing images through a bounded worker pool
//! - Summarizing a finished harvest

mod downloader;
mod naming;
pub mod stats;

pub use downloader::{download_image, ensure_dir, DownloadError, DownloadReport, ImageDownloader};
pub use naming::artifact_file_name;
pub use stats::{print_summary, HarvestSummary};
