//! Image download stage
//!
//! Each image is fetched and written on its own. A bad status, a transport
//! error, or a failed write is logged and that image is skipped; there is no
//! retry at this stage and no item waits on another.

use crate::crawler::{jitter, run_bounded};
use crate::output::naming::artifact_file_name;
use crate::{HarvestError, Result};
use reqwest::Client;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Reasons a single image was not persisted
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DownloadError {
    #[error("Failed to download: {url}, Status Code: {status}")]
    Status { url: String, status: u16 },

    #[error("Error downloading {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Failed to write {path}: {message}")]
    Write { path: String, message: String },

    #[error("Download task for {url} did not report back")]
    Lost { url: String },
}

/// Outcome of a download batch
#[derive(Debug, Default)]
pub struct DownloadReport {
    /// Source URL to the file written for it
    pub written: BTreeMap<String, PathBuf>,

    /// Source URL to the reason it was skipped
    pub failures: BTreeMap<String, DownloadError>,
}

/// Downloads image bytes through a bounded pool and writes one file per URL
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    client: Client,
    workers: usize,
    extension: String,
    start_jitter: Duration,
}

impl ImageDownloader {
    /// Creates a downloader
    ///
    /// # Arguments
    ///
    /// * `client` - HTTP client used for every image
    /// * `workers` - Maximum downloads in flight
    /// * `extension` - File extension for written images (from the MIME subtype)
    pub fn new(client: Client, workers: usize, extension: impl Into<String>) -> Self {
        Self {
            client,
            workers,
            extension: extension.into(),
            start_jitter: Duration::ZERO,
        }
    }

    /// Adds a random pause of up to `max` before each download
    pub fn with_start_jitter(mut self, max: Duration) -> Self {
        self.start_jitter = max;
        self
    }

    /// Downloads every URL into `destination`
    ///
    /// The destination is created (if absent) before any worker starts, and
    /// failing to create it is the only error returned. Per-image failures
    /// are collected in the report.
    pub async fn download_all<I>(
        &self,
        urls: I,
        destination: &Path,
    ) -> Result<DownloadReport>
    where
        I: IntoIterator<Item = String>,
    {
        ensure_dir(destination).await?;

        let urls: BTreeSet<String> = urls.into_iter().collect();
        tracing::info!(
            "Downloading {} images into {} with {} workers",
            urls.len(),
            destination.display(),
            self.workers
        );

        let client = self.client.clone();
        let extension = self.extension.clone();
        let directory = destination.to_path_buf();
        let start_jitter = self.start_jitter;

        let outcomes = run_bounded(urls.iter().cloned().collect(), self.workers, move |url: String| {
            let client = client.clone();
            let extension = extension.clone();
            let directory = directory.clone();
            async move {
                jitter(start_jitter).await;
                let result = download_image(&client, &url, &directory, &extension).await;
                (url, result)
            }
        })
        .await;

        let mut report = DownloadReport::default();
        for (url, result) in outcomes {
            match result {
                Ok(path) => {
                    report.written.insert(url, path);
                }
                Err(e) => {
                    tracing::error!("{}", e);
                    report.failures.insert(url, e);
                }
            }
        }

        for url in urls {
            if !report.written.contains_key(&url) && !report.failures.contains_key(&url) {
                let lost = DownloadError::Lost { url: url.clone() };
                tracing::error!("{}", lost);
                report.failures.insert(url, lost);
            }
        }

        tracing::info!(
            "Downloads finished: {} written, {} failed",
            report.written.len(),
            report.failures.len()
        );

        Ok(report)
    }
}

/// Creates `path` and its parents if they do not exist yet
pub async fn ensure_dir(path: &Path) -> Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| HarvestError::Io {
            path: path.display().to_string(),
            source,
        })
}

/// Fetches one image and writes it under `directory`
pub async fn download_image(
    client: &Client,
    url: &str,
    directory: &Path,
    extension: &str,
) -> std::result::Result<PathBuf, DownloadError> {
    let transport = |e: reqwest::Error| DownloadError::Transport {
        url: url.to_string(),
        message: e.to_string(),
    };

    let response = client.get(url).send().await.map_err(transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let bytes = response.bytes().await.map_err(transport)?;

    let path = directory.join(artifact_file_name(url, extension));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| DownloadError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    tracing::info!("Downloaded: {}", path.display());
    Ok(path)
}
