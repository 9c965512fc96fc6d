//! Page and byte fetchers
//!
//! This module owns the two network boundaries of the harvester:
//! - Rendering a page through a headless browser so client-side markup is present
//! - Building the plain HTTP client used for image bytes
//!
//! Rendering sits behind the [`RenderedFetcher`] trait so stages can be driven
//! by something other than a real browser.

use crate::config::{BrowserConfig, DownloadConfig};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeLaunchConfig};
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Reasons a single render attempt could not produce markup
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The browser process could not be started
    #[error("browser launch failed: {0}")]
    Launch(String),

    /// Navigation or content retrieval failed
    #[error("navigation failed: {0}")]
    Navigation(String),
}

/// Turns a URL into fully rendered markup
///
/// Each call is one attempt. Implementations acquire whatever rendering
/// resource they need for the call and release it before returning, on the
/// error path too. Dropping the returned future must not leak it either.
#[async_trait]
pub trait RenderedFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Chrome-backed fetcher that launches one browser per attempt
#[derive(Debug, Clone)]
pub struct ChromiumFetcher {
    headless: bool,
    settle_delay: Duration,
}

impl ChromiumFetcher {
    pub fn new(browser: &BrowserConfig, settle_delay: Duration) -> Self {
        Self {
            headless: browser.headless,
            settle_delay,
        }
    }

    /// Launch settings for one attempt, using `profile` as the user data dir
    fn launch_config(&self, profile: &Path) -> Result<ChromeLaunchConfig, FetchError> {
        let mut builder = ChromeLaunchConfig::builder().user_data_dir(profile);
        if !self.headless {
            builder = builder.with_head();
        }
        builder.build().map_err(FetchError::Launch)
    }

    /// Launches a browser on a fresh profile and starts driving its CDP event stream
    async fn launch(&self) -> Result<BrowserSession, FetchError> {
        let profile = new_profile_dir()?;
        let launch_config = self.launch_config(profile.path())?;

        let (browser, mut handler) = Browser::launch(launch_config)
            .await
            .map_err(|e| FetchError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(BrowserSession {
            browser,
            handler_task,
            _profile: profile,
        })
    }

    async fn load(&self, browser: &Browser, url: &str) -> Result<String, FetchError> {
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        // Crude proxy for "client-side rendering has finished"
        tokio::time::sleep(self.settle_delay).await;

        let content = page
            .content()
            .await
            .map_err(|e| FetchError::Navigation(e.to_string()));

        if let Err(e) = page.close().await {
            tracing::debug!("Failed to close page for {}: {}", url, e);
        }

        content
    }
}

#[async_trait]
impl RenderedFetcher for ChromiumFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut session = self.launch().await?;
        let rendered = self.load(&session.browser, url).await;
        session.shutdown(url).await;
        rendered
    }
}

/// A running browser plus the task pumping its event stream
///
/// Dropping the session without [`BrowserSession::shutdown`] (for example when
/// an attempt deadline cancels the fetch) stops the event task, and
/// chromiumoxide kills the child process when the browser is dropped.
///
/// Each session owns its Chrome profile directory. Concurrent browsers on
/// one profile trip Chrome's profile lock, so the directory is never shared
/// and is removed once the session is dropped. Field order matters: the
/// browser goes first so the process is gone before its profile is deleted.
struct BrowserSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    _profile: TempDir,
}

impl BrowserSession {
    async fn shutdown(&mut self, url: &str) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser after {}: {}", url, e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::debug!("Browser process did not exit cleanly after {}: {}", url, e);
        }
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

/// Creates an empty, uniquely named Chrome profile directory
fn new_profile_dir() -> Result<TempDir, FetchError> {
    tempfile::Builder::new()
        .prefix("catalog-harvest-profile-")
        .tempdir()
        .map_err(|e| FetchError::Launch(format!("cannot create browser profile: {}", e)))
}

/// Builds the HTTP client used for image downloads
///
/// # Arguments
///
/// * `config` - The download configuration (timeout and user agent)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &DownloadConfig) -> Result<Client, reqwest::Error> {
    let user_agent = config.user_agent.clone().unwrap_or_else(|| {
        format!(
            "{}/{}",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION")
        )
    });

    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}
