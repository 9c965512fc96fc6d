//! Fetch-then-extract with bounded retry
//!
//! A rendered page can come back "thin": the fetch succeeded but the page
//! was blocked or had not finished rendering, so extraction finds too little.
//! That case is retried exactly like a failed fetch. The task gives up after
//! a fixed number of attempts spaced by a fixed delay.

use crate::crawler::fetcher::{FetchError, RenderedFetcher};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Pure function from rendered markup to the URLs it contains
pub type Extractor = Arc<dyn Fn(&str) -> BTreeSet<String> + Send + Sync>;

/// Attempt and acceptance settings for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Fixed pause between consecutive attempts
    pub retry_delay: Duration,

    /// Smallest extracted set that counts as success
    pub min_results: usize,

    /// Upper bound for a single attempt; `None` leaves it to the fetcher
    pub attempt_timeout: Option<Duration>,
}

/// Why a single attempt was rejected
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptError {
    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),

    #[error("found {found} results, need at least {required}")]
    ThresholdNotMet { found: usize, required: usize },

    #[error("attempt exceeded {0:?}")]
    TimedOut(Duration),
}

/// Terminal failure of a URL after its attempt budget ran out
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("retries exhausted for {url} after {attempts} attempts: {last_error}")]
pub struct RetryExhausted {
    pub url: String,
    pub attempts: u32,
    pub last_error: AttemptError,
}

/// Result of running one URL through fetch-then-extract
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The extracted set met the threshold on attempt `attempts`
    Success {
        links: BTreeSet<String>,
        attempts: u32,
    },

    /// Every attempt failed
    Exhausted(RetryExhausted),
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. } => *attempts,
            Self::Exhausted(exhausted) => exhausted.attempts,
        }
    }

    /// Converts into a `Result`, for callers that want `?`
    pub fn into_result(self) -> Result<BTreeSet<String>, RetryExhausted> {
        match self {
            Self::Success { links, .. } => Ok(links),
            Self::Exhausted(exhausted) => Err(exhausted),
        }
    }
}

/// Fetches `url` and extracts from it until the result meets the threshold
///
/// Returns on the first accepted attempt. After `max_attempts` rejected
/// attempts, returns [`TaskOutcome::Exhausted`] carrying the URL and the last
/// rejection. There is no pause after the final attempt.
pub async fn fetch_with_retry(
    url: &str,
    fetcher: &dyn RenderedFetcher,
    extract: &Extractor,
    policy: &RetryPolicy,
) -> TaskOutcome {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        tracing::info!("Fetching {} (attempt {}/{})", url, attempt, max_attempts);

        let error = match attempt_once(url, fetcher, extract, policy).await {
            Ok(links) => {
                tracing::info!("Found {} URLs on {} (attempt {})", links.len(), url, attempt);
                return TaskOutcome::Success {
                    links,
                    attempts: attempt,
                };
            }
            Err(e) => e,
        };

        if attempt >= max_attempts {
            tracing::error!("Giving up on {} after {} attempts: {}", url, attempt, error);
            return TaskOutcome::Exhausted(RetryExhausted {
                url: url.to_string(),
                attempts: attempt,
                last_error: error,
            });
        }

        tracing::warn!(
            "Attempt {}/{} for {} failed, retrying: {}",
            attempt,
            max_attempts,
            url,
            error
        );
        tokio::time::sleep(policy.retry_delay).await;
    }
}

async fn attempt_once(
    url: &str,
    fetcher: &dyn RenderedFetcher,
    extract: &Extractor,
    policy: &RetryPolicy,
) -> Result<BTreeSet<String>, AttemptError> {
    let content = match policy.attempt_timeout {
        Some(limit) => tokio::time::timeout(limit, fetcher.fetch(url))
            .await
            .map_err(|_| AttemptError::TimedOut(limit))??,
        None => fetcher.fetch(url).await?,
    };

    let links = extract(&content);
    if links.len() < policy.min_results {
        return Err(AttemptError::ThresholdNotMet {
            found: links.len(),
            required: policy.min_results,
        });
    }

    Ok(links)
}
