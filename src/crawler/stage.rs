//! One pipeline stage: fetch-with-retry over a batch of URLs
//!
//! A stage deduplicates its inputs, runs [`fetch_with_retry`] for each of them
//! through a bounded worker pool, and merges what comes back into a
//! [`StageReport`]. A URL that exhausts its retries is recorded as a failure
//! and never affects its siblings.

use crate::crawler::fetcher::RenderedFetcher;
use crate::crawler::retry::{fetch_with_retry, Extractor, RetryPolicy, TaskOutcome};
use crate::crawler::scheduler::{jitter, run_bounded};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-input outcome of a stage, owned by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StageReport {
    /// Extracted URLs for every input that met its threshold
    pub successes: BTreeMap<String, BTreeSet<String>>,

    /// Inputs that exhausted their retries
    pub failures: BTreeSet<String>,
}

impl StageReport {
    /// Number of distinct inputs accounted for
    pub fn processed(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Deduplicated union of every successful extraction
    pub fn output(&self) -> BTreeSet<String> {
        self.successes.values().flatten().cloned().collect()
    }
}

/// Runs one stage of the harvest
pub struct StageRunner {
    name: &'static str,
    fetcher: Arc<dyn RenderedFetcher>,
    extractor: Extractor,
    policy: RetryPolicy,
    workers: usize,
    start_jitter: Duration,
}

impl StageRunner {
    /// Creates a stage runner
    ///
    /// # Arguments
    ///
    /// * `name` - Stage label used in log lines
    /// * `fetcher` - Rendering agent shared by all workers
    /// * `extractor` - Turns rendered markup into URLs
    /// * `policy` - Attempt budget and success threshold
    /// * `workers` - Maximum URLs in flight
    pub fn new(
        name: &'static str,
        fetcher: Arc<dyn RenderedFetcher>,
        extractor: Extractor,
        policy: RetryPolicy,
        workers: usize,
    ) -> Self {
        Self {
            name,
            fetcher,
            extractor,
            policy,
            workers,
            start_jitter: Duration::ZERO,
        }
    }

    /// Adds a random pause of up to `max` before each URL's first attempt
    pub fn with_start_jitter(mut self, max: Duration) -> Self {
        self.start_jitter = max;
        self
    }

    /// Processes every input URL and returns once all of them are settled
    ///
    /// Duplicate inputs are processed once. The report accounts for every
    /// distinct input, either as a success or as a failure.
    pub async fn run<I>(&self, urls: I) -> StageReport
    where
        I: IntoIterator<Item = String>,
    {
        let inputs: BTreeSet<String> = urls.into_iter().collect();
        let started = Instant::now();

        tracing::info!(
            "Stage '{}' starting: {} URLs, {} workers",
            self.name,
            inputs.len(),
            self.workers
        );

        let fetcher = Arc::clone(&self.fetcher);
        let extractor = Arc::clone(&self.extractor);
        let policy = self.policy.clone();
        let start_jitter = self.start_jitter;

        let outcomes = run_bounded(
            inputs.iter().cloned().collect(),
            self.workers,
            move |url: String| {
                let fetcher = Arc::clone(&fetcher);
                let extractor = Arc::clone(&extractor);
                let policy = policy.clone();
                async move {
                    jitter(start_jitter).await;
                    let outcome = fetch_with_retry(&url, fetcher.as_ref(), &extractor, &policy).await;
                    (url, outcome)
                }
            },
        )
        .await;

        let mut report = StageReport::default();
        for (url, outcome) in outcomes {
            match outcome {
                TaskOutcome::Success { links, attempts } => {
                    tracing::debug!(
                        "[{}] {} succeeded after {} attempt(s) with {} URLs",
                        self.name,
                        url,
                        attempts,
                        links.len()
                    );
                    report.successes.insert(url, links);
                }
                TaskOutcome::Exhausted(exhausted) => {
                    tracing::error!("[{}] FAILED TO FETCH URL: {}", self.name, exhausted.url);
                    report.failures.insert(url);
                }
            }
        }

        // Inputs whose worker died never reported back
        for url in &inputs {
            if !report.successes.contains_key(url) && !report.failures.contains(url) {
                tracing::error!("[{}] No outcome recorded for {}", self.name, url);
                report.failures.insert(url.clone());
            }
        }

        tracing::info!(
            "Stage '{}' finished in {:?}: {} processed, {} succeeded, {} failed, {} unique URLs extracted",
            self.name,
            started.elapsed(),
            report.processed(),
            report.successes.len(),
            report.failures.len(),
            report.output().len()
        );

        report
    }
}
