//! Crawl orchestrator
//!
//! Drives fetch + extract over every enumerated page with at most K fetches in
//! flight, merges each page into the shared `AggregationStore`, and persists
//! the aggregate once every task has settled.
//!
//! Per page: `Pending -> Fetching -> Extracting -> Merged`, or
//! `Fetching -> Failed` once the retry policy gives up. A resumed run skips
//! coordinates already present (`Resumed`), and a cancelled run never
//! dispatches the pages still waiting for a slot (`Cancelled`).

use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, trace, warn};
use uuid::Uuid;

use super::aggregation_store::AggregationStore;
use super::retry_policy::RetryPolicy;
use super::run_summary::{FailedPage, RunSummary};
use crate::domain::{PageTarget, RunState, TaskState};
use crate::infrastructure::config::{ConfigError, CrawlerConfig};
use crate::infrastructure::http_client::{FailureReason, FetchResult, HttpPageFetcher, PageFetcher};
use crate::infrastructure::parsing::{MetricExtractor, ParsingError};
use crate::infrastructure::persistence::{PersistenceError, Persister};

#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid extraction selectors: {0}")]
    Extraction(#[from] ParsingError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Failed to load previous output for resume: {0}")]
    Resume(#[source] PersistenceError),

    /// The run itself finished; only the final save failed. The aggregate is
    /// still held by the orchestrator's store.
    #[error("Failed to persist aggregate: {source}")]
    Persist {
        #[source]
        source: PersistenceError,
        summary: Box<RunSummary>,
    },
}

/// Result of one page task
#[derive(Debug)]
enum PageOutcome {
    Merged,
    Failed(FailedPage),
    Cancelled,
}

/// Shared, read-only inputs of a page task
struct PageWorker {
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<MetricExtractor>,
    store: Arc<AggregationStore>,
    retry: RetryPolicy,
}

impl PageWorker {
    async fn process(&self, target: &PageTarget) -> PageOutcome {
        let mut state = TaskState::Pending;
        advance(&mut state, TaskState::Fetching, target);

        let mut attempts = 0;
        let content = loop {
            attempts += 1;
            debug!("Fetching {} (attempt {})", target.url, attempts);
            match self.fetcher.fetch(&target.url).await {
                FetchResult::Success { content, .. } => break content,
                FetchResult::Failure(failure) => {
                    if self.retry.should_retry_failure(&failure, attempts) {
                        let delay = self.retry.delay_for(attempts);
                        debug!("Retrying {} in {:?}: {}", target.url, delay, failure.reason);
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    advance(&mut state, TaskState::Failed, target);
                    warn!("Failed to process {}: {}", target.url, failure.reason);
                    return PageOutcome::Failed(FailedPage::new(
                        target.coordinate,
                        target.url.clone(),
                        &failure.reason,
                        attempts,
                    ));
                }
            }
        };

        advance(&mut state, TaskState::Extracting, target);
        let page = self.extractor.extract(&content, target.coordinate);
        let written = self.store.merge(&page);
        advance(&mut state, TaskState::Merged, target);
        info!("Processed {} ({} metrics)", target.url, written);
        PageOutcome::Merged
    }
}

fn advance(state: &mut TaskState, next: TaskState, target: &PageTarget) {
    debug_assert!(state.can_transition_to(next), "illegal transition {state} -> {next}");
    trace!("{} {} -> {}", target.coordinate, state, next);
    *state = next;
}

pub struct Orchestrator {
    config: CrawlerConfig,
    worker: Arc<PageWorker>,
    persister: Persister,
    cancellation: CancellationToken,
}

impl Orchestrator {
    /// Validates `config` and compiles the extraction selectors
    pub fn new(config: CrawlerConfig, fetcher: Arc<dyn PageFetcher>) -> Result<Self, RunError> {
        config.validate()?;
        let extractor = MetricExtractor::with_config(&config.extraction)?;
        let worker = PageWorker {
            fetcher,
            extractor: Arc::new(extractor),
            store: Arc::new(AggregationStore::new()),
            retry: RetryPolicy::from_config(&config.retry),
        };
        let persister = Persister::new(config.output.path.clone());

        Ok(Self {
            config,
            worker: Arc::new(worker),
            persister,
            cancellation: CancellationToken::new(),
        })
    }

    /// Orchestrator fetching over HTTP with the configured worker settings
    pub fn with_http(config: CrawlerConfig) -> Result<Self, RunError> {
        let fetcher = HttpPageFetcher::from_worker_config(&config.workers)?;
        Self::new(config, Arc::new(fetcher))
    }

    /// Uses an externally owned cancellation token
    #[must_use]
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Token that stops dispatch of pages not yet started
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    #[must_use]
    pub fn store(&self) -> Arc<AggregationStore> {
        Arc::clone(&self.worker.store)
    }

    #[must_use]
    pub const fn persister(&self) -> &Persister {
        &self.persister
    }

    /// Saves the current aggregate, e.g. to retry after `RunError::Persist`
    pub async fn save(&self) -> Result<(), PersistenceError> {
        self.persister.save(&self.worker.store.snapshot()).await
    }

    pub async fn run(&self) -> Result<RunSummary, RunError> {
        let run_id = Uuid::new_v4();
        self.run_inner(run_id)
            .instrument(info_span!("crawl_run", %run_id))
            .await
    }

    async fn run_inner(&self, run_id: Uuid) -> Result<RunSummary, RunError> {
        let started = Instant::now();
        let enumerator = self.config.url_enumerator()?;
        let total = enumerator.len();
        let max_concurrent = self.config.workers.max_concurrent;
        info!(
            "🚀 Run {}: {} pages for {}-{} with {} concurrent fetches",
            RunState::Running,
            total,
            enumerator.years().first(),
            enumerator.years().last(),
            max_concurrent
        );

        if self.config.output.resume {
            match self.persister.load_if_exists().await.map_err(RunError::Resume)? {
                Some(previous) => {
                    let seeded = self.worker.store.seed(&previous);
                    info!("Resuming from {:?} with {} entries", self.persister.path(), seeded);
                }
                None => info!("No previous output at {:?}, starting fresh", self.persister.path()),
            }
        }

        let semaphore = Arc::new(Semaphore::new(max_concurrent));
        let mut resumed = 0;
        let mut tasks = FuturesUnordered::new();
        for target in enumerator.iter() {
            if self.config.output.resume && self.worker.store.contains_coordinate(target.coordinate) {
                trace!("{} {} -> {}", target.coordinate, TaskState::Pending, TaskState::Resumed);
                resumed += 1;
                continue;
            }

            let semaphore = Arc::clone(&semaphore);
            let worker = Arc::clone(&self.worker);
            let token = self.cancellation.clone();
            let task_target = target.clone();
            let handle = tokio::spawn(
                async move {
                    let _permit = tokio::select! {
                        biased;
                        () = token.cancelled() => return PageOutcome::Cancelled,
                        permit = semaphore.acquire_owned() => match permit {
                            Ok(permit) => permit,
                            Err(_) => return PageOutcome::Cancelled,
                        },
                    };
                    if token.is_cancelled() {
                        return PageOutcome::Cancelled;
                    }
                    worker.process(&task_target).await
                }
                .in_current_span(),
            );
            tasks.push(async move { (target, handle.await) });
        }

        let checkpoint_every = self.config.output.checkpoint_every;
        let mut succeeded = 0;
        let mut since_checkpoint = 0;
        let mut failed = Vec::new();
        let mut cancelled = 0;

        while let Some((target, joined)) = tasks.next().await {
            match joined {
                Ok(PageOutcome::Merged) => {
                    succeeded += 1;
                    since_checkpoint += 1;
                    if checkpoint_every > 0 && since_checkpoint >= checkpoint_every {
                        since_checkpoint = 0;
                        self.checkpoint().await;
                    }
                }
                Ok(PageOutcome::Failed(page)) => failed.push(page),
                Ok(PageOutcome::Cancelled) => {
                    trace!("{} {} -> {}", target.coordinate, TaskState::Pending, TaskState::Cancelled);
                    cancelled += 1;
                }
                Err(join_error) => {
                    error!("Task for {} aborted: {}", target.url, join_error);
                    failed.push(FailedPage::new(
                        target.coordinate,
                        target.url,
                        &FailureReason::Request(format!("task aborted: {join_error}")),
                        0,
                    ));
                }
            }
        }
        failed.sort_by_key(|page| page.coordinate);

        let state = RunState::settle(failed.len(), cancelled);
        if state == RunState::Cancelled {
            warn!("Run cancelled, {} pages were not dispatched", cancelled);
        }

        let aggregate = self.worker.store.snapshot();
        let summary = RunSummary {
            run_id,
            state,
            total,
            succeeded,
            failed,
            resumed,
            cancelled,
            entries: aggregate.len(),
            elapsed: started.elapsed(),
        };

        if let Err(source) = self.persister.save(&aggregate).await {
            error!("❌ Failed to persist aggregate to {:?}: {}", self.persister.path(), source);
            return Err(RunError::Persist {
                source,
                summary: Box::new(summary),
            });
        }

        info!("✅ {}", summary);
        Ok(summary)
    }

    async fn checkpoint(&self) {
        match self.save().await {
            Ok(()) => debug!("Checkpoint written to {:?}", self.persister.path()),
            Err(e) => warn!("⚠️ Checkpoint failed, continuing: {}", e),
        }
    }
}
