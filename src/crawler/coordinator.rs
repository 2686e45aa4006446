//! Crawler coordinator - main run orchestration logic
//!
//! This module contains the run loop that ties the pipeline together:
//! - Seeding the walker with the configured start URLs
//! - Spawning page and document tasks on one `JoinSet`
//! - Feeding admitted next-page links back into the walker
//! - Recording every download outcome in the metadata table
//! - Handling cancellation and sink failures

use crate::config::{validate, Config};
use crate::crawler::downloader::{DownloadCoordinator, DownloadOutcome};
use crate::crawler::fetcher::{Fetch, HttpFetcher};
use crate::crawler::walker::{DocumentLinkRecord, FrontierWalker, PageError, PageResult};
use crate::output::{MetadataSink, RecordDecision, RunSummary};
use crate::state::Admission;
use crate::storage::ArtifactStore;
use crate::url::parse_http_url;
use crate::SweepError;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::{Id, JoinSet};
use tracing::{debug, error, info, warn};
use url::Url;

const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Shared stop signal
///
/// Once set, no new page or document fetch starts. Fetches already on the
/// wire run to completion or time out on their own.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a spawned task hands back to the run loop
enum TaskOutput {
    Page {
        url: Url,
        result: Result<PageResult, PageError>,
    },
    Document(DownloadOutcome),
    /// The task saw the cancel flag and produced nothing
    Cancelled,
}

/// Work a spawned task carries, kept until the task is joined
enum TaskKind {
    Page(Url),
    Document(Url),
}

/// Tasks of one run, keyed by task id so a panicked task is still accounted
#[derive(Default)]
struct RunTasks {
    set: JoinSet<TaskOutput>,
    kinds: HashMap<Id, TaskKind>,
}

impl RunTasks {
    fn spawn<F>(&mut self, kind: TaskKind, task: F)
    where
        F: std::future::Future<Output = TaskOutput> + Send + 'static,
    {
        let handle = self.set.spawn(task);
        self.kinds.insert(handle.id(), kind);
    }
}

/// Main coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<dyn Fetch>,
    store: Arc<ArtifactStore>,
    cancel: CancelFlag,
}

impl Coordinator {
    /// Creates a coordinator backed by the HTTP fetcher
    ///
    /// Validates the configuration and prepares the output root and the
    /// artifact directory. Nothing is fetched yet.
    pub fn new(config: Config) -> Result<Self, SweepError> {
        validate(&config)?;
        let cancel = CancelFlag::new();
        let fetcher = Arc::new(HttpFetcher::new(&config, cancel.clone())?);
        Self::build(config, fetcher, cancel)
    }

    /// Creates a coordinator with a custom fetch layer
    pub fn with_fetcher(config: Config, fetcher: Arc<dyn Fetch>) -> Result<Self, SweepError> {
        validate(&config)?;
        Self::build(config, fetcher, CancelFlag::new())
    }

    fn build(
        config: Config,
        fetcher: Arc<dyn Fetch>,
        cancel: CancelFlag,
    ) -> Result<Self, SweepError> {
        std::fs::create_dir_all(config.output_root())?;

        let expiry = config
            .crawler
            .artifact_expiry_days
            .map(|days| Duration::from_secs(days.saturating_mul(SECONDS_PER_DAY)));
        let store = ArtifactStore::open(&config.files_dir(), expiry)?;

        info!(
            output = %config.output_root().display(),
            files = %store.root().display(),
            "Output directories ready"
        );

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            store: Arc::new(store),
            cancel,
        })
    }

    /// Flag that stops the run when set
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Runs the pipeline until every branch and download has finished
    ///
    /// Only sink failures and setup problems are returned as errors; page and
    /// document failures are counted in the summary.
    pub async fn run(&self) -> Result<RunSummary, SweepError> {
        let started = Instant::now();

        let start_urls = self
            .config
            .start_urls
            .iter()
            .map(|url| parse_http_url(url))
            .collect::<Result<Vec<_>, _>>()?;

        let sink = MetadataSink::open(&self.config.metadata_path())?;

        let walker = Arc::new(FrontierWalker::new(
            self.fetcher.clone(),
            self.config.crawler.file_extension.clone(),
            self.config.crawler.max_pages,
            self.config.crawler.allowed_domains.clone(),
        ));
        let downloader = Arc::new(DownloadCoordinator::new(
            self.fetcher.clone(),
            self.store.clone(),
        ));

        info!(
            start_urls = start_urls.len(),
            metadata = %sink.path().display(),
            "Starting run"
        );

        let mut summary = RunSummary::new();
        let mut tasks = RunTasks::default();

        for url in start_urls {
            let admission = walker.seed(&url);
            if admission.is_admitted() {
                self.spawn_page(&mut tasks, &walker, url);
            } else {
                info!(url = %url, cause = admission.as_str(), "Start URL not scheduled");
            }
        }

        while let Some(joined) = tasks.set.join_next_with_id().await {
            let output = match joined {
                Ok((id, output)) => {
                    tasks.kinds.remove(&id);
                    output
                }
                Err(e) => {
                    let kind = tasks.kinds.remove(&e.id());
                    if e.is_panic() {
                        match kind {
                            Some(TaskKind::Page(url)) => {
                                summary.pages_failed += 1;
                                error!(
                                    url = %url,
                                    error = %e,
                                    "Page task panicked, pagination terminated"
                                );
                            }
                            Some(TaskKind::Document(url)) => {
                                summary.documents_attempted += 1;
                                summary.documents_failed += 1;
                                error!(url = %url, error = %e, "Document task panicked");
                            }
                            None => error!(error = %e, "Task panicked"),
                        }
                    }
                    continue;
                }
            };

            match output {
                TaskOutput::Page {
                    url: _,
                    result: Ok(page),
                } => {
                    summary.pages_visited += 1;

                    for record in &page.documents {
                        self.spawn_document(&mut tasks, &downloader, record.clone());
                    }
                    self.follow_next_page(&mut tasks, &walker, &page);
                }
                TaskOutput::Page { url, result: Err(e) } => {
                    summary.pages_failed += 1;
                    warn!(url = %url, error = %e, "Page failed, pagination terminated");
                }
                TaskOutput::Document(outcome) => {
                    summary.documents_attempted += 1;
                    if outcome.is_reused() {
                        summary.documents_reused += 1;
                    } else if outcome.is_success() {
                        summary.documents_downloaded += 1;
                    } else {
                        summary.documents_failed += 1;
                    }

                    match sink.record(&outcome) {
                        Ok(RecordDecision::Written) => summary.rows_written += 1,
                        Ok(RecordDecision::Skipped) => {}
                        Err(e) => {
                            error!(error = %e, "Metadata sink failed, aborting run");
                            self.cancel.cancel();
                            tasks.set.abort_all();
                            return Err(e.into());
                        }
                    }
                }
                TaskOutput::Cancelled => {}
            }
        }

        sink.close()?;

        if self.cancel.is_cancelled() {
            warn!("Run cancelled before completion");
        }

        summary.documents_found = walker.documents_yielded();
        debug!(
            pages_admitted = walker.pages_admitted(),
            documents_yielded = summary.documents_found,
            "Frontier exhausted"
        );

        summary.duration = started.elapsed();
        summary.log();
        Ok(summary)
    }

    fn spawn_page(&self, tasks: &mut RunTasks, walker: &Arc<FrontierWalker>, url: Url) {
        let walker = walker.clone();
        let cancel = self.cancel.clone();

        tasks.spawn(TaskKind::Page(url.clone()), async move {
            if cancel.is_cancelled() {
                return TaskOutput::Cancelled;
            }
            let result = walker.visit(&url).await;
            if result.is_err() && cancel.is_cancelled() {
                return TaskOutput::Cancelled;
            }
            TaskOutput::Page { url, result }
        });
    }

    fn spawn_document(
        &self,
        tasks: &mut RunTasks,
        downloader: &Arc<DownloadCoordinator>,
        record: DocumentLinkRecord,
    ) {
        if self.cancel.is_cancelled() {
            return;
        }

        let downloader = downloader.clone();
        let cancel = self.cancel.clone();

        tasks.spawn(TaskKind::Document(record.url.clone()), async move {
            if cancel.is_cancelled() {
                return TaskOutput::Cancelled;
            }
            let outcome = downloader.fetch(&record).await;
            if !outcome.is_success() && cancel.is_cancelled() {
                return TaskOutput::Cancelled;
            }
            TaskOutput::Document(outcome)
        });
    }

    fn follow_next_page(
        &self,
        tasks: &mut RunTasks,
        walker: &Arc<FrontierWalker>,
        page: &PageResult,
    ) {
        let Some(next) = &page.next_page else {
            info!(url = %page.final_url, cause = "no_next_link", "Pagination terminated");
            return;
        };

        if self.cancel.is_cancelled() {
            info!(url = %page.final_url, cause = "cancelled", "Pagination terminated");
            return;
        }

        match walker.admit(next) {
            Admission::Admitted => {
                debug!(from = %page.final_url, next = %next, "Following next page");
                self.spawn_page(tasks, walker, next.clone());
            }
            other => info!(
                url = %page.final_url,
                next = %next,
                cause = other.as_str(),
                "Pagination terminated"
            ),
        }
    }
}
