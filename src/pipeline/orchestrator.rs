// src/pipeline/orchestrator.rs

//! Run orchestration: one job per source, a bounded pool of page workers and
//! a single merge loop that owns all job state and the aggregate.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::task::{Id, JoinError, JoinHandle, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Progress, ProgressSnapshot, ResultAggregate, RunStatus};
use crate::error::{AppError, FetchError, Result};
use crate::models::{
    ClassifiedRecord, CrawlJob, DateRange, IndustryCategory, RunConfig, SourceDescriptor,
    SourceRegistry, SourceSelection,
};
use crate::services::{Classifier, PageExtractor, PageFetcher, PageRequest, PageYield};

/// Parameters of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRequest {
    pub date_range: DateRange,

    /// Categories to keep; empty keeps all
    #[serde(default)]
    pub categories: Vec<IndustryCategory>,

    #[serde(default)]
    pub selection: SourceSelection,
}

impl RunRequest {
    pub fn new(date_range: DateRange) -> Self {
        Self {
            date_range,
            categories: Vec::new(),
            selection: SourceSelection::all(),
        }
    }

    pub fn with_categories(mut self, categories: Vec<IndustryCategory>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_selection(mut self, selection: SourceSelection) -> Self {
        self.selection = selection;
        self
    }

    fn wants(&self, category: IndustryCategory) -> bool {
        self.categories.is_empty() || self.categories.contains(&category)
    }
}

/// A run started in the background.
pub struct RunHandle {
    progress: Arc<Progress>,
    cancel: CancellationToken,
    task: JoinHandle<ResultAggregate>,
}

impl RunHandle {
    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Request cancellation. Records merged so far are kept.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that cancels this run, e.g. for a signal handler.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub async fn wait(self) -> Result<ResultAggregate> {
        self.task
            .await
            .map_err(|e| AppError::RunAborted(e.to_string()))
    }
}

// --- Page tasks ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageKind {
    Entry,
    Listing,
    Section,
}

#[derive(Debug, Clone)]
struct PageTask {
    job: usize,
    url: Url,
    kind: PageKind,
}

struct PageOutcome {
    task: PageTask,
    /// Final URL and extraction output
    result: std::result::Result<(Url, PageYield), FetchError>,
}

struct JobState {
    job: CrawlJob,
    deadline: Option<Instant>,
    /// Pages queued or in flight
    pending: usize,
    /// Pages ever queued, entry included
    scheduled: usize,
    visited: HashSet<Url>,
    settled: bool,
}

impl JobState {
    fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Mutable state of one run, owned by the merge loop.
struct RunState<'a> {
    config: &'a RunConfig,
    classifier: &'a Classifier,
    request: &'a RunRequest,
    progress: &'a Progress,
    jobs: Vec<JobState>,
    queue: VecDeque<PageTask>,
    aggregate: ResultAggregate,
}

impl<'a> RunState<'a> {
    fn new(
        sources: Vec<Arc<SourceDescriptor>>,
        config: &'a RunConfig,
        classifier: &'a Classifier,
        request: &'a RunRequest,
        progress: &'a Progress,
    ) -> Self {
        let mut jobs = Vec::with_capacity(sources.len());
        let mut queue = VecDeque::with_capacity(sources.len());
        for (id, source) in sources.into_iter().enumerate() {
            let url = source.entry_url();
            queue.push_back(PageTask {
                job: id,
                url: url.clone(),
                kind: PageKind::Entry,
            });
            jobs.push(JobState {
                job: CrawlJob::new(id, source, request.date_range),
                deadline: None,
                pending: 1,
                scheduled: 1,
                visited: HashSet::from([url]),
                settled: false,
            });
        }

        Self {
            config,
            classifier,
            request,
            progress,
            jobs,
            queue,
            aggregate: ResultAggregate::new(request.date_range, request.categories.clone()),
        }
    }

    /// Next page worth fetching, with its job's deadline and source.
    ///
    /// Pages of finished or expired jobs are dropped here.
    fn next_task(&mut self) -> Option<(PageTask, Instant, Arc<SourceDescriptor>)> {
        let budget = Duration::from_secs(self.config.job_timeout_secs);
        while let Some(task) = self.queue.pop_front() {
            let idx = task.job;
            let state = &mut self.jobs[idx];
            let deadline = *state.deadline.get_or_insert_with(|| Instant::now() + budget);

            if state.expired() {
                state.job.time_out();
            }
            if state.job.status.is_terminal() {
                state.pending -= 1;
                self.settle(idx);
                continue;
            }

            if task.kind == PageKind::Entry {
                state.job.start();
                self.progress.source_attempted();
                self.aggregate.metadata.sources_attempted += 1;
            }
            let source = Arc::clone(&state.job.source);
            return Some((task, deadline, source));
        }
        None
    }

    fn merge(&mut self, outcome: PageOutcome) {
        let PageOutcome { task, result } = outcome;
        let idx = task.job;
        match result {
            Ok((final_url, page)) => self.merge_page(&task, final_url, page),
            // Only produced while the run is being cancelled.
            Err(FetchError::Cancelled) => {}
            Err(err) => self.page_failed(&task, err),
        }
        self.jobs[idx].pending -= 1;
        self.settle(idx);
    }

    fn merge_page(&mut self, task: &PageTask, final_url: Url, page: PageYield) {
        let state = &mut self.jobs[task.job];
        let metadata = &mut self.aggregate.metadata;
        state.job.pages_fetched += 1;
        metadata.pages_fetched += 1;
        if page.degraded {
            metadata.degraded_pages += 1;
        }
        state.visited.insert(final_url);

        let PageYield {
            records,
            next_page,
            sections,
            ..
        } = page;

        let mut added = 0;
        for raw in records {
            state.job.records_found += 1;
            if !self.request.date_range.admits(raw.publication_date) {
                self.aggregate.metadata.records_filtered += 1;
                continue;
            }
            let category = self.classifier.classify(&raw);
            if !self.request.wants(category) {
                self.aggregate.metadata.records_filtered += 1;
                continue;
            }
            if self
                .aggregate
                .merge(ClassifiedRecord::new(raw, category, &state.job))
            {
                added += 1;
            }
        }
        self.progress.records_added(added);

        if state.expired() {
            debug!("[{}] time budget spent on {}", state.job.source.id, task.url);
            state.job.time_out();
            return;
        }

        // Follow-ups: the next listing page, then sections from the entry page.
        let mut follow_ups = Vec::new();
        if let Some(next) = next_page {
            follow_ups.push((next, PageKind::Listing));
        }
        if task.kind == PageKind::Entry {
            follow_ups.extend(
                sections
                    .into_iter()
                    .filter(|url| !state.visited.contains(url))
                    .take(self.config.max_sections_per_source)
                    .map(|url| (url, PageKind::Section)),
            );
        }

        let mut accepted = Vec::new();
        for (url, kind) in follow_ups {
            if state.scheduled >= self.config.max_pages_per_source {
                debug!("[{}] page budget reached", state.job.source.id);
                break;
            }
            if state.visited.insert(url.clone()) {
                state.scheduled += 1;
                state.pending += 1;
                accepted.push(PageTask {
                    job: task.job,
                    url,
                    kind,
                });
            }
        }
        for follow_up in accepted.into_iter().rev() {
            self.queue.push_front(follow_up);
        }
    }

    fn page_failed(&mut self, task: &PageTask, err: FetchError) {
        let state = &mut self.jobs[task.job];
        state.job.pages_failed += 1;
        self.aggregate.metadata.pages_failed += 1;

        if task.kind == PageKind::Entry {
            warn!("[{}] {} failed: {err}", state.job.source.id, task.url);
            state.job.fail(err);
        } else {
            debug!("[{}] follow-up {} failed: {err}", state.job.source.id, task.url);
            if state.expired() {
                state.job.time_out();
            }
        }
    }

    /// Close a job once no page of it is queued or in flight.
    fn settle(&mut self, idx: usize) {
        let state = &mut self.jobs[idx];
        if state.settled || state.pending > 0 {
            return;
        }
        state.settled = true;
        state.job.succeed();

        let job = &state.job;
        let failed = job.status.is_failure();
        if failed {
            self.aggregate.metadata.sources_failed += 1;
            self.aggregate.record_failure(job);
        } else {
            self.aggregate.metadata.sources_succeeded += 1;
        }
        self.progress.source_completed(failed);
        debug!(
            "[{}] {:?}: {} pages, {} failed, {} records",
            job.source.id, job.status, job.pages_fetched, job.pages_failed, job.records_found
        );
    }

    /// Route a panicked page worker through the normal failure path.
    fn crashed(&mut self, task: PageTask, err: JoinError) {
        error!("[{}] worker for {} crashed: {err}", self.jobs[task.job].job.source.id, task.url);
        self.merge(PageOutcome {
            task,
            result: Err(FetchError::WorkerCrashed(err.to_string())),
        });
    }

    fn finish(mut self, cancelled: bool) -> ResultAggregate {
        let status = if cancelled {
            let abandoned = self.jobs.iter().filter(|s| !s.settled).count();
            self.aggregate.metadata.sources_abandoned = abandoned;
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };

        self.aggregate.finalize(status);
        self.progress.finish(status);
        self.aggregate
    }
}

// --- Orchestrator ---

/// Dispatches crawl jobs over the selected sources and merges their results.
#[derive(Clone)]
pub struct Orchestrator {
    registry: Arc<SourceRegistry>,
    config: Arc<RunConfig>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<PageExtractor>,
    classifier: Arc<Classifier>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<SourceRegistry>,
        config: RunConfig,
        fetcher: Arc<dyn PageFetcher>,
        extractor: Arc<PageExtractor>,
        classifier: Arc<Classifier>,
    ) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            fetcher,
            extractor,
            classifier,
        }
    }

    fn plan(&self, request: &RunRequest) -> Result<Vec<Arc<SourceDescriptor>>> {
        let sources = request.selection.apply(&self.registry);
        if sources.is_empty() {
            return Err(AppError::EmptySelection);
        }
        Ok(sources)
    }

    /// Run to completion or until `cancel` fires.
    pub async fn run(&self, request: RunRequest, cancel: CancellationToken) -> Result<ResultAggregate> {
        let sources = self.plan(&request)?;
        let progress = Progress::new(sources.len());
        Ok(self.execute(sources, &request, &cancel, &progress).await)
    }

    /// Start a run on the current Tokio runtime.
    pub fn start(&self, request: RunRequest) -> Result<RunHandle> {
        let sources = self.plan(&request)?;
        let progress = Arc::new(Progress::new(sources.len()));
        let cancel = CancellationToken::new();

        let this = self.clone();
        let task_progress = Arc::clone(&progress);
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            this.execute(sources, &request, &task_cancel, &task_progress)
                .await
        });

        Ok(RunHandle {
            progress,
            cancel,
            task,
        })
    }

    async fn execute(
        &self,
        sources: Vec<Arc<SourceDescriptor>>,
        request: &RunRequest,
        cancel: &CancellationToken,
        progress: &Progress,
    ) -> ResultAggregate {
        info!(
            "Crawling {} sources for {}..{}",
            sources.len(),
            request.date_range.from,
            request.date_range.to
        );

        let mut state = RunState::new(sources, &self.config, &self.classifier, request, progress);
        let limit = self.config.max_concurrent.max(1);
        let mut workers: JoinSet<PageOutcome> = JoinSet::new();
        // Tasks in flight, so a crashed worker can be charged to its job.
        let mut in_flight: HashMap<Id, PageTask> = HashMap::new();

        let cancelled = loop {
            while !cancel.is_cancelled() && workers.len() < limit {
                let Some((task, deadline, source)) = state.next_task() else {
                    break;
                };
                let id = self.spawn_page(&mut workers, task.clone(), deadline, source, cancel);
                in_flight.insert(id, task);
            }

            if workers.is_empty() {
                break cancel.is_cancelled();
            }

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break true,
                joined = workers.join_next_with_id() => match joined {
                    Some(Ok((id, outcome))) => {
                        in_flight.remove(&id);
                        state.merge(outcome);
                    }
                    Some(Err(err)) => match in_flight.remove(&err.id()) {
                        Some(task) => state.crashed(task, err),
                        None => error!("untracked page worker failed: {err}"),
                    },
                    None => {}
                },
            }
        };

        if cancelled {
            workers.abort_all();
            info!("Run cancelled; keeping {} merged records", state.aggregate.len());
        }
        state.finish(cancelled)
    }

    fn spawn_page(
        &self,
        workers: &mut JoinSet<PageOutcome>,
        task: PageTask,
        deadline: Instant,
        source: Arc<SourceDescriptor>,
        cancel: &CancellationToken,
    ) -> Id {
        let fetcher = Arc::clone(&self.fetcher);
        let extractor = Arc::clone(&self.extractor);
        let cancel = cancel.clone();

        workers.spawn(async move {
            let request = PageRequest {
                source,
                url: task.url.clone(),
            };
            let fetched = tokio::time::timeout_at(deadline, fetcher.fetch(&request, &cancel))
                .await
                .unwrap_or(Err(FetchError::Timeout));
            let result = fetched.map(|page| {
                let yielded = extractor.extract(&page.body, &page.url, &request.source);
                (page.url, yielded)
            });
            PageOutcome { task, result }
        })
        .id()
    }
}
