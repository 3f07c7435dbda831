//! Orchestrator — fans jobs out onto a bounded worker pool, fans results
//! back in as one ordered [`IngestionResult`].
//!
//! Every job runs in isolation: a failed or panicking job becomes an
//! errors entry and never disturbs its siblings. Output ordering is
//! job-submission order, not completion order — each job's full result is
//! buffered and placed by awaiting the handles in the order they were
//! spawned, so repeated runs over static content produce byte-stable
//! output regardless of scheduling.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use sourcemill_crawler::Crawler;
use sourcemill_shared::{
    CancelFlag, CrawlConfig, IngestionJob, IngestionRequest, IngestionResult, JobSpec,
    KnowledgeItem, PipelineConfig, RequestId, Result, SourceError,
};

use crate::resolver;

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Side-channel for transport-layer progress display. Not pipeline state:
/// implementations may drive a progress bar or an upload percentage, the
/// orchestrator only reports into it.
pub trait ProgressReporter: Send + Sync {
    /// Called when a job is handed to the worker pool.
    fn job_started(&self, source_id: &str);
    /// Called when a job has settled, with its item and error counts.
    fn job_settled(&self, source_id: &str, items: usize, errors: usize);
    /// Called once the final result is assembled.
    fn done(&self, result: &IngestionResult);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn job_started(&self, _source_id: &str) {}
    fn job_settled(&self, _source_id: &str, _items: usize, _errors: usize) {}
    fn done(&self, _result: &IngestionResult) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// One configured ingestion pipeline. Cheap to construct; the worker pool
/// and fetch limiter are shared by every request run through it.
pub struct Pipeline {
    config: PipelineConfig,
    job_slots: Arc<Semaphore>,
    fetch_slots: Arc<Semaphore>,
}

/// Buffered output of one settled job.
#[derive(Debug, Default)]
struct JobOutput {
    items: Vec<KnowledgeItem>,
    errors: Vec<SourceError>,
}

impl Pipeline {
    /// Create a pipeline with the given limits.
    pub fn new(config: PipelineConfig) -> Self {
        let job_slots = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1) as usize));
        let fetch_slots = Arc::new(Semaphore::new(config.max_fetch_concurrency.max(1) as usize));
        Self {
            config,
            job_slots,
            fetch_slots,
        }
    }

    /// Run one submission to completion. See [`Pipeline::run_with_progress`].
    pub async fn run(&self, request: IngestionRequest) -> Result<IngestionResult> {
        self.run_with_progress(request, &SilentProgress).await
    }

    /// Run one submission, reporting progress into `progress`.
    ///
    /// Returns `Err` only for a structurally malformed request; every
    /// other failure is captured per-source inside the result. The result
    /// is emitted only after every scheduled job has settled — succeeded,
    /// partially succeeded, failed, or been cancelled by the request
    /// timeout (in which case `timed_out` is set and whatever was
    /// produced so far is returned).
    #[instrument(skip_all, fields(files = request.files.len()))]
    pub async fn run_with_progress(
        &self,
        request: IngestionRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<IngestionResult> {
        let request_id = RequestId::new();
        let resolved = resolver::resolve(&request)?;

        let mut errors = resolved.errors;
        if resolved.jobs.is_empty() {
            let result = IngestionResult {
                request_id,
                items: Vec::new(),
                errors,
                timed_out: false,
            };
            progress.done(&result);
            return Ok(result);
        }

        info!(
            %request_id,
            jobs = resolved.jobs.len(),
            workers = self.config.max_concurrent_jobs,
            "scheduling ingestion jobs"
        );

        let cancel = CancelFlag::new();
        let timer = {
            let cancel = cancel.clone();
            let timeout = Duration::from_secs(self.config.request_timeout_secs);
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!("request timeout expired, cancelling in-flight jobs");
                cancel.cancel();
            })
        };

        let mut handles = Vec::with_capacity(resolved.jobs.len());
        for job in resolved.jobs {
            progress.job_started(&job.source_id);

            let source_id = job.source_id.clone();
            let slots = self.job_slots.clone();
            let fetch_slots = self.fetch_slots.clone();
            let crawl_config = self.config.crawl.clone();
            let cancel = cancel.clone();

            let task_source = source_id.clone();
            let handle = tokio::spawn(async move {
                let Ok(_permit) = slots.acquire_owned().await else {
                    return JobOutput::default();
                };
                // Jobs still queued when the deadline hits produce nothing.
                if cancel.is_cancelled() {
                    debug!(source = %task_source, "job skipped after cancellation");
                    return JobOutput::default();
                }
                run_job(job, crawl_config, fetch_slots, &cancel).await
            });

            handles.push((source_id, handle));
        }

        // Fan-in: awaiting in spawn order preserves submission order even
        // though completion order varies.
        let mut items = Vec::new();
        for (source_id, handle) in handles {
            match handle.await {
                Ok(output) => {
                    progress.job_settled(&source_id, output.items.len(), output.errors.len());
                    items.extend(output.items);
                    errors.extend(output.errors);
                }
                Err(e) => {
                    warn!(source = %source_id, error = %e, "job task failed");
                    errors.push(SourceError::unreadable(
                        source_id,
                        format!("job task failed: {e}"),
                    ));
                }
            }
        }

        timer.abort();

        let result = IngestionResult {
            request_id,
            items,
            errors,
            timed_out: cancel.is_cancelled(),
        };

        info!(
            request_id = %result.request_id,
            items = result.items.len(),
            errors = result.errors.len(),
            timed_out = result.timed_out,
            "ingestion complete"
        );

        progress.done(&result);
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Job execution
// ---------------------------------------------------------------------------

/// Run one job to completion, converting its outcome into tagged items and
/// per-source errors. Never returns an error: failure is data here.
async fn run_job(
    job: IngestionJob,
    crawl_config: CrawlConfig,
    fetch_slots: Arc<Semaphore>,
    cancel: &CancelFlag,
) -> JobOutput {
    let IngestionJob {
        source_id,
        team_id,
        spec,
    } = job;

    match spec {
        JobSpec::Document { file_name, bytes } => {
            // PDF parsing is CPU-bound and synchronous; keep it off the
            // async workers.
            let parsed =
                tokio::task::spawn_blocking(move || sourcemill_extract::extract(&file_name, &bytes))
                    .await;

            match parsed {
                Ok(Ok(doc)) => JobOutput {
                    items: vec![KnowledgeItem {
                        title: doc.title,
                        content: doc.content,
                        source_id,
                        team_id,
                    }],
                    errors: Vec::new(),
                },
                Ok(Err(source_error)) => JobOutput {
                    items: Vec::new(),
                    errors: vec![source_error],
                },
                Err(e) => JobOutput {
                    items: Vec::new(),
                    errors: vec![SourceError::unreadable(
                        source_id,
                        format!("extraction task failed: {e}"),
                    )],
                },
            }
        }

        JobSpec::Crawl {
            seed_url,
            page_budget,
        } => {
            let crawler = match Crawler::new(crawl_config) {
                Ok(crawler) => crawler.with_fetch_slots(fetch_slots),
                Err(e) => {
                    return JobOutput {
                        items: Vec::new(),
                        errors: vec![SourceError::unreadable(source_id, e.to_string())],
                    };
                }
            };

            match crawler.crawl(&seed_url, page_budget, cancel).await {
                Ok(outcome) => JobOutput {
                    items: outcome
                        .pages
                        .into_iter()
                        .map(|page| KnowledgeItem {
                            title: page.title,
                            content: page.content,
                            source_id: page.url,
                            team_id: team_id.clone(),
                        })
                        .collect(),
                    errors: outcome.page_errors,
                },
                Err(source_error) => JobOutput {
                    items: Vec::new(),
                    errors: vec![source_error],
                },
            }
        }
    }
}
