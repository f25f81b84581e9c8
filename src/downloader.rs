use crate::backend::MediaBackend;
use crate::error::DownloaderError;
use crate::types::{ExecutionMode, JobOutcome, ResolvedJob};
use futures::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

pub struct Downloader {
    backend: Arc<dyn MediaBackend>,
    mode: ExecutionMode,
    max_attempts: u32,
    parallel_categories: usize,
    cancel: CancellationToken,
    progress: MultiProgress,
}

impl Downloader {
    pub fn new(backend: Arc<dyn MediaBackend>, mode: ExecutionMode) -> Self {
        Self {
            backend,
            mode,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            parallel_categories: 1,
            cancel: CancellationToken::new(),
            progress: MultiProgress::new(),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Run up to `lanes` categories at once. Jobs inside one category stay
    /// sequential and keep their inter-job delay.
    pub fn with_parallel_categories(mut self, lanes: usize) -> Self {
        self.parallel_categories = lanes.max(1);
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn without_progress(self) -> Self {
        self.progress.set_draw_target(ProgressDrawTarget::hidden());
        self
    }

    /// Runs every job and returns outcomes in job order. Stops early, with
    /// fewer outcomes than jobs, only when cancelled.
    pub async fn download_all(&self, jobs: Vec<ResolvedJob>) -> Vec<JobOutcome> {
        info!(
            "Running {} jobs in {} mode via {}",
            jobs.len(),
            self.mode,
            self.backend.name()
        );
        let lanes = self.lanes(jobs);

        let mut outcomes: Vec<JobOutcome> = if lanes.len() <= 1 {
            match lanes.into_iter().next() {
                Some(lane) => self.run_lane(lane).await,
                None => Vec::new(),
            }
        } else {
            futures::stream::iter(lanes)
                .map(|lane| self.run_lane(lane))
                .buffered(self.parallel_categories)
                .collect::<Vec<_>>()
                .await
                .into_iter()
                .flatten()
                .collect()
        };

        outcomes.sort_by_key(|o| o.job.index);
        outcomes
    }

    fn lanes(&self, jobs: Vec<ResolvedJob>) -> Vec<Vec<ResolvedJob>> {
        if jobs.is_empty() {
            return Vec::new();
        }
        if self.parallel_categories <= 1 {
            return vec![jobs];
        }

        let mut lanes: Vec<(Option<String>, Vec<ResolvedJob>)> = Vec::new();
        for job in jobs {
            match lanes.iter_mut().find(|(category, _)| *category == job.category) {
                Some((_, lane)) => lane.push(job),
                None => lanes.push((job.category.clone(), vec![job])),
            }
        }
        lanes.into_iter().map(|(_, lane)| lane).collect()
    }

    async fn run_lane(&self, lane: Vec<ResolvedJob>) -> Vec<JobOutcome> {
        let total = lane.len();
        let pb = self.progress.add(create_progress_bar(total as u64));
        let mut outcomes = Vec::with_capacity(total);

        for (position, job) in lane.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!("Stop requested, {} jobs in this lane not started", total - position);
                break;
            }
            let throttled = position > 0 && self.mode != ExecutionMode::DryRun;
            if throttled && !self.wait_between_jobs(&job).await {
                warn!(
                    "Stop requested while waiting, {} jobs in this lane not started",
                    total - position
                );
                break;
            }

            pb.set_message(job.url.clone());
            info!(
                "[{}/{}] Starting {} [{}]: {}",
                position + 1,
                total,
                self.mode,
                job.label(),
                job.url
            );
            let outcome = self.execute(job).await;
            info!(
                "[{}/{}] Finished {}: {} ({:.2?})",
                position + 1,
                total,
                outcome.job.url,
                outcome.status,
                outcome.duration
            );
            pb.inc(1);
            outcomes.push(outcome);
        }

        pb.finish_and_clear();
        outcomes
    }

    /// Sleeps for a uniform draw from the job's delay range. Returns false
    /// when cancelled during the wait.
    async fn wait_between_jobs(&self, job: &ResolvedJob) -> bool {
        let delay = job.delay.sample(&mut rand::thread_rng());
        if delay.is_zero() {
            return true;
        }
        info!("Waiting {:.1} seconds before next download...", delay.as_secs_f64());
        tokio::select! {
            _ = sleep(delay) => true,
            _ = self.cancel.cancelled() => false,
        }
    }

    /// Runs one job to a terminal state. Never returns an error: backend
    /// failures end up in the outcome.
    pub async fn execute(&self, job: ResolvedJob) -> JobOutcome {
        match self.mode {
            ExecutionMode::DryRun => {
                let detail = format!(
                    "would download {} to {} at {} quality",
                    job.url,
                    job.output_path.display(),
                    job.quality
                );
                info!("[dry-run] {}", detail);
                JobOutcome::skipped_dry_run(job, detail)
            }
            ExecutionMode::InfoOnly => {
                let start_time = Instant::now();
                match self.backend.extract_info(&job).await {
                    Ok(media) => {
                        info!("Extracted info for {}: {}", job.url, media.title);
                        JobOutcome::info_extracted(job, start_time.elapsed(), media)
                    }
                    Err(e) => {
                        let e = DownloaderError::from(e);
                        error!("Error extracting info for {}: {}", job.url, e);
                        JobOutcome::failed(job, 1, start_time.elapsed(), e.to_string())
                    }
                }
            }
            ExecutionMode::Download => self.download_with_retry(job).await,
        }
    }

    async fn download_with_retry(&self, job: ResolvedJob) -> JobOutcome {
        let start_time = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.backend.download(&job).await.map_err(DownloaderError::from) {
                Ok(()) => {
                    if attempt > 1 {
                        info!("Downloaded {} after {} attempts", job.url, attempt);
                    }
                    return JobOutcome::succeeded(job, attempt, start_time.elapsed());
                }
                Err(e) if attempt < self.max_attempts && !self.cancel.is_cancelled() => {
                    warn!(
                        "Attempt {}/{} failed for {}: {}",
                        attempt, self.max_attempts, job.url, e
                    );
                }
                Err(e) => {
                    if attempt < self.max_attempts {
                        warn!("Stop requested, not retrying {}", job.url);
                    }
                    error!(
                        "Error downloading {} after {} attempts: {}",
                        job.url, attempt, e
                    );
                    return JobOutcome::failed(job, attempt, start_time.elapsed(), e.to_string());
                }
            }
        }
    }
}

fn create_progress_bar(len: u64) -> ProgressBar {
    let pb = ProgressBar::new(len);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
