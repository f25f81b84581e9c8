mod backend;
mod cli;
mod downloader;
mod error;
mod locator;
mod options;
mod parser;
mod planner;
mod report;
mod settings;
mod types;

use anyhow::Context;
use backend::YtDlpBackend;
use clap::Parser;
use cli::Cli;
use colored::*;
use error::DownloaderError;
use locator::FsLocator;
use log::{error, info, warn};
use report::RunInfo;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use types::RunSummary;

const EXIT_FAILED_JOBS: u8 = 1;
const EXIT_CONFIG: u8 = 2;
const EXIT_CANCELLED: u8 = 130;

/// Mirrors log output to stderr and the appended run log.
struct LogSink {
    file: Option<File>,
}

impl Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        std::io::stderr().write_all(buf)?;
        if let Some(file) = &mut self.file {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        std::io::stderr().flush()?;
        if let Some(file) = &mut self.file {
            file.flush()?;
        }
        Ok(())
    }
}

fn init_logging(log_file: &Path) {
    let file = OpenOptions::new().create(true).append(true).open(log_file);
    let open_error = file.as_ref().err().map(|e| e.to_string());

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_secs()
        .target(env_logger::Target::Pipe(Box::new(LogSink { file: file.ok() })))
        .init();

    if let Some(e) = open_error {
        warn!("Cannot open run log {}: {}", log_file.display(), e);
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_file);
    info!("Starting video batch downloader");

    match run(cli).await {
        Ok(summary) if summary.cancelled => {
            error!("{}", DownloaderError::Cancelled);
            ExitCode::from(EXIT_CANCELLED)
        }
        Ok(summary) if summary.failed > 0 => {
            error!("{} jobs failed", summary.failed);
            ExitCode::from(EXIT_FAILED_JOBS)
        }
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::from(EXIT_CONFIG)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<RunSummary> {
    let locator = FsLocator::current_dir().context("cannot determine working directory")?;
    let mode = cli.mode();
    let overrides = cli.overrides();

    let backend_options = options::load_backend_options(cli.config.as_deref(), &locator)
        .await
        .context("loading backend options")?;
    if let Some(source) = &backend_options.source {
        info!(
            "Backend options: {} entries from {}",
            backend_options.options.len(),
            source.display()
        );
    }

    let source = planner::select_source(cli.file.as_deref(), &cli.urls, &locator)
        .await
        .context("selecting URL source")?
        .ok_or_else(|| {
            DownloaderError::config(
                "command line",
                "no URLs provided; pass URLs, --file, or create urls.yaml",
            )
        })?;

    let jobs = planner::plan(&source, &overrides, &backend_options).context("planning jobs")?;
    let planned = jobs.len();

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Stop requested, finishing the current job");
            signal_token.cancel();
        }
    });

    let mut downloader = downloader::Downloader::new(Arc::new(YtDlpBackend::detect()), mode)
        .with_max_attempts(cli.max_attempts)
        .with_parallel_categories(usize::try_from(cli.parallel_categories).unwrap_or(usize::MAX))
        .with_cancellation(cancel.clone());
    if cli.no_progress {
        downloader = downloader.without_progress();
    }

    let start_time = Instant::now();
    let outcomes = downloader.download_all(jobs).await;

    let summary = report::summarize(
        &outcomes,
        &RunInfo {
            planned,
            elapsed: start_time.elapsed(),
            cancelled: cancel.is_cancelled(),
            notices: backend_options.notices(),
        },
    );
    println!("{}", report::render(&summary));
    info!("{}", report::render_plain(&summary).trim_end());
    info!(
        "Run finished: {} succeeded, {} failed, {} skipped, {} info, {} not run",
        summary.succeeded, summary.failed, summary.skipped, summary.info_extracted, summary.not_run
    );

    if let Some(path) = &cli.report {
        if let Err(e) = report::write_report_csv(&outcomes, path).await {
            error!("Failed to write report CSV {}: {}", path.display(), e);
        }
    }

    Ok(summary)
}
