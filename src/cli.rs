use crate::downloader::DEFAULT_MAX_ATTEMPTS;
use crate::settings::CliOverrides;
use crate::types::{ExecutionMode, Quality};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Batch video downloader driven by categorized URL files",
    long_about = None
)]
pub struct Cli {
    /// Video URLs to download (ignored when --file is given)
    pub urls: Vec<String>,

    /// Categorized YAML document or flat URL list (one per line)
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Output directory [default: ./downloads]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Video quality [default: best]
    #[arg(short, long, value_enum)]
    pub quality: Option<Quality>,

    /// Minimum delay between downloads in seconds [default: 5]
    #[arg(long)]
    pub delay_min: Option<f64>,

    /// Maximum delay between downloads in seconds [default: 15]
    #[arg(long)]
    pub delay_max: Option<f64>,

    /// Extract video info only (no download)
    #[arg(long, conflicts_with = "dry_run")]
    pub info_only: bool,

    /// Show what would be downloaded without contacting the backend
    #[arg(long)]
    pub dry_run: bool,

    /// Backend options document (YAML or JSON); auto-detected when omitted
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Attempts per URL before it is recorded as failed
    #[arg(
        long,
        default_value_t = DEFAULT_MAX_ATTEMPTS,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub max_attempts: u32,

    /// Number of categories processed concurrently
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub parallel_categories: u64,

    /// Write a CSV row per job to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Run log, appended to on every run
    #[arg(long, default_value = "video_download.log")]
    pub log_file: PathBuf,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    pub fn mode(&self) -> ExecutionMode {
        if self.dry_run {
            ExecutionMode::DryRun
        } else if self.info_only {
            ExecutionMode::InfoOnly
        } else {
            ExecutionMode::Download
        }
    }

    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            quality: self.quality,
            delay_min: self.delay_min,
            delay_max: self.delay_max,
            output_path: self.output.clone(),
        }
    }
}
