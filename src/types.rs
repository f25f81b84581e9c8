use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Option name -> value, passed through to the extraction backend.
pub type OptionMap = BTreeMap<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    Medium,
    High,
    #[default]
    Best,
}

impl Quality {
    pub const ALL: [Quality; 4] = [Quality::Low, Quality::Medium, Quality::High, Quality::Best];

    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
            Quality::Best => "best",
        }
    }

    /// Format selector forced by this quality level. `Best` keeps whatever
    /// the option set already carries.
    pub fn format_selector(&self) -> Option<&'static str> {
        match self {
            Quality::Low => Some("worst[height>=480]/worst"),
            Quality::Medium => Some("bestvideo[height>=720]+bestaudio/best"),
            Quality::High => Some("bestvideo[height>=1080]+bestaudio/best"),
            Quality::Best => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Quality::ALL
            .into_iter()
            .find(|q| q.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                format!("unsupported quality '{s}' (expected one of low, medium, high, best)")
            })
    }
}

/// Inter-job delay bounds in seconds. Always `0 <= min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DelayRange {
    min_secs: f64,
    max_secs: f64,
}

impl DelayRange {
    pub const DEFAULT: DelayRange = DelayRange {
        min_secs: 5.0,
        max_secs: 15.0,
    };

    /// Upper bound for either end, one day.
    pub const MAX_SECS: f64 = 86_400.0;

    pub fn new(min_secs: f64, max_secs: f64) -> Result<Self, String> {
        if !min_secs.is_finite() || !max_secs.is_finite() {
            return Err(format!("delay bounds must be finite (got {min_secs}, {max_secs})"));
        }
        if min_secs < 0.0 || max_secs < 0.0 {
            return Err(format!(
                "delay bounds must not be negative (got {min_secs}, {max_secs})"
            ));
        }
        if min_secs > max_secs {
            return Err(format!(
                "delay_min ({min_secs}) is greater than delay_max ({max_secs})"
            ));
        }
        if max_secs > Self::MAX_SECS {
            return Err(format!(
                "delay bounds must not exceed {} seconds (got {max_secs})",
                Self::MAX_SECS
            ));
        }
        Ok(Self { min_secs, max_secs })
    }

    pub fn min_secs(&self) -> f64 {
        self.min_secs
    }

    pub fn max_secs(&self) -> f64 {
        self.max_secs
    }

    /// Uniform draw from `[min, max]`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min_secs == self.max_secs {
            return Duration::from_secs_f64(self.min_secs);
        }
        Duration::from_secs_f64(rng.gen_range(self.min_secs..=self.max_secs))
    }
}

impl fmt::Display for DelayRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}s", self.min_secs, self.max_secs)
    }
}

/// Top-level defaults of a URL document. Absent fields fall through to the
/// hard-coded fallbacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalSettings {
    pub default_quality: Option<Quality>,
    pub default_delay_range: Option<DelayRange>,
    pub default_output_path: Option<PathBuf>,
}

/// A named URL group. Overrides are kept raw until resolution so that a bad
/// value is reported against the category that declared it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Category {
    pub name: String,
    pub output_path: Option<PathBuf>,
    pub quality: Option<String>,
    pub delay_range: Option<(f64, f64)>,
    pub urls: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Download,
    InfoOnly,
    DryRun,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Download => f.write_str("download"),
            ExecutionMode::InfoOnly => f.write_str("info-only"),
            ExecutionMode::DryRun => f.write_str("dry-run"),
        }
    }
}

/// Fully merged unit of work. Built once by the planner, consumed once by
/// the executor.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJob {
    pub index: usize,
    pub url: String,
    pub category: Option<String>,
    pub output_path: PathBuf,
    pub quality: Quality,
    pub delay: DelayRange,
    pub cookie_file: Option<PathBuf>,
    pub options: OptionMap,
}

impl ResolvedJob {
    pub fn label(&self) -> &str {
        self.category.as_deref().unwrap_or("-")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub uploader: String,
    pub duration_secs: Option<f64>,
    pub view_count: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Succeeded,
    Failed,
    SkippedDryRun,
    InfoExtracted,
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Succeeded => f.write_str("succeeded"),
            JobStatus::Failed => f.write_str("failed"),
            JobStatus::SkippedDryRun => f.write_str("skipped-dry-run"),
            JobStatus::InfoExtracted => f.write_str("info-extracted"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobOutcome {
    pub job: ResolvedJob,
    pub status: JobStatus,
    pub attempts: u32,
    pub duration: Duration,
    pub error: Option<String>,
    pub detail: Option<String>,
    pub info: Option<MediaInfo>,
}

impl JobOutcome {
    pub fn succeeded(job: ResolvedJob, attempts: u32, duration: Duration) -> Self {
        Self::new(job, JobStatus::Succeeded, attempts, duration)
    }

    pub fn failed(job: ResolvedJob, attempts: u32, duration: Duration, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(job, JobStatus::Failed, attempts, duration)
        }
    }

    pub fn info_extracted(job: ResolvedJob, duration: Duration, info: MediaInfo) -> Self {
        Self {
            info: Some(info),
            ..Self::new(job, JobStatus::InfoExtracted, 1, duration)
        }
    }

    pub fn skipped_dry_run(job: ResolvedJob, detail: String) -> Self {
        Self {
            detail: Some(detail),
            ..Self::new(job, JobStatus::SkippedDryRun, 0, Duration::ZERO)
        }
    }

    fn new(job: ResolvedJob, status: JobStatus, attempts: u32, duration: Duration) -> Self {
        Self {
            job,
            status,
            attempts,
            duration,
            error: None,
            detail: None,
            info: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FailedJob {
    pub index: usize,
    pub url: String,
    pub attempts: u32,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub total_jobs: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub info_extracted: usize,
    pub not_run: usize,
    pub failures: Vec<FailedJob>,
    pub extracted: Vec<(String, MediaInfo)>,
    pub notices: Vec<String>,
    pub elapsed: Duration,
    pub cancelled: bool,
}

impl RunSummary {
    /// True when every planned job reached a non-failed terminal state.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.not_run == 0 && !self.cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn quality_parses_only_the_four_levels() {
        assert_eq!("best".parse::<Quality>().unwrap(), Quality::Best);
        assert_eq!(" High ".parse::<Quality>().unwrap(), Quality::High);
        assert!("720p".parse::<Quality>().is_err());
        assert!("".parse::<Quality>().is_err());
    }

    #[test]
    fn delay_range_rejects_inverted_and_negative_bounds() {
        assert!(DelayRange::new(10.0, 5.0).is_err());
        assert!(DelayRange::new(-1.0, 5.0).is_err());
        assert!(DelayRange::new(f64::NAN, 5.0).is_err());
        assert!(DelayRange::new(3.0, 3.0).is_ok());
    }

    #[test]
    fn delay_range_rejects_bounds_too_large_to_sleep() {
        assert!(DelayRange::new(1e20, 1e20).is_err());
        assert!(DelayRange::new(0.0, DelayRange::MAX_SECS + 1.0).is_err());

        let widest = DelayRange::new(DelayRange::MAX_SECS, DelayRange::MAX_SECS).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(widest.sample(&mut rng), Duration::from_secs(86_400));
    }

    #[test]
    fn delay_samples_stay_within_bounds() {
        let range = DelayRange::new(1.0, 2.0).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let d = range.sample(&mut rng).as_secs_f64();
            assert!((1.0..=2.0).contains(&d), "sample {d} out of range");
        }
        let fixed = DelayRange::new(0.0, 0.0).unwrap();
        assert_eq!(fixed.sample(&mut rng), Duration::ZERO);
    }

    #[test]
    fn summary_is_clean_only_without_failures_or_cancellation() {
        let mut summary = RunSummary {
            total_jobs: 1,
            succeeded: 1,
            failed: 0,
            skipped: 0,
            info_extracted: 0,
            not_run: 0,
            failures: Vec::new(),
            extracted: Vec::new(),
            notices: Vec::new(),
            elapsed: Duration::ZERO,
            cancelled: false,
        };
        assert!(summary.is_clean());
        summary.cancelled = true;
        assert!(!summary.is_clean());
    }
}
