use crate::error::DownloaderError;
use crate::types::{FailedJob, JobOutcome, JobStatus, MediaInfo, RunSummary};
use colored::*;
use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

/// Run-level facts the outcomes alone do not carry.
#[derive(Debug, Clone, Default)]
pub struct RunInfo {
    pub planned: usize,
    pub elapsed: Duration,
    pub cancelled: bool,
    pub notices: Vec<String>,
}

pub fn summarize(outcomes: &[JobOutcome], run: &RunInfo) -> RunSummary {
    let count = |status: JobStatus| outcomes.iter().filter(|o| o.status == status).count();

    let failures = outcomes
        .iter()
        .filter(|o| o.status == JobStatus::Failed)
        .map(|o| FailedJob {
            index: o.job.index,
            url: o.job.url.clone(),
            attempts: o.attempts,
            error: o.error.clone().unwrap_or_default(),
        })
        .collect();

    let extracted = outcomes
        .iter()
        .filter_map(|o| o.info.as_ref().map(|info| (o.job.url.clone(), info.clone())))
        .collect();

    RunSummary {
        total_jobs: run.planned,
        succeeded: count(JobStatus::Succeeded),
        failed: count(JobStatus::Failed),
        skipped: count(JobStatus::SkippedDryRun),
        info_extracted: count(JobStatus::InfoExtracted),
        not_run: run.planned.saturating_sub(outcomes.len()),
        failures,
        extracted,
        notices: run.notices.clone(),
        elapsed: run.elapsed,
        cancelled: run.cancelled,
    }
}

fn format_duration_secs(secs: f64) -> String {
    let total = secs.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn render_info(out: &mut String, url: &str, info: &MediaInfo) {
    if !info.id.is_empty() {
        let _ = writeln!(out, "  ID: {}", info.id);
    }
    let _ = writeln!(out, "  Title: {}", info.title);
    let _ = writeln!(out, "  Uploader: {}", info.uploader);
    let _ = writeln!(
        out,
        "  Duration: {}",
        info.duration_secs
            .map(format_duration_secs)
            .unwrap_or_else(|| "N/A".to_string())
    );
    let _ = writeln!(
        out,
        "  View count: {}",
        info.view_count
            .map(|v| v.to_string())
            .unwrap_or_else(|| "N/A".to_string())
    );
    let _ = writeln!(out, "  URL: {}", url);
    let _ = writeln!(out, "  {}", "-".repeat(48));
}

/// Colored summary block for the terminal.
pub fn render(summary: &RunSummary) -> String {
    render_with(summary, true)
}

/// Same block without ANSI styling, for the run log.
pub fn render_plain(summary: &RunSummary) -> String {
    render_with(summary, false)
}

fn render_with(summary: &RunSummary, styled: bool) -> String {
    let paint = |text: ColoredString| {
        if styled {
            text.to_string()
        } else {
            text.clear().to_string()
        }
    };
    let mut out = String::new();
    let _ = writeln!(out, "\n{}", "=".repeat(50));
    let _ = writeln!(out, "{}", paint("Run Summary:".bold()));
    let _ = writeln!(out, "Total jobs: {}", summary.total_jobs);
    let _ = writeln!(out, "Succeeded: {}", summary.succeeded);
    let _ = writeln!(out, "Failed: {}", summary.failed);
    let _ = writeln!(out, "Skipped (dry-run): {}", summary.skipped);
    let _ = writeln!(out, "Info extracted: {}", summary.info_extracted);
    if summary.not_run > 0 {
        let _ = writeln!(out, "Not run: {}", summary.not_run);
    }
    let _ = writeln!(out, "Total duration: {:.2?}", summary.elapsed);

    if !summary.extracted.is_empty() {
        let _ = writeln!(out, "\n{}", paint("Extracted info:".green().bold()));
        for (url, info) in &summary.extracted {
            render_info(&mut out, url, info);
        }
    }

    if !summary.failures.is_empty() {
        let _ = writeln!(out, "\n{}", paint("Failed downloads:".red().bold()));
        for failure in &summary.failures {
            let _ = writeln!(
                out,
                "  ✗ #{} {} ({} attempt{}) - {}",
                failure.index,
                failure.url,
                failure.attempts,
                if failure.attempts == 1 { "" } else { "s" },
                failure.error
            );
        }
    }

    if !summary.notices.is_empty() {
        let _ = writeln!(out, "\n{}", paint("Notices:".yellow().bold()));
        for notice in &summary.notices {
            let _ = writeln!(out, "  ! {}", notice);
        }
    }

    if summary.cancelled {
        let _ = writeln!(out, "\n{}", paint("Run was cancelled before completion".yellow()));
    } else if summary.is_clean() {
        let _ = writeln!(out, "\n{}", paint("All jobs completed successfully".green()));
    }

    out
}

/// Writes one CSV row per outcome.
pub async fn write_report_csv(outcomes: &[JobOutcome], path: &Path) -> Result<(), DownloaderError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut wtr = csv::WriterBuilder::new().from_path(path)?;
    wtr.write_record([
        "Index",
        "Category",
        "URL",
        "Status",
        "Attempts",
        "Duration (s)",
        "Output path",
        "Error",
        "Detail",
    ])?;

    for outcome in outcomes {
        wtr.write_record(&[
            outcome.job.index.to_string(),
            outcome.job.label().to_string(),
            outcome.job.url.clone(),
            outcome.status.to_string(),
            outcome.attempts.to_string(),
            format!("{:.2}", outcome.duration.as_secs_f64()),
            outcome.job.output_path.display().to_string(),
            outcome.error.clone().unwrap_or_default(),
            outcome.detail.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DelayRange, Quality, ResolvedJob};
    use std::path::PathBuf;

    fn job(index: usize, url: &str) -> ResolvedJob {
        ResolvedJob {
            index,
            url: url.to_string(),
            category: Some("movies".to_string()),
            output_path: PathBuf::from("./downloads/movies"),
            quality: Quality::Best,
            delay: DelayRange::new(1.0, 1.0).unwrap(),
            cookie_file: None,
            options: Default::default(),
        }
    }

    fn run(planned: usize) -> RunInfo {
        RunInfo {
            planned,
            elapsed: Duration::from_secs(3),
            ..Default::default()
        }
    }

    #[test]
    fn dry_run_summary_counts_skips() {
        let outcomes = vec![
            JobOutcome::skipped_dry_run(job(0, "https://e.com/1"), "would".into()),
            JobOutcome::skipped_dry_run(job(1, "https://e.com/2"), "would".into()),
        ];
        let summary = summarize(&outcomes, &run(2));
        assert_eq!(summary.total_jobs, 2);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 0);
        assert!(summary.is_clean());

        let text = render(&summary);
        assert!(text.contains("Skipped (dry-run): 2"), "{text}");
        assert!(text.contains("Failed: 0"), "{text}");
    }

    #[test]
    fn failures_listed_in_job_order_with_reasons() {
        let outcomes = vec![
            JobOutcome::failed(job(0, "https://e.com/a"), 3, Duration::ZERO, "boom a".into()),
            JobOutcome::succeeded(job(1, "https://e.com/b"), 1, Duration::ZERO),
            JobOutcome::failed(job(2, "https://e.com/c"), 1, Duration::ZERO, "boom c".into()),
        ];
        let summary = summarize(&outcomes, &run(3));
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.succeeded, 1);
        let urls: Vec<_> = summary.failures.iter().map(|f| f.url.as_str()).collect();
        assert_eq!(urls, ["https://e.com/a", "https://e.com/c"]);
        assert!(!summary.is_clean());

        let text = render(&summary);
        assert!(text.contains("https://e.com/a (3 attempts) - boom a"), "{text}");
        assert!(text.contains("https://e.com/c (1 attempt) - boom c"), "{text}");
    }

    #[test]
    fn partial_run_reports_jobs_not_run() {
        let outcomes = vec![JobOutcome::succeeded(job(0, "https://e.com/a"), 1, Duration::ZERO)];
        let summary = summarize(
            &outcomes,
            &RunInfo {
                cancelled: true,
                ..run(4)
            },
        );
        assert_eq!(summary.not_run, 3);
        assert!(render(&summary).contains("Not run: 3"));
    }

    #[test]
    fn info_and_notices_are_rendered() {
        let info = MediaInfo {
            title: "Clip".into(),
            uploader: "Someone".into(),
            duration_secs: Some(125.0),
            view_count: Some(42),
            ..Default::default()
        };
        let outcomes = vec![JobOutcome::info_extracted(
            job(0, "https://e.com/a"),
            Duration::ZERO,
            info,
        )];
        let summary = summarize(
            &outcomes,
            &RunInfo {
                notices: vec!["Cookie file not found: x".into()],
                ..run(1)
            },
        );
        let text = render(&summary);
        assert!(text.contains("Title: Clip"));
        assert!(text.contains("Duration: 2:05"));
        assert!(text.contains("View count: 42"));
        assert!(text.contains("Cookie file not found: x"));
    }

    #[test]
    fn plain_rendering_carries_failures_without_escape_codes() {
        colored::control::set_override(true);
        let outcomes = vec![JobOutcome::failed(
            job(0, "https://e.com/a"),
            3,
            Duration::ZERO,
            "boom a".into(),
        )];
        let summary = summarize(&outcomes, &run(1));

        let plain = render_plain(&summary);
        assert!(!plain.contains('\x1b'), "{plain:?}");
        assert!(plain.contains("Failed downloads:"), "{plain}");
        assert!(plain.contains("https://e.com/a (3 attempts) - boom a"), "{plain}");
        assert!(render(&summary).contains('\x1b'));
        colored::control::unset_override();
    }

    #[tokio::test]
    async fn writes_one_csv_row_per_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/run.csv");
        let outcomes = vec![
            JobOutcome::succeeded(job(0, "https://e.com/a"), 1, Duration::from_millis(1500)),
            JobOutcome::failed(job(1, "https://e.com/b"), 3, Duration::ZERO, "bad, really".into()),
        ];

        write_report_csv(&outcomes, &path).await.unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][3], "succeeded");
        assert_eq!(&rows[0][5], "1.50");
        assert_eq!(&rows[1][7], "bad, really");
        assert_eq!(&rows[1][8], "");
    }
}
