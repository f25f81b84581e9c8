use crate::error::DownloaderError;
use crate::locator::Locator;
use crate::options::BackendOptions;
use crate::parser::{self, UrlDocument};
use crate::settings::{self, CliOverrides, EffectiveSettings};
use crate::types::{GlobalSettings, ResolvedJob};
use log::{info, warn};
use std::path::{Path, PathBuf};

pub const DEFAULT_URL_FILES: &[&str] = &[
    "urls.yaml",
    "urls.yml",
    "config/urls.yaml",
    "config/urls.yml",
    "urls.txt",
    "config/urls.txt",
];

#[derive(Debug, Clone, PartialEq)]
pub enum UrlSource {
    Document { path: PathBuf, document: UrlDocument },
    FileList { path: PathBuf, urls: Vec<String> },
    CommandLine(Vec<String>),
}

impl UrlSource {
    pub fn describe(&self) -> String {
        match self {
            UrlSource::Document { path, .. } => format!("categorized document {}", path.display()),
            UrlSource::FileList { path, .. } => format!("URL list {}", path.display()),
            UrlSource::CommandLine(urls) => format!("{} command-line URLs", urls.len()),
        }
    }
}

/// Picks exactly one URL source: an explicit file, then command-line URLs,
/// then a conventional file. Command-line URLs are dropped, not merged, when
/// a file is given.
pub async fn select_source(
    file: Option<&Path>,
    direct: &[String],
    locator: &dyn Locator,
) -> Result<Option<UrlSource>, DownloaderError> {
    if let Some(file) = file {
        let path = locator
            .resolve(file)
            .ok_or_else(|| DownloaderError::ConfigNotFound(file.to_path_buf()))?;
        if !direct.is_empty() {
            info!(
                "Ignoring {} command-line URLs because a URL file was given",
                direct.len()
            );
        }
        return load_file(path).await.map(Some);
    }

    if !direct.is_empty() {
        return Ok(Some(UrlSource::CommandLine(direct.to_vec())));
    }

    match locator.locate(DEFAULT_URL_FILES) {
        Some(path) => {
            info!("Using URL file {}", path.display());
            load_file(path).await.map(Some)
        }
        None => Ok(None),
    }
}

async fn load_file(path: PathBuf) -> Result<UrlSource, DownloaderError> {
    if parser::is_categorized(&path) {
        let document = parser::load_url_document(&path).await?;
        Ok(UrlSource::Document { path, document })
    } else {
        let urls = parser::load_url_list(&path).await?;
        Ok(UrlSource::FileList { path, urls })
    }
}

pub fn plan(
    source: &UrlSource,
    cli: &CliOverrides,
    backend: &BackendOptions,
) -> Result<Vec<ResolvedJob>, DownloaderError> {
    let mut jobs = Vec::new();

    match source {
        UrlSource::Document { document, .. } => {
            for category in &document.categories {
                let effective = settings::resolve(&document.global, Some(category), cli)?;
                if category.urls.is_empty() {
                    warn!("Category '{}' has no URLs, skipping", category.name);
                    continue;
                }
                push_group(
                    &mut jobs,
                    &category.urls,
                    Some(category.name.as_str()),
                    &effective,
                    backend,
                );
            }
            if !document.urls.is_empty() {
                let effective = settings::resolve(&document.global, None, cli)?;
                push_group(&mut jobs, &document.urls, None, &effective, backend);
            }
        }
        UrlSource::FileList { urls, .. } | UrlSource::CommandLine(urls) => {
            let effective = settings::resolve(&GlobalSettings::default(), None, cli)?;
            push_group(&mut jobs, urls, None, &effective, backend);
        }
    }

    info!("Planned {} jobs from {}", jobs.len(), source.describe());
    Ok(jobs)
}

fn push_group(
    jobs: &mut Vec<ResolvedJob>,
    urls: &[String],
    category: Option<&str>,
    effective: &EffectiveSettings,
    backend: &BackendOptions,
) {
    let options = backend.job_options(effective.quality);
    for url in urls {
        jobs.push(ResolvedJob {
            index: jobs.len(),
            url: url.clone(),
            category: category.map(str::to_string),
            output_path: effective.output_path.clone(),
            quality: effective.quality,
            delay: effective.delay,
            cookie_file: backend.cookie_file().map(Path::to_path_buf),
            options: options.clone(),
        });
    }
}
