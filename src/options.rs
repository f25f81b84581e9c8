use crate::error::DownloaderError;
use crate::locator::Locator;
use crate::parser::read_config_file;
use crate::types::{OptionMap, Quality};
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::path::{Path, PathBuf};

pub const DEFAULT_OPTION_FILES: &[&str] = &[
    "config/yt-dlp.yaml",
    "config/yt-dlp.json",
    "yt-dlp.yaml",
    "yt-dlp.json",
];

pub const DEFAULT_COOKIE_FILES: &[&str] = &[
    "config/cookies.txt",
    "cookies.txt",
    "www.bilibili.com_cookies.txt",
    "~/cookies.txt",
    "~/Downloads/cookies.txt",
];

/// Dedicated top-level cookie key, named as the backend names it.
pub const COOKIE_KEY: &str = "cookiefile";
/// Nested settings block that may also carry a cookie path. Never passed
/// through to the backend.
pub const NESTED_SETTINGS_KEY: &str = "global_settings";
const NESTED_COOKIE_KEYS: &[&str] = &["cookies_file", "cookiefile", "cookie_file"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSource {
    OptionsKey,
    NestedSettings,
    Conventional,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CookieStatus {
    #[default]
    NotConfigured,
    Found { path: PathBuf, source: CookieSource },
    Missing { path: PathBuf, source: CookieSource },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendOptions {
    pub source: Option<PathBuf>,
    pub options: OptionMap,
    pub cookies: CookieStatus,
}

impl BackendOptions {
    pub fn cookie_file(&self) -> Option<&Path> {
        match &self.cookies {
            CookieStatus::Found { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Things the run report should mention about option loading.
    pub fn notices(&self) -> Vec<String> {
        match &self.cookies {
            CookieStatus::Missing { path, .. } => {
                vec![DownloaderError::CookieFileMissing(path.clone()).to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// Built-in defaults, overlaid with the loaded document, with the
    /// quality's format selector applied last.
    pub fn job_options(&self, quality: Quality) -> OptionMap {
        let mut merged = default_backend_options();
        merged.extend(self.options.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(format) = quality.format_selector() {
            merged.insert("format".to_string(), Value::from(format));
        }
        merged
    }
}

pub fn default_backend_options() -> OptionMap {
    [
        ("format", json!("bestvideo[height>=720]+bestaudio/best[acodec!=none]")),
        ("merge_output_format", json!("mp4")),
        ("writeinfojson", json!(true)),
        ("writesubtitles", json!(true)),
        ("writeautomaticsub", json!(true)),
        ("subtitleslangs", json!(["zh-CN", "zh-TW", "en"])),
        ("embed_subs", json!(true)),
        ("writedescription", json!(true)),
        ("writethumbnail", json!(true)),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub async fn load_backend_options(
    explicit: Option<&Path>,
    locator: &dyn Locator,
) -> Result<BackendOptions, DownloaderError> {
    let path = match explicit {
        Some(path) => Some(
            locator
                .resolve(path)
                .ok_or_else(|| DownloaderError::ConfigNotFound(path.to_path_buf()))?,
        ),
        None => locator.locate(DEFAULT_OPTION_FILES),
    };

    let (options, key_cookie, nested_cookie) = match &path {
        Some(path) => {
            info!("Loading backend options from {}", path.display());
            let contents = read_config_file(path).await?;
            parse_options_document(&contents, path)?
        }
        None => {
            debug!("No backend options document found, using built-in defaults");
            (OptionMap::new(), None, None)
        }
    };

    let cookies = resolve_cookies(key_cookie, nested_cookie, locator);
    match &cookies {
        CookieStatus::Found { path, source } => {
            info!("Using cookies file {} ({:?})", path.display(), source)
        }
        CookieStatus::Missing { path, .. } => warn!(
            "Cookie file {} does not exist, continuing without cookies",
            path.display()
        ),
        CookieStatus::NotConfigured => {
            warn!("No cookies file found. Some videos may not be accessible.")
        }
    }

    Ok(BackendOptions {
        source: path,
        options,
        cookies,
    })
}

/// Splits an options document into pass-through options and the two
/// candidate cookie references (top-level key, nested settings key).
pub fn parse_options_document(
    contents: &str,
    origin: &Path,
) -> Result<(OptionMap, Option<PathBuf>, Option<PathBuf>), DownloaderError> {
    let context = origin.display().to_string();
    if contents.trim().is_empty() {
        return Ok((OptionMap::new(), None, None));
    }

    let mut options: OptionMap = serde_yaml::from_str(contents)
        .map_err(|e| {
            DownloaderError::config(context.as_str(), format!("expected a key/value mapping: {e}"))
        })?;

    let key_cookie = options
        .remove(COOKIE_KEY)
        .map(|v| cookie_path(v, &format!("{context}: {COOKIE_KEY}")))
        .transpose()?
        .flatten();

    let nested_cookie = match options.remove(NESTED_SETTINGS_KEY) {
        Some(Value::Object(settings)) => NESTED_COOKIE_KEYS
            .iter()
            .find_map(|key| settings.get(*key).map(|v| (key, v.clone())))
            .map(|(key, v)| cookie_path(v, &format!("{context}: {NESTED_SETTINGS_KEY}.{key}")))
            .transpose()?
            .flatten(),
        Some(Value::Null) | None => None,
        Some(_) => {
            return Err(DownloaderError::config(
                format!("{context}: {NESTED_SETTINGS_KEY}"),
                "expected a mapping",
            ))
        }
    };

    Ok((options, key_cookie, nested_cookie))
}

fn cookie_path(value: Value, context: &str) -> Result<Option<PathBuf>, DownloaderError> {
    match value {
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Ok(Some(PathBuf::from(s.trim()))),
        Value::Null => Ok(None),
        other => Err(DownloaderError::config(
            context,
            format!("expected a file path, got {other}"),
        )),
    }
}

/// Highest-priority reference wins even when its file is missing; lower
/// levels are not consulted in that case.
fn resolve_cookies(
    key_cookie: Option<PathBuf>,
    nested_cookie: Option<PathBuf>,
    locator: &dyn Locator,
) -> CookieStatus {
    let declared = key_cookie
        .map(|p| (p, CookieSource::OptionsKey))
        .or_else(|| nested_cookie.map(|p| (p, CookieSource::NestedSettings)));

    match declared {
        Some((path, source)) => match locator.resolve(&path) {
            Some(found) => CookieStatus::Found {
                path: found,
                source,
            },
            None => CookieStatus::Missing { path, source },
        },
        None => match locator.locate(DEFAULT_COOKIE_FILES) {
            Some(path) => CookieStatus::Found {
                path,
                source: CookieSource::Conventional,
            },
            None => CookieStatus::NotConfigured,
        },
    }
}
