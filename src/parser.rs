use crate::error::DownloaderError;
use crate::types::{Category, DelayRange, GlobalSettings, Quality};
use log::debug;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// A parsed categorized URL document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlDocument {
    pub global: GlobalSettings,
    pub categories: Vec<Category>,
    /// Top-level `urls` that belong to no category.
    pub urls: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawDocument {
    global_settings: Option<RawGlobalSettings>,
    categories: Option<serde_yaml::Mapping>,
    urls: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawGlobalSettings {
    #[serde(alias = "quality")]
    default_quality: Option<String>,
    #[serde(alias = "delay_range")]
    default_delay_range: Option<(f64, f64)>,
    #[serde(alias = "output_path")]
    default_output_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCategory {
    output_path: Option<PathBuf>,
    quality: Option<String>,
    delay_range: Option<(f64, f64)>,
    urls: Option<Vec<String>>,
}

/// True when the file should be read as a categorized YAML document rather
/// than a flat URL list.
pub fn is_categorized(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref(),
        Some("yaml" | "yml")
    )
}

/// Reads a configuration file as UTF-8. Failures name the file.
pub async fn read_config_file(path: &Path) -> Result<String, DownloaderError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| DownloaderError::config(path.display().to_string(), e.to_string()))
}

pub async fn load_url_document(path: &Path) -> Result<UrlDocument, DownloaderError> {
    let contents = read_config_file(path).await?;
    parse_url_document(&contents, &path.display().to_string())
}

pub async fn load_url_list(path: &Path) -> Result<Vec<String>, DownloaderError> {
    let contents = read_config_file(path).await?;
    let urls = parse_url_list(&contents);
    debug!("Loaded {} URLs from {}", urls.len(), path.display());
    Ok(urls)
}

/// One URL per line; blank lines and `#` comments are ignored.
pub fn parse_url_list(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

pub fn parse_url_document(contents: &str, origin: &str) -> Result<UrlDocument, DownloaderError> {
    if contents.trim().is_empty() {
        return Ok(UrlDocument::default());
    }

    let raw: RawDocument = serde_yaml::from_str(contents)
        .map_err(|e| DownloaderError::config(origin, e.to_string()))?;

    let global = match raw.global_settings {
        Some(g) => parse_global(g, origin)?,
        None => GlobalSettings::default(),
    };

    let mut categories = Vec::new();
    for (key, value) in raw.categories.unwrap_or_default() {
        let name = match key {
            serde_yaml::Value::String(name) => name,
            other => {
                return Err(DownloaderError::config(
                    format!("{origin}: categories"),
                    format!("category names must be strings, got {other:?}"),
                ))
            }
        };
        categories.push(parse_category(name, value, origin)?);
    }

    let urls = clean_urls(raw.urls.unwrap_or_default(), &format!("{origin}: urls"))?;

    debug!(
        "Parsed {} categories and {} uncategorized URLs from {}",
        categories.len(),
        urls.len(),
        origin
    );

    Ok(UrlDocument {
        global,
        categories,
        urls,
    })
}

fn parse_global(raw: RawGlobalSettings, origin: &str) -> Result<GlobalSettings, DownloaderError> {
    let default_quality = raw
        .default_quality
        .map(|q| {
            q.parse::<Quality>().map_err(|message| {
                DownloaderError::config(
                    format!("{origin}: global_settings.default_quality"),
                    message,
                )
            })
        })
        .transpose()?;

    let default_delay_range = raw
        .default_delay_range
        .map(|(min, max)| {
            DelayRange::new(min, max).map_err(|message| {
                DownloaderError::config(
                    format!("{origin}: global_settings.default_delay_range"),
                    message,
                )
            })
        })
        .transpose()?;

    Ok(GlobalSettings {
        default_quality,
        default_delay_range,
        default_output_path: raw.default_output_path,
    })
}

fn parse_category(
    name: String,
    value: serde_yaml::Value,
    origin: &str,
) -> Result<Category, DownloaderError> {
    let context = format!("{origin}: categories.{name}");
    let raw: RawCategory = match value {
        serde_yaml::Value::Null => RawCategory::default(),
        value => serde_yaml::from_value(value)
            .map_err(|e| DownloaderError::config(context.as_str(), e.to_string()))?,
    };

    let urls = raw
        .urls
        .ok_or_else(|| DownloaderError::config(context.as_str(), "missing `urls` key"))?;

    Ok(Category {
        urls: clean_urls(urls, &format!("{context}.urls"))?,
        name,
        output_path: raw.output_path,
        quality: raw.quality,
        delay_range: raw.delay_range,
    })
}

fn clean_urls(urls: Vec<String>, context: &str) -> Result<Vec<String>, DownloaderError> {
    urls.into_iter()
        .enumerate()
        .map(|(i, url)| {
            let url = url.trim();
            if url.is_empty() {
                Err(DownloaderError::config(context, format!("entry {i} is empty")))
            } else {
                Ok(url.to_string())
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
global_settings:
  default_quality: medium
  default_delay_range: [1, 3]
  default_output_path: /srv/videos
categories:
  movies:
    quality: high
    urls:
      - https://example.com/m/1
      - https://example.com/m/2
  music:
    output_path: /srv/music
    urls:
      - https://example.com/a/1
  empty:
    urls: []
"#;

    #[test]
    fn parses_categories_in_declaration_order() {
        let doc = parse_url_document(DOC, "urls.yaml").unwrap();
        let names: Vec<_> = doc.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["movies", "music", "empty"]);
        assert_eq!(doc.categories[0].urls.len(), 2);
        assert_eq!(doc.categories[0].quality.as_deref(), Some("high"));
        assert_eq!(doc.categories[1].output_path, Some(PathBuf::from("/srv/music")));
        assert!(doc.categories[2].urls.is_empty());
        assert_eq!(doc.global.default_quality, Some(Quality::Medium));
        assert_eq!(doc.global.default_delay_range, Some(DelayRange::new(1.0, 3.0).unwrap()));
    }

    #[test]
    fn accepts_short_global_keys() {
        let doc = parse_url_document(
            "global_settings:\n  quality: low\n  output_path: out\n",
            "urls.yaml",
        )
        .unwrap();
        assert_eq!(doc.global.default_quality, Some(Quality::Low));
        assert_eq!(doc.global.default_output_path, Some(PathBuf::from("out")));
    }

    #[test]
    fn category_without_urls_key_is_rejected() {
        let err = parse_url_document("categories:\n  movies:\n    quality: best\n", "urls.yaml")
            .unwrap_err();
        let text = err.to_string();
        assert!(text.contains("categories.movies"), "{text}");
        assert!(text.contains("urls"), "{text}");

        let err = parse_url_document("categories:\n  movies:\n", "urls.yaml").unwrap_err();
        assert!(matches!(err, DownloaderError::Config { .. }));
    }

    #[test]
    fn invalid_global_quality_names_the_field() {
        let err = parse_url_document("global_settings:\n  default_quality: 4k\n", "u.yaml")
            .unwrap_err();
        assert!(err.to_string().contains("global_settings.default_quality"));
    }

    #[test]
    fn inverted_global_delay_is_rejected() {
        let err = parse_url_document("global_settings:\n  default_delay_range: [9, 2]\n", "u.yaml")
            .unwrap_err();
        assert!(err.to_string().contains("default_delay_range"));
    }

    #[test]
    fn flat_list_skips_comments_and_blanks_but_keeps_duplicates() {
        let urls = parse_url_list(concat!(
            "# Test file\n",
            "https://example.com/video1\n",
            "\n",
            "   \n",
            "https://example.com/video2\n",
            "https://example.com/video1\n",
        ));
        assert_eq!(
            urls,
            [
                "https://example.com/video1",
                "https://example.com/video2",
                "https://example.com/video1"
            ]
        );
    }

    #[test]
    fn detects_categorized_files_by_extension() {
        assert!(is_categorized(Path::new("urls.yaml")));
        assert!(is_categorized(Path::new("config/URLS.YML")));
        assert!(!is_categorized(Path::new("urls.txt")));
        assert!(!is_categorized(Path::new("urls")));
    }

    #[tokio::test]
    async fn unreadable_files_name_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let list = dir.path().join("list.txt");
        let doc = dir.path().join("urls.yaml");
        std::fs::write(&list, b"https://e.com/\xff\xfe\n").unwrap();
        std::fs::write(&doc, b"categories:\n  c:\n    urls: [\xff]\n").unwrap();

        let err = load_url_list(&list).await.unwrap_err();
        assert!(matches!(err, DownloaderError::Config { .. }));
        assert!(err.to_string().contains("list.txt"), "{err}");

        let err = load_url_document(&doc).await.unwrap_err();
        assert!(err.to_string().contains("urls.yaml"), "{err}");

        let err = load_url_list(&dir.path().join("gone.txt")).await.unwrap_err();
        assert!(err.to_string().contains("gone.txt"), "{err}");
    }
}
