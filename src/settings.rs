use crate::error::DownloaderError;
use crate::types::{Category, DelayRange, GlobalSettings, Quality};
use serde::Serialize;
use std::path::{Path, PathBuf};

pub const FALLBACK_QUALITY: Quality = Quality::Best;
pub const FALLBACK_OUTPUT: &str = "./downloads";

/// Values given explicitly on the command line. `None` means the flag was
/// not passed and must not shadow lower layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CliOverrides {
    pub quality: Option<Quality>,
    pub delay_min: Option<f64>,
    pub delay_max: Option<f64>,
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveSettings {
    pub quality: Quality,
    pub delay: DelayRange,
    pub output_path: PathBuf,
}

#[derive(Debug, Default)]
struct Layer {
    quality: Option<Quality>,
    delay_min: Option<f64>,
    delay_max: Option<f64>,
    output_path: Option<PathBuf>,
}

fn first<T>(layers: &[Layer], pick: impl Fn(&Layer) -> Option<T>) -> Option<T> {
    layers.iter().find_map(pick)
}

fn under_category(base: &Path, category: Option<&Category>) -> PathBuf {
    match category {
        Some(c) => base.join(&c.name),
        None => base.to_path_buf(),
    }
}

/// Merges command-line flags, category overrides and document defaults into
/// one record per URL group. Each field walks the layers from highest to
/// lowest priority (command line, category, global) and falls back to the
/// hard-coded default when none supplies it.
pub fn resolve(
    global: &GlobalSettings,
    category: Option<&Category>,
    cli: &CliOverrides,
) -> Result<EffectiveSettings, DownloaderError> {
    let context = match category {
        Some(c) => format!("category '{}'", c.name),
        None => "global settings".to_string(),
    };

    let cli_layer = Layer {
        quality: cli.quality,
        delay_min: cli.delay_min,
        delay_max: cli.delay_max,
        output_path: cli
            .output_path
            .as_deref()
            .map(|p| under_category(p, category)),
    };

    let category_layer = match category {
        Some(c) => category_layer(c)?,
        None => Layer::default(),
    };

    let global_layer = Layer {
        quality: global.default_quality,
        delay_min: global.default_delay_range.map(|d| d.min_secs()),
        delay_max: global.default_delay_range.map(|d| d.max_secs()),
        output_path: global
            .default_output_path
            .as_deref()
            .map(|p| under_category(p, category)),
    };

    let layers = [cli_layer, category_layer, global_layer];

    let quality = first(&layers, |l| l.quality).unwrap_or(FALLBACK_QUALITY);
    let delay_min =
        first(&layers, |l| l.delay_min).unwrap_or(DelayRange::DEFAULT.min_secs());
    let delay_max =
        first(&layers, |l| l.delay_max).unwrap_or(DelayRange::DEFAULT.max_secs());
    let delay = DelayRange::new(delay_min, delay_max)
        .map_err(|message| DownloaderError::config(context.as_str(), message))?;
    let output_path = first(&layers, |l| l.output_path.clone())
        .unwrap_or_else(|| under_category(Path::new(FALLBACK_OUTPUT), category));

    if output_path.as_os_str().is_empty() {
        return Err(DownloaderError::config(context, "output_path resolved to an empty path"));
    }

    Ok(EffectiveSettings {
        quality,
        delay,
        output_path,
    })
}

fn category_layer(category: &Category) -> Result<Layer, DownloaderError> {
    let field = |name: &str| format!("categories.{}.{}", category.name, name);

    let quality = category
        .quality
        .as_deref()
        .map(|raw| {
            raw.parse::<Quality>()
                .map_err(|message| DownloaderError::config(field("quality"), message))
        })
        .transpose()?;

    if let Some(path) = &category.output_path {
        if path.as_os_str().is_empty() {
            return Err(DownloaderError::config(
                field("output_path"),
                "output_path must not be empty",
            ));
        }
    }

    Ok(Layer {
        quality,
        delay_min: category.delay_range.map(|(min, _)| min),
        delay_max: category.delay_range.map(|(_, max)| max),
        output_path: category.output_path.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(name: &str) -> Category {
        Category {
            name: name.to_string(),
            urls: vec!["https://example.com/v/1".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn falls_back_to_hard_coded_defaults() {
        let settings = resolve(&GlobalSettings::default(), None, &CliOverrides::default()).unwrap();
        assert_eq!(settings.quality, Quality::Best);
        assert_eq!(settings.delay, DelayRange::DEFAULT);
        assert_eq!(settings.output_path, PathBuf::from("./downloads"));
    }

    #[test]
    fn category_without_output_path_lands_under_global_default() {
        let global = GlobalSettings {
            default_output_path: Some(PathBuf::from("/media")),
            ..Default::default()
        };
        let settings =
            resolve(&global, Some(&category("movies")), &CliOverrides::default()).unwrap();
        assert_eq!(settings.output_path, PathBuf::from("/media/movies"));

        let settings =
            resolve(&GlobalSettings::default(), Some(&category("music")), &CliOverrides::default())
                .unwrap();
        assert_eq!(settings.output_path, PathBuf::from("./downloads/music"));
    }

    #[test]
    fn fields_resolve_independently() {
        let global = GlobalSettings {
            default_quality: Some(Quality::Low),
            default_delay_range: Some(DelayRange::new(2.0, 4.0).unwrap()),
            default_output_path: None,
        };
        let mut cat = category("clips");
        cat.quality = Some("high".to_string());

        let settings = resolve(&global, Some(&cat), &CliOverrides::default()).unwrap();
        assert_eq!(settings.quality, Quality::High);
        assert_eq!(settings.delay, DelayRange::new(2.0, 4.0).unwrap());
    }

    #[test]
    fn command_line_wins_over_category_and_global() {
        let global = GlobalSettings {
            default_quality: Some(Quality::Low),
            default_delay_range: Some(DelayRange::new(2.0, 4.0).unwrap()),
            default_output_path: Some(PathBuf::from("/global")),
        };
        let mut cat = category("clips");
        cat.quality = Some("high".to_string());
        cat.output_path = Some(PathBuf::from("/clips"));
        cat.delay_range = Some((1.0, 3.0));
        let cli = CliOverrides {
            quality: Some(Quality::Medium),
            delay_min: Some(0.0),
            delay_max: None,
            output_path: Some(PathBuf::from("/cli")),
        };

        let settings = resolve(&global, Some(&cat), &cli).unwrap();
        assert_eq!(settings.quality, Quality::Medium);
        assert_eq!(settings.delay.min_secs(), 0.0);
        assert_eq!(settings.delay.max_secs(), 3.0);
        assert_eq!(settings.output_path, PathBuf::from("/cli/clips"));
    }

    #[test]
    fn category_output_path_beats_global() {
        let global = GlobalSettings {
            default_output_path: Some(PathBuf::from("/global")),
            ..Default::default()
        };
        let mut cat = category("docs");
        cat.output_path = Some(PathBuf::from("/elsewhere/docs"));
        let settings = resolve(&global, Some(&cat), &CliOverrides::default()).unwrap();
        assert_eq!(settings.output_path, PathBuf::from("/elsewhere/docs"));
    }

    #[test]
    fn rejects_unknown_category_quality_naming_the_field() {
        let mut cat = category("movies");
        cat.quality = Some("ultra".to_string());
        let err = resolve(&GlobalSettings::default(), Some(&cat), &CliOverrides::default())
            .unwrap_err();
        let text = err.to_string();
        assert!(matches!(err, DownloaderError::Config { .. }));
        assert!(text.contains("movies"), "{text}");
        assert!(text.contains("ultra"), "{text}");
    }

    #[test]
    fn rejects_inverted_delay_after_merge() {
        let cli = CliOverrides {
            delay_min: Some(20.0),
            ..Default::default()
        };
        let err = resolve(&GlobalSettings::default(), None, &cli).unwrap_err();
        assert!(matches!(err, DownloaderError::Config { .. }));
    }

    #[test]
    fn oversized_cli_delay_is_a_config_error() {
        let cli = CliOverrides {
            delay_min: Some(1e20),
            delay_max: Some(1e20),
            ..Default::default()
        };
        let err = resolve(&GlobalSettings::default(), None, &cli).unwrap_err();
        assert!(matches!(err, DownloaderError::Config { .. }));
        assert!(err.to_string().contains("must not exceed"), "{err}");
    }

    #[test]
    fn resolution_is_repeatable_byte_for_byte() {
        let mut cat = category("series");
        cat.quality = Some("medium".to_string());
        cat.delay_range = Some((1.5, 2.5));
        let cli = CliOverrides {
            output_path: Some(PathBuf::from("out")),
            ..Default::default()
        };
        let a = resolve(&GlobalSettings::default(), Some(&cat), &cli).unwrap();
        let b = resolve(&GlobalSettings::default(), Some(&cat), &cli).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }
}
