use crate::error::BackendError;
use crate::types::{MediaInfo, ResolvedJob};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::process::Command;

pub const OUTPUT_TEMPLATE: &str = "%(uploader)s - %(title)s [%(id)s].%(ext)s";

#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Name of the backend (for logging)
    fn name(&self) -> &'static str;

    /// Metadata only, no download side effect.
    async fn extract_info(&self, job: &ResolvedJob) -> Result<MediaInfo, BackendError>;

    async fn download(&self, job: &ResolvedJob) -> Result<(), BackendError>;
}

/// Drives the `yt-dlp` executable.
pub struct YtDlpBackend {
    ytdlp_bin: PathBuf,
    ffmpeg_dir: Option<PathBuf>,
}

impl YtDlpBackend {
    pub fn new(ytdlp_bin: impl Into<PathBuf>, ffmpeg_dir: Option<PathBuf>) -> Self {
        Self {
            ytdlp_bin: ytdlp_bin.into(),
            ffmpeg_dir,
        }
    }

    /// Looks up `yt-dlp` and `ffmpeg` on the PATH and a few common install
    /// locations.
    pub fn detect() -> Self {
        let ytdlp_bin = find_tool("yt-dlp", &["/opt/homebrew/bin/yt-dlp", "/usr/local/bin/yt-dlp"])
            .unwrap_or_else(|| PathBuf::from("yt-dlp"));
        let ffmpeg_dir = find_tool(
            "ffmpeg",
            &[
                "/usr/local/bin/ffmpeg",
                "/opt/homebrew/bin/ffmpeg",
                "C:\\ffmpeg\\bin\\ffmpeg.exe",
            ],
        )
        .and_then(|p| p.parent().map(Path::to_path_buf));
        if ffmpeg_dir.is_none() {
            warn!("FFmpeg not found. Video processing may be limited.");
        }
        Self::new(ytdlp_bin, ffmpeg_dir)
    }

    pub fn info_args(&self, job: &ResolvedJob) -> Vec<String> {
        let mut args = vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
        ];
        if let Some(cookies) = &job.cookie_file {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        args.push(job.url.clone());
        args
    }

    pub fn download_args(&self, job: &ResolvedJob) -> Vec<String> {
        let mut args = Vec::new();
        let mut template = OUTPUT_TEMPLATE.to_string();

        for (key, value) in &job.options {
            match key.as_str() {
                "outtmpl" => {
                    if let Some(t) = value.as_str() {
                        template = t.to_string();
                    }
                }
                "audioformat" => {}
                "extractaudio" => {
                    if value.as_bool() == Some(true) {
                        args.push("-x".to_string());
                        if let Some(fmt) = job.options.get("audioformat").and_then(scalar) {
                            args.push("--audio-format".to_string());
                            args.push(fmt);
                        }
                    }
                }
                _ => push_option(&mut args, key, value),
            }
        }

        if let Some(cookies) = &job.cookie_file {
            args.push("--cookies".to_string());
            args.push(cookies.display().to_string());
        }
        if let Some(dir) = &self.ffmpeg_dir {
            args.push("--ffmpeg-location".to_string());
            args.push(dir.display().to_string());
        }
        args.push("--no-playlist".to_string());
        args.push("-o".to_string());
        args.push(job.output_path.join(template).display().to_string());
        args.push(job.url.clone());
        args
    }

    async fn run(&self, args: &[String]) -> Result<Vec<u8>, BackendError> {
        debug!("{} {}", self.ytdlp_bin.display(), args.join(" "));
        let output = Command::new(&self.ytdlp_bin)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    BackendError::ToolNotFound(self.ytdlp_bin.display().to_string())
                }
                _ => BackendError::Execution {
                    status: "spawn error".to_string(),
                    stderr: e.to_string(),
                },
            })?;

        if output.status.success() {
            Ok(output.stdout)
        } else {
            Err(BackendError::Execution {
                status: output.status.to_string(),
                stderr: last_line(&output.stderr),
            })
        }
    }
}

#[async_trait]
impl MediaBackend for YtDlpBackend {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn extract_info(&self, job: &ResolvedJob) -> Result<MediaInfo, BackendError> {
        let stdout = self.run(&self.info_args(job)).await?;
        parse_media_info(&stdout)
    }

    async fn download(&self, job: &ResolvedJob) -> Result<(), BackendError> {
        tokio::fs::create_dir_all(&job.output_path)
            .await
            .map_err(|e| BackendError::Execution {
                status: "output directory".to_string(),
                stderr: format!("{}: {}", job.output_path.display(), e),
            })?;
        self.run(&self.download_args(job)).await.map(|_| ())
    }
}

fn find_tool(name: &str, common_paths: &[&str]) -> Option<PathBuf> {
    which::which(name).ok().or_else(|| {
        common_paths
            .iter()
            .map(PathBuf::from)
            .find(|p| p.is_file())
    })
}

/// Maps a backend option name to its command-line flag.
fn flag_for(key: &str) -> String {
    match key {
        "format" => "-f".to_string(),
        "writeinfojson" => "--write-info-json".to_string(),
        "writesubtitles" => "--write-subs".to_string(),
        "writeautomaticsub" => "--write-auto-subs".to_string(),
        "subtitleslangs" => "--sub-langs".to_string(),
        "embed_subs" => "--embed-subs".to_string(),
        "writethumbnail" => "--write-thumbnail".to_string(),
        "writedescription" => "--write-description".to_string(),
        "ignoreerrors" => "--ignore-errors".to_string(),
        "ratelimit" => "--limit-rate".to_string(),
        "ffmpeg_location" => "--ffmpeg-location".to_string(),
        other => format!("--{}", other.replace('_', "-")),
    }
}

fn push_option(args: &mut Vec<String>, key: &str, value: &Value) {
    match value {
        Value::Bool(true) => args.push(flag_for(key)),
        Value::Bool(false) | Value::Null => {}
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().filter_map(scalar).collect();
            if !joined.is_empty() {
                args.push(flag_for(key));
                args.push(joined.join(","));
            }
        }
        Value::Object(_) => debug!("Skipping nested backend option '{}'", key),
        other => {
            if let Some(v) = scalar(other) {
                args.push(flag_for(key));
                args.push(v);
            }
        }
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn last_line(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("no error output")
        .trim()
        .to_string()
}

pub fn parse_media_info(stdout: &[u8]) -> Result<MediaInfo, BackendError> {
    let json: Value = serde_json::from_slice(stdout)
        .map_err(|e| BackendError::Parse(format!("JSON parse error: {}", e)))?;

    Ok(MediaInfo {
        id: json["id"].as_str().unwrap_or("").to_string(),
        title: json["title"].as_str().unwrap_or("N/A").to_string(),
        uploader: json["uploader"].as_str().unwrap_or("N/A").to_string(),
        duration_secs: json["duration"].as_f64(),
        view_count: json["view_count"].as_u64(),
    })
}
