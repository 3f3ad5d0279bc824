use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::task::{Task, TaskId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Quality {
    #[default]
    #[serde(rename = "best")]
    Best,
    #[serde(rename = "1080")]
    P1080,
    #[serde(rename = "720")]
    P720,
    #[serde(rename = "480")]
    P480,
    #[serde(rename = "360")]
    P360,
    #[serde(rename = "audio")]
    Audio,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Best => "best",
            Self::P1080 => "1080",
            Self::P720 => "720",
            Self::P480 => "480",
            Self::P360 => "360",
            Self::Audio => "audio",
        }
    }

    /// Maximum video height, when capped.
    pub fn max_height(&self) -> Option<u32> {
        match self {
            Self::P1080 => Some(1080),
            Self::P720 => Some(720),
            Self::P480 => Some(480),
            Self::P360 => Some(360),
            Self::Best | Self::Audio => None,
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
        match s.trim().to_ascii_lowercase().trim_end_matches('p') {
            "best" => Ok(Self::Best),
            "1080" => Ok(Self::P1080),
            "720" => Ok(Self::P720),
            "480" => Ok(Self::P480),
            "360" => Ok(Self::P360),
            "audio" => Ok(Self::Audio),
            other => Err(format!("unknown quality: {other}")),
        }
    }
}

/// Output container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mkv,
    Webm,
    Mp3,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mkv => "mkv",
            Self::Webm => "webm",
            Self::Mp3 => "mp3",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(self, Self::Mp3)
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "mkv" => Ok(Self::Mkv),
            "webm" => Ok(Self::Webm),
            "mp3" => Ok(Self::Mp3),
            other => Err(format!("unknown format: {other}")),
        }
    }
}

/// Per-run settings. Cloned into the run at `start`, so later edits never
/// reach an in-flight run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSettings {
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub format: OutputFormat,
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default)]
    pub download_playlist: bool,
}

fn default_output_dir() -> String {
    "./downloads".to_string()
}

impl Default for QueueSettings {
    fn default() -> Self {
        Self {
            quality: Quality::default(),
            format: OutputFormat::default(),
            output_dir: default_output_dir(),
            download_playlist: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub task_id: TaskId,
    pub url: String,
    pub output_dir: String,
    pub quality: Quality,
    pub format: OutputFormat,
    pub download_playlist: bool,
}

impl DownloadRequest {
    pub fn new(task: &Task, settings: &QueueSettings) -> Self {
        Self {
            task_id: task.id.clone(),
            url: task.url.clone(),
            output_dir: settings.output_dir.clone(),
            quality: settings.quality,
            format: settings.format,
            download_playlist: settings.download_playlist,
        }
    }
}
