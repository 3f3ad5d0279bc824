use std::path::PathBuf;

use clap::Parser;
use mediaq_core::{OutputFormat, Quality, QueueSettings};

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Progress bars on a terminal, plain lines otherwise.
    Auto,
    Bars,
    Plain,
    /// Queue events as JSON lines on stdout.
    Jsonl,
    Quiet,
}

#[derive(Parser, Debug)]
#[command(name = "mediaq", version, about = "Download a queue of media URLs with yt-dlp")]
pub struct Args {
    /// URLs to enqueue, in order.
    pub urls: Vec<String>,

    /// Read URLs from a file, one per line. `#` starts a comment.
    #[arg(long, short = 'f', action = clap::ArgAction::Append)]
    pub file: Vec<PathBuf>,

    /// Read URLs from stdin.
    #[arg(long)]
    pub stdin: bool,

    /// best, 1080, 720, 480, 360 or audio.
    #[arg(long, short = 'q')]
    pub quality: Option<Quality>,

    /// mp4, mkv, webm or mp3.
    #[arg(long)]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'o')]
    pub output: Option<String>,

    /// Expand playlist URLs into every item.
    #[arg(long)]
    pub playlist: bool,

    /// Per-download timeout in seconds. 0 disables it.
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Config file to use instead of the default lookup.
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ProgressMode::Auto)]
    pub progress: ProgressMode,

    /// yt-dlp binary to run.
    #[arg(long)]
    pub engine_bin: Option<String>,
}

impl Args {
    /// Merge command-line overrides into the configured defaults.
    pub fn settings(&self, defaults: &QueueSettings) -> QueueSettings {
        let mut settings = defaults.clone();
        if let Some(quality) = self.quality {
            settings.quality = quality;
        }
        if let Some(format) = self.format {
            settings.format = format;
        }
        if let Some(output) = self.output.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            settings.output_dir = output.to_string();
        }
        if self.playlist {
            settings.download_playlist = true;
        }
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn flags_override_defaults() {
        let args = Args::parse_from([
            "mediaq",
            "-q",
            "720p",
            "--format",
            "mkv",
            "--playlist",
            "-o",
            "/srv/media",
            "https://youtu.be/abc",
        ]);
        let settings = args.settings(&QueueSettings::default());
        assert_eq!(settings.quality, Quality::P720);
        assert_eq!(settings.format, OutputFormat::Mkv);
        assert_eq!(settings.output_dir, "/srv/media");
        assert!(settings.download_playlist);
        assert_eq!(args.urls, vec!["https://youtu.be/abc"]);
    }

    #[test]
    fn defaults_survive_without_flags() {
        let args = Args::parse_from(["mediaq", "--file", "list.txt"]);
        let defaults = QueueSettings {
            quality: Quality::Audio,
            download_playlist: true,
            ..Default::default()
        };
        assert_eq!(args.settings(&defaults), defaults);
        assert_eq!(args.progress, ProgressMode::Auto);
        assert_eq!(args.file, vec![PathBuf::from("list.txt")]);
    }

    #[test]
    fn rejects_unknown_quality() {
        assert!(Args::try_parse_from(["mediaq", "-q", "8k", "https://youtu.be/abc"]).is_err());
    }
}
