use mediaq_core::{DownloadRequest, OutputFormat, Quality};

/// yt-dlp `-f` selector for a quality/container pair.
pub fn build_format_string(quality: Quality, format: OutputFormat) -> String {
    if quality == Quality::Audio || format.is_audio() {
        return "bestaudio[ext=m4a]/bestaudio/best".to_string();
    }

    match (format, quality.max_height()) {
        (OutputFormat::Mp4, Some(h)) => format!(
            "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/bestvideo[height<={h}]+bestaudio/best[height<={h}]/best"
        ),
        (OutputFormat::Mp4, None) => {
            "bestvideo[ext=mp4]+bestaudio[ext=m4a]/bestvideo+bestaudio/best".to_string()
        }
        (_, Some(h)) => format!("bestvideo[height<={h}]+bestaudio/best[height<={h}]/best"),
        (_, None) => "bestvideo+bestaudio/best".to_string(),
    }
}

/// Full argument vector for one download. `extra` goes right before the URL.
pub fn build_args(request: &DownloadRequest, extra: &[String]) -> Vec<String> {
    let output_dir = request.output_dir.trim_end_matches(['/', '\\']);
    let output_dir = if output_dir.is_empty() { "." } else { output_dir };

    let mut args = vec![
        "--newline".to_string(),
        "-f".to_string(),
        build_format_string(request.quality, request.format),
        "-o".to_string(),
        format!("{output_dir}/%(title)s.%(ext)s"),
    ];

    if !request.download_playlist {
        args.push("--no-playlist".to_string());
    }

    if request.format.is_audio() {
        args.extend(["-x", "--audio-format", "mp3"].map(String::from));
    } else {
        args.push("--merge-output-format".to_string());
        args.push(request.format.as_str().to_string());
    }

    args.extend(extra.iter().cloned());
    args.push(request.url.clone());
    args
}
