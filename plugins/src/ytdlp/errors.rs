use mediaq_core::EngineFailure;

const DISK_MARKERS: &[&str] = &[
    "Permission denied",
    "No space left",
    "Read-only file system",
];

/// Map a non-zero engine exit to a failure using the captured stderr tail.
pub fn classify_failure(exit_code: Option<i32>, stderr_tail: &str) -> EngineFailure {
    let last_error = stderr_tail
        .lines()
        .rev()
        .map(str::trim)
        .find_map(|l| l.strip_prefix("ERROR:"))
        .map(|msg| msg.trim().to_string())
        .filter(|msg| !msg.is_empty());

    if stderr_tail.contains("Unsupported URL") {
        return EngineFailure::Unsupported(last_error.unwrap_or_else(|| "Unsupported URL".into()));
    }

    if let Some(marker) = DISK_MARKERS.iter().find(|m| stderr_tail.contains(**m)) {
        return EngineFailure::Disk(last_error.unwrap_or_else(|| (*marker).to_string()));
    }

    let message = last_error.unwrap_or_else(|| match exit_code {
        Some(code) => format!("Download failed (exit code {code})"),
        None => "Download failed".to_string(),
    });
    EngineFailure::Network(message)
}
