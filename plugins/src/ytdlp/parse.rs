use std::sync::OnceLock;

use mediaq_core::{ProgressEvent, TaskId};
use regex::Regex;

fn item_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"Downloading (?:item|video) (\d+) of (\d+)").expect("valid regex")
    })
}

fn destination_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\[(?:download|ExtractAudio)\] Destination: (.+)$|^\[Merger\] Merging formats into "(.+)"$"#)
            .expect("valid regex")
    })
}

fn playlist_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[download\] Downloading playlist: (.+)$").expect("valid regex")
    })
}

fn percent_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\[download\]\s+(\d+(?:\.\d+)?)%(?:.*?\bat\s+(\S+))?(?:.*?\bETA\s+(\S+))?")
            .expect("valid regex")
    })
}

fn format_suffix_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\.f\d+$").expect("valid regex"))
}

/// Title from an output path: file name without directory, extension or
/// yt-dlp's `.fNNN` per-format suffix.
pub fn title_from_path(path: &str) -> Option<String> {
    let path = path.trim().trim_matches('"');
    let name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = match name.rfind('.') {
        Some(0) | None => name,
        Some(dot) => &name[..dot],
    };
    let stem = format_suffix_re().replace(stem, "");
    let stem = stem.trim();
    (!stem.is_empty()).then(|| stem.to_string())
}

/// Per-download parser state. Feed it stdout lines in order; it yields a
/// progress event for every percentage line, stamped with the most recently
/// seen title and playlist position.
#[derive(Debug)]
pub struct OutputTracker {
    task_id: TaskId,
    title: Option<String>,
    playlist_name: Option<String>,
    index: Option<u32>,
    count: Option<u32>,
}

impl OutputTracker {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            title: None,
            playlist_name: None,
            index: None,
            count: None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref().or(self.playlist_name.as_deref())
    }

    pub fn playlist_name(&self) -> Option<&str> {
        self.playlist_name.as_deref()
    }

    pub fn feed(&mut self, line: &str) -> Option<ProgressEvent> {
        let line = line.trim_end();

        if let Some(caps) = playlist_re().captures(line) {
            self.playlist_name = Some(caps[1].trim().to_string());
            return None;
        }

        if let Some(caps) = item_re().captures(line) {
            self.index = caps[1].parse().ok();
            self.count = caps[2].parse().ok();
            // A new item; the previous file's title no longer applies.
            self.title = None;
            return None;
        }

        if let Some(caps) = destination_re().captures(line) {
            let path = caps.get(1).or_else(|| caps.get(2))?;
            if let Some(title) = title_from_path(path.as_str()) {
                self.title = Some(title);
            }
            return None;
        }

        let caps = percent_re().captures(line)?;
        let percent: f64 = caps[1].parse().ok()?;
        let speed = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        let eta = caps.get(3).map(|m| m.as_str()).unwrap_or_default();

        Some(self.stamp(
            ProgressEvent::downloading(self.task_id.clone(), percent).with_rate(speed, eta),
        ))
    }

    /// Event for a clean engine exit.
    pub fn finished(&self) -> ProgressEvent {
        self.stamp(ProgressEvent::finished(self.task_id.clone()))
    }

    fn stamp(&self, mut event: ProgressEvent) -> ProgressEvent {
        if let Some(title) = self.title() {
            event = event.with_title(title);
        }
        if let (Some(index), Some(count)) = (self.index, self.count) {
            event = event.with_playlist(index, count);
        }
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mediaq_core::EngineStatus;
    use pretty_assertions::assert_eq;

    fn tracker() -> OutputTracker {
        OutputTracker::new(TaskId::from("t1"))
    }

    #[test]
    fn parses_percent_speed_and_eta() {
        let mut t = tracker();
        let ev = t
            .feed("[download]  42.3% of ~ 10.00MiB at  1.20MiB/s ETA 00:05 (frag 3/10)")
            .unwrap();
        assert_eq!(ev.status, EngineStatus::Downloading);
        assert_eq!(ev.percent, 42.3);
        assert_eq!(ev.speed, "1.20MiB/s");
        assert_eq!(ev.eta, "00:05");
        assert_eq!(ev.title, None);
        assert_eq!(ev.playlist_position(), None);
    }

    #[test]
    fn percent_without_rate() {
        let mut t = tracker();
        let ev = t.feed("[download] 100% of 10.00MiB").unwrap();
        assert_eq!(ev.percent, 100.0);
        assert_eq!(ev.speed, "");
        assert_eq!(ev.eta, "");
    }

    #[test]
    fn ignores_unrelated_lines() {
        let mut t = tracker();
        assert!(t.feed("[youtube] abc: Downloading webpage").is_none());
        assert!(t.feed("[info] abc: Downloading 1 format(s): 22").is_none());
        assert!(t.feed("").is_none());
    }

    #[test]
    fn learns_title_from_destination() {
        let mut t = tracker();
        t.feed("[download] Destination: /data/videos/My Clip.f137.mp4");
        let ev = t.feed("[download]  10.0% of 5MiB at 1MiB/s ETA 00:04").unwrap();
        assert_eq!(ev.title.as_deref(), Some("My Clip"));

        t.feed("[ExtractAudio] Destination: C:\\music\\Song Name.mp3");
        assert_eq!(t.title(), Some("Song Name"));

        t.feed("[Merger] Merging formats into \"/data/videos/Final Cut.mkv\"");
        assert_eq!(t.title(), Some("Final Cut"));
    }

    #[test]
    fn tracks_playlist_position_and_name() {
        let mut t = tracker();
        t.feed("[download] Downloading playlist: Road Trip");
        assert_eq!(t.playlist_name(), Some("Road Trip"));

        t.feed("[download] Downloading item 2 of 5");
        let ev = t.feed("[download]  50.0% of 3MiB at 1MiB/s ETA 00:01").unwrap();
        assert_eq!(ev.playlist_index, Some(2));
        assert_eq!(ev.playlist_count, Some(5));
        assert_eq!(ev.title.as_deref(), Some("Road Trip"));

        t.feed("[download] Destination: ./downloads/Episode 2.webm");
        t.feed("[download] Downloading video 3 of 5");
        assert_eq!(t.title(), Some("Road Trip"));

        let done = t.finished();
        assert_eq!(done.status, EngineStatus::Finished);
        assert_eq!(done.percent, 100.0);
        assert_eq!(done.playlist_index, Some(3));
    }

    #[test]
    fn title_from_path_edge_cases() {
        assert_eq!(title_from_path("plain"), Some("plain".to_string()));
        assert_eq!(title_from_path(".hidden"), Some(".hidden".to_string()));
        assert_eq!(title_from_path("/dir/"), None);
        assert_eq!(title_from_path("a/b.c.d.mp4"), Some("b.c.d".to_string()));
    }
}
