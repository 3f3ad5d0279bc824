use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use mediaq_core::{QueueEvent, RunPhase, RunSummary, Task, TaskId, TaskStatus};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::commands::cli::ProgressMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Bars,
    Plain,
    Jsonl,
    Quiet,
}

impl RenderMode {
    pub fn resolve(mode: ProgressMode) -> Self {
        match mode {
            ProgressMode::Auto if atty::is(atty::Stream::Stderr) => Self::Bars,
            ProgressMode::Auto | ProgressMode::Plain => Self::Plain,
            ProgressMode::Bars => Self::Bars,
            ProgressMode::Jsonl => Self::Jsonl,
            ProgressMode::Quiet => Self::Quiet,
        }
    }
}

fn status_icon(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "⏳",
        TaskStatus::Downloading => "⬇",
        TaskStatus::Completed => "✅",
        TaskStatus::Error => "❌",
        TaskStatus::Cancelled => "⏹",
    }
}

/// One-line description of a task for plain output and finished bars.
pub fn task_line(task: &Task) -> String {
    let mut line = format!(
        "{} [{}] {}",
        status_icon(task.status),
        task.platform.label(),
        task.title
    );
    if task.has_real_title() {
        line.push_str(&format!(" <{}>", task.url));
    }
    if let Some(err) = task.error.as_deref() {
        line.push_str(&format!(": {err}"));
    }
    line
}

fn bar_message(task: &Task) -> String {
    let mut msg = task.title.clone();
    if let Some(pos) = task.playlist {
        msg.push_str(&format!(" [{}/{}]", pos.index, pos.total));
    }
    if !task.speed.is_empty() {
        msg.push_str(&format!("  {}", task.speed));
    }
    if !task.eta.is_empty() {
        msg.push_str(&format!("  ETA {}", task.eta));
    }
    msg
}

/// Renders queue events: progress bars, plain status lines or JSON lines.
pub struct ProgressMonitor {
    mode: RenderMode,
    multi: MultiProgress,
    overall: ProgressBar,
    task_bars: HashMap<TaskId, ProgressBar>,
    settled: HashSet<TaskId>,
}

impl ProgressMonitor {
    pub fn new(mode: RenderMode) -> Self {
        let multi = MultiProgress::new();
        if mode != RenderMode::Bars {
            multi.set_draw_target(ProgressDrawTarget::hidden());
        }
        let overall = multi.add(ProgressBar::new(0));
        overall.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} downloads {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▓▒░  "),
        );

        Self {
            mode,
            multi,
            overall,
            task_bars: HashMap::new(),
            settled: HashSet::new(),
        }
    }

    /// Handle one event. Returns true once the run has finished.
    pub fn handle(&mut self, event: &QueueEvent) -> bool {
        if self.mode == RenderMode::Jsonl {
            match serde_json::to_string(event) {
                Ok(line) => {
                    let mut out = std::io::stdout().lock();
                    let _ = writeln!(out, "{line}");
                    let _ = out.flush();
                }
                Err(e) => tracing::warn!(error = %e, kind = event.kind(), "failed to encode event"),
            }
            return matches!(event, QueueEvent::RunFinished { .. });
        }

        match event {
            QueueEvent::RunStarted { total, .. } => {
                self.overall.set_length(*total as u64);
                self.overall.set_position(0);
                self.settled.clear();
            }
            QueueEvent::TaskUpdated { task } => self.on_task(task),
            QueueEvent::PlaylistContextChanged { context } => match context {
                Some(ctx) => self
                    .overall
                    .set_message(format!("playlist {}/{}: {}", ctx.index, ctx.total, ctx.title)),
                None => self.overall.set_message(""),
            },
            QueueEvent::PhaseChanged {
                phase: RunPhase::Stopping,
            } => {
                self.overall.set_message("stopping...");
                if self.mode == RenderMode::Plain {
                    eprintln!("stopping after the current download...");
                }
            }
            QueueEvent::RunFinished { summary } => {
                self.finish(summary);
                return true;
            }
            _ => {}
        }
        false
    }

    fn on_task(&mut self, task: &Task) {
        match task.status {
            TaskStatus::Pending => {}
            TaskStatus::Downloading => {
                if self.mode == RenderMode::Plain && !self.task_bars.contains_key(&task.id) {
                    eprintln!("{} {}", status_icon(task.status), task.url);
                }
                let bar = self.bar_for(&task.id);
                bar.set_position(task.progress.round() as u64);
                bar.set_message(bar_message(task));
            }
            status if status.is_terminal() => {
                if !self.settled.insert(task.id.clone()) {
                    return;
                }
                self.overall.inc(1);
                match self.task_bars.remove(&task.id) {
                    Some(bar) if self.mode == RenderMode::Bars => {
                        bar.set_position(task.progress.round() as u64);
                        bar.finish_with_message(task_line(task));
                    }
                    _ => {
                        if self.mode == RenderMode::Plain {
                            eprintln!("{}", task_line(task));
                        }
                    }
                }
            }
            _ => {}
        }
    }

    fn bar_for(&mut self, id: &TaskId) -> ProgressBar {
        if let Some(bar) = self.task_bars.get(id) {
            return bar.clone();
        }
        let bar = self.multi.add(ProgressBar::new(100));
        bar.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} {bar:25.green/white} {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", " "]),
        );
        if self.mode == RenderMode::Bars {
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        self.task_bars.insert(id.clone(), bar.clone());
        bar
    }

    fn finish(&mut self, summary: &RunSummary) {
        for (_, bar) in self.task_bars.drain() {
            bar.finish_and_clear();
        }
        let msg = if summary.stopped {
            "⏹ stopped"
        } else if summary.is_clean() {
            "✅ all downloads completed"
        } else {
            "❌ some downloads failed"
        };
        self.overall.finish_with_message(msg);
    }

    pub fn settled_count(&self) -> usize {
        self.settled.len()
    }
}

impl Drop for ProgressMonitor {
    fn drop(&mut self) {
        for (_, bar) in self.task_bars.drain() {
            bar.finish_and_clear();
        }
    }
}

/// Drain queue events into the monitor until the run finishes or the
/// channel closes.
pub async fn drive(mut rx: broadcast::Receiver<QueueEvent>, mut monitor: ProgressMonitor) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                if monitor.handle(&event) {
                    break;
                }
            }
            Err(RecvError::Lagged(n)) => {
                tracing::debug!(skipped = n, "renderer lagged behind queue events");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
