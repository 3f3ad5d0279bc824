use std::time::Duration;

use mediaq_core::config::AppConfig;
use mediaq_core::error::CliError;
use mediaq_core::task::parse_url_list;
use mediaq_core::{QueueOrchestrator, RunSummary, TaskStatus};
use mediaq_plugins::factory::build_engine;
use tokio::io::AsyncReadExt;

use crate::commands::cli::Args;
use crate::render::{self, task_line, ProgressMonitor, RenderMode};

/// Exit code when a run was interrupted by Ctrl-C.
pub const EXIT_STOPPED: i32 = 130;
pub const EXIT_FAILURES: i32 = 1;

pub fn exit_code_for_summary(summary: &RunSummary) -> i32 {
    if summary.stopped {
        EXIT_STOPPED
    } else if summary.is_clean() {
        0
    } else {
        EXIT_FAILURES
    }
}

/// Gather URLs from positional arguments, `--file` lists and stdin, in that
/// order. Validation and de-duplication happen when they are enqueued.
pub async fn collect_urls(args: &Args) -> Result<Vec<String>, CliError> {
    let mut urls: Vec<String> = args
        .urls
        .iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    for path in &args.file {
        let text = tokio::fs::read_to_string(path).await.map_err(|e| {
            CliError::Command(format!("read url list {} failed: {e}", path.display()))
        })?;
        let listed = parse_url_list(&text);
        tracing::debug!(file = %path.display(), urls = listed.len(), "read url list");
        urls.extend(listed);
    }

    if args.stdin {
        let mut text = String::new();
        tokio::io::stdin().read_to_string(&mut text).await?;
        urls.extend(parse_url_list(&text));
    }

    Ok(urls)
}

pub async fn run_queue(args: Args, cfg: AppConfig) -> Result<i32, CliError> {
    let urls = collect_urls(&args).await?;
    if urls.is_empty() {
        return Err(CliError::Command(
            "no URLs given (pass them as arguments, --file or --stdin)".into(),
        ));
    }

    let settings = args.settings(&cfg.queue.defaults);
    let mut options = cfg.queue.orchestrator_options();
    if let Some(secs) = args.timeout {
        options.engine_timeout = (secs > 0).then(|| Duration::from_secs(secs));
    }

    let mut engine_cfg = cfg.engine.clone();
    if let Some(bin) = args.engine_bin.as_deref().filter(|b| !b.trim().is_empty()) {
        engine_cfg.binary = bin.to_string();
    }

    let orchestrator = QueueOrchestrator::new(build_engine(&engine_cfg), options);
    let mode = RenderMode::resolve(args.progress);
    let renderer = tokio::spawn(render::drive(
        orchestrator.subscribe(),
        ProgressMonitor::new(mode),
    ));

    let ids = orchestrator.add(&urls).await;
    let skipped = urls.len() - ids.len();
    if skipped > 0 {
        tracing::warn!(skipped, "ignored invalid or duplicate URLs");
        if mode != RenderMode::Jsonl {
            eprintln!("skipped {skipped} invalid or duplicate URL(s)");
        }
    }
    if ids.is_empty() {
        renderer.abort();
        return Err(CliError::Command("no valid URLs to download".into()));
    }

    tokio::fs::create_dir_all(&settings.output_dir)
        .await
        .map_err(|e| CliError::Command(format!("create {} failed: {e}", settings.output_dir)))?;

    let handle = orchestrator.start(settings).await?;
    tracing::info!(run_id = handle.run_id(), tasks = ids.len(), "queue started");

    let stopper = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, stopping queue");
                orchestrator.stop().await;
            }
        })
    };

    let summary = handle.wait().await?;
    stopper.abort();
    if let Err(e) = renderer.await {
        tracing::debug!(error = %e, "renderer task ended abnormally");
    }

    if !matches!(mode, RenderMode::Jsonl | RenderMode::Quiet) {
        print_report(&orchestrator, &summary).await;
    }
    Ok(exit_code_for_summary(&summary))
}

async fn print_report(orchestrator: &QueueOrchestrator, summary: &RunSummary) {
    for task in orchestrator.snapshot().await {
        if task.status != TaskStatus::Completed {
            eprintln!("{}", task_line(&task));
        }
    }
    eprintln!(
        "{} completed, {} failed, {} cancelled, {} not started in {:.1}s",
        summary.completed,
        summary.failed,
        summary.cancelled,
        summary.pending,
        summary.duration_ms as f64 / 1000.0
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn exit_codes_follow_summary() {
        let clean = RunSummary {
            total: 2,
            completed: 2,
            ..Default::default()
        };
        assert_eq!(exit_code_for_summary(&clean), 0);

        let failed = RunSummary {
            failed: 1,
            ..clean.clone()
        };
        assert_eq!(exit_code_for_summary(&failed), EXIT_FAILURES);

        let stopped = RunSummary {
            stopped: true,
            ..clean
        };
        assert_eq!(exit_code_for_summary(&stopped), EXIT_STOPPED);
    }

    #[tokio::test]
    async fn collects_arguments_then_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "# saved list\nhttps://vimeo.com/1\n\n  https://vimeo.com/2  \nnot-a-url"
        )
        .unwrap();

        let path = file.path().to_string_lossy().into_owned();
        let args = Args::parse_from(["mediaq", " https://youtu.be/a ", "--file", &path]);
        let urls = collect_urls(&args).await.unwrap();
        assert_eq!(
            urls,
            vec!["https://youtu.be/a", "https://vimeo.com/1", "https://vimeo.com/2"]
        );
    }

    #[tokio::test]
    async fn missing_url_file_is_an_error() {
        let args = Args::parse_from(["mediaq", "--file", "/nonexistent/urls.txt"]);
        assert!(matches!(
            collect_urls(&args).await,
            Err(CliError::Command(_))
        ));
    }
}
