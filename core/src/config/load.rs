use std::path::{Path, PathBuf};

use super::types::AppConfig;

/// Get the default mediaq data directory: ~/.mediaq
pub fn get_mediaq_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".mediaq"))
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.mediaq/config.toml
    let user_config = get_mediaq_data_dir()?.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let cfg = if user_config.exists() {
        read_config(&user_config)?
    } else if local_config.exists() {
        read_config(local_config)?
    } else {
        AppConfig::default()
    };

    Ok(finalize(cfg))
}

/// Load an explicit config file. Environment overrides still apply.
pub fn load_from_path(path: &Path) -> anyhow::Result<AppConfig> {
    Ok(finalize(read_config(path)?))
}

fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("read {} failed: {e}", path.display()))?;
    let cfg = toml::from_str::<AppConfig>(&s)
        .map_err(|e| anyhow::anyhow!("parse {} failed: {e}", path.display()))?;
    Ok(cfg)
}

fn finalize(mut cfg: AppConfig) -> AppConfig {
    // Environment variable overrides (highest priority)
    if let Ok(v) = std::env::var("MEDIAQ_OUTPUT_DIR") {
        if !v.trim().is_empty() {
            cfg.queue.defaults.output_dir = v;
        }
    }
    if let Ok(v) = std::env::var("MEDIAQ_ENGINE_BIN") {
        if !v.trim().is_empty() {
            cfg.engine.binary = v;
        }
    }

    cfg.queue.defaults.output_dir = shellexpand::tilde(&cfg.queue.defaults.output_dir).into_owned();
    cfg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{OutputFormat, Quality};
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn loads_partial_file_with_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[queue]
engine_timeout_secs = 600

[queue.defaults]
quality = "720"
format = "mp3"
output_dir = "/tmp/media"
download_playlist = true

[engine]
extra_args = ["--no-mtime"]
"#
        )
        .unwrap();

        let cfg = load_from_path(file.path()).unwrap();
        assert_eq!(cfg.queue.defaults.quality, Quality::P720);
        assert_eq!(cfg.queue.defaults.format, OutputFormat::Mp3);
        assert!(cfg.queue.defaults.download_playlist);
        assert_eq!(cfg.engine.extra_args, vec!["--no-mtime".to_string()]);
        assert_eq!(cfg.engine.cancel_grace_ms, 2000);
        assert!(cfg.logging.enabled);
        assert_eq!(
            cfg.queue.orchestrator_options().engine_timeout,
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn zero_timeout_means_none() {
        let mut cfg = AppConfig::default();
        cfg.queue.engine_timeout_secs = Some(0);
        assert_eq!(cfg.queue.orchestrator_options().engine_timeout, None);
    }

    #[test]
    fn rejects_malformed_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[queue.defaults]\nquality = \"8k\"").unwrap();
        assert!(load_from_path(file.path()).is_err());
    }
}
