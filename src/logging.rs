//! Logging initialization.
//!
//! Logs go to stderr, or to `<state>/logs/assetpack-{datetime}.log` when
//! `logging.to_file` is set. `--debug` wins over `RUST_LOG`, which wins over
//! the configured level.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Flushes buffered file output when dropped
    pub _guard: Option<WorkerGuard>,

    /// Path to the log file, when file logging is enabled
    pub log_file_path: Option<PathBuf>,
}

/// Level filter directive: `--debug`, then `RUST_LOG`, then the config
fn filter_directive(config: &Config, debug_override: bool, rust_log: Option<String>) -> String {
    if debug_override {
        return "debug".to_string();
    }
    rust_log
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| config.logging.level.clone())
}

fn log_file_name(now: chrono::DateTime<chrono::Utc>) -> String {
    format!("assetpack-{}.log", now.format("%Y%m%dT%H%M%SZ"))
}

fn log_file_in(logs_dir: &Path) -> PathBuf {
    logs_dir.join(log_file_name(chrono::Utc::now()))
}

/// Install the global subscriber.
///
/// The returned handle must be kept alive for the duration of the program.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let directive = filter_directive(config, debug_override, std::env::var("RUST_LOG").ok());
    let filter = tracing_subscriber::EnvFilter::new(directive);

    if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)?;

        let log_file_path = log_file_in(&logs_dir);
        let log_filename = log_file_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn test_config(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.paths.state = temp_dir.path().to_string_lossy().to_string();
        config
    }

    #[test]
    fn test_logs_path_under_state() {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let logs_dir = config.logs_path();
        assert!(logs_dir.ends_with("logs"));
        assert!(logs_dir.starts_with(temp_dir.path()));
    }

    #[test]
    fn test_log_file_name_format() {
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();
        assert_eq!(log_file_name(now), "assetpack-20240309T140500Z.log");

        let temp_dir = TempDir::new().unwrap();
        let path = log_file_in(temp_dir.path());
        assert!(path.starts_with(temp_dir.path()));
        assert!(path.to_string_lossy().ends_with(".log"));
    }

    #[test]
    fn test_debug_flag_overrides_level() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.logging.level = "warn".to_string();

        assert_eq!(filter_directive(&config, false, None), "warn");
        assert_eq!(filter_directive(&config, true, None), "debug");
    }

    #[test]
    fn test_debug_flag_beats_rust_log() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.logging.level = "warn".to_string();
        let rust_log = || Some("assetpack=trace".to_string());

        assert_eq!(filter_directive(&config, true, rust_log()), "debug");
        assert_eq!(filter_directive(&config, false, rust_log()), "assetpack=trace");
        assert_eq!(filter_directive(&config, false, Some(String::new())), "warn");
    }
}
