//! `tracing` setup for the binary.
//!
//! Events go to stderr; `--log-file` adds a plain-text copy. `RUST_LOG`
//! overrides the default filter.

use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub verbose: bool,
    pub log_file: Option<PathBuf>,
}

impl LogOptions {
    fn default_filter(&self) -> &'static str {
        if self.verbose {
            "niche_finder=debug,info"
        } else {
            "info"
        }
    }
}

/// Install the global subscriber. Keep the returned guard alive until exit so
/// buffered file output is flushed.
pub fn init_logging(options: &LogOptions) -> anyhow::Result<Option<WorkerGuard>> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.default_filter()));

    let (file_layer, guard) = match &options.log_file {
        Some(path) => {
            let (dir, name) = split_log_path(path)?;
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory: {}", dir.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(rolling::never(dir, name));
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("tracing setup failed: {e}"))?;

    Ok(guard)
}

fn split_log_path(path: &Path) -> anyhow::Result<(&Path, &std::ffi::OsStr)> {
    let name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file path has no file name: {}", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    Ok((dir, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_file_name_logs_to_cwd() {
        let (dir, name) = split_log_path(Path::new("niche_finder.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "niche_finder.log");
    }

    #[test]
    fn nested_path_splits() {
        let (dir, name) = split_log_path(Path::new("logs/run.log")).unwrap();
        assert_eq!(dir, Path::new("logs"));
        assert_eq!(name, "run.log");
    }

    #[test]
    fn directory_only_path_is_rejected() {
        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn verbose_raises_crate_level() {
        let options = LogOptions {
            verbose: true,
            ..LogOptions::default()
        };
        assert_eq!(options.default_filter(), "niche_finder=debug,info");
        assert_eq!(LogOptions::default().default_filter(), "info");
    }
}
