use crate::error::{MotioncamError, Result};
use clap::ValueEnum;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

/// Console log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

/// Verbosity flags shared by the binaries
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbosity {
    pub debug: bool,
    pub verbose: bool,
    pub quiet: bool,
}

impl Verbosity {
    /// Most verbose flag wins
    pub fn level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else if self.quiet {
            "error"
        } else {
            "warn"
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` overrides the flags. With `log_dir`, a daily-rotated plain-text
/// file `<file_prefix>.<date>` is written as well; keep the returned guard
/// alive until exit so buffered lines are flushed.
pub fn init_logging(
    verbosity: Verbosity,
    format: LogFormat,
    log_dir: Option<&Path>,
    file_prefix: &str,
) -> Result<Option<WorkerGuard>> {
    let log_level = verbosity.level();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "motioncam={level},motioncam_dashboard={level},tower_http={level}",
            level = log_level
        ))
    });

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(verbosity.debug)
            .with_file(verbosity.debug)
            .with_line_number(verbosity.debug)
            .boxed(),
    });

    let guard = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            layers.push(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(true)
                    .with_writer(writer)
                    .boxed(),
            );
            Some(guard)
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .map_err(|e| MotioncamError::system(format!("Failed to initialize logging: {}", e)))?;

    Ok(guard)
}
