use crate::error::{CliError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::Subscriber;
use tracing_subscriber::{
    Layer,
    filter::{LevelFilter, Targets},
    fmt::{self, format::FmtSpan},
    prelude::*,
    registry::LookupSpan,
};

/// Targets whose events follow the requested verbosity. Everything else is held at WARN.
const PIPELINE_TARGETS: [&str; 2] = ["dockflow", "dockflow_cli"];

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::OFF;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn targets(pipeline_level: LevelFilter, other_level: LevelFilter) -> Targets {
    Targets::new()
        .with_default(other_level)
        .with_targets(PIPELINE_TARGETS.map(|target| (target, pipeline_level)))
}

fn console_targets(level: LevelFilter) -> Targets {
    targets(level, level.min(LevelFilter::WARN))
}

/// The log file always keeps the DEBUG trace of the pipeline (tool command lines,
/// per-cluster staging) even when the console is quieter.
fn file_targets(console: LevelFilter) -> Targets {
    targets(console.max(LevelFilter::DEBUG), LevelFilter::WARN)
}

fn console_layer<S>(level: LevelFilter) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .with_target(false)
        .compact()
        .with_filter(console_targets(level))
}

/// Closing spans are recorded so every `refine_cluster{cluster_id=..}` task leaves its
/// duration in the file; worker threads are named after the refinement pool.
fn file_layer<S>(file: File, console: LevelFilter) -> impl Layer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(file)
        .with_ansi(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_filter(file_targets(console))
}

/// Creates the log file, including missing parent directories such as a fresh output
/// directory.
fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(CliError::Io)?;
    }
    File::create(path).map_err(CliError::Io)
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<PathBuf>) -> Result<()> {
    let level = level_filter(verbosity, quiet);
    let file = match log_file {
        Some(path) => Some(file_layer(open_log_file(&path)?, level)),
        None => None,
    };

    tracing_subscriber::registry()
        .with(console_layer(level))
        .with(file)
        .init();
    Ok(())
}
