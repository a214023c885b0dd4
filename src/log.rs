use std::path::PathBuf;

use anyhow::Result;
use tracing::metadata::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt::Layer, prelude::*, registry, EnvFilter, FmtSubscriber};

/// keeps the non-blocking writers flushing. drop on exit, not before
pub struct Guard {
    _logfile: WorkerGuard,
    _stdout: WorkerGuard,
}

fn filter() -> Result<EnvFilter> {
    Ok(EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?)
}

/// stdout only, for one-shot commands
pub fn init_logging() -> Result<()> {
    LogTracer::init()?;
    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_env_filter(filter()?)
            .pretty()
            .finish(),
    )?;
    Ok(())
}

/// stdout plus an hourly rolling `remoteweather.log` in `log_dir`
pub fn init_logging_with_file(log_dir: PathBuf) -> Result<Guard> {
    let appender = tracing_appender::rolling::hourly(log_dir, "remoteweather.log");
    let (logfile, logfile_guard) = tracing_appender::non_blocking(appender);
    let logfile_layer = Layer::new()
        .with_writer(logfile)
        .with_ansi(false)
        .compact();
    let (stdout, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    let stdout_layer = Layer::new().with_writer(stdout).pretty();
    LogTracer::init()?;
    tracing::subscriber::set_global_default(
        registry()
            .with(filter()?)
            .with(logfile_layer)
            .with(stdout_layer),
    )?;
    Ok(Guard {
        _logfile: logfile_guard,
        _stdout: stdout_guard,
    })
}
