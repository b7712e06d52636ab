//! Structured logging (§10.3): one general rotating log plus three
//! target-filtered sinks (`access_log`, `mds_client`, `object_client`) that
//! let the driver's and coordinator's I/O be followed independently of the
//! general process log.

use eoss_common::Config;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Keeps the non-blocking writer worker threads alive; drop this only at
/// process exit.
pub struct LoggingGuards(#[allow(dead_code)] Vec<tracing_appender::non_blocking::WorkerGuard>);

fn rotating_writer(path: std::path::PathBuf, config: &Config) -> FileRotate<AppendCount> {
    FileRotate::new(
        path,
        AppendCount::new(config.log_backup_count as usize),
        ContentLimit::Bytes(config.log_max_bytes as usize),
        Compression::None,
        #[cfg(unix)]
        None,
    )
}

pub fn init(config: &Config, verbose: bool) -> LoggingGuards {
    let env_filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (general_writer, general_guard) =
        tracing_appender::non_blocking(rotating_writer(config.logging_path.join("eoss.log"), config));
    let (access_writer, access_guard) =
        tracing_appender::non_blocking(rotating_writer(config.logging_path.join("access.log"), config));
    let (mds_writer, mds_guard) =
        tracing_appender::non_blocking(rotating_writer(config.logging_path.join("mds_client.log"), config));
    let (object_writer, object_guard) = tracing_appender::non_blocking(rotating_writer(
        config.logging_path.join("object_client.log"),
        config,
    ));

    let general_layer = fmt::layer().with_target(true).with_writer(general_writer);

    let access_layer = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(access_writer)
        .with_filter(filter_fn(|meta| meta.target() == "access_log"));

    let mds_layer = fmt::layer()
        .with_writer(mds_writer)
        .with_filter(filter_fn(|meta| meta.target() == "mds_client"));

    let object_layer = fmt::layer()
        .with_writer(object_writer)
        .with_filter(filter_fn(|meta| meta.target() == "object_client"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(general_layer)
        .with(access_layer)
        .with(mds_layer)
        .with(object_layer)
        .init();

    LoggingGuards(vec![general_guard, access_guard, mds_guard, object_guard])
}
