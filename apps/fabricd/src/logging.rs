// SPDX-FileCopyrightText: © 2025 FabricFlow Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! `tracing`-subscriber setup: console and optional non-blocking file output.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

use crate::config::LogConfig;

type DynLayer = Box<dyn Layer<Registry> + Send + Sync + 'static>;

fn env_filter_or_level(default_level: tracing::Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.as_str()))
}

fn make_console_layer(level: tracing::Level) -> DynLayer {
    tracing_subscriber::fmt::layer().with_filter(env_filter_or_level(level)).boxed()
}

fn make_file_layer(non_blocking: tracing_appender::non_blocking::NonBlocking, level: tracing::Level) -> DynLayer {
    tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_filter(env_filter_or_level(level))
        .boxed()
}

/// Initializes the global tracing subscriber from `log_config`.
///
/// # Errors
///
/// Returns an error if file logging is enabled and the log directory cannot be created.
pub fn init_logging(
    log_config: &LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>> {
    let mut guard = None;
    let mut layers: Vec<DynLayer> = Vec::new();

    if log_config.file_enable {
        let log_path = std::path::Path::new(&log_config.file_path);
        let log_dir = log_path.parent().unwrap_or_else(|| std::path::Path::new("."));
        let log_filename = log_path.file_name().unwrap_or_else(|| std::ffi::OsStr::new("fabricd.log"));
        std::fs::create_dir_all(log_dir)
            .map_err(|e| format!("failed to create log directory {}: {e}", log_dir.display()))?;

        let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard = Some(file_guard);
        layers.push(make_file_layer(non_blocking, log_config.file_level.into()));
    }

    if log_config.console_enable {
        layers.push(make_console_layer(log_config.console_level.into()));
    }

    if !log_config.console_enable && !log_config.file_enable {
        layers.push(make_console_layer(tracing::Level::INFO));
    }

    tracing_subscriber::registry().with(layers).init();
    Ok(guard)
}
