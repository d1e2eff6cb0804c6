//! Tracing subscriber setup driven by [`config::Logger`].

use tracing::level_filters::LevelFilter;
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::MakeWriter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::config::{self, LogFormat, LogLevel, LogRotation};

const MODULE_WHITELIST: &[&str] = &["mcr_rs", "async_openai"];

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Installs the global tracing subscriber.
///
/// Logs go to stdout and, when configured, to a rolling file. The returned
/// guard must be kept alive for non-blocking file output to be flushed.
/// Calling this more than once keeps the first subscriber.
#[must_use]
pub fn init(config: &config::Logger) -> Option<WorkerGuard> {
    if !config.enable {
        return None;
    }

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let mut guard = None;
    let mut appender_error = None;

    if let Some(file) = config.file_appender.as_ref().filter(|file| file.enable) {
        let mut builder = rolling::Builder::new()
            .rotation(rotation(file.rotation))
            .filename_prefix(&file.filename_prefix)
            .filename_suffix("log");
        if let Some(max) = file.max_log_files {
            builder = builder.max_log_files(max);
        }
        match builder.build(&file.dir) {
            Ok(appender) => {
                let layer = if file.non_blocking {
                    let (writer, worker_guard) = tracing_appender::non_blocking(appender);
                    guard = Some(worker_guard);
                    fmt_layer(writer, file.format, false)
                } else {
                    fmt_layer(appender, file.format, false)
                };
                layers.push(layer.with_filter(level_filter(file.level)).boxed());
            }
            Err(err) => appender_error = Some(err),
        }
    }

    layers.push(fmt_layer(std::io::stdout, config.format, true));

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directives(config)))
        .unwrap_or_else(|_| EnvFilter::new(LogLevel::Info.as_str()));

    if tracing_subscriber::registry()
        .with(layers)
        .with(filter)
        .try_init()
        .is_err()
    {
        return None;
    }

    if let Some(err) = appender_error {
        tracing::warn!(error = %err, "log file appender disabled");
    }
    guard
}

fn directives(config: &config::Logger) -> String {
    config.override_filter.clone().unwrap_or_else(|| {
        MODULE_WHITELIST
            .iter()
            .map(|module| format!("{module}={}", config.level.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    })
}

fn fmt_layer<W>(writer: W, format: LogFormat, ansi: bool) -> BoxedLayer
where
    W: for<'writer> MakeWriter<'writer> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(ansi)
        .with_writer(writer);
    match format {
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().boxed(),
    }
}

fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Off => LevelFilter::OFF,
        LogLevel::Trace => LevelFilter::TRACE,
        LogLevel::Debug => LevelFilter::DEBUG,
        LogLevel::Info => LevelFilter::INFO,
        LogLevel::Warn => LevelFilter::WARN,
        LogLevel::Error => LevelFilter::ERROR,
    }
}

fn rotation(rotation: LogRotation) -> rolling::Rotation {
    match rotation {
        LogRotation::Minutely => rolling::Rotation::MINUTELY,
        LogRotation::Hourly => rolling::Rotation::HOURLY,
        LogRotation::Daily => rolling::Rotation::DAILY,
        LogRotation::Never => rolling::Rotation::NEVER,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_directives_cover_whitelisted_modules() {
        let config = config::Logger {
            level: LogLevel::Debug,
            ..config::Logger::default()
        };
        assert_eq!(directives(&config), "mcr_rs=debug,async_openai=debug");
    }

    #[test]
    fn override_filter_wins() {
        let config = config::Logger {
            override_filter: Some("mcr_rs=trace".to_string()),
            ..config::Logger::default()
        };
        assert_eq!(directives(&config), "mcr_rs=trace");
    }

    #[test]
    fn disabled_logger_installs_nothing() {
        let config = config::Logger {
            enable: false,
            ..config::Logger::default()
        };
        assert!(init(&config).is_none());
    }
}
