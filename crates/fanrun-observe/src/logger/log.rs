use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer, fmt, fmt::time::OffsetTime, layer::SubscriberExt, registry::LookupSpan,
    util::SubscriberInitExt,
};

use super::{
    config::{FileLogConfig, FileRotation, LoggerConfig},
    error::LoggerError,
    format::LoggerFormat,
};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

pub struct Logger;

impl Logger {
    pub fn text(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let filter = mk_filter(&cfg.level)?;
        let file_layer = mk_file_layer(cfg)?;
        let fmt_layer = fmt::layer()
            .with_ansi(cfg.use_color)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer());

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(fmt_layer);
        init_with(subscriber)
    }

    pub fn json(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let filter = mk_filter(&cfg.level)?;
        let file_layer = mk_file_layer(cfg)?;
        let fmt_layer = fmt::layer()
            .json()
            .with_ansi(false)
            .with_target(cfg.with_targets)
            .with_timer(mk_timer());

        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(fmt_layer);
        init_with(subscriber)
    }

    pub fn journald(cfg: &LoggerConfig) -> Result<(), LoggerError> {
        let filter = mk_filter(&cfg.level)?;
        mk_journald(filter, cfg)
    }
}

fn mk_filter(level: &str) -> Result<EnvFilter, LoggerError> {
    EnvFilter::try_new(level).map_err(|_| LoggerError::InvalidLogLevel(level.to_string()))
}

fn mk_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

fn mk_appender(file: &FileLogConfig) -> Result<RollingFileAppender, LoggerError> {
    let rotation = match file.rotation {
        FileRotation::Minutely => Rotation::MINUTELY,
        FileRotation::Hourly => Rotation::HOURLY,
        FileRotation::Daily => Rotation::DAILY,
        FileRotation::Never => Rotation::NEVER,
    };
    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&file.prefix)
        .filename_suffix("log")
        .build(&file.directory)
        .map_err(|e| LoggerError::LogFile {
            dir: file.directory.display().to_string(),
            reason: e.to_string(),
        })
}

/// File output mirrors the console format but never carries ANSI escapes.
fn mk_file_layer<S>(cfg: &LoggerConfig) -> Result<Option<BoxedLayer<S>>, LoggerError>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let Some(file) = &cfg.file else {
        return Ok(None);
    };
    let layer = fmt::layer()
        .with_ansi(false)
        .with_target(cfg.with_targets)
        .with_timer(mk_timer())
        .with_writer(mk_appender(file)?);

    let layer = match cfg.format {
        LoggerFormat::Json => layer.json().boxed(),
        LoggerFormat::Text | LoggerFormat::Journald => layer.boxed(),
    };
    Ok(Some(layer))
}

fn as_error(e: impl std::fmt::Display) -> LoggerError {
    let s = e.to_string();
    if s.contains("SetGlobalDefaultError") || s.contains("global default trace dispatcher") {
        LoggerError::AlreadyInitialized
    } else {
        LoggerError::InitializationFailed(s)
    }
}

fn init_with<S>(subscriber: S) -> Result<(), LoggerError>
where
    S: Subscriber + Send + Sync + 'static,
{
    subscriber.try_init().map_err(as_error)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn mk_journald(filter: EnvFilter, cfg: &LoggerConfig) -> Result<(), LoggerError> {
    let file_layer = mk_file_layer(cfg)?;
    let journald = tracing_journald::layer()
        .map_err(|e| LoggerError::InitializationFailed(format!("journald: {e}")))?;
    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(journald);
    init_with(subscriber)
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn mk_journald(_filter: EnvFilter, _cfg: &LoggerConfig) -> Result<(), LoggerError> {
    Err(LoggerError::JournaldNotSupported)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn appender_writes_into_directory() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = FileLogConfig {
            directory: dir.path().join("logs"),
            prefix: "run".to_string(),
            rotation: FileRotation::Never,
        };
        let mut appender = mk_appender(&cfg).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let written: Vec<_> = std::fs::read_dir(dir.path().join("logs"))
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("run"))
            .collect();
        assert_eq!(written.len(), 1);
        let body = std::fs::read_to_string(written[0].path()).unwrap();
        assert_eq!(body, "hello\n");
    }

    #[test]
    fn already_initialized_is_recognised() {
        assert!(matches!(
            as_error("SetGlobalDefaultError { .. }"),
            LoggerError::AlreadyInitialized
        ));
        assert!(matches!(
            as_error("boom"),
            LoggerError::InitializationFailed(ref s) if s == "boom"
        ));
    }
}
