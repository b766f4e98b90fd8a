use std::{io::IsTerminal, path::PathBuf};

use serde::Deserialize;

use super::format::LoggerFormat;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `info` or `warn,fanrun.exec=debug`.
    pub level: String,
    pub with_targets: bool,
    pub use_color: bool,
    /// Additionally write logs to a rolling file.
    pub file: Option<FileLogConfig>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        let use_color = cfg!(test) || std::io::stdout().is_terminal();
        Self {
            format: LoggerFormat::Text,
            level: "info".to_string(),
            with_targets: true,
            use_color,
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileRotation {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

/// Rolling log file: `<directory>/<prefix>.<date>.log`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileLogConfig {
    pub directory: PathBuf,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default)]
    pub rotation: FileRotation,
}

fn default_prefix() -> String {
    "fanrun".to_string()
}

impl FileLogConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            prefix: default_prefix(),
            rotation: FileRotation::default(),
        }
    }
}
