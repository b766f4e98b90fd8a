use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("configuration validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),
}
