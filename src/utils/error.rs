use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MeasureError {
    #[error("Could not resolve DTID {dtid} within {timeout:?}")]
    ResolveTimeout { dtid: String, timeout: Duration },

    #[error("Resolving DTID {dtid} failed: {message}")]
    ResolveError { dtid: String, message: String },

    #[error("Could not fetch DT doc from {url} within {timeout:?}")]
    FetchTimeout { url: String, timeout: Duration },

    #[error("Fetching DT doc from {url} failed: {message}")]
    FetchError { url: String, message: String },

    #[error("DT doc at {url} is not a valid document: {message}")]
    ParseError { url: String, message: String },

    #[error("Timing log {destination} is not writable: {message}")]
    LogWriteError { destination: String, message: String },

    #[error("HTTP client error: {0}")]
    HttpClientError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Could not serialize parameters: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MeasureError {
    /// 節點層級的錯誤：只終止單一分支，不影響整個量測
    pub fn is_node_local(&self) -> bool {
        matches!(
            self,
            MeasureError::ResolveTimeout { .. }
                | MeasureError::ResolveError { .. }
                | MeasureError::FetchTimeout { .. }
                | MeasureError::FetchError { .. }
                | MeasureError::ParseError { .. }
        )
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            e if e.is_node_local() => ErrorSeverity::Low,
            MeasureError::ConfigError { .. }
            | MeasureError::ConfigValidationError { .. }
            | MeasureError::InvalidConfigValueError { .. }
            | MeasureError::MissingConfigError { .. } => ErrorSeverity::High,
            MeasureError::HttpClientError(_) | MeasureError::TomlSerializeError(_) => {
                ErrorSeverity::Medium
            }
            _ => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MeasureError::ResolveTimeout { .. } | MeasureError::FetchTimeout { .. } => {
                "Increase timeout_registry / timeout_base or check network connectivity"
            }
            MeasureError::ResolveError { .. } => "Check that the DTID is a reachable URL",
            MeasureError::FetchError { .. } => "Check that the hosting URL serves index.json",
            MeasureError::ParseError { .. } => "Check the DT doc format at the hosting URL",
            MeasureError::LogWriteError { .. } | MeasureError::IoError(_) => {
                "Check that the output directory exists and is writable"
            }
            MeasureError::ConfigError { .. }
            | MeasureError::ConfigValidationError { .. }
            | MeasureError::InvalidConfigValueError { .. }
            | MeasureError::MissingConfigError { .. } => "Fix the parameter file and retry",
            MeasureError::HttpClientError(_) => "Check TLS and proxy settings",
            MeasureError::TomlSerializeError(_) => {
                "Re-run with --verbose and report the failure"
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, MeasureError>;
