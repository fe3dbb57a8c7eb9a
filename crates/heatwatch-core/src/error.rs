//! Application-level error types for HeatWatch.
//!
//! Each crate keeps its own error enum; `AppError` gathers them so callers
//! at the top can match on one type and ask for a `user_message()`.

use heatwatch_alerts::AlertError;
use heatwatch_weather::WeatherError;
use thiserror::Error;

/// Top-level application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Weather service error: {0}")]
    Weather(#[from] WeatherError),

    #[error("Alert error: {0}")]
    Alert(#[from] AlertError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Returns a user-friendly message suitable for display.
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Alert(e) => e.user_message(),
            AppError::Io(_) => "A file operation failed. Please try again.",
            AppError::Other(_) => "An unexpected error occurred. Please try again.",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Weather(e) if e.is_retryable())
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
        }
    }
}
