//! Weather provider error types.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    /// Missing or rejected provider credential
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Location search returned no candidates
    #[error("Location not found: {0}")]
    NotFound(String),

    /// Network failure or 5xx response
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// 4xx response other than auth, or an unusable body
    #[error("Provider rejected request ({status}): {message}")]
    Permanent { status: u16, message: String },

    /// Every fetch in a batch failed
    #[error("No readings could be fetched for {attempted} locations")]
    AggregateEmpty { attempted: usize },
}

impl WeatherError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Self::Configuration(format!("API key rejected ({})", status))
        } else if status.is_server_error() {
            Self::Transient(format!("{}: {}", status, body))
        } else {
            Self::Permanent {
                status: status.as_u16(),
                message: body.to_string(),
            }
        }
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "Weather API key is missing or invalid. Check settings.",
            Self::NotFound(_) => "Location not found. Check and try again.",
            Self::Transient(_) => "Weather service unavailable. Please try again later.",
            Self::Permanent { .. } => "Weather service rejected the request.",
            Self::AggregateEmpty { .. } => "No weather data could be loaded.",
        }
    }

    /// Whether a retry layer may try the request again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<reqwest::Error> for WeatherError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::from_status(status, &error.to_string());
        }
        if error.is_decode() {
            return Self::Permanent {
                status: 200,
                message: format!("Invalid response body: {}", error),
            };
        }
        Self::Transient(error.to_string())
    }
}
