use anyhow::{Context, Result};
use heatwatch_alerts::DEFAULT_POLL_INTERVAL;
use heatwatch_weather::client::{ACCUWEATHER_API_BASE, REQUEST_TIMEOUT_SECS};
use heatwatch_weather::{LocationQuery, DEFAULT_FORECAST_DAYS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::ConfigError;

/// Environment variable that overrides `provider.api_key`
pub const API_KEY_ENV: &str = "HEATWATCH_API_KEY";

/// Longest daily forecast the provider offers
pub const MAX_FORECAST_DAYS: usize = 15;

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// All errors joined into one line
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Weather provider access
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Alert polling
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Cities refreshed by `refresh_monitored`
    #[serde(default)]
    pub monitor: MonitorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider API key. `HEATWATCH_API_KEY` takes precedence when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_forecast_days")]
    pub forecast_days: usize,
}

fn default_base_url() -> String {
    ACCUWEATHER_API_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    REQUEST_TIMEOUT_SECS
}

fn default_forecast_days() -> usize {
    DEFAULT_FORECAST_DAYS
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            forecast_days: default_forecast_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Seconds between rule evaluations (default: 300)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Threshold offered for new rules, in °C
    #[serde(default = "default_threshold")]
    pub default_threshold: f64,

    /// Rules registered at startup
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleConfig>,
}

/// An alert rule declared in the config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub city: LocationQuery,
    /// Falls back to `alerts.default_threshold`
    #[serde(default)]
    pub threshold: Option<f64>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
}

fn default_poll_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_threshold() -> f64 {
    35.0
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            default_threshold: default_threshold(),
            rules: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_cities")]
    pub cities: Vec<LocationQuery>,

    /// Minutes between background refreshes of `cities` (0 disables)
    #[serde(default = "default_refresh_minutes")]
    pub refresh_minutes: u32,
}

fn default_refresh_minutes() -> u32 {
    15
}

fn default_cities() -> Vec<LocationQuery> {
    [
        ("Madrid", "Spain"),
        ("Athens", "Greece"),
        ("Rome", "Italy"),
        ("Barcelona", "Spain"),
        ("Paris", "France"),
        ("Vienna", "Austria"),
        ("Berlin", "Germany"),
        ("Amsterdam", "Netherlands"),
        ("London", "UK"),
        ("Stockholm", "Sweden"),
    ]
    .into_iter()
    .map(|(name, country)| LocationQuery::new(name, Some(country)))
    .collect()
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            cities: default_cities(),
            refresh_minutes: default_refresh_minutes(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist.
    ///
    /// `HEATWATCH_API_KEY` is applied after reading and is never written back.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("Failed to read config file")?;
            Self::parse(&contents)?
        } else {
            let config = Self::default();
            config.save_to(path)?;
            tracing::info!("Wrote default config to {}", path.display());
            config
        };

        config.apply_api_key_override(std::env::var(API_KEY_ENV).ok());
        Ok(config)
    }

    /// Parse a TOML document. Missing sections take their defaults.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load configuration and validate it
    ///
    /// Returns the config along with any validation warnings.
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        Self::load_validated_from(&Self::config_path()?)
    }

    pub fn load_validated_from(path: &Path) -> Result<(Self, ValidationResult)> {
        let config = Self::load_from(path)?;
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        self.validate_url(&self.provider.base_url, "provider.base_url", &mut result);

        if self.provider.timeout_secs == 0 {
            result.add_error("provider.timeout_secs", "Timeout must be greater than 0");
        }

        if self.provider.forecast_days == 0 || self.provider.forecast_days > MAX_FORECAST_DAYS {
            result.add_error(
                "provider.forecast_days",
                format!("Forecast days must be between 1 and {}", MAX_FORECAST_DAYS),
            );
        }

        if !self.has_api_key() {
            result.add_warning(
                "provider.api_key",
                format!(
                    "No API key configured - set it here or via {}",
                    API_KEY_ENV
                ),
            );
        }

        if self.alerts.poll_interval_secs == 0 {
            result.add_error(
                "alerts.poll_interval_secs",
                "Poll interval must be greater than 0",
            );
        } else if self.alerts.poll_interval_secs > 86_400 {
            result.add_warning(
                "alerts.poll_interval_secs",
                "Poll interval is more than 24 hours",
            );
        }

        if !self.alerts.default_threshold.is_finite() {
            result.add_error(
                "alerts.default_threshold",
                "Default threshold must be a number",
            );
        }

        for (index, rule) in self.alerts.rules.iter().enumerate() {
            let field = format!("alerts.rules[{}]", index);
            if rule.city.name.trim().is_empty() {
                result.add_error(&field, "City name is required");
            }
            if rule.email.trim().is_empty() {
                result.add_error(&field, "Email is required");
            }
            if rule.threshold.is_some_and(|t| !t.is_finite()) {
                result.add_error(&field, "Threshold must be a number");
            }
        }

        if self.monitor.cities.is_empty() {
            result.add_warning("monitor.cities", "No cities to monitor");
        }

        if self.monitor.refresh_minutes == 0 {
            result.add_warning(
                "monitor.refresh_minutes",
                "Background refresh disabled (0 minutes) - alerts use startup readings",
            );
        } else if self.monitor.refresh_minutes > 1440 {
            result.add_warning(
                "monitor.refresh_minutes",
                "Refresh interval is more than 24 hours",
            );
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Whether a non-blank API key is configured
    pub fn has_api_key(&self) -> bool {
        self.provider
            .api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.alerts.poll_interval_secs)
    }

    /// Background refresh period, `None` when disabled
    pub fn refresh_interval(&self) -> Option<Duration> {
        match self.monitor.refresh_minutes {
            0 => None,
            minutes => Some(Duration::from_secs(u64::from(minutes) * 60)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.provider.timeout_secs)
    }

    fn apply_api_key_override(&mut self, value: Option<String>) {
        if let Some(key) = value.filter(|k| !k.trim().is_empty()) {
            tracing::debug!("Using API key from {}", API_KEY_ENV);
            self.provider.api_key = Some(key);
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get the path to the configuration file
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("heatwatch");

        Ok(config_dir.join("config.toml"))
    }
}
