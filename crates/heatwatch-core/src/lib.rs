pub mod config;
pub mod error;
pub mod monitor;

pub use config::{Config, RuleConfig, ValidationResult, API_KEY_ENV};
pub use error::{AppError, ConfigError};
pub use monitor::{HeatMonitor, LocationReport, RefreshSummary};

use anyhow::Result;

/// Initialize logging for the application
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))?;

    tracing::info!("HeatWatch core initialized");
    Ok(())
}
