use std::sync::Arc;

use heatwatch_alerts::{
    AlertError, AlertReport, AlertRule, NewAlertRule, PollScheduler, RuleId, RuleStore,
};
use heatwatch_weather::{
    fetch_all, heat_map, FetchFailure, ForecastDay, HeatMapEntry, LocatedReading, Location,
    LocationQuery, LocationResolver, Reading, ReadingStore, Readings, WeatherClient,
    WeatherError,
};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::config::Config;
use crate::error::{AppError, ConfigError};

/// Outcome of a refresh round
#[derive(Debug, Default)]
pub struct RefreshSummary {
    /// Cities asked for
    pub requested: usize,
    /// Cities that resolved to a location key
    pub resolved: usize,
    /// Readings published to the store
    pub published: usize,
    pub failures: Vec<FetchFailure>,
}

/// Current conditions and forecast for one looked-up place.
///
/// The two halves are fetched independently; one failing leaves the other.
#[derive(Debug)]
pub struct LocationReport {
    pub location: Location,
    pub current: Result<Reading, WeatherError>,
    pub forecast: Result<Vec<ForecastDay>, WeatherError>,
}

/// Application state and lifecycle manager.
///
/// Owns the provider client, the resolver cache, both stores and the alert
/// scheduler. Readings change only through [`HeatMonitor::refresh`] and
/// [`HeatMonitor::lookup`].
pub struct HeatMonitor {
    config: Arc<Config>,
    client: Arc<WeatherClient>,
    resolver: LocationResolver,
    readings: Arc<ReadingStore>,
    rules: Arc<RuleStore>,
    scheduler: PollScheduler,
}

impl HeatMonitor {
    /// Create a monitor from a validated configuration
    pub fn new(config: Config) -> Result<Self, AppError> {
        let validation = config.validate();
        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        let client = Arc::new(WeatherClient::with_settings(
            config.provider.api_key.clone(),
            &config.provider.base_url,
            config.request_timeout(),
        )?);
        let readings = Arc::new(ReadingStore::new());
        let rules = Arc::new(RuleStore::new());

        Ok(Self {
            config: Arc::new(config),
            resolver: LocationResolver::new(client.clone()),
            scheduler: PollScheduler::new(rules.clone(), readings.clone()),
            client,
            readings,
            rules,
        })
    }

    /// Resolve `cities`, fetch their current conditions and publish them.
    ///
    /// Cities that fail to resolve or fetch are skipped. Fails with
    /// `AggregateEmpty` when no city produced a reading, and with
    /// `Configuration` when the API key is missing or rejected.
    pub async fn refresh(&self, cities: &[LocationQuery]) -> Result<RefreshSummary, AppError> {
        if !self.client.has_credential() {
            return Err(WeatherError::Configuration(
                "Weather API key is not configured".to_string(),
            )
            .into());
        }

        tracing::info!("Refreshing {} cities", cities.len());
        let locations = self.resolver.resolve_all(cities).await?;
        if locations.is_empty() && !cities.is_empty() {
            return Err(WeatherError::AggregateEmpty {
                attempted: cities.len(),
            }
            .into());
        }

        let (readings, failures) = fetch_all(&self.client, &locations).await.into_parts()?;
        let published = readings.len();
        self.readings.set_readings(readings);

        tracing::info!(
            "Refresh complete: {} of {} cities published",
            published,
            cities.len()
        );
        Ok(RefreshSummary {
            requested: cities.len(),
            resolved: locations.len(),
            published,
            failures,
        })
    }

    /// Refresh the configured city list
    pub async fn refresh_monitored(&self) -> Result<RefreshSummary, AppError> {
        let cities = self.config.monitor.cities.clone();
        self.refresh(&cities).await
    }

    /// Resolve one place and fetch its conditions and forecast concurrently.
    ///
    /// A successful current reading is published to the reading store, so
    /// rules on the looked-up location are evaluated against it.
    pub async fn lookup(
        &self,
        name: &str,
        country: Option<&str>,
    ) -> Result<LocationReport, AppError> {
        let location = self.resolver.resolve(name, country).await?;

        let (current, forecast) = tokio::join!(
            self.client.get_current(&location.key),
            self.client
                .get_forecast(&location.key, self.config.provider.forecast_days),
        );

        match &current {
            Ok(reading) => {
                let mut published = Readings::new();
                published.insert(
                    location.key.clone(),
                    LocatedReading {
                        location: location.clone(),
                        reading: reading.clone(),
                    },
                );
                self.readings.set_readings(published);
            }
            Err(e) => tracing::warn!("Current conditions for {} failed: {}", location.key, e),
        }
        if let Err(e) = &forecast {
            tracing::warn!("Forecast for {} failed: {}", location.key, e);
        }

        Ok(LocationReport {
            location,
            current,
            forecast,
        })
    }

    /// Hottest first
    pub fn heat_map(&self) -> Vec<HeatMapEntry> {
        heat_map(&self.readings.snapshot())
    }

    pub fn add_rule(&self, rule: NewAlertRule) -> Result<AlertRule, AppError> {
        Ok(self.rules.add(rule)?)
    }

    /// Rule request for `location` at the configured default threshold
    pub fn rule_for(&self, location: &Location, email: impl Into<String>) -> NewAlertRule {
        NewAlertRule::new(
            location.key.clone(),
            location.display_name(),
            self.config.alerts.default_threshold,
            email,
        )
    }

    /// Register the rules declared in `alerts.rules`.
    ///
    /// Each city is resolved first; rules whose city can't be resolved or
    /// whose contents are invalid are logged and skipped.
    pub async fn add_configured_rules(&self) -> Vec<AlertRule> {
        let mut added = Vec::new();

        for configured in &self.config.alerts.rules {
            let location = match self.resolver.resolve_query(&configured.city).await {
                Ok(location) => location,
                Err(e) => {
                    tracing::warn!(
                        "Skipping alert rule for {}: {}",
                        configured.city.search_text(),
                        e
                    );
                    continue;
                }
            };

            let mut request = self.rule_for(&location, configured.email.clone());
            if let Some(threshold) = configured.threshold {
                request.threshold = threshold;
            }
            request.phone = configured.phone.clone();

            match self.rules.add(request) {
                Ok(rule) => added.push(rule),
                Err(e) => tracing::warn!(
                    "Skipping alert rule for {}: {}",
                    location.display_name(),
                    e
                ),
            }
        }

        added
    }

    pub fn remove_rule(&self, id: RuleId) -> Result<AlertRule, AppError> {
        self.rules
            .remove(id)
            .ok_or_else(|| AlertError::RuleNotFound(id).into())
    }

    pub fn set_rule_active(&self, id: RuleId, active: bool) -> Result<AlertRule, AppError> {
        Ok(self.rules.set_active(id, active)?)
    }

    pub fn rules(&self) -> Vec<AlertRule> {
        self.rules.list()
    }

    /// Evaluate all rules against the current readings right away
    pub fn check_alerts(&self) -> AlertReport {
        self.scheduler.evaluate_now()
    }

    /// Start periodic alert checks at the configured interval
    pub async fn start_alerts(&self) -> Result<UnboundedReceiver<AlertReport>, AppError> {
        Ok(self.scheduler.start(self.config.poll_interval()).await?)
    }

    pub async fn stop_alerts(&self) -> bool {
        self.scheduler.stop().await
    }

    pub async fn alerts_running(&self) -> bool {
        self.scheduler.is_running().await
    }

    /// Stop background work
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down heat monitor");
        self.scheduler.stop().await;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn readings(&self) -> &ReadingStore {
        &self.readings
    }

    pub fn resolver(&self) -> &LocationResolver {
        &self.resolver
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.alerts.poll_interval_secs = 0;

        let result = HeatMonitor::new(config);
        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::Invalid(msg))) if msg.contains("poll_interval")
        ));
    }

    #[tokio::test]
    async fn test_refresh_without_key_is_configuration_error() {
        let monitor = HeatMonitor::new(Config::default()).unwrap();

        let result = monitor.refresh_monitored().await;
        assert!(matches!(
            result,
            Err(AppError::Weather(WeatherError::Configuration(_)))
        ));
        assert!(monitor.readings().is_empty());
    }

    #[test]
    fn test_rule_for_uses_default_threshold() {
        let mut config = Config::default();
        config.alerts.default_threshold = 33.0;
        let monitor = HeatMonitor::new(config).unwrap();

        let location = Location {
            name: "Madrid".into(),
            country: "Spain".into(),
            key: "308526".into(),
            latitude: 40.4,
            longitude: -3.7,
        };
        let rule = monitor.rule_for(&location, "ops@example.com");

        assert_eq!(rule.threshold, 33.0);
        assert_eq!(rule.location_name, "Madrid, Spain");
        assert_eq!(rule.location_key, "308526");
    }

    #[test]
    fn test_remove_missing_rule() {
        let monitor = HeatMonitor::new(Config::default()).unwrap();
        assert!(matches!(
            monitor.remove_rule(RuleId(42)),
            Err(AppError::Alert(AlertError::RuleNotFound(RuleId(42))))
        ));
    }
}
