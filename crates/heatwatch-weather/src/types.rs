use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Default number of forecast days requested from the provider
pub const DEFAULT_FORECAST_DAYS: usize = 5;

/// Heat severity bands derived from temperature (°C)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Moderate,
    High,
    Extreme,
}

impl Severity {
    pub const MODERATE_FROM: f64 = 30.0;
    pub const HIGH_FROM: f64 = 35.0;
    pub const EXTREME_FROM: f64 = 40.0;

    /// Classify a temperature in °C. Bands are inclusive at their lower edge.
    pub fn from_temperature(celsius: f64) -> Self {
        if celsius >= Self::EXTREME_FROM {
            Self::Extreme
        } else if celsius >= Self::HIGH_FROM {
            Self::High
        } else if celsius >= Self::MODERATE_FROM {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::Extreme => "extreme",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A place resolved by the provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub name: String,
    pub country: String,
    /// Provider-assigned opaque location key
    pub key: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    /// "Madrid, Spain"
    pub fn display_name(&self) -> String {
        if self.country.is_empty() {
            self.name.clone()
        } else {
            format!("{}, {}", self.name, self.country)
        }
    }
}

/// Latest known conditions for a location
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Temperature in °C
    pub temperature: f64,
    pub condition: String,
    /// Relative humidity in percent
    pub humidity: u8,
    /// Wind speed in km/h
    pub wind_speed: f64,
    /// Apparent temperature in °C
    pub feels_like: f64,
    pub uv_index: u8,
    /// Visibility in km
    pub visibility: f64,
    /// Pressure in mb
    pub pressure: f64,
    /// Dew point in °C
    pub dew_point: f64,
    /// Cloud cover in percent
    pub cloud_cover: u8,
    pub captured_at: DateTime<Utc>,
}

impl Reading {
    /// Severity is always recomputed, never stored.
    pub fn severity(&self) -> Severity {
        Severity::from_temperature(self.temperature)
    }
}

/// One day of a short-range forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    /// "Today" for the first entry, short weekday name afterwards
    pub label: String,
    pub date: NaiveDate,
    pub max: f64,
    pub min: f64,
    pub condition: String,
    pub feels_like_max: f64,
    pub precipitation_probability: u8,
}

/// A reading paired with the location it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocatedReading {
    pub location: Location,
    pub reading: Reading,
}

/// Latest readings keyed by location key
pub type Readings = HashMap<String, LocatedReading>;

/// Heat map row derived from a reading snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatMapEntry {
    pub name: String,
    pub country: String,
    pub key: String,
    pub temperature: f64,
    pub severity: Severity,
    pub condition: String,
}

impl From<&LocatedReading> for HeatMapEntry {
    fn from(entry: &LocatedReading) -> Self {
        Self {
            name: entry.location.name.clone(),
            country: entry.location.country.clone(),
            key: entry.location.key.clone(),
            temperature: entry.reading.temperature,
            severity: entry.reading.severity(),
            condition: entry.reading.condition.clone(),
        }
    }
}

/// Build heat map rows, hottest first, ties broken by name.
pub fn heat_map(readings: &Readings) -> Vec<HeatMapEntry> {
    let mut entries: Vec<HeatMapEntry> = readings.values().map(HeatMapEntry::from).collect();
    entries.sort_by(|a, b| {
        b.temperature
            .total_cmp(&a.temperature)
            .then_with(|| a.name.cmp(&b.name))
    });
    entries
}

/// Round half up to a whole unit, matching the provider display convention.
pub(crate) fn round_whole(value: f64) -> f64 {
    (value + 0.5).floor()
}
