use chrono::Utc;
use heatwatch_weather::{LocatedReading, Location, Reading, Readings};

use crate::rule::{AlertRule, RuleId};
use crate::store::RuleMap;

pub fn rule(id: u64, key: &str, threshold: f64, active: bool) -> AlertRule {
    AlertRule {
        id: RuleId(id),
        location_key: key.into(),
        location_name: format!("City {}", key),
        threshold,
        email: "ops@example.com".into(),
        phone: None,
        active,
        created_at: Utc::now(),
    }
}

pub fn rules(list: Vec<AlertRule>) -> RuleMap {
    list.into_iter().map(|r| (r.id, r)).collect()
}

/// Readings keyed by location key, one per `(key, temperature)`.
pub fn readings(entries: &[(&str, f64)]) -> Readings {
    entries
        .iter()
        .map(|&(key, temperature)| {
            (
                key.to_string(),
                LocatedReading {
                    location: Location {
                        name: format!("City {}", key),
                        country: "Spain".into(),
                        key: key.to_string(),
                        latitude: 0.0,
                        longitude: 0.0,
                    },
                    reading: Reading {
                        temperature,
                        condition: "Sunny".into(),
                        humidity: 20,
                        wind_speed: 10.0,
                        feels_like: temperature,
                        uv_index: 8,
                        visibility: 10.0,
                        pressure: 1012.0,
                        dew_point: 5.0,
                        cloud_cover: 0,
                        captured_at: Utc::now(),
                    },
                },
            )
        })
        .collect()
}
