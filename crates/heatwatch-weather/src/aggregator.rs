//! Concurrent current-conditions fan-out across a location set.

use std::collections::HashSet;

use futures::future::join_all;

use crate::client::WeatherClient;
use crate::error::WeatherError;
use crate::types::{LocatedReading, Location, Readings};

/// A location whose fetch failed during aggregation
#[derive(Debug)]
pub struct FetchFailure {
    pub location: Location,
    pub error: WeatherError,
}

/// Outcome of one aggregation batch
#[derive(Debug, Default)]
pub struct AggregateResult {
    pub readings: Readings,
    pub failures: Vec<FetchFailure>,
}

impl AggregateResult {
    /// Number of distinct locations fetched.
    pub fn attempted(&self) -> usize {
        self.readings.len() + self.failures.len()
    }

    /// Every attempted fetch failed.
    pub fn is_aggregate_empty(&self) -> bool {
        self.readings.is_empty() && !self.failures.is_empty()
    }

    /// Readings, or an error when nothing succeeded.
    ///
    /// A rejected credential is reported as `Configuration`; any other
    /// all-failed batch is `AggregateEmpty`.
    pub fn into_readings(self) -> Result<Readings, WeatherError> {
        self.into_parts().map(|(readings, _)| readings)
    }

    /// Readings and per-location failures, with the same error rules as
    /// [`AggregateResult::into_readings`].
    pub fn into_parts(mut self) -> Result<(Readings, Vec<FetchFailure>), WeatherError> {
        if self.is_aggregate_empty() {
            let rejected = self
                .failures
                .iter()
                .position(|f| matches!(f.error, WeatherError::Configuration(_)));
            return Err(match rejected {
                Some(index) => self.failures.swap_remove(index).error,
                None => WeatherError::AggregateEmpty {
                    attempted: self.failures.len(),
                },
            });
        }
        Ok((self.readings, self.failures))
    }
}

/// Fetch current conditions for every location concurrently.
///
/// Returns only once every fetch has finished. A failed fetch is logged and
/// left out of the readings; it never aborts the batch. Locations sharing a
/// key are fetched once.
pub async fn fetch_all(client: &WeatherClient, locations: &[Location]) -> AggregateResult {
    let mut seen = HashSet::new();
    let unique: Vec<&Location> = locations
        .iter()
        .filter(|location| seen.insert(location.key.clone()))
        .collect();

    tracing::debug!("Fetching current conditions for {} locations", unique.len());

    let results = join_all(
        unique
            .iter()
            .map(|location| client.get_current(&location.key)),
    )
    .await;

    let mut aggregate = AggregateResult::default();
    for (location, result) in unique.into_iter().zip(results) {
        match result {
            Ok(reading) => {
                aggregate.readings.insert(
                    location.key.clone(),
                    LocatedReading {
                        location: location.clone(),
                        reading,
                    },
                );
            }
            Err(error) => {
                tracing::warn!(
                    "Skipping {} (key {}): {}",
                    location.display_name(),
                    location.key,
                    error
                );
                aggregate.failures.push(FetchFailure {
                    location: location.clone(),
                    error,
                });
            }
        }
    }

    tracing::info!(
        "Fetched {} of {} locations",
        aggregate.readings.len(),
        aggregate.attempted()
    );
    aggregate
}
