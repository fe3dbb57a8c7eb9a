//! Place name to provider location resolution with a process-lifetime cache.
//!
//! The provider's first-ranked candidate is taken as the best match; no local
//! fuzzy matching happens. Cached entries are never invalidated.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::client::WeatherClient;
use crate::error::WeatherError;
use crate::types::Location;

/// A place to resolve, optionally narrowed by country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationQuery {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl LocationQuery {
    pub fn new(name: impl Into<String>, country: Option<&str>) -> Self {
        Self {
            name: name.into(),
            country: country.map(str::to_string),
        }
    }

    /// Search text sent to the provider: "Madrid" or "Madrid, Spain".
    pub fn search_text(&self) -> String {
        let name = self.name.trim();
        match self.country.as_deref().map(str::trim) {
            Some(country) if !country.is_empty() => format!("{}, {}", name, country),
            _ => name.to_string(),
        }
    }

    fn cache_key(&self) -> String {
        self.search_text().to_lowercase()
    }
}

pub struct LocationResolver {
    client: Arc<WeatherClient>,
    cache: RwLock<HashMap<String, Location>>,
}

impl LocationResolver {
    pub fn new(client: Arc<WeatherClient>) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a place name, consulting the cache first.
    pub async fn resolve(
        &self,
        name: &str,
        country: Option<&str>,
    ) -> Result<Location, WeatherError> {
        self.resolve_query(&LocationQuery::new(name, country)).await
    }

    pub async fn resolve_query(&self, query: &LocationQuery) -> Result<Location, WeatherError> {
        if !self.client.has_credential() {
            return Err(WeatherError::Configuration(
                "Weather API key is not configured".to_string(),
            ));
        }

        let search_text = query.search_text();
        if search_text.is_empty() {
            return Err(WeatherError::NotFound("empty location name".to_string()));
        }

        let cache_key = query.cache_key();
        let cached = self.cache.read().get(&cache_key).cloned();
        if let Some(location) = cached {
            tracing::debug!("Resolved {} from cache", search_text);
            return Ok(location);
        }

        let location = self
            .client
            .search_locations(&search_text)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| WeatherError::NotFound(search_text.clone()))?;

        tracing::info!(
            "Resolved {} to {} (key {})",
            search_text,
            location.display_name(),
            location.key
        );
        self.cache.write().insert(cache_key, location.clone());
        Ok(location)
    }

    /// Resolve many places concurrently.
    ///
    /// Lookup failures are logged and omitted. A `Configuration` error means
    /// no query can succeed, so it is returned instead of a partial list.
    pub async fn resolve_all(
        &self,
        queries: &[LocationQuery],
    ) -> Result<Vec<Location>, WeatherError> {
        let results = join_all(queries.iter().map(|q| self.resolve_query(q))).await;

        let mut locations = Vec::with_capacity(queries.len());
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(location) => locations.push(location),
                Err(e @ WeatherError::Configuration(_)) => return Err(e),
                Err(e) => tracing::warn!("Failed to resolve {}: {}", query.search_text(), e),
            }
        }
        Ok(locations)
    }

    /// Cached location for a query, without touching the network.
    pub fn cached(&self, name: &str, country: Option<&str>) -> Option<Location> {
        let key = LocationQuery::new(name, country).cache_key();
        self.cache.read().get(&key).cloned()
    }

    pub fn cached_count(&self) -> usize {
        self.cache.read().len()
    }
}
