//! AccuWeather-compatible provider client.
//!
//! A thin typed translation of the location search, current conditions and
//! daily forecast endpoints. No retries happen here; callers receive the
//! classified [`WeatherError`] and decide what to do with it.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::instrument;

use crate::error::WeatherError;
use crate::types::{round_whole, ForecastDay, Location, Reading};

pub const ACCUWEATHER_API_BASE: &str = "https://dataservice.accuweather.com";
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Daily forecast products offered by the provider, in days.
const FORECAST_PRODUCTS: [usize; 4] = [1, 5, 10, 15];

#[derive(Debug, Clone)]
pub struct WeatherClient {
    client: Arc<Client>,
    api_key: Option<String>,
    base_url: String,
}

impl WeatherClient {
    /// Client against the public provider endpoint.
    pub fn new(api_key: Option<String>) -> Result<Self, WeatherError> {
        Self::with_settings(
            api_key,
            ACCUWEATHER_API_BASE,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        )
    }

    pub fn with_base_url(api_key: Option<String>, base_url: &str) -> Result<Self, WeatherError> {
        Self::with_settings(api_key, base_url, Duration::from_secs(REQUEST_TIMEOUT_SECS))
    }

    pub fn with_settings(
        api_key: Option<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, WeatherError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            WeatherError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            client: Arc::new(client),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Whether a non-blank credential is configured.
    pub fn has_credential(&self) -> bool {
        self.credential().is_ok()
    }

    fn credential(&self) -> Result<&str, WeatherError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(WeatherError::Configuration(
                "Weather API key is not configured".to_string(),
            )),
        }
    }

    /// Free-text location search. Candidates keep the provider's ranking.
    #[instrument(skip(self), level = "info")]
    pub async fn search_locations(&self, query: &str) -> Result<Vec<Location>, WeatherError> {
        let candidates: Vec<ApiLocation> = self
            .get_json(
                "/locations/v1/cities/search",
                &[("q", query), ("details", "true")],
            )
            .await?;

        Ok(candidates.into_iter().map(Location::from).collect())
    }

    /// Current conditions for a resolved location key.
    #[instrument(skip(self), level = "info")]
    pub async fn get_current(&self, key: &str) -> Result<Reading, WeatherError> {
        let path = format!("/currentconditions/v1/{}", urlencoding::encode(key));
        let observations: Vec<ApiCurrentConditions> =
            self.get_json(&path, &[("details", "true")]).await?;

        observations
            .into_iter()
            .next()
            .map(Reading::from)
            .ok_or_else(|| WeatherError::Permanent {
                status: 200,
                message: "No weather data available".to_string(),
            })
    }

    /// Daily forecast in metric units, at most `days` entries.
    #[instrument(skip(self), level = "info")]
    pub async fn get_forecast(
        &self,
        key: &str,
        days: usize,
    ) -> Result<Vec<ForecastDay>, WeatherError> {
        // Credential is checked even when nothing would be requested.
        self.credential()?;
        if days == 0 {
            return Ok(Vec::new());
        }

        let path = format!(
            "/forecasts/v1/daily/{}day/{}",
            forecast_product(days),
            urlencoding::encode(key)
        );
        let response: ApiForecastResponse = self
            .get_json(&path, &[("details", "true"), ("metric", "true")])
            .await?;

        response
            .daily_forecasts
            .into_iter()
            .take(days)
            .enumerate()
            .map(|(index, day)| day.into_forecast_day(index))
            .collect()
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, WeatherError> {
        let api_key = self.credential()?;
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .client
            .get(&url)
            .query(&[("apikey", api_key)])
            .query(params)
            .send()
            .await?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, WeatherError> {
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body).map_err(|e| WeatherError::Permanent {
                status: status.as_u16(),
                message: format!("Invalid response body: {}", e),
            })
        } else {
            let text = response.text().await.unwrap_or_default();
            tracing::debug!("Provider returned status {}", status);
            Err(WeatherError::from_status(status, &text))
        }
    }
}

/// Smallest provider product covering `days`.
fn forecast_product(days: usize) -> usize {
    FORECAST_PRODUCTS
        .into_iter()
        .find(|&product| product >= days)
        .unwrap_or(FORECAST_PRODUCTS[FORECAST_PRODUCTS.len() - 1])
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiLocation {
    key: String,
    localized_name: String,
    country: Option<ApiCountry>,
    geo_position: Option<ApiGeoPosition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiCountry {
    localized_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiGeoPosition {
    latitude: f64,
    longitude: f64,
}

impl From<ApiLocation> for Location {
    fn from(api: ApiLocation) -> Self {
        let (latitude, longitude) = api
            .geo_position
            .map(|g| (g.latitude, g.longitude))
            .unwrap_or((0.0, 0.0));

        Self {
            name: api.localized_name,
            country: api.country.map(|c| c.localized_name).unwrap_or_default(),
            key: api.key,
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiValue {
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiMetric {
    metric: ApiValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiWind {
    speed: ApiMetric,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiCurrentConditions {
    weather_text: String,
    epoch_time: Option<i64>,
    temperature: ApiMetric,
    real_feel_temperature: Option<ApiMetric>,
    relative_humidity: Option<u8>,
    wind: Option<ApiWind>,
    #[serde(rename = "UVIndex")]
    uv_index: Option<u8>,
    visibility: Option<ApiMetric>,
    pressure: Option<ApiMetric>,
    dew_point: Option<ApiMetric>,
    cloud_cover: Option<u8>,
}

fn metric(value: Option<ApiMetric>) -> f64 {
    value.map(|v| round_whole(v.metric.value)).unwrap_or_default()
}

impl From<ApiCurrentConditions> for Reading {
    fn from(api: ApiCurrentConditions) -> Self {
        let temperature = round_whole(api.temperature.metric.value);
        let captured_at = api
            .epoch_time
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .unwrap_or_else(Utc::now);

        Self {
            temperature,
            condition: api.weather_text,
            humidity: api.relative_humidity.unwrap_or_default(),
            wind_speed: metric(api.wind.map(|w| w.speed)),
            feels_like: api
                .real_feel_temperature
                .map(|v| round_whole(v.metric.value))
                .unwrap_or(temperature),
            uv_index: api.uv_index.unwrap_or_default(),
            visibility: metric(api.visibility),
            pressure: metric(api.pressure),
            dew_point: metric(api.dew_point),
            cloud_cover: api.cloud_cover.unwrap_or_default(),
            captured_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiForecastResponse {
    daily_forecasts: Vec<ApiDailyForecast>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiRange {
    minimum: ApiValue,
    maximum: ApiValue,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiDayPart {
    icon_phrase: String,
    precipitation_probability: Option<u8>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ApiDailyForecast {
    date: String,
    temperature: ApiRange,
    real_feel_temperature: Option<ApiRange>,
    day: ApiDayPart,
}

impl ApiDailyForecast {
    fn into_forecast_day(self, index: usize) -> Result<ForecastDay, WeatherError> {
        let date = DateTime::parse_from_rfc3339(&self.date)
            .map_err(|e| WeatherError::Permanent {
                status: 200,
                message: format!("Invalid forecast date '{}': {}", self.date, e),
            })?
            .date_naive();

        let label = if index == 0 {
            "Today".to_string()
        } else {
            date.format("%a").to_string()
        };
        let max = round_whole(self.temperature.maximum.value);

        Ok(ForecastDay {
            label,
            date,
            max,
            min: round_whole(self.temperature.minimum.value),
            condition: self.day.icon_phrase,
            feels_like_max: self
                .real_feel_temperature
                .map(|r| round_whole(r.maximum.value))
                .unwrap_or(max),
            precipitation_probability: self.day.precipitation_probability.unwrap_or_default(),
        })
    }
}
