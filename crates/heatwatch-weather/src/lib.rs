//! Weather data acquisition for HeatWatch
//!
//! Resolves place names to provider location keys, fetches current conditions
//! and daily forecasts, and aggregates readings across many locations.

pub mod aggregator;
pub mod client;
pub mod error;
pub mod resolver;
pub mod store;
pub mod types;

pub use aggregator::{fetch_all, AggregateResult, FetchFailure};
pub use client::WeatherClient;
pub use error::WeatherError;
pub use resolver::{LocationQuery, LocationResolver};
pub use store::ReadingStore;
pub use types::*;
