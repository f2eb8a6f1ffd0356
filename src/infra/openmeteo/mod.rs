//! Open-Meteo air-quality API.
//!
//! [`OpenMeteoClient`] implements
//! [`AirQualityApi`](crate::services::air_quality_api::AirQualityApi) and
//! retries transient failures a fixed number of times before giving up.

pub mod client;

pub use client::OpenMeteoClient;
