use anyhow::{Context, Result, bail};
use aq_twin::channel::NORMALIZED_CHANNELS;
use aq_twin::fetch::{HttpClient, get_json};
use aq_twin::series::{Cell, Series};
use aq_twin::store::format_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{info, warn};

use crate::services::air_quality_api::{AirQualityApi, City};

pub const BASE_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";
pub const MAX_ATTEMPTS: usize = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Deserialize)]
struct AirQualityResponse {
    hourly: Map<String, Value>,
}

pub struct OpenMeteoClient<C> {
    http: C,
    base_url: String,
    retry_delay: Duration,
}

impl<C: HttpClient> OpenMeteoClient<C> {
    pub fn new(http: C) -> Self {
        Self {
            http,
            base_url: BASE_URL.to_string(),
            retry_delay: RETRY_DELAY,
        }
    }

    #[cfg(test)]
    fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    async fn request(&self, city: &City) -> Result<AirQualityResponse> {
        let hourly = NORMALIZED_CHANNELS.map(|c| c.key()).join(",");
        let query = [
            ("latitude", city.latitude.to_string()),
            ("longitude", city.longitude.to_string()),
            ("hourly", hourly),
            ("timezone", "auto".to_string()),
        ];
        get_json(&self.http, &self.base_url, &query).await
    }
}

#[async_trait]
impl<C: HttpClient> AirQualityApi for OpenMeteoClient<C> {
    #[tracing::instrument(skip(self, city), fields(city = city.name))]
    async fn hourly(&self, city: &City, fetched_at: DateTime<Utc>) -> Result<Series> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.request(city).await {
                Ok(resp) => {
                    let series = hourly_to_series(&resp.hourly, city.name, fetched_at)?;
                    info!(rows = series.len(), attempt, "Air quality data fetched");
                    return Ok(series);
                }
                Err(e) if attempt < MAX_ATTEMPTS => {
                    warn!(attempt, error = %e, "Air quality request failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "air quality request for {} failed after {attempt} attempts",
                        city.name
                    )));
                }
            }
        }
    }
}

/// Converts the `hourly` object of an Open-Meteo reply into a raw series with
/// columns `time`, the channels present, `city` and `timestamp`.
pub fn hourly_to_series(
    hourly: &Map<String, Value>,
    city: &str,
    fetched_at: DateTime<Utc>,
) -> Result<Series> {
    let times = hourly
        .get("time")
        .and_then(Value::as_array)
        .context("hourly block has no time array")?;

    let mut channels = Vec::new();
    for channel in NORMALIZED_CHANNELS {
        let Some(values) = hourly.get(channel.key()) else {
            continue;
        };
        let values = values
            .as_array()
            .with_context(|| format!("hourly {channel} is not an array"))?;
        if values.len() != times.len() {
            bail!(
                "hourly {channel} has {} values for {} hours",
                values.len(),
                times.len()
            );
        }
        channels.push((channel, values));
    }

    let mut columns = vec!["time".to_string()];
    columns.extend(channels.iter().map(|(c, _)| c.key().to_string()));
    columns.extend(["city".to_string(), "timestamp".to_string()]);

    let stamp = format_timestamp(fetched_at);
    let mut series = Series::new(columns);
    for (i, time) in times.iter().enumerate() {
        let mut row = Vec::with_capacity(channels.len() + 3);
        row.push(time.as_str().map_or(Cell::Missing, |t| Cell::Text(t.to_string())));
        row.extend(
            channels
                .iter()
                .map(|(_, values)| values[i].as_f64().map_or(Cell::Missing, Cell::Number)),
        );
        row.push(Cell::Text(city.to_string()));
        row.push(Cell::Text(stamp.clone()));
        series.push_row(row)?;
    }

    Ok(series)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::TimeZone;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct AlwaysDown(AtomicUsize);

    #[async_trait]
    impl HttpClient for AlwaysDown {
        async fn execute(&self, req: reqwest::Request) -> Result<reqwest::Response> {
            assert!(req.url().query().unwrap().contains("timezone=auto"));
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(anyhow!("connection refused"))
        }
    }

    fn fetched_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 13, 0, 0).unwrap()
    }

    #[test]
    fn test_hourly_to_series_layout() {
        let hourly = json!({
            "time": ["2024-05-01T00:00", "2024-05-01T01:00"],
            "pm10": [12.0, null],
            "pm2_5": [8.5, 9.0],
            "ozone": [40.0, 41.5]
        });

        let series = hourly_to_series(hourly.as_object().unwrap(), "Paris", fetched_at()).unwrap();

        assert_eq!(
            series.columns(),
            ["time", "pm10", "pm2_5", "ozone", "city", "timestamp"]
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series.rows()[1][1], Cell::Missing);
        assert_eq!(series.rows()[0][4], Cell::Text("Paris".into()));
        assert_eq!(series.rows()[0][5], Cell::Text("20240501T130000Z".into()));
        assert_eq!(series.values("pm2_5").unwrap(), vec![8.5, 9.0]);
    }

    #[test]
    fn test_hourly_to_series_rejects_mismatched_lengths() {
        let hourly = json!({ "time": ["a", "b"], "pm10": [1.0] });
        assert!(hourly_to_series(hourly.as_object().unwrap(), "Paris", fetched_at()).is_err());

        let no_time = json!({ "pm10": [1.0] });
        assert!(hourly_to_series(no_time.as_object().unwrap(), "Paris", fetched_at()).is_err());
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let client =
            OpenMeteoClient::new(AlwaysDown(AtomicUsize::new(0))).with_retry_delay(Duration::ZERO);
        let city = crate::services::air_quality_api::lookup_city("Delhi").unwrap();

        let err = client.hourly(&city, fetched_at()).await.unwrap_err();

        assert_eq!(client.http.0.load(Ordering::SeqCst), MAX_ATTEMPTS);
        assert!(err.to_string().contains("after 3 attempts"));
    }
}
