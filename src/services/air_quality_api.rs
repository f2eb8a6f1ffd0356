//! Trait and types for hourly air-quality data providers.

use anyhow::Result;
use aq_twin::series::Series;
use chrono::{DateTime, Utc};

/// A city with known coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

const KNOWN_CITIES: [City; 8] = [
    City {
        name: "London",
        latitude: 51.5074,
        longitude: -0.1278,
    },
    City {
        name: "Paris",
        latitude: 48.8566,
        longitude: 2.3522,
    },
    City {
        name: "New York",
        latitude: 40.7128,
        longitude: -74.0060,
    },
    City {
        name: "Bangalore",
        latitude: 12.9716,
        longitude: 77.5946,
    },
    City {
        name: "Mumbai",
        latitude: 19.0760,
        longitude: 72.8777,
    },
    City {
        name: "Delhi",
        latitude: 28.6139,
        longitude: 77.2090,
    },
    City {
        name: "Chennai",
        latitude: 13.0827,
        longitude: 80.2707,
    },
    City {
        name: "Kolkata",
        latitude: 22.5726,
        longitude: 88.3639,
    },
];

/// Looks up coordinates by city name, ignoring case.
pub fn lookup_city(name: &str) -> Option<City> {
    KNOWN_CITIES
        .into_iter()
        .find(|c| c.name.eq_ignore_ascii_case(name.trim()))
}

/// Abstraction over an hourly air-quality provider (e.g., Open-Meteo).
#[async_trait::async_trait]
pub trait AirQualityApi: Send + Sync {
    /// Raw hourly readings for `city`, stamped with `fetched_at`.
    async fn hourly(&self, city: &City, fetched_at: DateTime<Utc>) -> Result<Series>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_city() {
        let ny = lookup_city("new york").unwrap();
        assert_eq!(ny.name, "New York");
        assert_eq!(ny.longitude, -74.0060);
        assert!(lookup_city("Atlantis").is_none());
    }
}
