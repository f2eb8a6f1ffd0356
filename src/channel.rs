//! Pollutant channels measured per city.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A named pollutant measurement, identified by its column key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Pm10,
    #[serde(rename = "pm2_5")]
    Pm25,
    CarbonMonoxide,
    NitrogenDioxide,
    Ozone,
    SulphurDioxide,
}

/// Channels that drive insight, forecast and scenario logic.
pub const CORE_CHANNELS: [Channel; 3] = [Channel::Pm25, Channel::Pm10, Channel::NitrogenDioxide];

/// Channels that are min-max scaled by the normalizer, in the order the
/// acquisition layer requests them.
pub const NORMALIZED_CHANNELS: [Channel; 6] = [
    Channel::Pm10,
    Channel::Pm25,
    Channel::CarbonMonoxide,
    Channel::NitrogenDioxide,
    Channel::Ozone,
    Channel::SulphurDioxide,
];

impl Channel {
    /// Column key used in series, artifacts and modifier maps.
    pub fn key(self) -> &'static str {
        match self {
            Channel::Pm10 => "pm10",
            Channel::Pm25 => "pm2_5",
            Channel::CarbonMonoxide => "carbon_monoxide",
            Channel::NitrogenDioxide => "nitrogen_dioxide",
            Channel::Ozone => "ozone",
            Channel::SulphurDioxide => "sulphur_dioxide",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        NORMALIZED_CHANNELS.into_iter().find(|c| c.key() == key)
    }

    pub fn is_core(self) -> bool {
        CORE_CHANNELS.contains(&self)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_round_trip_through_from_key() {
        for channel in NORMALIZED_CHANNELS {
            assert_eq!(Channel::from_key(channel.key()), Some(channel));
        }
        assert_eq!(Channel::from_key("temperature"), None);
    }

    #[test]
    fn test_serde_uses_column_keys() {
        let json = serde_json::to_string(&Channel::Pm25).unwrap();
        assert_eq!(json, "\"pm2_5\"");
        let parsed: Channel = serde_json::from_str("\"nitrogen_dioxide\"").unwrap();
        assert_eq!(parsed, Channel::NitrogenDioxide);
    }

    #[test]
    fn test_core_channels() {
        assert!(Channel::Pm25.is_core());
        assert!(Channel::NitrogenDioxide.is_core());
        assert!(!Channel::Ozone.is_core());
    }
}
