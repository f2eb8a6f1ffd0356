//! Runtime settings read from the environment (after `.env` is loaded).

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CITIES: &str = "London,Paris,New York";
pub const DEFAULT_SCENARIO: &str = "What if traffic is reduced by 30%?";
pub const DEFAULT_FETCH_INTERVAL_MINUTES: u64 = 60;

/// Connection details for an OpenAI-compatible text generator.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub cities: Vec<String>,
    pub fetch_interval: Duration,
    pub data_dir: PathBuf,
    pub artifact_bucket: Option<String>,
    pub artifact_prefix: Option<String>,
    pub scenario_description: String,
    pub profiles_path: Option<PathBuf>,
    pub llm: Option<LlmSettings>,
    pub open_meteo_api_key: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds settings from an arbitrary variable lookup. Blank values count
    /// as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let cities = parse_cities(&get("CITY_LIST").unwrap_or_else(|| DEFAULT_CITIES.to_string()));
        if cities.is_empty() {
            bail!("CITY_LIST does not name any city");
        }

        let minutes = match get("DATA_FETCH_INTERVAL_MINUTES") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| {
                    format!("DATA_FETCH_INTERVAL_MINUTES must be a whole number, got '{raw}'")
                })?,
            None => DEFAULT_FETCH_INTERVAL_MINUTES,
        };

        let llm = match (get("LLM_BASE_URL"), get("LLM_MODEL")) {
            (Some(base_url), Some(model)) => Some(LlmSettings {
                base_url,
                model,
                api_key: get("LLM_API_KEY"),
            }),
            (Some(_), None) => bail!("LLM_BASE_URL is set but LLM_MODEL is missing"),
            _ => None,
        };

        if minutes == 0 {
            bail!("DATA_FETCH_INTERVAL_MINUTES must be at least 1");
        }
        let fetch_interval = minutes
            .checked_mul(60)
            .map(Duration::from_secs)
            .with_context(|| format!("DATA_FETCH_INTERVAL_MINUTES {minutes} is too large"))?;

        Ok(Self {
            cities,
            fetch_interval,
            data_dir: get("DATA_DIR").unwrap_or_else(|| "data".to_string()).into(),
            artifact_bucket: get("ARTIFACT_BUCKET"),
            artifact_prefix: get("ARTIFACT_PREFIX"),
            scenario_description: get("SCENARIO_DESCRIPTION")
                .unwrap_or_else(|| DEFAULT_SCENARIO.to_string()),
            profiles_path: get("SCENARIO_PROFILES_PATH").map(PathBuf::from),
            llm,
            open_meteo_api_key: get("OPEN_METEO_API_KEY"),
        })
    }

    /// Location of the local run ledger.
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("runs.csv")
    }
}

/// Splits a comma separated city list, dropping blanks.
pub fn parse_cities(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let s = settings(&[]).unwrap();
        assert_eq!(s.cities, vec!["London", "Paris", "New York"]);
        assert_eq!(s.fetch_interval, Duration::from_secs(3600));
        assert_eq!(s.data_dir, PathBuf::from("data"));
        assert_eq!(s.scenario_description, DEFAULT_SCENARIO);
        assert!(s.artifact_bucket.is_none());
        assert!(s.llm.is_none());
        assert_eq!(s.ledger_path(), PathBuf::from("data/runs.csv"));
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            ("CITY_LIST", " Delhi, ,Mumbai "),
            ("DATA_FETCH_INTERVAL_MINUTES", "15"),
            ("ARTIFACT_BUCKET", "aq-bucket"),
            ("LLM_BASE_URL", "http://localhost:11434/v1"),
            ("LLM_MODEL", "llama3"),
            ("SCENARIO_DESCRIPTION", "  "),
        ])
        .unwrap();

        assert_eq!(s.cities, vec!["Delhi", "Mumbai"]);
        assert_eq!(s.fetch_interval, Duration::from_secs(900));
        assert_eq!(s.artifact_bucket.as_deref(), Some("aq-bucket"));
        assert_eq!(s.scenario_description, DEFAULT_SCENARIO);

        let llm = s.llm.unwrap();
        assert_eq!(llm.model, "llama3");
        assert!(llm.api_key.is_none());
    }

    #[test]
    fn test_invalid_values() {
        let err = settings(&[("DATA_FETCH_INTERVAL_MINUTES", "hourly")]).unwrap_err();
        assert!(err.to_string().contains("DATA_FETCH_INTERVAL_MINUTES"));

        assert!(settings(&[("CITY_LIST", " , ")]).is_err());

        let err = settings(&[("DATA_FETCH_INTERVAL_MINUTES", "0")]).unwrap_err();
        assert!(err.to_string().contains("at least 1"));
        let huge = u64::MAX.to_string();
        let err = settings(&[("DATA_FETCH_INTERVAL_MINUTES", &huge)]).unwrap_err();
        assert!(err.to_string().contains("too large"));
        assert!(settings(&[("LLM_BASE_URL", "http://x")]).is_err());
    }
}
