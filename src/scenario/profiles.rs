use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

use super::{ScenarioModifiers, ScenarioStrategy};
use crate::channel::Channel::{NitrogenDioxide, Pm10, Pm25};

/// Named scenario profiles, looked up by normalized key.
///
/// Extra profiles can be loaded from a plain JSON object on disk and merged
/// over the built-in table:
/// ```json
/// {
///   "school_holidays": { "pm2_5": -0.05, "pm10": -0.05, "nitrogen_dioxide": -0.12 },
///   "construction_boom": { "pm10": 0.3 }
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ProfileTable {
    entries: HashMap<String, ScenarioModifiers>,
}

impl ProfileTable {
    /// The profiles shipped with the pipeline.
    pub fn builtin() -> Self {
        let traffic_cut =
            ScenarioModifiers::from([(Pm25, -0.2), (Pm10, -0.2), (NitrogenDioxide, -0.2)]);

        let entries = HashMap::from([
            ("traffic_reduction".to_string(), traffic_cut.clone()),
            ("what_if_traffic_is_reduced_by_30%?".to_string(), traffic_cut),
            (
                "increased_traffic".to_string(),
                ScenarioModifiers::from([(Pm25, 0.2), (Pm10, 0.15), (NitrogenDioxide, 0.25)]),
            ),
            (
                "industrial_shutdown".to_string(),
                ScenarioModifiers::from([(Pm25, -0.3), (Pm10, -0.35), (NitrogenDioxide, -0.15)]),
            ),
            (
                "odd_even_rule".to_string(),
                ScenarioModifiers::from([(Pm25, -0.1), (Pm10, -0.08), (NitrogenDioxide, -0.18)]),
            ),
        ]);

        Self { entries }
    }

    /// Loads profiles from a JSON file at `path`.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario profiles from {path}"))?;
        let entries: HashMap<String, BTreeMap<String, f64>> = serde_json::from_str(&content)
            .with_context(|| format!("invalid scenario profiles in {path}"))?;

        Ok(Self {
            entries: entries
                .into_iter()
                .map(|(k, v)| (super::normalize_key(&k), ScenarioModifiers::from(v)))
                .collect(),
        })
    }

    /// Adds `other`'s profiles, replacing entries with the same key.
    pub fn merge(mut self, other: ProfileTable) -> Self {
        self.entries.extend(other.entries);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ScenarioModifiers> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl ScenarioStrategy for ProfileTable {
    fn name(&self) -> &'static str {
        "profile_table"
    }

    async fn resolve(&self, key: &str, _description: &str) -> Option<ScenarioModifiers> {
        self.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::Channel;
    use std::io::Write;

    #[test]
    fn test_builtin_default_scenario_matches_traffic_cut() {
        let table = ProfileTable::builtin();
        let modifiers = table.get("what_if_traffic_is_reduced_by_30%?").unwrap();

        assert_eq!(modifiers.get(Channel::Pm25), -0.2);
        assert_eq!(modifiers.get(Channel::Pm10), -0.2);
        assert_eq!(modifiers.get(Channel::NitrogenDioxide), -0.2);
        assert_eq!(modifiers.get(Channel::Ozone), 0.0);
    }

    #[test]
    fn test_load_normalizes_keys_and_merges() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let profiles = concat!(
            r#"{"Traffic Reduction": {"pm2_5": -0.5}, "#,
            r#""school_holidays": {"nitrogen_dioxide": -0.12}}"#
        );
        file.write_all(profiles.as_bytes()).unwrap();

        let loaded = ProfileTable::load(file.path().to_str().unwrap()).unwrap();
        let table = ProfileTable::builtin().merge(loaded);

        assert_eq!(table.get("traffic_reduction").unwrap().get(Channel::Pm25), -0.5);
        assert_eq!(
            table.get("school_holidays").unwrap().get(Channel::NitrogenDioxide),
            -0.12
        );
        assert!(table.get("industrial_shutdown").is_some());
    }

    #[test]
    fn test_load_rejects_non_numeric_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"bad": {{"pm2_5": "lots"}}}}"#).unwrap();

        assert!(ProfileTable::load(file.path().to_str().unwrap()).is_err());
    }

    #[tokio::test]
    async fn test_strategy_declines_unknown_key() {
        let table = ProfileTable::builtin();
        assert!(table.resolve("unknown_plan", "unknown plan").await.is_none());
        assert!(table.resolve("odd_even_rule", "Odd Even Rule").await.is_some());
    }
}
