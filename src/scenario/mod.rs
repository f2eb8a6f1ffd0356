//! Scenario resolution: free-text "what-if" descriptions to per-channel
//! adjustment factors.
//!
//! [`ScenarioResolver`] walks an ordered list of [`ScenarioStrategy`]
//! implementations and returns the first answer. The standard chain is a
//! static [`ProfileTable`] followed by an [`InterpretationStrategy`] backed by
//! an injected [`TextGenerator`]. When every strategy declines, the resolver
//! returns [`ScenarioModifiers::fallback`]. Resolution never fails.

mod interpret;
mod profiles;

pub use interpret::{
    ADJUSTMENT_RANGE, InterpretationStrategy, MAX_LENGTH, TextGenerator, build_prompt,
    parse_modifiers,
};
pub(crate) use interpret::extract_json_object;
pub use profiles::ProfileTable;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::channel::{CORE_CHANNELS, Channel};

/// Adjustment applied to every core channel when nothing else resolves.
pub const FALLBACK_ADJUSTMENT: f64 = -0.1;

/// Signed fractional adjustments keyed by channel key. Absent channels are 0.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScenarioModifiers(BTreeMap<String, f64>);

impl ScenarioModifiers {
    /// `{pm2_5: -0.1, pm10: -0.1, nitrogen_dioxide: -0.1}`.
    pub fn fallback() -> Self {
        Self(
            CORE_CHANNELS
                .iter()
                .map(|c| (c.key().to_string(), FALLBACK_ADJUSTMENT))
                .collect(),
        )
    }

    pub fn get(&self, channel: Channel) -> f64 {
        self.0.get(channel.key()).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, f64>> for ScenarioModifiers {
    fn from(map: BTreeMap<String, f64>) -> Self {
        Self(map)
    }
}

impl<const N: usize> From<[(Channel, f64); N]> for ScenarioModifiers {
    fn from(pairs: [(Channel, f64); N]) -> Self {
        Self(
            pairs
                .into_iter()
                .map(|(c, v)| (c.key().to_string(), v))
                .collect(),
        )
    }
}

/// Normalizes a description into a profile lookup key: trimmed, lowercased,
/// spaces replaced by underscores.
pub fn normalize_key(description: &str) -> String {
    description.trim().to_lowercase().replace(' ', "_")
}

/// One step of the resolution chain. Returning `None` passes to the next step.
#[async_trait]
pub trait ScenarioStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn resolve(&self, key: &str, description: &str) -> Option<ScenarioModifiers>;
}

/// Ordered chain of scenario strategies with a fixed default.
pub struct ScenarioResolver {
    strategies: Vec<Box<dyn ScenarioStrategy>>,
    fallback: ScenarioModifiers,
}

impl Default for ScenarioResolver {
    fn default() -> Self {
        Self {
            strategies: Vec::new(),
            fallback: ScenarioModifiers::fallback(),
        }
    }
}

impl ScenarioResolver {
    /// Profile table first, then the generator when one is available.
    pub fn standard(profiles: ProfileTable, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        let resolver = Self::default().with_strategy(profiles);
        match generator {
            Some(generator) => resolver.with_strategy(InterpretationStrategy::new(generator)),
            None => resolver,
        }
    }

    /// Appends a strategy after the existing ones.
    pub fn with_strategy(mut self, strategy: impl ScenarioStrategy + 'static) -> Self {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    #[tracing::instrument(skip(self))]
    pub async fn resolve(&self, description: &str) -> ScenarioModifiers {
        let key = normalize_key(description);

        for strategy in &self.strategies {
            if let Some(modifiers) = strategy.resolve(&key, description).await {
                info!(strategy = strategy.name(), %key, "Scenario resolved");
                return modifiers;
            }
            debug!(strategy = strategy.name(), %key, "Strategy declined scenario");
        }

        info!(%key, "Scenario unresolved, using default modifiers");
        self.fallback.clone()
    }
}
