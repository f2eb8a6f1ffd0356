use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::warn;

use super::{ScenarioModifiers, ScenarioStrategy};
use crate::channel::{CORE_CHANNELS, Channel};

/// Maximum length, in tokens, requested from the generator.
pub const MAX_LENGTH: usize = 150;

/// Accepted range for a generated adjustment. Below -1 would mean negative
/// concentrations.
pub const ADJUSTMENT_RANGE: RangeInclusive<f64> = -1.0..=10.0;

/// A text-generation capability. Output is untrusted free text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_length: usize) -> Result<String>;
}

/// Asks a [`TextGenerator`] to translate a scenario into modifiers.
///
/// Declines (returns `None`) on generator errors and on output that does not
/// parse as a JSON object of numbers covering at least one core channel.
pub struct InterpretationStrategy {
    generator: Arc<dyn TextGenerator>,
}

impl InterpretationStrategy {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl ScenarioStrategy for InterpretationStrategy {
    fn name(&self) -> &'static str {
        "interpretation"
    }

    async fn resolve(&self, _key: &str, description: &str) -> Option<ScenarioModifiers> {
        let prompt = build_prompt(description);

        let output = match self.generator.generate(&prompt, MAX_LENGTH).await {
            Ok(output) => output,
            Err(e) => {
                warn!(error = %e, "Scenario interpretation failed");
                return None;
            }
        };

        match parse_modifiers(&output) {
            Ok(modifiers) => Some(modifiers),
            Err(e) => {
                warn!(error = %e, output = %output, "Scenario interpretation output rejected");
                None
            }
        }
    }
}

/// Builds the structured prompt sent to the generator.
pub fn build_prompt(description: &str) -> String {
    let keys = CORE_CHANNELS
        .iter()
        .map(|c| format!("\"{}\"", c.key()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are an air quality expert.\n\
         Scenario: {description}\n\n\
         Estimate the fractional change in each pollutant if this scenario happens, \
         where -0.2 means a 20% reduction and 0.1 means a 10% increase. \
         Respond only with a JSON object with the numeric fields {keys}."
    )
}

/// Parses generator output into modifiers. Text around the JSON object is
/// ignored; every value must be a number in [`ADJUSTMENT_RANGE`].
pub fn parse_modifiers(output: &str) -> Result<ScenarioModifiers> {
    let object = extract_json_object(output)?;

    let mut modifiers = BTreeMap::new();
    for (key, value) in object {
        let Some(v) = value.as_f64() else {
            bail!("value for {key} is not a number");
        };
        if !ADJUSTMENT_RANGE.contains(&v) {
            bail!("adjustment {v} for {key} is outside {ADJUSTMENT_RANGE:?}");
        }
        modifiers.insert(key, v);
    }

    if !modifiers
        .keys()
        .filter_map(|k| Channel::from_key(k))
        .any(Channel::is_core)
    {
        bail!("output names none of the core channels");
    }

    Ok(ScenarioModifiers::from(modifiers))
}

/// Finds the outermost `{ ... }` in generator output and parses it as a JSON
/// object. Typographic and single quotes are read as double quotes.
pub(crate) fn extract_json_object(output: &str) -> Result<Map<String, Value>> {
    let normalized: String = output
        .chars()
        .map(|c| match c {
            '\'' | '\u{2018}' | '\u{2019}' | '\u{201c}' | '\u{201d}' => '"',
            other => other,
        })
        .collect();

    let (Some(start), Some(end)) = (normalized.find('{'), normalized.rfind('}')) else {
        bail!("no JSON object in output");
    };
    if end < start {
        bail!("no JSON object in output");
    }

    serde_json::from_str(&normalized[start..=end]).context("output is not a JSON object")
}
