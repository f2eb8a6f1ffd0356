//! Per-city pollution analysis: which pollutants matter most and what policy
//! to take, asked of a [`TextGenerator`] with a fixed fallback answer.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::analyzers::types::InsightRecord;
use crate::scenario::{MAX_LENGTH, TextGenerator, extract_json_object};

pub const FALLBACK_CONCERNS: [&str; 2] = ["pm2_5", "nitrogen_dioxide"];
pub const FALLBACK_RECOMMENDATION: &str =
    "Reduce traffic during peak hours and promote public transport.";

/// Where an analysis came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    Generator,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollutionAnalysis {
    pub concerns: Vec<String>,
    pub recommendation: String,
    pub source: AnalysisSource,
}

impl PollutionAnalysis {
    pub fn fallback() -> Self {
        Self {
            concerns: FALLBACK_CONCERNS.map(String::from).to_vec(),
            recommendation: FALLBACK_RECOMMENDATION.to_string(),
            source: AnalysisSource::Fallback,
        }
    }
}

pub fn build_analysis_prompt(city: &str, insights: &InsightRecord) -> String {
    let summary = insights
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect::<Vec<_>>()
        .join("; ");

    format!(
        "You are an air quality expert.\n\
         City: {city}\n\
         Insights: {summary}\n\n\
         Which pollutants are most concerning and what policy should be taken? \
         Respond in JSON with fields 'concerns' and 'recommendation'."
    )
}

/// Parses generator output. `concerns` must be a list of strings and
/// `recommendation` a non-empty string; other fields are ignored.
pub fn parse_analysis(output: &str) -> Result<PollutionAnalysis> {
    let object = extract_json_object(output)?;

    let concerns = object
        .get("concerns")
        .and_then(|v| v.as_array())
        .context("missing 'concerns' list")?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .context("'concerns' must only hold strings")?;

    let recommendation = object
        .get("recommendation")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .context("missing 'recommendation' text")?;
    if recommendation.is_empty() {
        bail!("'recommendation' is empty");
    }

    Ok(PollutionAnalysis {
        concerns,
        recommendation: recommendation.to_string(),
        source: AnalysisSource::Generator,
    })
}

/// Asks `generator` for an analysis of `city`. Never fails: a missing
/// generator, a generator error or unusable output all give
/// [`PollutionAnalysis::fallback`].
pub async fn analyze(
    generator: Option<&dyn TextGenerator>,
    city: &str,
    insights: &InsightRecord,
) -> PollutionAnalysis {
    let Some(generator) = generator else {
        debug!(city, "No generator configured, using fallback analysis");
        return PollutionAnalysis::fallback();
    };

    let prompt = build_analysis_prompt(city, insights);
    let output = match generator.generate(&prompt, MAX_LENGTH).await {
        Ok(output) => output,
        Err(e) => {
            warn!(city, error = %e, "Pollution analysis failed");
            return PollutionAnalysis::fallback();
        }
    };

    match parse_analysis(&output) {
        Ok(analysis) => analysis,
        Err(e) => {
            warn!(city, error = %e, output = %output, "Pollution analysis output rejected");
            PollutionAnalysis::fallback()
        }
    }
}
