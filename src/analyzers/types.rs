//! Data types produced by the forecast-and-scenario pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::Deref;

use crate::analyzers::reasoning::PollutionAnalysis;
use crate::channel::Channel;
use crate::scenario::ScenarioModifiers;

/// Number of hourly steps every forecast covers.
pub const HORIZON: usize = 24;

/// Trailing window, in rows, used for insights and forecasting.
pub const WINDOW: usize = 48;

/// Qualitative per-channel signals, keyed by `{channel}` and `{channel}_trend`.
pub type InsightRecord = BTreeMap<String, String>;

/// Exactly [`HORIZON`] predicted values for one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Forecast(Vec<f64>);

impl Forecast {
    pub(crate) fn constant(value: f64) -> Self {
        Self(vec![value; HORIZON])
    }

    pub(crate) fn from_predictions(values: Vec<f64>) -> Self {
        debug_assert_eq!(values.len(), HORIZON);
        Self(values)
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

impl Deref for Forecast {
    type Target = [f64];

    fn deref(&self) -> &[f64] {
        &self.0
    }
}

/// Whether a forecast was adjusted by a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMode {
    Baseline,
    Scenario,
}

/// Insight artifact persisted per city and run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightArtifact {
    pub schema_version: u8,
    pub city: String,
    pub generated_at: DateTime<Utc>,
    pub insights: InsightRecord,
    pub analysis: PollutionAnalysis,
    pub scenario_description: String,
}

/// Forecast artifact persisted per city and run, one series per core channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastArtifact {
    pub schema_version: u8,
    pub algorithm_version: u8,
    pub city: String,
    pub generated_at: DateTime<Utc>,
    pub mode: ForecastMode,
    pub horizon_hours: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub scenario_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub modifiers: Option<ScenarioModifiers>,
    pub channels: BTreeMap<Channel, Forecast>,
}
