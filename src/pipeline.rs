//! Per-city forecast-and-scenario pipeline.
//!
//! For each city the coordinator selects the latest processed artifact,
//! detects insights, asks for a pollution analysis, forecasts every core
//! channel with and without the scenario adjustment, and persists three
//! artifacts stamped with the run's generation time. Cities are processed
//! one after another and a failure in one city never stops the others; each
//! city's fate is recorded in the returned [`RunReport`].

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::error::Error as _;
use std::sync::Arc;
use tracing::{Instrument, debug, error, info, warn};

use crate::analyzers::forecast::forecast;
use crate::analyzers::insights::detect;
use crate::analyzers::reasoning::{PollutionAnalysis, analyze};
use crate::analyzers::types::{
    Forecast, ForecastArtifact, ForecastMode, HORIZON, InsightArtifact, InsightRecord,
};
use crate::channel::{CORE_CHANNELS, Channel};
use crate::error::PipelineError;
use crate::normalize::clean;
use crate::output::{RunRecord, encode_series_csv};
use crate::scenario::{ScenarioModifiers, ScenarioResolver, TextGenerator};
use crate::series::Series;
use crate::store::{Artifact, ArtifactKind, ArtifactStore, latest_series, read_series, write_json};

pub const SCHEMA_VERSION: u8 = 1;
pub const ALGORITHM_VERSION: u8 = 1;

/// Everything produced for one city in a run.
#[derive(Debug, Clone, Serialize)]
pub struct CityResult {
    pub city: String,
    pub source_key: String,
    pub insights: InsightRecord,
    pub analysis: PollutionAnalysis,
    pub modifiers: ScenarioModifiers,
    pub baseline: BTreeMap<Channel, Forecast>,
    pub scenario: BTreeMap<Channel, Forecast>,
    pub artifact_keys: Vec<String>,
}

#[derive(Debug)]
pub enum CityStatus {
    Completed(CityResult),
    Skipped(PipelineError),
    Failed(PipelineError),
}

#[derive(Debug)]
pub struct CityOutcome {
    pub city: String,
    pub status: CityStatus,
}

/// Result of one pipeline run across all requested cities.
#[derive(Debug)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub scenario_description: String,
    pub outcomes: Vec<CityOutcome>,
}

impl RunReport {
    /// Insights detected for `city` in this run, if it completed.
    pub fn insights(&self, city: &str) -> Option<&InsightRecord> {
        self.completed()
            .find(|r| r.city == city)
            .map(|r| &r.insights)
    }

    pub fn completed(&self) -> impl Iterator<Item = &CityResult> {
        self.outcomes.iter().filter_map(|o| match &o.status {
            CityStatus::Completed(result) => Some(result),
            _ => None,
        })
    }

    /// `(completed, skipped, failed)` city counts.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.outcomes
            .iter()
            .fold((0, 0, 0), |(c, s, f), o| match o.status {
                CityStatus::Completed(_) => (c + 1, s, f),
                CityStatus::Skipped(_) => (c, s + 1, f),
                CityStatus::Failed(_) => (c, s, f + 1),
            })
    }

    /// One ledger row per city.
    pub fn records(&self) -> Vec<RunRecord> {
        self.outcomes
            .iter()
            .map(|o| {
                let (status, detail) = match &o.status {
                    CityStatus::Completed(r) => ("completed", Some(r.source_key.clone())),
                    CityStatus::Skipped(e) => ("skipped", Some(error_chain(e))),
                    CityStatus::Failed(e) => ("failed", Some(error_chain(e))),
                };
                RunRecord {
                    generated_at: self.generated_at,
                    city: o.city.clone(),
                    status: status.to_string(),
                    detail,
                }
            })
            .collect()
    }
}

/// Formats an error with its sources, outermost first.
pub fn error_chain(e: &PipelineError) -> String {
    let mut parts = vec![e.to_string()];
    let mut source = e.source();
    while let Some(s) = source {
        parts.push(s.to_string());
        source = s.source();
    }
    parts.join(": ")
}

/// Coordinates a pipeline run against an artifact store.
pub struct Pipeline<'a, S: ArtifactStore + ?Sized> {
    store: &'a S,
    resolver: &'a ScenarioResolver,
    scenario: String,
    analyst: Option<Arc<dyn TextGenerator>>,
}

impl<'a, S: ArtifactStore + ?Sized> Pipeline<'a, S> {
    pub fn new(
        store: &'a S,
        resolver: &'a ScenarioResolver,
        scenario: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            scenario: scenario.into(),
            analyst: None,
        }
    }

    /// Generator asked for each city's pollution analysis. Without one every
    /// city gets [`PollutionAnalysis::fallback`].
    pub fn with_analyst(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.analyst = Some(generator);
        self
    }

    /// Runs every city in order. The scenario description is resolved at most
    /// once per run, on the first city that reaches that stage.
    #[tracing::instrument(
        skip(self, cities),
        fields(cities = cities.len(), scenario = %self.scenario)
    )]
    pub async fn run(&self, cities: &[String], generated_at: DateTime<Utc>) -> RunReport {
        let mut modifiers: Option<ScenarioModifiers> = None;
        let mut outcomes = Vec::with_capacity(cities.len());

        for city in cities {
            let span = tracing::info_span!("city_pipeline", city = %city);
            let status = match self
                .run_city(city, generated_at, &mut modifiers)
                .instrument(span)
                .await
            {
                Ok(result) => {
                    info!(
                        city = %city,
                        artifacts = result.artifact_keys.len(),
                        "City pipeline completed"
                    );
                    CityStatus::Completed(result)
                }
                Err(e) if e.is_skip() => {
                    warn!(city = %city, "No processed data found, skipping city");
                    CityStatus::Skipped(e)
                }
                Err(e) => {
                    error!(city = %city, error = %error_chain(&e), "City pipeline failed");
                    CityStatus::Failed(e)
                }
            };

            outcomes.push(CityOutcome {
                city: city.clone(),
                status,
            });
        }

        let report = RunReport {
            generated_at,
            scenario_description: self.scenario.clone(),
            outcomes,
        };
        let (completed, skipped, failed) = report.counts();
        info!(completed, skipped, failed, "Pipeline run finished");
        report
    }

    async fn run_city(
        &self,
        city: &str,
        generated_at: DateTime<Utc>,
        modifiers: &mut Option<ScenarioModifiers>,
    ) -> Result<CityResult, PipelineError> {
        let (artifact, series) = latest_series(self.store, city).await?;
        debug!(key = %artifact.key, rows = series.len(), "Selected artifact");

        let insights = detect(&series);
        info!(insights = ?insights, "Insights detected");

        let analysis = analyze(self.analyst.as_deref(), city, &insights).await;
        debug!(concerns = ?analysis.concerns, source = ?analysis.source, "Pollution analysed");

        let channels: Vec<Channel> = CORE_CHANNELS
            .into_iter()
            .filter(|c| series.has_column(c.key()))
            .collect();

        let baseline = forecast_all(&series, &channels, None);

        if modifiers.is_none() {
            *modifiers = Some(self.resolver.resolve(&self.scenario).await);
        }
        let modifiers = modifiers.clone().unwrap_or_else(ScenarioModifiers::fallback);

        let scenario = forecast_all(&series, &channels, Some(&modifiers));

        let artifact_keys = self
            .persist(
                city,
                generated_at,
                (&insights, &analysis),
                &modifiers,
                &baseline,
                &scenario,
            )
            .await?;

        Ok(CityResult {
            city: city.to_string(),
            source_key: artifact.key,
            insights,
            analysis,
            modifiers,
            baseline,
            scenario,
            artifact_keys,
        })
    }

    /// Writes the insight, baseline and scenario artifacts. Each write is
    /// attempted even if an earlier one failed; the first failure is returned.
    async fn persist(
        &self,
        city: &str,
        generated_at: DateTime<Utc>,
        (insights, analysis): (&InsightRecord, &PollutionAnalysis),
        modifiers: &ScenarioModifiers,
        baseline: &BTreeMap<Channel, Forecast>,
        scenario: &BTreeMap<Channel, Forecast>,
    ) -> Result<Vec<String>, PipelineError> {
        let insight_artifact = InsightArtifact {
            schema_version: SCHEMA_VERSION,
            city: city.to_string(),
            generated_at,
            insights: insights.clone(),
            analysis: analysis.clone(),
            scenario_description: self.scenario.clone(),
        };
        let baseline_artifact =
            forecast_artifact(city, generated_at, ForecastMode::Baseline, None, baseline);
        let scenario_artifact = forecast_artifact(
            city,
            generated_at,
            ForecastMode::Scenario,
            Some((&self.scenario, modifiers)),
            scenario,
        );

        let (store, stamp) = (self.store, generated_at);
        let results = [
            (
                ArtifactKind::Insights,
                write_json(store, city, ArtifactKind::Insights, stamp, &insight_artifact).await,
            ),
            (
                ArtifactKind::Forecast,
                write_json(store, city, ArtifactKind::Forecast, stamp, &baseline_artifact).await,
            ),
            (
                ArtifactKind::Scenario,
                write_json(store, city, ArtifactKind::Scenario, stamp, &scenario_artifact).await,
            ),
        ];

        let mut keys = Vec::new();
        let mut first_error = None;
        for (kind, result) in results {
            match result {
                Ok(artifact) => {
                    debug!(%kind, key = %artifact.key, "Artifact persisted");
                    keys.push(artifact.key);
                }
                Err(source) => {
                    error!(%kind, error = %source, "Failed to persist artifact");
                    first_error.get_or_insert(PipelineError::Persistence {
                        city: city.to_string(),
                        kind,
                        source,
                    });
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(keys),
        }
    }
}

fn forecast_all(
    series: &Series,
    channels: &[Channel],
    modifiers: Option<&ScenarioModifiers>,
) -> BTreeMap<Channel, Forecast> {
    channels
        .iter()
        .map(|&c| (c, forecast(series, c, modifiers)))
        .collect()
}

fn forecast_artifact(
    city: &str,
    generated_at: DateTime<Utc>,
    mode: ForecastMode,
    scenario: Option<(&str, &ScenarioModifiers)>,
    channels: &BTreeMap<Channel, Forecast>,
) -> ForecastArtifact {
    ForecastArtifact {
        schema_version: SCHEMA_VERSION,
        algorithm_version: ALGORITHM_VERSION,
        city: city.to_string(),
        generated_at,
        mode,
        horizon_hours: HORIZON,
        scenario_description: scenario.map(|(d, _)| d.to_string()),
        modifiers: scenario.map(|(_, m)| m.clone()),
        channels: channels.clone(),
    }
}

/// Counts from a batch cleaning pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CleanSummary {
    pub cleaned: usize,
    pub already_clean: usize,
    pub failed: usize,
}

/// Cleans every raw artifact of `cities` that has no processed counterpart
/// yet. The processed artifact carries the raw artifact's timestamp.
/// Failures are logged and counted per artifact.
#[tracing::instrument(skip(store, cities), fields(cities = cities.len()))]
pub async fn clean_raw_artifacts<S: ArtifactStore + ?Sized>(
    store: &S,
    cities: &[String],
) -> CleanSummary {
    let mut summary = CleanSummary::default();

    for city in cities {
        let (raw, processed) = match (
            store.list_artifacts(city, ArtifactKind::Raw).await,
            store.list_artifacts(city, ArtifactKind::Processed).await,
        ) {
            (Ok(raw), Ok(processed)) => (raw, processed),
            (Err(e), _) | (_, Err(e)) => {
                error!(city = %city, error = %e, "Failed to list artifacts");
                summary.failed += 1;
                continue;
            }
        };

        for artifact in raw {
            if processed.iter().any(|p| p.generated_at == artifact.generated_at) {
                summary.already_clean += 1;
                continue;
            }

            let result: Result<Artifact> = async {
                let series = read_series(store, &artifact).await?;
                let body = encode_series_csv(&clean(&series))?;
                store
                    .write(city, ArtifactKind::Processed, artifact.generated_at, &body)
                    .await
            }
            .await;

            match result {
                Ok(written) => {
                    info!(
                        city = %city,
                        source = %artifact.key,
                        key = %written.key,
                        "Raw artifact cleaned"
                    );
                    summary.cleaned += 1;
                }
                Err(e) => {
                    error!(
                        city = %city,
                        key = %artifact.key,
                        error = %e,
                        "Failed to clean raw artifact"
                    );
                    summary.failed += 1;
                }
            }
        }
    }

    info!(?summary, "Cleaning pass finished");
    summary
}

/// Whether a city has both a processed series and a baseline forecast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputCheck {
    pub city: String,
    pub processed: bool,
    pub forecast: bool,
}

impl OutputCheck {
    pub fn is_ok(&self) -> bool {
        self.processed && self.forecast
    }
}

/// Checks every city for the outputs a completed run leaves behind.
pub async fn verify_outputs<S: ArtifactStore + ?Sized>(
    store: &S,
    cities: &[String],
) -> Result<Vec<OutputCheck>> {
    let mut checks = Vec::with_capacity(cities.len());
    for city in cities {
        checks.push(OutputCheck {
            city: city.clone(),
            processed: store.latest(city, ArtifactKind::Processed).await?.is_some(),
            forecast: store.latest(city, ArtifactKind::Forecast).await?.is_some(),
        });
    }
    Ok(checks)
}
