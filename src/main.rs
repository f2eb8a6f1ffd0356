//! CLI entry point for the air-quality twin.
//!
//! Provides subcommands for fetching raw readings from Open-Meteo, cleaning
//! them into processed series, running the forecast-and-scenario pipeline,
//! verifying outputs and scheduling the whole cycle.

mod infra;
mod services;

use crate::infra::llm::ChatCompletionGenerator;
use crate::infra::openmeteo::OpenMeteoClient;
use crate::services::air_quality_api::{AirQualityApi, lookup_city};
use anyhow::{Result, bail};
use aq_twin::config::{Settings, parse_cities};
use aq_twin::fetch::BasicClient;
use aq_twin::fetch::auth::{ApiKey, UrlParam};
use aq_twin::output::{append_record, encode_series_csv, print_json};
use aq_twin::pipeline::{Pipeline, clean_raw_artifacts, verify_outputs};
use aq_twin::report::publish_reports;
use aq_twin::scenario::{ProfileTable, ScenarioResolver, TextGenerator};
use aq_twin::store::{Artifact, ArtifactKind, ArtifactStore, FsStore, S3Store};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "aq_twin")]
#[command(about = "Air-quality forecasts and what-if scenarios per city", long_about = None)]
struct Cli {
    /// Local data directory (overrides DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Store artifacts in this S3 bucket instead of the data directory
    #[arg(long, global = true)]
    s3_bucket: Option<String>,

    /// Comma separated cities (overrides CITY_LIST)
    #[arg(long, global = true)]
    cities: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch hourly readings for every city and store them as raw artifacts
    Fetch,
    /// Clean raw artifacts that have no processed counterpart yet
    Clean,
    /// Run insights, baseline and scenario forecasts for every city
    Run {
        /// Scenario description (overrides SCENARIO_DESCRIPTION)
        #[arg(short, long)]
        scenario: Option<String>,

        /// Print the per-city outcome records as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show the modifiers a scenario description resolves to
    Resolve {
        #[arg(value_name = "DESCRIPTION")]
        description: String,
    },
    /// Check that every city has processed and forecast outputs
    Verify,
    /// Repeat fetch, clean and run every fetch interval
    Schedule {
        /// Number of cycles to run (0 = forever)
        #[arg(short = 'n', long, default_value_t = 0)]
        num_runs: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/aq_twin.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("aq_twin.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(dir) = cli.data_dir {
        settings.data_dir = dir;
    }
    if let Some(bucket) = cli.s3_bucket {
        settings.artifact_bucket = Some(bucket);
    }
    if let Some(cities) = cli.cities.as_deref() {
        settings.cities = parse_cities(cities);
    }

    let store = build_store(&settings).await;

    match cli.command {
        Commands::Fetch => {
            fetch_all(store.as_ref(), &settings).await?;
        }
        Commands::Clean => {
            clean_raw_artifacts(store.as_ref(), &settings.cities).await;
        }
        Commands::Run { scenario, json } => {
            if let Some(scenario) = scenario {
                settings.scenario_description = scenario;
            }
            let analyst = build_generator(&settings)?;
            let resolver = build_resolver(&settings, analyst.clone())?;
            run_pipeline(store.as_ref(), &resolver, analyst, &settings, json).await?;
        }
        Commands::Resolve { description } => {
            let resolver = build_resolver(&settings, build_generator(&settings)?)?;
            info!(strategies = ?resolver.strategy_names(), "Resolving scenario");
            let modifiers = resolver.resolve(&description).await;
            print_json(&modifiers)?;
        }
        Commands::Verify => {
            let checks = verify_outputs(store.as_ref(), &settings.cities).await?;
            for check in &checks {
                if check.is_ok() {
                    info!(city = %check.city, "[OK]");
                } else {
                    warn!(
                        city = %check.city,
                        processed = check.processed,
                        forecast = check.forecast,
                        "[MISSING]"
                    );
                }
            }

            let missing = checks.iter().filter(|c| !c.is_ok()).count();
            if missing > 0 {
                bail!("{missing} of {} cities are missing outputs", checks.len());
            }
            info!("All outputs present");
        }
        Commands::Schedule { num_runs } => {
            schedule(store.as_ref(), &settings, num_runs).await?;
        }
    }

    Ok(())
}

/// S3 when a bucket is configured, the local data directory otherwise.
async fn build_store(settings: &Settings) -> Box<dyn ArtifactStore> {
    match &settings.artifact_bucket {
        Some(bucket) => {
            let config = aws_config::load_from_env().await;
            info!(bucket = %bucket, prefix = ?settings.artifact_prefix, "Using S3 artifact store");
            Box::new(S3Store::new(&config, bucket, settings.artifact_prefix.as_deref()))
        }
        None => {
            info!(dir = %settings.data_dir.display(), "Using local artifact store");
            Box::new(FsStore::new(&settings.data_dir))
        }
    }
}

fn build_resolver(
    settings: &Settings,
    generator: Option<Arc<dyn TextGenerator>>,
) -> Result<ScenarioResolver> {
    let mut profiles = ProfileTable::builtin();
    if let Some(path) = &settings.profiles_path {
        let extra = ProfileTable::load(&path.to_string_lossy())?;
        info!(path = %path.display(), profiles = extra.len(), "Loaded scenario profiles");
        profiles = profiles.merge(extra);
    }

    Ok(ScenarioResolver::standard(profiles, generator))
}

/// The configured text generator, shared by scenario interpretation and the
/// per-city pollution analysis.
fn build_generator(settings: &Settings) -> Result<Option<Arc<dyn TextGenerator>>> {
    let Some(llm) = &settings.llm else {
        return Ok(None);
    };

    info!(base_url = %llm.base_url, model = %llm.model, "Text generator enabled");
    let http = BasicClient::new()?;
    let generator: Arc<dyn TextGenerator> = match &llm.api_key {
        Some(key) => Arc::new(ChatCompletionGenerator::new(
            ApiKey::bearer(http, key),
            &llm.base_url,
            &llm.model,
        )),
        None => Arc::new(ChatCompletionGenerator::new(http, &llm.base_url, &llm.model)),
    };
    Ok(Some(generator))
}

fn build_api(settings: &Settings) -> Result<Box<dyn AirQualityApi>> {
    let http = BasicClient::new()?;
    let api: Box<dyn AirQualityApi> = match &settings.open_meteo_api_key {
        Some(key) => Box::new(OpenMeteoClient::new(UrlParam {
            inner: http,
            param_name: "apikey".to_string(),
            key: key.clone(),
        })),
        None => Box::new(OpenMeteoClient::new(http)),
    };
    Ok(api)
}

/// Fetches every known city and writes one raw artifact each. Unknown cities
/// and failed fetches are logged and skipped.
#[tracing::instrument(skip_all, fields(cities = settings.cities.len()))]
async fn fetch_all(store: &dyn ArtifactStore, settings: &Settings) -> Result<usize> {
    let api = build_api(settings)?;
    let fetched_at = Utc::now();
    let mut written = 0;

    for name in &settings.cities {
        let Some(city) = lookup_city(name) else {
            warn!(city = %name, "No coordinates known for city, skipping");
            continue;
        };

        let result: Result<Artifact> = async {
            let series = api.hourly(&city, fetched_at).await?;
            let body = encode_series_csv(&series)?;
            store.write(name, ArtifactKind::Raw, fetched_at, &body).await
        }
        .await;

        match result {
            Ok(artifact) => {
                info!(city = %name, key = %artifact.key, "Raw data stored");
                written += 1;
            }
            Err(e) => error!(city = %name, error = %e, "Failed to fetch city"),
        }
    }

    info!(written, "Fetch finished");
    Ok(written)
}

/// One pipeline run: analyses, forecasts, reports and ledger rows.
async fn run_pipeline(
    store: &dyn ArtifactStore,
    resolver: &ScenarioResolver,
    analyst: Option<Arc<dyn TextGenerator>>,
    settings: &Settings,
    json: bool,
) -> Result<()> {
    let mut pipeline = Pipeline::new(store, resolver, settings.scenario_description.as_str());
    if let Some(generator) = analyst {
        pipeline = pipeline.with_analyst(generator);
    }
    let report = pipeline.run(&settings.cities, Utc::now()).await;

    publish_reports(store, &report).await;

    let ledger = settings.ledger_path();
    let ledger = ledger.to_string_lossy();
    let records = report.records();
    for record in &records {
        if let Err(e) = append_record(&ledger, record) {
            error!(path = %ledger, error = %e, "Failed to append run record");
        }
    }

    if json {
        print_json(&records)?;
    }
    Ok(())
}

#[tracing::instrument(
    skip(store, settings),
    fields(interval_secs = settings.fetch_interval.as_secs())
)]
async fn schedule(store: &dyn ArtifactStore, settings: &Settings, num_runs: usize) -> Result<()> {
    let analyst = build_generator(settings)?;
    let resolver = build_resolver(settings, analyst.clone())?;

    if num_runs == 0 {
        info!("Scheduling forever. Press Ctrl+C to stop.");
    }

    let mut run_count = 0;
    loop {
        if num_runs > 0 && run_count >= num_runs {
            break;
        }
        run_count += 1;
        info!(run = run_count, "Starting scheduled cycle");

        if let Err(e) = fetch_all(store, settings).await {
            error!(error = %e, "Fetch stage failed");
        }
        clean_raw_artifacts(store, &settings.cities).await;
        if let Err(e) = run_pipeline(store, &resolver, analyst.clone(), settings, false).await {
            error!(error = %e, "Pipeline stage failed");
        }

        if num_runs == 0 || run_count < num_runs {
            info!(secs = settings.fetch_interval.as_secs(), "Waiting before next cycle");
            tokio::time::sleep(settings.fetch_interval).await;
        }
    }

    info!(runs = run_count, "Schedule finished");
    Ok(())
}
