//! Markdown city reports built from insight records.

use tracing::{error, info};

use crate::analyzers::types::InsightRecord;
use crate::pipeline::RunReport;
use crate::store::{ArtifactKind, ArtifactStore};

/// Renders the per-city report served alongside forecasts.
pub fn render_city_report(city: &str, insights: &InsightRecord) -> String {
    if insights.is_empty() {
        return format!("No insights available for {city}.");
    }

    let mut lines = vec![
        format!("# Air Quality Report for {city}"),
        String::new(),
        "## Summary of Trends and Events:".to_string(),
    ];
    lines.extend(insights.iter().map(|(k, v)| format!("- **{k}**: {v}")));
    lines.join("\n")
}

/// Writes a `report` artifact for every completed city in `report`.
/// Returns how many were written; failures are logged per city.
pub async fn publish_reports<S: ArtifactStore + ?Sized>(store: &S, report: &RunReport) -> usize {
    let mut written = 0;
    for result in report.completed() {
        let body = render_city_report(&result.city, &result.insights);
        match store
            .write(&result.city, ArtifactKind::Report, report.generated_at, body.as_bytes())
            .await
        {
            Ok(artifact) => {
                info!(city = %result.city, key = %artifact.key, "Report written");
                written += 1;
            }
            Err(e) => error!(city = %result.city, error = %e, "Failed to write report"),
        }
    }
    written
}
