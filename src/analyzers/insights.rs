use tracing::debug;

use crate::analyzers::trend::classify;
use crate::analyzers::types::{InsightRecord, WINDOW};
use crate::analyzers::utility::LinearFit;
use crate::channel::CORE_CHANNELS;
use crate::series::Series;

/// Normalized level above which a reading counts as a high-pollution event.
pub const HIGH_POLLUTION_THRESHOLD: f64 = 0.8;

/// Scans the trailing window of each core channel and emits an event count
/// and, when at least two values exist, a trend sentence.
///
/// Channels absent from the series produce no entries.
pub fn detect(series: &Series) -> InsightRecord {
    let mut insights = InsightRecord::new();

    for channel in CORE_CHANNELS {
        let Some(window) = series.trailing(channel.key(), WINDOW) else {
            continue;
        };

        let high_events = window
            .iter()
            .filter(|v| **v > HIGH_POLLUTION_THRESHOLD)
            .count();
        insights.insert(
            channel.key().to_string(),
            format!("{high_events} high {channel} events in recent data."),
        );

        if let Some(fit) = LinearFit::fit(&window) {
            let trend = classify(fit.slope);
            debug!(channel = %channel, slope = fit.slope, ?trend, "Trend fitted");
            insights.insert(format!("{channel}_trend"), trend.describe(channel));
        }
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_five_high_events_verbatim() {
        let mut values = vec![0.5; 48];
        for v in values.iter_mut().step_by(9).take(5) {
            *v = 0.9;
        }
        let series = Series::from_columns(vec![("pm2_5", values)]);

        let insights = detect(&series);
        assert_eq!(insights["pm2_5"], "5 high pm2_5 events in recent data.");
    }

    #[test]
    fn test_events_counted_in_trailing_window_only() {
        // Twelve early spikes fall outside the last 48 rows.
        let mut values = vec![0.95; 12];
        values.extend(vec![0.2; 48]);
        let series = Series::from_columns(vec![("pm10", values)]);

        let insights = detect(&series);
        assert_eq!(insights["pm10"], "0 high pm10 events in recent data.");
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let series = Series::from_columns(vec![("pm10", vec![0.8, 0.8, 0.81])]);
        assert_eq!(detect(&series)["pm10"], "1 high pm10 events in recent data.");
    }

    #[test]
    fn test_trend_directions() {
        let rising: Vec<f64> = (0..48).map(|i| i as f64 / 47.0).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        let flat = vec![0.4; 48];
        let series = Series::from_columns(vec![
            ("pm2_5", rising),
            ("pm10", falling),
            ("nitrogen_dioxide", flat),
        ]);

        let insights = detect(&series);
        assert_eq!(insights["pm2_5_trend"], "Increasing trend in pm2_5");
        assert_eq!(insights["pm10_trend"], "Decreasing trend in pm10");
        assert_eq!(
            insights["nitrogen_dioxide_trend"],
            "Stable nitrogen_dioxide trend"
        );
    }

    #[test]
    fn test_single_row_skips_trend() {
        let series = Series::from_columns(vec![("pm2_5", vec![0.9])]);
        let insights = detect(&series);

        assert_eq!(insights["pm2_5"], "1 high pm2_5 events in recent data.");
        assert!(!insights.contains_key("pm2_5_trend"));
    }

    #[test]
    fn test_absent_and_non_core_channels_skipped() {
        let series = Series::from_columns(vec![("ozone", vec![0.9, 0.95])]);
        assert!(detect(&series).is_empty());
    }
}
