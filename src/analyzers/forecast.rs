use tracing::debug;

use crate::analyzers::types::{Forecast, HORIZON, WINDOW};
use crate::analyzers::utility::{LinearFit, mean};
use crate::channel::Channel;
use crate::scenario::ScenarioModifiers;
use crate::series::Series;

/// Projects `channel` [`HORIZON`] hours ahead from its trailing window.
///
/// With `modifiers` the forecast is that of the window scaled by
/// `1 + modifiers[channel]`. The fit is linear in the window, so the scale is
/// applied to the unscaled fit's predictions, which keeps large factors from
/// overflowing. Predictions are clamped to `[0, 1]`; a prediction that is not
/// a number becomes 0.
///
/// Windows with fewer than two values yield a constant forecast of the
/// window mean (0 when empty), without scenario adjustment.
pub fn forecast(
    series: &Series,
    channel: Channel,
    modifiers: Option<&ScenarioModifiers>,
) -> Forecast {
    let window = series
        .trailing(channel.key(), WINDOW)
        .unwrap_or_default();

    if window.len() < 2 {
        debug!(channel = %channel, points = window.len(), "Degenerate window, constant forecast");
        return Forecast::constant(mean(&window));
    }

    let factor = modifiers.map_or(1.0, |m| 1.0 + m.get(channel));

    let Some(fit) = LinearFit::fit(&window) else {
        return Forecast::constant(mean(&window));
    };

    let start = window.len();
    let predictions = (start..start + HORIZON)
        .map(|x| clamp_unit(fit.predict(x as f64) * factor))
        .collect();

    Forecast::from_predictions(predictions)
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn linear(from: f64, to: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| from + (to - from) * i as f64 / (n - 1) as f64)
            .collect()
    }

    fn modifiers(pairs: &[(&str, f64)]) -> ScenarioModifiers {
        ScenarioModifiers::from(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[test]
    fn test_rising_series_continues_then_clamps() {
        let series = Series::from_columns(vec![("pm2_5", linear(0.1, 0.9, 48))]);
        let values = forecast(&series, Channel::Pm25, None);

        assert_eq!(values.len(), 24);

        let first_clamped = values.iter().position(|v| *v == 1.0).unwrap();
        assert!(first_clamped > 0);
        for pair in values[..first_clamped].windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert!(values[0] > 0.9);
        assert!(values[first_clamped..].iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_always_24_values_in_unit_range() {
        let steep = Series::from_columns(vec![("pm10", linear(0.0, 50.0, 30))]);
        let falling = Series::from_columns(vec![("pm10", linear(1.0, 0.0, 10))]);

        for series in [&steep, &falling] {
            let values = forecast(series, Channel::Pm10, None);
            assert_eq!(values.len(), 24);
            assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_degenerate_windows() {
        let empty = Series::from_columns(vec![("pm10", vec![])]);
        assert_eq!(forecast(&empty, Channel::Pm10, None).into_inner(), vec![0.0; 24]);

        let single = Series::from_columns(vec![("pm10", vec![0.37])]);
        assert_eq!(forecast(&single, Channel::Pm10, None).into_inner(), vec![0.37; 24]);

        let missing = Series::from_columns(vec![("ozone", vec![0.2, 0.4])]);
        assert_eq!(forecast(&missing, Channel::Pm10, None).into_inner(), vec![0.0; 24]);
    }

    #[test]
    fn test_degenerate_window_ignores_modifiers() {
        let single = Series::from_columns(vec![("pm2_5", vec![0.5])]);
        let adjusted = forecast(&single, Channel::Pm25, Some(&modifiers(&[("pm2_5", -0.5)])));
        assert_eq!(adjusted.into_inner(), vec![0.5; 24]);
    }

    #[test]
    fn test_scenario_scales_whole_window() {
        let series = Series::from_columns(vec![("nitrogen_dioxide", vec![0.5; 48])]);

        let baseline = forecast(&series, Channel::NitrogenDioxide, None);
        let reduced = forecast(
            &series,
            Channel::NitrogenDioxide,
            Some(&modifiers(&[("nitrogen_dioxide", -0.2)])),
        );

        assert!(baseline.iter().all(|v| (v - 0.5).abs() < 1e-12));
        assert!(reduced.iter().all(|v| (v - 0.4).abs() < 1e-12));
    }

    #[test]
    fn test_scenario_without_channel_entry_matches_baseline() {
        let series = Series::from_columns(vec![("pm10", linear(0.2, 0.6, 48))]);

        let baseline = forecast(&series, Channel::Pm10, None);
        let scenario = forecast(&series, Channel::Pm10, Some(&modifiers(&[("pm2_5", -0.3)])));

        assert_eq!(baseline, scenario);
    }

    #[test]
    fn test_large_increase_still_clamped() {
        let series = Series::from_columns(vec![("pm2_5", vec![0.7; 10])]);
        let boosted = forecast(&series, Channel::Pm25, Some(&modifiers(&[("pm2_5", 3.0)])));
        assert!(boosted.iter().all(|v| *v == 1.0));

        let wiped = forecast(&series, Channel::Pm25, Some(&modifiers(&[("pm2_5", -2.0)])));
        assert!(wiped.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_extreme_adjustment_stays_in_unit_range() {
        let series = Series::from_columns(vec![("pm2_5", vec![0.9; 48])]);

        for adjustment in [1e308, -1e308, f64::MAX, f64::INFINITY] {
            let scenario = modifiers(&[("pm2_5", adjustment)]);
            let values = forecast(&series, Channel::Pm25, Some(&scenario));
            assert_eq!(values.len(), 24);
            assert!(values.iter().all(|v| (0.0..=1.0).contains(v)), "{adjustment}: {values:?}");
        }

        let up = forecast(&series, Channel::Pm25, Some(&modifiers(&[("pm2_5", 1e308)])));
        assert!(up.iter().all(|v| *v == 1.0));
    }

    #[test]
    fn test_clamp_unit() {
        assert_eq!(clamp_unit(f64::NAN), 0.0);
        assert_eq!(clamp_unit(f64::INFINITY), 1.0);
        assert_eq!(clamp_unit(f64::NEG_INFINITY), 0.0);
        assert_eq!(clamp_unit(0.25), 0.25);
    }
}
