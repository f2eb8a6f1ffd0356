/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// An ordinary least-squares line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    /// Fits a line to `values` against x = 0..len-1.
    ///
    /// Returns `None` for fewer than two points.
    pub fn fit(values: &[f64]) -> Option<Self> {
        if values.len() < 2 {
            return None;
        }

        let n = values.len() as f64;
        let x_mean = (n - 1.0) / 2.0;
        let y_mean = mean(values);

        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, &y) in values.iter().enumerate() {
            let dx = i as f64 - x_mean;
            numerator += dx * (y - y_mean);
            denominator += dx * dx;
        }

        let slope = numerator / denominator;
        Some(Self {
            slope,
            intercept: y_mean - slope * x_mean,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn test_fit_requires_two_points() {
        assert!(LinearFit::fit(&[]).is_none());
        assert!(LinearFit::fit(&[0.4]).is_none());
    }

    #[test]
    fn test_fit_exact_line() {
        let values: Vec<f64> = (0..10).map(|i| 0.5 + 0.25 * i as f64).collect();
        let fit = LinearFit::fit(&values).unwrap();

        assert!((fit.slope - 0.25).abs() < 1e-12);
        assert!((fit.intercept - 0.5).abs() < 1e-12);
        assert!((fit.predict(10.0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_flat_series() {
        let fit = LinearFit::fit(&[0.3, 0.3, 0.3]).unwrap();
        assert_eq!(fit.slope, 0.0);
        assert!((fit.intercept - 0.3).abs() < 1e-12);
    }
}
