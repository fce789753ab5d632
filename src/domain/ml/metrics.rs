use serde::{Deserialize, Serialize};

/// Out-of-sample regression quality on the raw price scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub samples: usize,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl RegressionMetrics {
    /// Pairs beyond the shorter slice are ignored. Empty input gives zeros.
    pub fn compute(predicted: &[f64], actual: &[f64]) -> Self {
        let n = predicted.len().min(actual.len());
        if n == 0 {
            return Self {
                samples: 0,
                rmse: 0.0,
                mae: 0.0,
                r2: 0.0,
            };
        }

        let pairs = || predicted.iter().zip(actual.iter()).take(n);
        let sq_err: f64 = pairs().map(|(p, t)| (p - t).powi(2)).sum();
        let abs_err: f64 = pairs().map(|(p, t)| (p - t).abs()).sum();

        let mean_y = actual[..n].iter().sum::<f64>() / n as f64;
        let var_y = actual[..n].iter().map(|t| (t - mean_y).powi(2)).sum::<f64>() / n as f64;
        let mse = sq_err / n as f64;
        let r2 = if var_y > 0.0 { 1.0 - mse / var_y } else { 0.0 };

        Self {
            samples: n,
            rmse: mse.sqrt(),
            mae: abs_err / n as f64,
            r2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_prediction() {
        let y = [1.0, 2.0, 3.0, 4.0];
        let m = RegressionMetrics::compute(&y, &y);
        assert_eq!(m.samples, 4);
        assert_eq!(m.rmse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[test]
    fn test_constant_offset() {
        let m = RegressionMetrics::compute(&[2.0, 3.0, 4.0], &[1.0, 2.0, 3.0]);
        assert!((m.rmse - 1.0).abs() < 1e-12);
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!(m.r2 < 1.0);
    }

    #[test]
    fn test_empty_input() {
        let m = RegressionMetrics::compute(&[], &[]);
        assert_eq!(m.samples, 0);
        assert_eq!(m.rmse, 0.0);
    }
}
