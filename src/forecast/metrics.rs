//! Holdout accuracy of a trained model and the prediction interval built from it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Accuracy of a model on its holdout split (all errors in MW)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Percent; averaged over samples whose actual value is non-zero
    pub mape: f64,
    /// Coefficient of determination; 0 when the actuals are constant
    pub r2: f64,
    pub sample_count: usize,
    pub max_error: f64,
    pub min_error: f64,
    /// Spread of the signed residuals
    pub std_dev: f64,
}

/// Running sums over residuals `actual - predicted`
#[derive(Default)]
struct Residuals {
    n: usize,
    sum: f64,
    sum_abs: f64,
    sum_sq: f64,
    max_abs: f64,
    min_abs: f64,
    pct_sum: f64,
    pct_n: usize,
}

impl Residuals {
    fn push(&mut self, actual: f64, predicted: f64) {
        let residual = actual - predicted;
        let abs = residual.abs();
        if self.n == 0 {
            self.min_abs = abs;
        }
        self.n += 1;
        self.sum += residual;
        self.sum_abs += abs;
        self.sum_sq += residual * residual;
        self.max_abs = self.max_abs.max(abs);
        self.min_abs = self.min_abs.min(abs);
        // Zero actuals (solar at night) have no percentage error
        if actual.abs() > 1e-6 {
            self.pct_sum += 100.0 * abs / actual.abs();
            self.pct_n += 1;
        }
    }
}

impl ForecastMetrics {
    pub fn calculate(actual: &[f64], predicted: &[f64]) -> Result<Self, ForecastMetricsError> {
        match (actual.len(), predicted.len()) {
            (a, p) if a != p => {
                return Err(ForecastMetricsError::DimensionMismatch {
                    actual: a,
                    predicted: p,
                })
            }
            (0, _) => return Err(ForecastMetricsError::EmptyData),
            _ => {}
        }

        let mut r = Residuals::default();
        for (a, p) in actual.iter().zip(predicted) {
            r.push(*a, *p);
        }
        let n = r.n as f64;

        let centre = actual.iter().sum::<f64>() / n;
        let spread: f64 = actual.iter().map(|a| (a - centre) * (a - centre)).sum();
        let bias = r.sum / n;

        Ok(Self {
            mae: r.sum_abs / n,
            rmse: (r.sum_sq / n).sqrt(),
            mape: if r.pct_n == 0 {
                0.0
            } else {
                r.pct_sum / r.pct_n as f64
            },
            r2: if spread > 1e-10 {
                1.0 - r.sum_sq / spread
            } else {
                0.0
            },
            sample_count: r.n,
            max_error: r.max_abs,
            min_error: r.min_abs,
            std_dev: (r.sum_sq / n - bias * bias).max(0.0).sqrt(),
        })
    }

    /// Banded on MAPE
    pub fn quality(&self) -> ForecastQuality {
        match self.mape {
            m if m < 5.0 => ForecastQuality::Excellent,
            m if m < 10.0 => ForecastQuality::Good,
            m if m < 20.0 => ForecastQuality::Fair,
            m if m < 50.0 => ForecastQuality::Poor,
            _ => ForecastQuality::VeryPoor,
        }
    }

    /// MAPE under 20%, R² over 0.5 and at least one day of hourly holdout
    pub fn is_reliable(&self) -> bool {
        self.mape < 20.0 && self.r2 > 0.5 && self.sample_count >= 24
    }
}

impl fmt::Display for ForecastMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n={} mae={:.1}MW rmse={:.1}MW mape={:.1}% r2={:.3} ({:?})",
            self.sample_count,
            self.mae,
            self.rmse,
            self.mape,
            self.r2,
            self.quality()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastQuality {
    Excellent,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ForecastMetricsError {
    #[error("{actual} actual values but {predicted} predictions")]
    DimensionMismatch { actual: usize, predicted: usize },

    #[error("no samples to evaluate")]
    EmptyData,
}

/// Symmetric normal-approximation interval around a point forecast
#[derive(Debug, Clone, Copy)]
pub struct PredictionInterval {
    confidence: f64,
}

impl PredictionInterval {
    /// Confidence is clamped into [0.5, 0.999]
    pub fn new(confidence: f64) -> Self {
        let confidence = if confidence.is_finite() {
            confidence.clamp(0.5, 0.999)
        } else {
            0.95
        };
        Self { confidence }
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    /// Two-sided z-score for the configured confidence
    pub fn z_score(&self) -> f64 {
        match self.confidence {
            c if c >= 0.99 => 2.576,
            c if c >= 0.95 => 1.96,
            c if c >= 0.90 => 1.645,
            c if c >= 0.80 => 1.282,
            _ => 1.0,
        }
    }

    /// (lower, upper) for `prediction ± z·std_dev`, clipped to [0, ceiling]
    pub fn bounds(&self, prediction: f64, std_dev: f64, ceiling: f64) -> (f64, f64) {
        let ceiling = ceiling.max(0.0);
        let margin = self.z_score() * std_dev.max(0.0);
        let lower = (prediction - margin).clamp(0.0, ceiling);
        let upper = (prediction + margin).clamp(0.0, ceiling);
        (lower, upper)
    }
}
