use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::types::Target;
use crate::forecast::metrics::ForecastMetrics;

/// Forecast confidence level, derived from the model's holdout R²
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ForecastConfidence {
    High,   // R² >= 0.9
    Medium, // R² 0.7-0.9
    Low,    // R² < 0.7
}

impl std::fmt::Display for ForecastConfidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::High => write!(f, "high"),
            Self::Medium => write!(f, "medium"),
            Self::Low => write!(f, "low"),
        }
    }
}

impl ForecastConfidence {
    /// Create from a numerical accuracy value (0.0 - 1.0)
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 0.9 {
            Self::High
        } else if accuracy >= 0.7 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A point prediction for one target at one timestamp
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub target: Target,
    pub timestamp: DateTime<Utc>,
    /// Predicted value after clipping to the physical range (MW)
    pub value_mw: f64,
    /// Model output before clipping (MW)
    pub raw_value_mw: f64,
    /// True when the raw output fell outside [0, ceiling]
    pub clipped: bool,
    /// Prediction interval lower bound (MW)
    pub lower_mw: f64,
    /// Prediction interval upper bound (MW)
    pub upper_mw: f64,
    pub confidence: ForecastConfidence,
    /// Holdout metrics of the model that produced this value
    pub metrics: ForecastMetrics,
    pub model_id: String,
}

/// Closed time range covered by a set of forecasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// ISO 8601 interval notation, e.g. `2024-06-01T00:00:00+00:00/2024-06-01T23:00:00+00:00`
    pub fn id(&self) -> String {
        format!("{}/{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

/// Peak and average of one target over the window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPeak {
    pub timestamp: DateTime<Utc>,
    pub value_mw: f64,
    pub mean_mw: f64,
    pub samples: usize,
}

/// Generation shares at one timestamp
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MixPoint {
    pub timestamp: DateTime<Utc>,
    pub total_generation_mw: f64,
    /// Share of total generation per generation target (0.0 - 1.0)
    pub shares: BTreeMap<Target, f64>,
}

/// Demand minus generation at one timestamp. Positive means shortfall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalancePoint {
    pub timestamp: DateTime<Utc>,
    pub demand_mw: f64,
    pub generation_mw: f64,
    pub balance_mw: f64,
}

/// Grid signals derived from forecasts across one window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridInsight {
    pub window: TimeWindow,
    pub window_id: String,
    pub peaks: BTreeMap<Target, TargetPeak>,
    /// Expected targets that had no forecasts in the window
    pub absent: Vec<Target>,
    /// `None` when no generation target is present
    pub generation_mix: Option<Vec<MixPoint>>,
    /// `None` when demand or an expected generation target is absent
    pub balance: Option<Vec<BalancePoint>>,
}

impl GridInsight {
    pub fn is_complete(&self) -> bool {
        self.absent.is_empty()
    }

    /// Largest shortfall over the window, if balance is available
    pub fn peak_shortfall(&self) -> Option<&BalancePoint> {
        self.balance.as_ref()?.iter().fold(None, |best, point| match best {
            Some(b) if b.balance_mw >= point.balance_mw => Some(b),
            _ => Some(point),
        })
    }
}
