use tracing::debug;

use crate::config::PhysicalLimits;
use crate::domain::{Forecast, ForecastConfidence};
use crate::error::ForecastError;
use crate::forecast::features::FeatureRow;
use crate::forecast::metrics::PredictionInterval;
use crate::ml::TrainedModel;

/// Pure inference: one model, one feature row, one clipped prediction
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    limits: PhysicalLimits,
    interval: PredictionInterval,
}

impl ForecastEngine {
    pub fn new(limits: PhysicalLimits, interval_confidence: f64) -> Self {
        Self {
            limits,
            interval: PredictionInterval::new(interval_confidence),
        }
    }

    pub fn limits(&self) -> &PhysicalLimits {
        &self.limits
    }

    pub fn predict(
        &self,
        model: &TrainedModel,
        row: &FeatureRow,
    ) -> Result<Forecast, ForecastError> {
        let target = model.target();
        model.schema().ensure_matches(row.schema())?;
        if let Some(bad) = row.values().iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::InvalidObservation {
                timestamp: row.timestamp(),
                reason: format!("feature {} is not finite", row.schema().columns()[bad].feature),
            });
        }

        let raw = model.predict_raw(row)?;
        // A misconfigured negative limit collapses the range to zero
        let ceiling = self.limits.ceiling(target).max(0.0);
        let value = clip(raw, ceiling);
        let clipped = value != raw;
        if clipped {
            debug!(
                target = %target,
                timestamp = %row.timestamp(),
                raw,
                value,
                "Clipped prediction"
            );
        }

        let metrics = model.metrics().clone();
        let (lower, upper) = self.interval.bounds(value, metrics.std_dev, ceiling);

        Ok(Forecast {
            target,
            timestamp: row.timestamp(),
            value_mw: value,
            raw_value_mw: raw,
            clipped,
            lower_mw: lower,
            upper_mw: upper,
            confidence: ForecastConfidence::from_accuracy(metrics.r2),
            metrics,
            model_id: model.model_id().to_string(),
        })
    }
}

/// Floor at zero and cap at `ceiling`; a NaN output becomes zero
fn clip(raw: f64, ceiling: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, ceiling.max(0.0))
    }
}
