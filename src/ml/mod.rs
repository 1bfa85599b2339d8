//! Machine Learning Module
//!
//! One gradient-boosted regression model per forecast target:
//! - `tree` / `boosting`: the learner
//! - `training`: offline fitting with chronological holdout evaluation
//! - `inference`: versioned registry of published models
//! - `store`: on-disk artifacts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Target;
use crate::error::ForecastError;
use crate::forecast::features::{Feature, FeatureRow, FeatureSchema};
use crate::forecast::metrics::ForecastMetrics;

pub mod boosting;
pub mod inference;
pub mod store;
pub mod training;
pub mod tree;

pub use boosting::GradientBoostedTrees;
pub use inference::{ModelRegistry, PublishedModel};
pub use store::ModelStore;
pub use training::{ModelTrainer, TrainingConfig};

/// ML Model Metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_id: String,
    pub target: Target,
    pub trained_at: DateTime<Utc>,
    pub training_samples: usize,
    pub holdout_samples: usize,
    /// Trees kept after truncation to the best holdout round
    pub boosting_rounds: usize,
    pub stopped_early: bool,
    /// Evaluated on the holdout split only
    pub holdout_metrics: ForecastMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: Feature,
    /// Share of total split gain (0.0 - 1.0)
    pub importance: f64,
}

/// A fitted model together with the schema it was trained on.
///
/// Immutable once built; retraining produces a new instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedModel {
    metadata: ModelMetadata,
    schema: FeatureSchema,
    ensemble: GradientBoostedTrees,
    /// Sorted by importance, highest first
    importances: Vec<FeatureImportance>,
}

impl TrainedModel {
    pub(crate) fn new(
        metadata: ModelMetadata,
        schema: FeatureSchema,
        ensemble: GradientBoostedTrees,
        importances: Vec<FeatureImportance>,
    ) -> Self {
        Self {
            metadata,
            schema,
            ensemble,
            importances,
        }
    }

    pub fn target(&self) -> Target {
        self.metadata.target
    }

    pub fn model_id(&self) -> &str {
        &self.metadata.model_id
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn metrics(&self) -> &ForecastMetrics {
        &self.metadata.holdout_metrics
    }

    pub fn feature_importance(&self) -> &[FeatureImportance] {
        &self.importances
    }

    pub fn ensemble(&self) -> &GradientBoostedTrees {
        &self.ensemble
    }

    /// Unclipped model output. Fails if the row's schema differs from the training schema.
    pub fn predict_raw(&self, row: &FeatureRow) -> Result<f64, ForecastError> {
        self.schema.ensure_matches(row.schema())?;
        Ok(self.ensemble.predict(row.values()))
    }
}
