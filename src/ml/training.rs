//! Offline model training
//!
//! Splits a chronologically ordered training set into a training prefix and a
//! holdout suffix, fits a boosted ensemble, and evaluates on the holdout only.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use super::boosting::{BoostingParams, GradientBoostedTrees};
use super::tree::TreeParams;
use super::{FeatureImportance, ModelMetadata, TrainedModel};
use crate::domain::Target;
use crate::error::ForecastError;
use crate::forecast::dataset::TrainingExample;
use crate::forecast::metrics::ForecastMetrics;

/// Training Configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrainingConfig {
    #[validate(range(min = 0.001, max = 1.0))]
    pub learning_rate: f64,
    #[validate(range(min = 1, max = 10000))]
    pub max_rounds: usize,
    #[validate(range(min = 1, max = 16))]
    pub max_depth: usize,
    #[validate(range(min = 1))]
    pub min_samples_leaf: usize,
    #[validate(range(min = 0.0))]
    pub min_split_gain: f64,
    #[validate(range(min = 1))]
    pub early_stopping_patience: usize,
    /// Chronological share of examples used for fitting; the rest is holdout
    pub train_fraction: f64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            max_rounds: 300,
            max_depth: 4,
            min_samples_leaf: 5,
            min_split_gain: 1e-9,
            early_stopping_patience: 15,
            train_fraction: 0.8,
        }
    }
}

impl TrainingConfig {
    fn boosting_params(&self) -> BoostingParams {
        BoostingParams {
            learning_rate: self.learning_rate,
            max_rounds: self.max_rounds,
            patience: self.early_stopping_patience,
            tree: TreeParams {
                max_depth: self.max_depth,
                min_samples_leaf: self.min_samples_leaf,
                min_split_gain: self.min_split_gain,
            },
        }
    }
}

/// Model Trainer
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train one target's model from its examples
    pub fn train(
        &self,
        target: Target,
        examples: &[TrainingExample],
    ) -> Result<TrainedModel, ForecastError> {
        let n = examples.len();
        if n < 2 {
            return Err(ForecastError::EmptyDataset {
                target,
                found: n,
                required: 2,
            });
        }
        if let Some(foreign) = examples.iter().find(|e| e.target != target) {
            return Err(ForecastError::InvalidRequest(format!(
                "{} example in {} training set",
                foreign.target, target
            )));
        }

        let schema = examples[0].features.schema().clone();
        for example in examples {
            schema.ensure_matches(example.features.schema())?;
        }

        let mut ordered: Vec<&TrainingExample> = examples.iter().collect();
        ordered.sort_by_key(|e| e.timestamp());

        let split = holdout_split(n, self.config.train_fraction);
        let (train, holdout) = ordered.split_at(split);

        let train_x: Vec<Vec<f64>> = train.iter().map(|e| e.features.values().to_vec()).collect();
        let train_y: Vec<f64> = train.iter().map(|e| e.value).collect();
        let holdout_x: Vec<Vec<f64>> = holdout
            .iter()
            .map(|e| e.features.values().to_vec())
            .collect();
        let holdout_y: Vec<f64> = holdout.iter().map(|e| e.value).collect();

        let fit = GradientBoostedTrees::fit(
            &train_x,
            &train_y,
            &holdout_x,
            &holdout_y,
            &self.config.boosting_params(),
        );
        check_divergence(target, &fit.holdout_rmse)?;

        let predicted: Vec<f64> = holdout_x.iter().map(|row| fit.model.predict(row)).collect();
        let metrics = ForecastMetrics::calculate(&holdout_y, &predicted).map_err(|e| {
            ForecastError::TrainingDiverged {
                target,
                reason: e.to_string(),
            }
        })?;
        if !metrics.r2.is_finite() || !metrics.rmse.is_finite() {
            return Err(ForecastError::TrainingDiverged {
                target,
                reason: "non-finite holdout metrics".to_string(),
            });
        }
        if !metrics.is_reliable() {
            warn!(target = %target, %metrics, "Model does not meet reliability criteria");
        }

        let mut importances: Vec<FeatureImportance> = schema
            .columns()
            .iter()
            .zip(fit.model.gain_importances())
            .map(|(column, importance)| FeatureImportance {
                feature: column.feature,
                importance,
            })
            .collect();
        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let metadata = ModelMetadata {
            model_id: format!("{}_gbt_{}", target, uuid::Uuid::new_v4()),
            target,
            trained_at: chrono::Utc::now(),
            training_samples: train.len(),
            holdout_samples: holdout.len(),
            boosting_rounds: fit.best_round,
            stopped_early: fit.stopped_early,
            holdout_metrics: metrics,
        };

        info!(
            target = %target,
            model_id = %metadata.model_id,
            rounds = fit.best_round,
            stopped_early = fit.stopped_early,
            r2 = metadata.holdout_metrics.r2,
            rmse = metadata.holdout_metrics.rmse,
            mae = metadata.holdout_metrics.mae,
            "Model trained"
        );

        Ok(TrainedModel::new(metadata, schema, fit.model, importances))
    }
}

/// Index of the first holdout example; both sides keep at least one example
fn holdout_split(n: usize, train_fraction: f64) -> usize {
    let split = (n as f64 * train_fraction).floor() as usize;
    split.clamp(1, n.saturating_sub(1).max(1))
}

/// Non-finite holdout RMSE, or RMSE rising at every round, means the run is unusable
fn check_divergence(target: Target, holdout_rmse: &[f64]) -> Result<(), ForecastError> {
    if let Some(round) = holdout_rmse.iter().position(|r| !r.is_finite()) {
        warn!(target = %target, round, "Holdout RMSE became non-finite");
        return Err(ForecastError::TrainingDiverged {
            target,
            reason: format!("holdout RMSE non-finite at round {round}"),
        });
    }
    if holdout_rmse.len() >= 2 && holdout_rmse.windows(2).all(|w| w[1] > w[0]) {
        warn!(
            target = %target,
            rounds = holdout_rmse.len() - 1,
            "Holdout RMSE increased every round"
        );
        return Err(ForecastError::TrainingDiverged {
            target,
            reason: format!(
                "holdout RMSE increased monotonically over {} rounds",
                holdout_rmse.len() - 1
            ),
        });
    }
    Ok(())
}
