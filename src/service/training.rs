//! Offline retraining: assemble → train → persist → publish

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::Config;
use crate::domain::{GenerationRecord, Target, WeatherObservation};
use crate::error::ForecastError;
use crate::forecast::{AssemblyReport, DatasetAssembler, FeatureBuilder, ForecastMetrics};
use crate::ml::{FeatureImportance, ModelRegistry, ModelStore, ModelTrainer};

/// Summary of one successful training run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingOutcome {
    pub target: Target,
    pub model_id: String,
    pub version: u64,
    pub artifact: PathBuf,
    pub report: AssemblyReport,
    pub boosting_rounds: usize,
    pub metrics: ForecastMetrics,
    pub feature_importance: Vec<FeatureImportance>,
}

pub struct TrainingJob {
    assembler: DatasetAssembler,
    trainer: ModelTrainer,
    store: ModelStore,
    registry: Arc<ModelRegistry>,
}

impl TrainingJob {
    pub fn new(
        assembler: DatasetAssembler,
        trainer: ModelTrainer,
        store: ModelStore,
        registry: Arc<ModelRegistry>,
    ) -> Self {
        Self {
            assembler,
            trainer,
            store,
            registry,
        }
    }

    pub fn from_config(config: &Config, registry: Arc<ModelRegistry>) -> anyhow::Result<Self> {
        let builder = FeatureBuilder::new(config.timezone.tz()?, config.features.clone());
        Ok(Self::new(
            DatasetAssembler::new(builder, config.dataset.min_examples),
            ModelTrainer::new(config.training.clone()),
            ModelStore::new(&config.models.dir),
            registry,
        ))
    }

    /// Train and publish one target.
    ///
    /// The artifact is written before publishing; if any step fails, both the
    /// stored artifact and the served model are left as they were.
    pub async fn run(
        &self,
        target: Target,
        weather: &[WeatherObservation],
        generation: &[GenerationRecord],
    ) -> Result<TrainingOutcome, ForecastError> {
        let set = self.assembler.assemble(target, weather, generation)?;
        let model = self.trainer.train(target, &set.examples)?;
        let artifact = self.store.save(&model)?;

        let outcome = TrainingOutcome {
            target,
            model_id: model.model_id().to_string(),
            version: 0,
            artifact,
            report: set.report,
            boosting_rounds: model.metadata().boosting_rounds,
            metrics: model.metrics().clone(),
            feature_importance: model.feature_importance().to_vec(),
        };
        let version = self.registry.publish(model).await;

        Ok(TrainingOutcome { version, ..outcome })
    }

    /// Train each target independently; one failure does not stop the others
    pub async fn run_all(
        &self,
        targets: &[Target],
        weather: &[WeatherObservation],
        generation: &[GenerationRecord],
    ) -> Vec<(Target, Result<TrainingOutcome, ForecastError>)> {
        let mut results = Vec::with_capacity(targets.len());
        for &target in targets {
            let result = self.run(target, weather, generation).await;
            match &result {
                Ok(outcome) => info!(
                    target = %target,
                    version = outcome.version,
                    r2 = outcome.metrics.r2,
                    "Training run complete"
                ),
                Err(e) => error!(
                    target = %target,
                    error = %e,
                    "Training run failed; keeping current model"
                ),
            }
            results.push((target, result));
        }
        results
    }
}
