//! Train on synthetic history, then serve forecasts through the facade

use chrono::{Duration, Timelike};
use chrono_tz::America::New_York;
use gridcast::config::{Config, PhysicalLimits};
use gridcast::domain::Target;
use gridcast::forecast::{
    DatasetAssembler, Feature, FeatureRow, FeatureSchema, ForecastEngine, WeatherFeed,
};
use gridcast::ml::{ModelRegistry, ModelTrainer, TrainingConfig};
use gridcast::service::{ForecastRequest, ForecastService, ServingState, TrainingJob};
use gridcast::{ErrorKind, ForecastError};
use std::sync::Arc;

use super::common;

const ALL: [Target; 3] = [Target::Solar, Target::Wind, Target::Demand];

fn config(dir: &std::path::Path) -> Config {
    let mut cfg = Config::default();
    cfg.models.dir = dir.to_path_buf();
    cfg.training.max_rounds = 80;
    cfg.training.learning_rate = 0.2;
    cfg
}

#[test]
fn test_solar_model_tracks_radiation() {
    let (weather, generation) = common::synthetic_feeds(1000, 2024);
    let set = DatasetAssembler::new(common::builder(), 100)
        .assemble(Target::Solar, &weather, &generation)
        .unwrap();
    assert_eq!(set.len(), 1000);

    let model = ModelTrainer::new(TrainingConfig::default())
        .train(Target::Solar, &set.examples)
        .unwrap();

    assert!(model.metrics().r2 > 0.8, "holdout {}", model.metrics());
    assert_eq!(model.metrics().sample_count, 200);
    assert_eq!(model.feature_importance()[0].feature, Feature::SolarRadiation);
}

#[tokio::test]
async fn test_train_then_forecast_day_ahead() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let (weather, generation) = common::synthetic_feeds(1000, 7);

    let registry = Arc::new(ModelRegistry::new());
    let job = TrainingJob::from_config(&cfg, registry.clone()).unwrap();
    for (target, result) in job.run_all(&ALL, &weather, &generation).await {
        let outcome = result.unwrap_or_else(|e| panic!("{target}: {e}"));
        assert!(outcome.artifact.exists());
    }

    let feed = Arc::new(WeatherFeed::new(weather));
    let service = ForecastService::from_config(&cfg, registry, feed).unwrap();
    let start = common::start() + Duration::hours(900);
    let response = service
        .forecast(&ForecastRequest::horizon(start, 24, ALL.to_vec()))
        .await
        .unwrap();

    assert_eq!(response.forecasts.len(), 72);
    assert_eq!(response.timezone, "America/New_York");
    for forecast in &response.forecasts {
        let ceiling = cfg.limits.ceiling(forecast.target);
        assert!((0.0..=ceiling).contains(&forecast.value_mw), "{forecast:?}");
        assert!(forecast.lower_mw <= forecast.value_mw && forecast.value_mw <= forecast.upper_mw);
    }

    // Night-time solar stays near zero
    let night = response
        .for_target(Target::Solar)
        .find(|f| f.timestamp.with_timezone(&New_York).hour() == 2)
        .unwrap();
    assert!(night.value_mw < 200.0, "{night:?}");

    let insight = response.insight.expect("insight for a multi-source request");
    assert!(insight.is_complete());
    assert_eq!(insight.window.start, start);
    assert_eq!(insight.window.end, start + Duration::hours(23));
    assert_eq!(insight.peaks.len(), 3);
    assert_eq!(insight.generation_mix.as_ref().unwrap().len(), 24);
    let balance = insight.balance.as_ref().unwrap();
    assert_eq!(balance.len(), 24);
    // Demand dwarfs solar + wind in this data set
    assert!(insight.peak_shortfall().unwrap().balance_mw > 0.0);
    for point in insight.generation_mix.as_ref().unwrap() {
        if point.total_generation_mw > 0.0 {
            let sum: f64 = point.shares.values().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }
    assert_eq!(service.status(), ServingState::Idle);
}

#[tokio::test]
async fn test_failed_retrain_keeps_serving_previous_model() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let (weather, generation) = common::synthetic_feeds(400, 3);

    let registry = Arc::new(ModelRegistry::new());
    let job = TrainingJob::from_config(&cfg, registry.clone()).unwrap();
    let first = job.run(Target::Demand, &weather, &generation).await.unwrap();

    let err = job.run(Target::Demand, &weather, &[]).await.unwrap_err();
    assert!(matches!(err, ForecastError::EmptyDataset { found: 0, .. }));

    let service =
        ForecastService::from_config(&cfg, registry, Arc::new(WeatherFeed::new(weather))).unwrap();
    let response = service
        .forecast(&ForecastRequest::at(common::start() + Duration::hours(10), vec![Target::Demand]))
        .await
        .unwrap();
    assert_eq!(response.forecasts[0].model_id, first.model_id);
    assert!(response.insight.is_none());
}

#[tokio::test]
async fn test_missing_inputs_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path());
    let (weather, generation) = common::synthetic_feeds(300, 4);

    let registry = Arc::new(ModelRegistry::new());
    let job = TrainingJob::from_config(&cfg, registry.clone()).unwrap();
    job.run(Target::Wind, &weather, &generation).await.unwrap();

    let service =
        ForecastService::from_config(&cfg, registry, Arc::new(WeatherFeed::new(weather))).unwrap();

    // No model for solar
    let err = service
        .forecast(&ForecastRequest::at(common::start(), vec![Target::Solar, Target::Wind]))
        .await
        .unwrap_err();
    assert!(matches!(err, ForecastError::ModelUnavailable { target: Target::Solar }));

    // Weather feed ends after 300 hours
    let beyond = common::start() + Duration::hours(310);
    let err = service
        .forecast(&ForecastRequest::at(beyond, vec![Target::Wind]))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ForecastError::UpstreamDataUnavailable { timestamp, .. } if timestamp == beyond
    ));
    assert!(err.is_unavailable());
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert_eq!(service.status(), ServingState::Idle);
}

#[tokio::test]
async fn test_permuted_feature_row_is_rejected() {
    let (weather, generation) = common::synthetic_feeds(300, 8);
    let set = DatasetAssembler::new(common::builder(), 100)
        .assemble(Target::Wind, &weather, &generation)
        .unwrap();
    let model = ModelTrainer::new(TrainingConfig {
        max_rounds: 20,
        ..TrainingConfig::default()
    })
    .train(Target::Wind, &set.examples)
    .unwrap();

    let row = common::builder().build(&weather[0]).unwrap();
    let mut columns = FeatureSchema::standard().columns().to_vec();
    columns.reverse();
    let mut values = row.values().to_vec();
    values.reverse();
    let permuted =
        FeatureRow::from_parts(row.timestamp(), FeatureSchema::new(columns), values).unwrap();

    let engine = ForecastEngine::new(PhysicalLimits::default(), 0.95);
    assert!(engine.predict(&model, &row).is_ok());
    assert!(matches!(
        engine.predict(&model, &permuted),
        Err(ForecastError::FeatureSchemaMismatch { .. })
    ));
}
