//! CSV feeds on disk → trained artifacts → models loaded by a fresh process

use chrono::Duration;
use chrono_tz::America::New_York;
use gridcast::config::Config;
use gridcast::domain::Target;
use gridcast::forecast::{FeatureSchema, WeatherFeed};
use gridcast::io::{load_generation_csv, load_weather_csv};
use gridcast::ml::{ModelRegistry, ModelStore};
use gridcast::service::{ForecastRequest, ForecastService, TrainingJob};
use std::sync::Arc;

use super::common;

#[tokio::test]
async fn test_csv_feeds_train_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let (mut weather, generation) = common::synthetic_feeds(360, 21);
    // One observation with a gap must be skipped, not fatal
    weather[5].cloudcover = None;

    let (weather_csv, generation_csv) = common::to_csv(&weather, &generation);
    let weather_path = dir.path().join("weather.csv");
    let generation_path = dir.path().join("generation.csv");
    std::fs::write(&weather_path, weather_csv).unwrap();
    std::fs::write(&generation_path, generation_csv).unwrap();

    let loaded_weather = load_weather_csv(&weather_path, &New_York).unwrap();
    let loaded_generation = load_generation_csv(&generation_path, &New_York).unwrap();
    assert_eq!(loaded_weather, weather);
    assert_eq!(loaded_generation.len(), 360 * 3);

    let mut cfg = Config::default();
    cfg.models.dir = dir.path().join("models");
    cfg.training.max_rounds = 40;

    let job = TrainingJob::from_config(&cfg, Arc::new(ModelRegistry::new())).unwrap();
    let outcome = job
        .run(Target::Solar, &loaded_weather, &loaded_generation)
        .await
        .unwrap();
    assert_eq!(outcome.report.matched, 359);
    assert_eq!(outcome.report.invalid_observations, 1);
    assert_eq!(outcome.report.foreign_records, 720);

    // A new registry sees only what was persisted
    let registry = Arc::new(ModelRegistry::new());
    let loaded = ModelStore::new(&cfg.models.dir)
        .load_into(&registry, &FeatureSchema::standard())
        .await
        .unwrap();
    assert_eq!(loaded, vec![Target::Solar]);

    let service =
        ForecastService::from_config(&cfg, registry, Arc::new(WeatherFeed::new(loaded_weather)))
            .unwrap();
    let response = service
        .forecast(&ForecastRequest::horizon(
            common::start() + Duration::hours(300),
            12,
            vec![Target::Solar],
        ))
        .await
        .unwrap();
    assert_eq!(response.forecasts.len(), 12);
    assert!(response.forecasts.iter().all(|f| f.model_id == outcome.model_id));
}
