//! Shared fixtures for unit tests

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use chrono_tz::America::New_York;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::sync::OnceLock;

use crate::config::FeatureBounds;
use crate::domain::{Forecast, ForecastConfidence, GenerationRecord, Target, WeatherObservation};
use crate::forecast::{
    DatasetAssembler, FeatureBuilder, FeatureRow, ForecastMetrics, TrainingExample,
};
use crate::ml::{ModelTrainer, TrainedModel, TrainingConfig};

/// Local noon (EDT) on a summer Saturday
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 16, 0, 0).unwrap()
}

pub fn builder() -> FeatureBuilder {
    FeatureBuilder::new(New_York, FeatureBounds::default())
}

pub fn feature_row(
    timestamp: DateTime<Utc>,
    temperature: f64,
    windspeed: f64,
    solar_radiation: f64,
    cloudcover: f64,
) -> FeatureRow {
    builder()
        .build(&WeatherObservation::new(
            timestamp,
            temperature,
            windspeed,
            solar_radiation,
            cloudcover,
        ))
        .unwrap()
}

/// Hourly weather plus solar, wind and demand with known physical relationships
pub fn synthetic_feeds(
    hours: usize,
    seed: u64,
) -> (Vec<WeatherObservation>, Vec<GenerationRecord>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = Utc.with_ymd_and_hms(2024, 4, 1, 4, 0, 0).unwrap();
    let mut weather = Vec::with_capacity(hours);
    let mut generation = Vec::with_capacity(hours * 3);

    for h in 0..hours {
        let timestamp = start + Duration::hours(h as i64);
        let local_hour = timestamp.with_timezone(&New_York).hour() as f64;

        let cloudcover: f64 = rng.gen_range(0.0..100.0);
        let windspeed: f64 = rng.gen_range(0.0..60.0);
        let temperature =
            15.0 + 8.0 * (PI * (local_hour - 9.0) / 12.0).sin() + rng.gen_range(-2.0..2.0);
        let clear_sky = (900.0 * (PI * (local_hour - 6.0) / 12.0).sin()).max(0.0);
        let radiation = clear_sky * (1.0 - 0.75 * cloudcover / 100.0);

        let solar = (4.0 * radiation + rng.gen_range(-40.0..40.0)).max(0.0);
        let wind = ((0.009 * windspeed.powi(3)).min(1800.0) + rng.gen_range(-20.0..20.0)).max(0.0);
        let evening = if (17.0..=21.0).contains(&local_hour) { 2500.0 } else { 0.0 };
        let demand = 12_000.0
            + 150.0 * (temperature - 18.0).abs()
            + evening
            + rng.gen_range(-200.0..200.0);

        weather.push(WeatherObservation::new(
            timestamp,
            temperature,
            windspeed,
            radiation,
            cloudcover,
        ));
        generation.push(GenerationRecord::new(timestamp, Target::Solar, solar));
        generation.push(GenerationRecord::new(timestamp, Target::Wind, wind));
        generation.push(GenerationRecord::new(timestamp, Target::Demand, demand));
    }
    (weather, generation)
}

pub fn solar_examples(hours: usize, seed: u64) -> Vec<TrainingExample> {
    let (weather, generation) = synthetic_feeds(hours, seed);
    DatasetAssembler::new(builder(), 0)
        .assemble(Target::Solar, &weather, &generation)
        .unwrap()
        .examples
}

/// A freshly trained (unique id) solar model on a small data set
pub fn small_solar_model() -> TrainedModel {
    let config = TrainingConfig {
        max_rounds: 40,
        learning_rate: 0.3,
        ..TrainingConfig::default()
    };
    ModelTrainer::new(config)
        .train(Target::Solar, &solar_examples(240, 42))
        .unwrap()
}

pub fn shared_solar_model() -> &'static TrainedModel {
    static MODEL: OnceLock<TrainedModel> = OnceLock::new();
    MODEL.get_or_init(small_solar_model)
}

pub fn forecast(target: Target, timestamp: DateTime<Utc>, value_mw: f64) -> Forecast {
    Forecast {
        target,
        timestamp,
        value_mw,
        raw_value_mw: value_mw,
        clipped: false,
        lower_mw: value_mw,
        upper_mw: value_mw,
        confidence: ForecastConfidence::High,
        metrics: ForecastMetrics {
            mae: 0.0,
            rmse: 0.0,
            mape: 0.0,
            r2: 1.0,
            sample_count: 1,
            max_error: 0.0,
            min_error: 0.0,
            std_dev: 0.0,
        },
        model_id: format!("{target}_fixture"),
    }
}
