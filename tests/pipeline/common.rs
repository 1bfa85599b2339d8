//! Synthetic New England style feeds with known weather → output relationships
//!
//! Mirrors the crate's unit-test fixtures, which are compiled only under
//! `cfg(test)` and so are not visible to integration tests.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use chrono_tz::America::New_York;
use gridcast::config::FeatureBounds;
use gridcast::domain::{GenerationRecord, Target, WeatherObservation};
use gridcast::forecast::FeatureBuilder;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;
use std::fmt::Write;

pub fn start() -> DateTime<Utc> {
    // Local midnight, 1 April 2024 (EDT)
    Utc.with_ymd_and_hms(2024, 4, 1, 4, 0, 0).unwrap()
}

pub fn builder() -> FeatureBuilder {
    FeatureBuilder::new(New_York, FeatureBounds::default())
}

pub fn clear_sky(local_hour: f64) -> f64 {
    (900.0 * (PI * (local_hour - 6.0) / 12.0).sin()).max(0.0)
}

pub fn synthetic_feeds(
    hours: usize,
    seed: u64,
) -> (Vec<WeatherObservation>, Vec<GenerationRecord>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut weather = Vec::with_capacity(hours);
    let mut generation = Vec::with_capacity(hours * 3);

    for h in 0..hours {
        let timestamp = start() + Duration::hours(h as i64);
        let local_hour = timestamp.with_timezone(&New_York).hour() as f64;

        let cloudcover: f64 = rng.gen_range(0.0..100.0);
        let windspeed: f64 = rng.gen_range(0.0..60.0);
        let temperature =
            15.0 + 8.0 * (PI * (local_hour - 9.0) / 12.0).sin() + rng.gen_range(-2.0..2.0);
        let radiation = clear_sky(local_hour) * (1.0 - 0.75 * cloudcover / 100.0);

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

/// Render feeds in the on-disk CSV layout, times as naive local wall clock
pub fn to_csv(
    weather: &[WeatherObservation],
    generation: &[GenerationRecord],
) -> (String, String) {
    let local = |ts: DateTime<Utc>| {
        ts.with_timezone(&New_York)
            .format("%Y-%m-%d %H:%M")
            .to_string()
    };
    let cell = |v: Option<f64>| v.map(|v| v.to_string()).unwrap_or_default();

    let mut w = String::from("time,temperature,windspeed,solar_radiation,cloudcover\n");
    for obs in weather {
        let _ = writeln!(
            w,
            "{},{},{},{},{}",
            local(obs.timestamp),
            cell(obs.temperature),
            cell(obs.windspeed),
            cell(obs.solar_radiation),
            cell(obs.cloudcover)
        );
    }

    let mut g = String::from("time,target,value\n");
    for record in generation {
        let _ = writeln!(g, "{},{},{}", local(record.timestamp), record.target, record.value_mw);
    }
    (w, g)
}
