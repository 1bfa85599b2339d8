//! CSV input feeds for weather observations and generation records.
//!
//! Weather: `time,temperature,windspeed,solar_radiation,cloudcover` (blank
//! cells are missing values). Generation: `time,target,value`.
//!
//! `time` is RFC 3339, or a naive `YYYY-MM-DD HH:MM[:SS]` read in the
//! operating timezone. Everything is normalised to UTC.

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, LocalResult, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::info;

use crate::domain::{GenerationRecord, Target, WeatherObservation};

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

#[derive(Debug, Deserialize)]
struct WeatherRow {
    time: String,
    temperature: Option<f64>,
    windspeed: Option<f64>,
    solar_radiation: Option<f64>,
    cloudcover: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct GenerationRow {
    time: String,
    target: String,
    value: f64,
}

/// Parse a feed timestamp into a UTC instant.
///
/// Naive local times falling in a DST fold resolve to the earlier instant;
/// times skipped by a DST gap are rejected.
pub fn parse_timestamp(raw: &str, tz: &Tz) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| anyhow!("unrecognised timestamp '{raw}'"))?;
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Ok(dt.with_timezone(&Utc)),
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => bail!("'{raw}' does not exist in {tz} (DST gap)"),
    }
}

pub fn read_weather_csv(reader: impl Read, tz: &Tz) -> Result<Vec<WeatherObservation>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut observations = Vec::new();
    for (i, row) in rdr.deserialize::<WeatherRow>().enumerate() {
        // Header is line 1
        let line = i + 2;
        let row = row.with_context(|| format!("weather feed line {line}"))?;
        let timestamp =
            parse_timestamp(&row.time, tz).with_context(|| format!("weather feed line {line}"))?;
        observations.push(WeatherObservation {
            timestamp,
            temperature: row.temperature,
            windspeed: row.windspeed,
            solar_radiation: row.solar_radiation,
            cloudcover: row.cloudcover,
        });
    }
    Ok(observations)
}

pub fn read_generation_csv(reader: impl Read, tz: &Tz) -> Result<Vec<GenerationRecord>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut records = Vec::new();
    for (i, row) in rdr.deserialize::<GenerationRow>().enumerate() {
        let line = i + 2;
        let row = row.with_context(|| format!("generation feed line {line}"))?;
        let timestamp = parse_timestamp(&row.time, tz)
            .with_context(|| format!("generation feed line {line}"))?;
        let target: Target = row
            .target
            .parse()
            .map_err(|e| anyhow!("generation feed line {line}: {e}"))?;
        records.push(GenerationRecord::new(timestamp, target, row.value));
    }
    Ok(records)
}

pub fn load_weather_csv(path: &Path, tz: &Tz) -> Result<Vec<WeatherObservation>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let observations = read_weather_csv(file, tz)?;
    info!(path = %path.display(), rows = observations.len(), "Loaded weather feed");
    Ok(observations)
}

pub fn load_generation_csv(path: &Path, tz: &Tz) -> Result<Vec<GenerationRecord>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let records = read_generation_csv(file, tz)?;
    info!(path = %path.display(), rows = records.len(), "Loaded generation feed");
    Ok(records)
}
