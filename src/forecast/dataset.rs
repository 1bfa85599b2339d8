//! Joins weather features with measured generation into per-target training sets

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::domain::{GenerationRecord, Target, WeatherObservation};
use crate::error::ForecastError;
use crate::forecast::features::{FeatureBuilder, FeatureRow};

/// A feature row paired with the measured value of one target
#[derive(Debug, Clone, Serialize)]
pub struct TrainingExample {
    pub features: FeatureRow,
    pub target: Target,
    /// Measured value (MW)
    pub value: f64,
}

impl TrainingExample {
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.features.timestamp()
    }
}

/// What happened to the input rows during assembly
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AssemblyReport {
    pub matched: usize,
    /// Valid observations with no generation record at that instant
    pub unmatched_weather: usize,
    /// Valid records with no observation at that instant
    pub unmatched_generation: usize,
    pub invalid_observations: usize,
    /// Observations replaced by a later one at the same instant
    pub duplicate_observations: usize,
    pub invalid_records: usize,
    pub duplicate_records: usize,
    /// Records belonging to a different target
    pub foreign_records: usize,
}

/// Training examples for one target, oldest first
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub target: Target,
    pub examples: Vec<TrainingExample>,
    pub report: AssemblyReport,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }
}

pub struct DatasetAssembler {
    builder: FeatureBuilder,
    min_examples: usize,
}

impl DatasetAssembler {
    pub fn new(builder: FeatureBuilder, min_examples: usize) -> Self {
        Self {
            builder,
            min_examples,
        }
    }

    pub fn min_examples(&self) -> usize {
        self.min_examples
    }

    /// Inner-join observations and records for `target` on UTC instant.
    ///
    /// Rows present on only one side are dropped and counted; the run fails
    /// only when fewer than `min_examples` pairs survive.
    pub fn assemble(
        &self,
        target: Target,
        weather: &[WeatherObservation],
        generation: &[GenerationRecord],
    ) -> Result<TrainingSet, ForecastError> {
        let mut report = AssemblyReport::default();

        let mut measured: HashMap<DateTime<Utc>, f64> = HashMap::with_capacity(generation.len());
        for record in generation {
            if record.target != target {
                report.foreign_records += 1;
                continue;
            }
            if !record.value_mw.is_finite() || record.value_mw < 0.0 {
                warn!(
                    target = %target,
                    timestamp = %record.timestamp,
                    value = record.value_mw,
                    "Dropping invalid generation record"
                );
                report.invalid_records += 1;
                continue;
            }
            match measured.entry(record.timestamp) {
                Entry::Vacant(slot) => {
                    slot.insert(record.value_mw);
                }
                Entry::Occupied(_) => {
                    debug!(
                        target = %target,
                        timestamp = %record.timestamp,
                        "Duplicate generation record ignored"
                    );
                    report.duplicate_records += 1;
                }
            }
        }

        // Later observations for an instant supersede earlier ones, as in the serving feed
        let latest: HashMap<DateTime<Utc>, usize> = weather
            .iter()
            .enumerate()
            .map(|(i, obs)| (obs.timestamp, i))
            .collect();

        let mut examples = Vec::with_capacity(measured.len().min(weather.len()));
        for (i, obs) in weather.iter().enumerate() {
            if latest.get(&obs.timestamp) != Some(&i) {
                debug!(
                    target = %target,
                    timestamp = %obs.timestamp,
                    "Superseded weather observation ignored"
                );
                report.duplicate_observations += 1;
                continue;
            }
            let features = match self.builder.build(obs) {
                Ok(row) => row,
                Err(e) => {
                    warn!(target = %target, error = %e, "Skipping invalid weather observation");
                    report.invalid_observations += 1;
                    continue;
                }
            };
            match measured.remove(&obs.timestamp) {
                Some(value) => examples.push(TrainingExample {
                    features,
                    target,
                    value,
                }),
                None => report.unmatched_weather += 1,
            }
        }
        report.unmatched_generation = measured.len();
        report.matched = examples.len();

        if report.unmatched_weather > 0 || report.unmatched_generation > 0 {
            warn!(
                target = %target,
                unmatched_weather = report.unmatched_weather,
                unmatched_generation = report.unmatched_generation,
                "Dropped rows without a counterpart"
            );
        }

        if examples.len() < self.min_examples {
            return Err(ForecastError::EmptyDataset {
                target,
                found: examples.len(),
                required: self.min_examples,
            });
        }

        examples.sort_by_key(|e| e.timestamp());

        info!(target = %target, matched = report.matched, "Assembled training set");

        Ok(TrainingSet {
            target,
            examples,
            report,
        })
    }
}
