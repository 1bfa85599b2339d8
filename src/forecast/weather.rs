//! Weather inputs for serving
//!
//! The facade asks a [`WeatherSource`] for the observation (or forecast
//! observation) at each requested instant. [`WeatherFeed`] is the in-memory
//! source backed by a loaded feed file.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::domain::WeatherObservation;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// `Ok(None)` when the source has nothing for that instant
    async fn observation_at(&self, timestamp: DateTime<Utc>) -> Result<Option<WeatherObservation>>;
}

/// Observations keyed by UTC instant
#[derive(Debug, Clone, Default)]
pub struct WeatherFeed {
    observations: BTreeMap<DateTime<Utc>, WeatherObservation>,
}

impl WeatherFeed {
    /// Later observations for the same instant replace earlier ones
    pub fn new(observations: impl IntoIterator<Item = WeatherObservation>) -> Self {
        Self {
            observations: observations
                .into_iter()
                .map(|o| (o.timestamp, o))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.observations.keys().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.observations.keys().next_back().copied()
    }

    pub fn get(&self, timestamp: DateTime<Utc>) -> Option<&WeatherObservation> {
        self.observations.get(&timestamp)
    }
}

#[async_trait]
impl WeatherSource for WeatherFeed {
    async fn observation_at(&self, timestamp: DateTime<Utc>) -> Result<Option<WeatherObservation>> {
        Ok(self.get(timestamp).cloned())
    }
}
