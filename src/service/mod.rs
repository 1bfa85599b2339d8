//! Serving facade
//!
//! The single entry point for callers. A request moves through
//! `Idle → Fetching → Producing → Idle`: weather for every requested instant
//! is gathered first, then features, forecasts and (when more than one
//! generation target is requested) grid insight are produced.

use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Config, ServingConfig};
use crate::domain::{Forecast, GridInsight, Target, WeatherObservation};
use crate::error::ForecastError;
use crate::forecast::{FeatureBuilder, ForecastEngine, GridInsightCalculator, WeatherSource};
use crate::ml::ModelRegistry;

pub mod training;

pub use training::{TrainingJob, TrainingOutcome};

/// Lifecycle of one serving request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServingState {
    Idle,
    /// Awaiting weather input
    Fetching,
    /// Running features, inference and insight
    Producing,
}

impl ServingState {
    pub fn can_transition_to(&self, next: ServingState) -> bool {
        use ServingState::*;
        matches!(
            (self, next),
            (Idle, Fetching) | (Fetching, Producing) | (Fetching, Idle) | (Producing, Idle)
        )
    }
}

impl std::fmt::Display for ServingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Fetching => write!(f, "fetching"),
            Self::Producing => write!(f, "producing"),
        }
    }
}

#[derive(Default)]
struct InFlight {
    fetching: AtomicUsize,
    producing: AtomicUsize,
}

impl InFlight {
    fn counter(&self, state: ServingState) -> Option<&AtomicUsize> {
        match state {
            ServingState::Idle => None,
            ServingState::Fetching => Some(&self.fetching),
            ServingState::Producing => Some(&self.producing),
        }
    }
}

/// Tracks one request's state; dropping it returns the request to `Idle`
struct Phase<'a> {
    request_id: Uuid,
    state: ServingState,
    in_flight: &'a InFlight,
}

impl<'a> Phase<'a> {
    fn begin(request_id: Uuid, in_flight: &'a InFlight) -> Self {
        let mut phase = Self {
            request_id,
            state: ServingState::Idle,
            in_flight,
        };
        phase.advance(ServingState::Fetching);
        phase
    }

    fn advance(&mut self, next: ServingState) {
        debug_assert!(self.state.can_transition_to(next));
        if let Some(c) = self.in_flight.counter(self.state) {
            c.fetch_sub(1, Ordering::SeqCst);
        }
        if let Some(c) = self.in_flight.counter(next) {
            c.fetch_add(1, Ordering::SeqCst);
        }
        debug!(request_id = %self.request_id, from = %self.state, to = %next, "Request state");
        self.state = next;
    }
}

impl Drop for Phase<'_> {
    fn drop(&mut self) {
        if self.state != ServingState::Idle {
            self.advance(ServingState::Idle);
        }
    }
}

/// Timestamps and targets to forecast
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastRequest {
    pub timestamps: Vec<DateTime<Utc>>,
    pub targets: Vec<Target>,
}

impl ForecastRequest {
    pub fn at(timestamp: DateTime<Utc>, targets: Vec<Target>) -> Self {
        Self {
            timestamps: vec![timestamp],
            targets,
        }
    }

    /// `hours` hourly timestamps starting at `start`
    pub fn horizon(start: DateTime<Utc>, hours: u32, targets: Vec<Target>) -> Self {
        Self {
            timestamps: (0..hours as i64).map(|h| start + Duration::hours(h)).collect(),
            targets,
        }
    }

    /// Sorted, de-duplicated timestamps and targets, checked against the horizon limit
    fn normalized(
        &self,
        max_horizon_hours: u32,
    ) -> Result<(Vec<DateTime<Utc>>, Vec<Target>), ForecastError> {
        let mut timestamps = self.timestamps.clone();
        timestamps.sort();
        timestamps.dedup();
        let mut targets = self.targets.clone();
        targets.sort();
        targets.dedup();

        if targets.is_empty() {
            return Err(ForecastError::InvalidRequest("no targets requested".to_string()));
        }
        let (Some(first), Some(last)) = (timestamps.first(), timestamps.last()) else {
            return Err(ForecastError::InvalidRequest("no timestamps requested".to_string()));
        };
        let span_hours = (*last - *first).num_hours();
        if timestamps.len() > max_horizon_hours as usize || span_hours >= max_horizon_hours as i64 {
            return Err(ForecastError::InvalidRequest(format!(
                "horizon of {} timestamps over {span_hours}h exceeds {max_horizon_hours}h limit",
                timestamps.len()
            )));
        }
        Ok((timestamps, targets))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Operating timezone the features were derived in
    pub timezone: String,
    /// Ordered by timestamp, then target
    pub forecasts: Vec<Forecast>,
    pub insight: Option<GridInsight>,
}

impl ForecastResponse {
    pub fn for_target(&self, target: Target) -> impl Iterator<Item = &Forecast> {
        self.forecasts.iter().filter(move |f| f.target == target)
    }
}

pub struct ForecastService {
    builder: FeatureBuilder,
    engine: ForecastEngine,
    insights: GridInsightCalculator,
    registry: Arc<ModelRegistry>,
    weather: Arc<dyn WeatherSource>,
    cache: RwLock<HashMap<DateTime<Utc>, (Instant, WeatherObservation)>>,
    ttl: std::time::Duration,
    max_horizon_hours: u32,
    in_flight: InFlight,
}

impl ForecastService {
    pub fn new(
        builder: FeatureBuilder,
        engine: ForecastEngine,
        registry: Arc<ModelRegistry>,
        weather: Arc<dyn WeatherSource>,
        serving: &ServingConfig,
    ) -> Self {
        Self {
            builder,
            engine,
            insights: GridInsightCalculator::new(),
            registry,
            weather,
            cache: RwLock::new(HashMap::new()),
            ttl: std::time::Duration::from_secs(serving.weather_cache_ttl_seconds),
            max_horizon_hours: serving.max_horizon_hours,
            in_flight: InFlight::default(),
        }
    }

    pub fn from_config(
        config: &Config,
        registry: Arc<ModelRegistry>,
        weather: Arc<dyn WeatherSource>,
    ) -> anyhow::Result<Self> {
        let builder = FeatureBuilder::new(config.timezone.tz()?, config.features.clone());
        let engine = ForecastEngine::new(config.limits.clone(), config.serving.interval_confidence);
        Ok(Self::new(builder, engine, registry, weather, &config.serving))
    }

    /// Most advanced state of any in-flight request
    pub fn status(&self) -> ServingState {
        if self.in_flight.producing.load(Ordering::SeqCst) > 0 {
            ServingState::Producing
        } else if self.in_flight.fetching.load(Ordering::SeqCst) > 0 {
            ServingState::Fetching
        } else {
            ServingState::Idle
        }
    }

    pub async fn forecast(
        &self,
        request: &ForecastRequest,
    ) -> Result<ForecastResponse, ForecastError> {
        let request_id = Uuid::new_v4();
        let (timestamps, targets) = request.normalized(self.max_horizon_hours)?;

        let mut phase = Phase::begin(request_id, &self.in_flight);

        // Models are pinned for the whole request so a concurrent publish cannot mix versions
        let mut models = Vec::with_capacity(targets.len());
        for target in &targets {
            models.push(self.registry.require(*target).await?);
        }

        let observations =
            try_join_all(timestamps.iter().map(|ts| self.observation(*ts))).await?;

        phase.advance(ServingState::Producing);

        let mut forecasts = Vec::with_capacity(observations.len() * models.len());
        for obs in &observations {
            let row = self.builder.build(obs)?;
            for published in &models {
                forecasts.push(self.engine.predict(&published.model, &row)?);
            }
        }

        let generation_targets = targets.iter().filter(|t| t.is_generation()).count();
        let insight = if generation_targets > 1 {
            self.insights.compute(&forecasts, &targets)
        } else {
            None
        };

        info!(
            request_id = %request_id,
            timestamps = timestamps.len(),
            targets = ?targets,
            forecasts = forecasts.len(),
            insight = insight.is_some(),
            "Forecast produced"
        );

        Ok(ForecastResponse {
            request_id,
            generated_at: Utc::now(),
            timezone: self.builder.timezone().name().to_string(),
            forecasts,
            insight,
        })
    }

    async fn observation(
        &self,
        timestamp: DateTime<Utc>,
    ) -> Result<WeatherObservation, ForecastError> {
        {
            let cache = self.cache.read().await;
            if let Some((fetched_at, obs)) = cache.get(&timestamp) {
                if fetched_at.elapsed() < self.ttl {
                    return Ok(obs.clone());
                }
            }
        }

        match self.weather.observation_at(timestamp).await {
            Ok(Some(obs)) => {
                let mut cache = self.cache.write().await;
                let ttl = self.ttl;
                cache.retain(|_, (fetched_at, _)| fetched_at.elapsed() < ttl);
                cache.insert(timestamp, (Instant::now(), obs.clone()));
                Ok(obs)
            }
            Ok(None) => Err(ForecastError::UpstreamDataUnavailable {
                timestamp,
                reason: "no weather observation for this timestamp".to_string(),
            }),
            Err(e) => {
                warn!(%timestamp, error = %e, "Weather source failed");
                Err(ForecastError::UpstreamDataUnavailable {
                    timestamp,
                    reason: format!("weather source failed: {e:#}"),
                })
            }
        }
    }
}
