//! Error taxonomy for the forecasting pipeline.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::Target;

/// Errors raised by the feature, training, inference and serving layers
#[derive(Debug, Error)]
pub enum ForecastError {
    #[error("invalid observation at {timestamp}: {reason}")]
    InvalidObservation {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    #[error("dataset for {target} has {found} examples, at least {required} required")]
    EmptyDataset {
        target: Target,
        found: usize,
        required: usize,
    },

    #[error("training diverged for {target}: {reason}")]
    TrainingDiverged { target: Target, reason: String },

    #[error("feature schema mismatch: expected [{expected}], found [{found}]")]
    FeatureSchemaMismatch { expected: String, found: String },

    #[error("weather data unavailable for {timestamp}: {reason}")]
    UpstreamDataUnavailable {
        timestamp: DateTime<Utc>,
        reason: String,
    },

    #[error("no trained model available for {target}")]
    ModelUnavailable { target: Target },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("model artifact error for {target}: {reason}")]
    Artifact { target: Target, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used by callers to decide how to surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected input data or request
    BadInput,
    /// Fatal to one training run only
    Training,
    /// Feature ordering/units disagree; a configuration or programming error
    Schema,
    /// Forecast cannot be produced right now
    Unavailable,
    /// Model artifact persistence failed
    Storage,
}

impl ForecastError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidObservation { .. } | Self::InvalidRequest(_) => ErrorKind::BadInput,
            Self::EmptyDataset { .. } | Self::TrainingDiverged { .. } => ErrorKind::Training,
            Self::FeatureSchemaMismatch { .. } => ErrorKind::Schema,
            Self::UpstreamDataUnavailable { .. } | Self::ModelUnavailable { .. } => {
                ErrorKind::Unavailable
            }
            Self::Artifact { .. } | Self::Io(_) => ErrorKind::Storage,
        }
    }

    /// True when the caller should render "forecast unavailable"
    pub fn is_unavailable(&self) -> bool {
        self.kind() == ErrorKind::Unavailable
    }
}
