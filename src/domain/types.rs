use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumIter;

// ============================================================================
// Forecast Targets
// ============================================================================

/// An independently modelled forecast quantity
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Solar,
    Wind,
    Demand,
}

impl Target {
    /// Solar and wind count towards total generation; demand does not
    pub fn is_generation(&self) -> bool {
        matches!(self, Self::Solar | Self::Wind)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Solar => "solar",
            Self::Wind => "wind",
            Self::Demand => "demand",
        }
    }
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Target {
    type Err = &'static str;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solar" => Ok(Self::Solar),
            "wind" => Ok(Self::Wind),
            "demand" => Ok(Self::Demand),
            _ => Err("invalid target; expected solar, wind or demand"),
        }
    }
}

// ============================================================================
// Input Records
// ============================================================================

/// One weather reading from the external collector.
///
/// Timestamps are stored as UTC instants; the operating timezone is applied
/// when calendar features are derived. Fields are optional because the feed
/// may leave gaps; the feature builder rejects rows with missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherObservation {
    pub timestamp: DateTime<Utc>,
    /// Air temperature (°C)
    pub temperature: Option<f64>,
    /// Wind speed (km/h)
    pub windspeed: Option<f64>,
    /// Global horizontal irradiance (W/m²)
    pub solar_radiation: Option<f64>,
    /// Cloud cover (0-100%)
    pub cloudcover: Option<f64>,
}

impl WeatherObservation {
    /// Create a fully populated observation
    pub fn new(
        timestamp: DateTime<Utc>,
        temperature: f64,
        windspeed: f64,
        solar_radiation: f64,
        cloudcover: f64,
    ) -> Self {
        Self {
            timestamp,
            temperature: Some(temperature),
            windspeed: Some(windspeed),
            solar_radiation: Some(solar_radiation),
            cloudcover: Some(cloudcover),
        }
    }
}

/// One measured generation or demand value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub timestamp: DateTime<Utc>,
    pub target: Target,
    /// Measured value (MW)
    pub value_mw: f64,
}

impl GenerationRecord {
    pub fn new(timestamp: DateTime<Utc>, target: Target, value_mw: f64) -> Self {
        Self {
            timestamp,
            target,
            value_mw,
        }
    }
}
