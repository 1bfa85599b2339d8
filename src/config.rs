use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

use crate::domain::Target;
use crate::ml::training::TrainingConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Config {
    pub timezone: TimezoneConfig,
    #[validate(nested)]
    pub features: FeatureBounds,
    #[validate(nested)]
    pub dataset: DatasetConfig,
    #[validate(nested)]
    pub training: TrainingConfig,
    #[validate(nested)]
    pub limits: PhysicalLimits,
    pub models: ModelsConfig,
    #[validate(nested)]
    pub serving: ServingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimezoneConfig {
    /// IANA name of the operating timezone
    pub operating: String,
}

impl TimezoneConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.operating
            .parse::<Tz>()
            .map_err(|e| anyhow!("invalid operating timezone '{}': {e}", self.operating))
    }
}

/// Inclusive plausible range for one weather variable
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
}

impl Bounds {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeatureBounds {
    pub temperature_c: Bounds,
    pub windspeed_kmh: Bounds,
    pub solar_radiation_wm2: Bounds,
    pub cloudcover_percent: Bounds,
}

impl Default for FeatureBounds {
    fn default() -> Self {
        Self {
            temperature_c: Bounds::new(-60.0, 60.0),
            windspeed_kmh: Bounds::new(0.0, 250.0),
            solar_radiation_wm2: Bounds::new(0.0, 1500.0),
            cloudcover_percent: Bounds::new(0.0, 100.0),
        }
    }
}

impl FeatureBounds {
    fn all(&self) -> [(&'static str, Bounds); 4] {
        [
            ("temperature_c", self.temperature_c),
            ("windspeed_kmh", self.windspeed_kmh),
            ("solar_radiation_wm2", self.solar_radiation_wm2),
            ("cloudcover_percent", self.cloudcover_percent),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatasetConfig {
    /// Minimum joined examples required to train a model
    #[validate(range(min = 2))]
    pub min_examples: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self { min_examples: 100 }
    }
}

/// Physical ceilings (MW) that predictions are clipped to
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PhysicalLimits {
    #[validate(range(min = 0.0))]
    pub solar_max_mw: f64,
    #[validate(range(min = 0.0))]
    pub wind_max_mw: f64,
    #[validate(range(min = 0.0))]
    pub demand_max_mw: f64,
}

impl Default for PhysicalLimits {
    fn default() -> Self {
        // New England installed capacity plus headroom
        Self {
            solar_max_mw: 6_000.0,
            wind_max_mw: 2_500.0,
            demand_max_mw: 30_000.0,
        }
    }
}

impl PhysicalLimits {
    pub fn ceiling(&self, target: Target) -> f64 {
        match target {
            Target::Solar => self.solar_max_mw,
            Target::Wind => self.wind_max_mw,
            Target::Demand => self.demand_max_mw,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding one artifact per target
    pub dir: PathBuf,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("models"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServingConfig {
    pub weather_cache_ttl_seconds: u64,
    #[validate(range(min = 1, max = 8760))]
    pub max_horizon_hours: u32,
    /// Coverage of the prediction interval attached to each forecast
    #[validate(range(min = 0.5, max = 0.999))]
    pub interval_confidence: f64,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            weather_cache_ttl_seconds: 300,
            max_horizon_hours: 168,
            interval_confidence: 0.95,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: TimezoneConfig {
                operating: "America/New_York".to_string(),
            },
            features: FeatureBounds::default(),
            dataset: DatasetConfig::default(),
            training: TrainingConfig::default(),
            limits: PhysicalLimits::default(),
            models: ModelsConfig::default(),
            serving: ServingConfig::default(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from("config/default.toml")
    }

    /// Defaults, then the TOML file (if present), then `GRIDCAST__SECTION__KEY` env vars
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("GRIDCAST__").split("__"));
        let cfg: Config = figment.extract().context("failed to load configuration")?;
        cfg.check()?;
        Ok(cfg)
    }

    /// Field validation plus cross-field checks
    pub fn check(&self) -> Result<()> {
        self.validate().context("invalid configuration")?;
        self.timezone.tz()?;
        for (name, bounds) in self.features.all() {
            if !(bounds.min < bounds.max) {
                anyhow::bail!("features.{name}: min must be below max");
            }
        }
        let fraction = self.training.train_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            anyhow::bail!("training.train_fraction must be strictly between 0 and 1");
        }
        Ok(())
    }
}
