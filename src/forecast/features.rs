//! Feature engineering for forecasting models
//!
//! Turns one weather observation into a fixed, ordered feature row. The
//! column order is defined once by [`Feature`] and recorded in a
//! [`FeatureSchema`] so inference can verify it against the model.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use strum::{EnumIter, IntoEnumIterator};

use crate::config::{Bounds, FeatureBounds};
use crate::domain::WeatherObservation;
use crate::error::ForecastError;

/// Feature columns in canonical order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    HourSin,
    HourCos,
    MonthSin,
    MonthCos,
    Temperature,
    Windspeed,
    SolarRadiation,
    Cloudcover,
    WindspeedCubed,
    Season,
    TimeOfDay,
    IsWeekend,
}

impl Feature {
    pub fn name(&self) -> &'static str {
        match self {
            Self::HourSin => "hour_sin",
            Self::HourCos => "hour_cos",
            Self::MonthSin => "month_sin",
            Self::MonthCos => "month_cos",
            Self::Temperature => "temperature",
            Self::Windspeed => "windspeed",
            Self::SolarRadiation => "solar_radiation",
            Self::Cloudcover => "cloudcover",
            Self::WindspeedCubed => "windspeed_cubed",
            Self::Season => "season",
            Self::TimeOfDay => "time_of_day",
            Self::IsWeekend => "is_weekend",
        }
    }

    pub fn unit(&self) -> Unit {
        match self {
            Self::HourSin | Self::HourCos | Self::MonthSin | Self::MonthCos => Unit::Dimensionless,
            Self::Temperature => Unit::Celsius,
            Self::Windspeed => Unit::KilometresPerHour,
            Self::SolarRadiation => Unit::WattsPerSquareMetre,
            Self::Cloudcover => Unit::Percent,
            Self::WindspeedCubed => Unit::KilometresPerHourCubed,
            Self::Season | Self::TimeOfDay => Unit::Category,
            Self::IsWeekend => Unit::Flag,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Measurement unit of a feature column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    Dimensionless,
    Celsius,
    KilometresPerHour,
    KilometresPerHourCubed,
    WattsPerSquareMetre,
    Percent,
    Category,
    Flag,
}

impl std::fmt::Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Dimensionless => "1",
            Self::Celsius => "°C",
            Self::KilometresPerHour => "km/h",
            Self::KilometresPerHourCubed => "(km/h)³",
            Self::WattsPerSquareMetre => "W/m²",
            Self::Percent => "%",
            Self::Category => "category",
            Self::Flag => "flag",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub feature: Feature,
    pub unit: Unit,
}

/// Ordered feature columns a row was built with, or a model was trained on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<FeatureColumn>,
}

impl FeatureSchema {
    /// The schema produced by [`FeatureBuilder`]
    pub fn standard() -> Self {
        Self::new(
            Feature::iter()
                .map(|feature| FeatureColumn {
                    feature,
                    unit: feature.unit(),
                })
                .collect(),
        )
    }

    pub fn new(columns: Vec<FeatureColumn>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[FeatureColumn] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.feature.name()).collect()
    }

    pub fn position(&self, feature: Feature) -> Option<usize> {
        self.columns.iter().position(|c| c.feature == feature)
    }

    /// e.g. `hour_sin[1], temperature[°C]`
    pub fn describe(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{}[{}]", c.feature, c.unit))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Fails unless `other` has the identical column order and units
    pub fn ensure_matches(&self, other: &FeatureSchema) -> Result<(), ForecastError> {
        if self == other {
            return Ok(());
        }
        Err(ForecastError::FeatureSchemaMismatch {
            expected: self.describe(),
            found: other.describe(),
        })
    }
}

/// One model input row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    timestamp: DateTime<Utc>,
    schema: FeatureSchema,
    values: Vec<f64>,
}

impl FeatureRow {
    /// Assemble a row from explicit parts; the value count must match the schema
    pub fn from_parts(
        timestamp: DateTime<Utc>,
        schema: FeatureSchema,
        values: Vec<f64>,
    ) -> Result<Self, ForecastError> {
        if schema.len() != values.len() {
            return Err(ForecastError::FeatureSchemaMismatch {
                expected: schema.describe(),
                found: format!("{} values", values.len()),
            });
        }
        Ok(Self {
            timestamp,
            schema,
            values,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn get(&self, feature: Feature) -> Option<f64> {
        self.schema.position(feature).map(|i| self.values[i])
    }
}

/// Builds feature rows from weather observations
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    timezone: Tz,
    bounds: FeatureBounds,
    schema: FeatureSchema,
}

impl FeatureBuilder {
    pub fn new(timezone: Tz, bounds: FeatureBounds) -> Self {
        Self {
            timezone,
            bounds,
            schema: FeatureSchema::standard(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Build the feature row for one observation
    pub fn build(&self, obs: &WeatherObservation) -> Result<FeatureRow, ForecastError> {
        let temperature = require(obs, "temperature", obs.temperature, self.bounds.temperature_c)?;
        let windspeed = require(obs, "windspeed", obs.windspeed, self.bounds.windspeed_kmh)?;
        let solar_radiation = require(
            obs,
            "solar_radiation",
            obs.solar_radiation,
            self.bounds.solar_radiation_wm2,
        )?;
        let cloudcover =
            require(obs, "cloudcover", obs.cloudcover, self.bounds.cloudcover_percent)?;

        let local = obs.timestamp.with_timezone(&self.timezone);
        let hour = local.hour();
        let month = local.month();
        let (hour_sin, hour_cos) = cyclical(hour as f64, 24.0);
        let (month_sin, month_cos) = cyclical(month as f64, 12.0);
        let is_weekend = matches!(local.weekday(), Weekday::Sat | Weekday::Sun);

        let values = self
            .schema
            .columns()
            .iter()
            .map(|c| match c.feature {
                Feature::HourSin => hour_sin,
                Feature::HourCos => hour_cos,
                Feature::MonthSin => month_sin,
                Feature::MonthCos => month_cos,
                Feature::Temperature => temperature,
                Feature::Windspeed => windspeed,
                Feature::SolarRadiation => solar_radiation,
                Feature::Cloudcover => cloudcover,
                Feature::WindspeedCubed => windspeed.powi(3),
                Feature::Season => season(month) as f64,
                Feature::TimeOfDay => time_of_day(hour) as f64,
                Feature::IsWeekend => {
                    if is_weekend {
                        1.0
                    } else {
                        0.0
                    }
                }
            })
            .collect();

        Ok(FeatureRow {
            timestamp: obs.timestamp,
            schema: self.schema.clone(),
            values,
        })
    }
}

fn require(
    obs: &WeatherObservation,
    field: &str,
    value: Option<f64>,
    bounds: Bounds,
) -> Result<f64, ForecastError> {
    let value = value.filter(|v| v.is_finite()).ok_or_else(|| {
        ForecastError::InvalidObservation {
            timestamp: obs.timestamp,
            reason: format!("{field} is missing"),
        }
    })?;
    if !bounds.contains(value) {
        return Err(ForecastError::InvalidObservation {
            timestamp: obs.timestamp,
            reason: format!(
                "{field} = {value} outside plausible range [{}, {}]",
                bounds.min, bounds.max
            ),
        });
    }
    Ok(value)
}

/// Encode a periodic value as (sin, cos) so the period boundary is continuous
pub fn cyclical(value: f64, period: f64) -> (f64, f64) {
    let angle = 2.0 * PI * value / period;
    (angle.sin(), angle.cos())
}

/// Season from month (1=winter, 2=spring, 3=summer, 4=autumn)
fn season(month: u32) -> u32 {
    match month {
        12 | 1 | 2 => 1,
        3..=5 => 2,
        6..=8 => 3,
        _ => 4,
    }
}

/// Quarter of the day (1: 00-05, 2: 06-11, 3: 12-17, 4: 18-23)
fn time_of_day(hour: u32) -> u32 {
    match hour {
        0..=5 => 1,
        6..=11 => 2,
        12..=17 => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::New_York;
    use proptest::prelude::*;
    use rstest::rstest;

    fn builder() -> FeatureBuilder {
        FeatureBuilder::new(New_York, FeatureBounds::default())
    }

    fn obs_at(timestamp: DateTime<Utc>) -> WeatherObservation {
        WeatherObservation::new(timestamp, 12.0, 20.0, 450.0, 30.0)
    }

    fn distance(a: (f64, f64), b: (f64, f64)) -> f64 {
        ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
    }

    #[test]
    fn test_standard_schema_order() {
        let schema = FeatureSchema::standard();
        assert_eq!(schema.len(), 12);
        assert_eq!(
            &schema.names()[..8],
            &[
                "hour_sin",
                "hour_cos",
                "month_sin",
                "month_cos",
                "temperature",
                "windspeed",
                "solar_radiation",
                "cloudcover"
            ]
        );
        assert_eq!(schema.columns()[5].unit, Unit::KilometresPerHour);
    }

    #[test]
    fn test_build_uses_operating_timezone() {
        // 03:00 UTC on a Saturday is 23:00 Friday in New York (EDT)
        let ts = Utc.with_ymd_and_hms(2024, 6, 8, 3, 0, 0).unwrap();
        let row = builder().build(&obs_at(ts)).unwrap();

        let (sin, cos) = cyclical(23.0, 24.0);
        assert!((row.get(Feature::HourSin).unwrap() - sin).abs() < 1e-12);
        assert!((row.get(Feature::HourCos).unwrap() - cos).abs() < 1e-12);
        assert_eq!(row.get(Feature::IsWeekend), Some(0.0));
        assert_eq!(row.get(Feature::TimeOfDay), Some(4.0));
        assert_eq!(row.get(Feature::Season), Some(3.0));
        assert_eq!(row.timestamp(), ts);
    }

    #[test]
    fn test_weather_passes_through_unchanged() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 17, 0, 0).unwrap();
        let row = builder().build(&obs_at(ts)).unwrap();
        assert_eq!(row.get(Feature::Temperature), Some(12.0));
        assert_eq!(row.get(Feature::Windspeed), Some(20.0));
        assert_eq!(row.get(Feature::SolarRadiation), Some(450.0));
        assert_eq!(row.get(Feature::Cloudcover), Some(30.0));
        assert_eq!(row.get(Feature::WindspeedCubed), Some(8000.0));
        assert_eq!(row.get(Feature::Season), Some(1.0));
        assert_eq!(row.values().len(), row.schema().len());
    }

    #[rstest]
    #[case::missing_temperature(None, Some(5.0), Some(100.0), Some(10.0), "temperature is missing")]
    #[case::negative_windspeed(Some(10.0), Some(-1.0), Some(100.0), Some(10.0), "windspeed")]
    #[case::nan_radiation(
        Some(10.0),
        Some(5.0),
        Some(f64::NAN),
        Some(10.0),
        "solar_radiation is missing"
    )]
    #[case::cloudcover_over_100(Some(10.0), Some(5.0), Some(100.0), Some(120.0), "cloudcover")]
    #[case::scorching(Some(75.0), Some(5.0), Some(100.0), Some(10.0), "temperature")]
    fn test_invalid_observations_are_rejected(
        #[case] temperature: Option<f64>,
        #[case] windspeed: Option<f64>,
        #[case] solar_radiation: Option<f64>,
        #[case] cloudcover: Option<f64>,
        #[case] expected: &str,
    ) {
        let obs = WeatherObservation {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            temperature,
            windspeed,
            solar_radiation,
            cloudcover,
        };
        match builder().build(&obs) {
            Err(ForecastError::InvalidObservation { reason, .. }) => {
                assert!(reason.contains(expected), "reason was: {reason}")
            }
            other => panic!("expected InvalidObservation, got {other:?}"),
        }
    }

    #[test]
    fn test_encoding_continuous_across_wraparound() {
        let step = distance(cyclical(1.0, 24.0), cyclical(2.0, 24.0));
        let wrap = distance(cyclical(23.0, 24.0), cyclical(0.0, 24.0));
        assert!((step - wrap).abs() < 1e-12);

        let step = distance(cyclical(1.0, 12.0), cyclical(2.0, 12.0));
        let wrap = distance(cyclical(12.0, 12.0), cyclical(1.0, 12.0));
        assert!((step - wrap).abs() < 1e-12);
    }

    #[test]
    fn test_from_parts_rejects_wrong_length() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let result = FeatureRow::from_parts(ts, FeatureSchema::standard(), vec![1.0, 2.0]);
        assert!(matches!(
            result,
            Err(ForecastError::FeatureSchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_ensure_matches_detects_unit_change() {
        let standard = FeatureSchema::standard();
        let mut columns = standard.columns().to_vec();
        columns[5].unit = Unit::Percent;
        let altered = FeatureSchema::new(columns);
        assert!(standard.ensure_matches(&standard.clone()).is_ok());
        assert!(standard.ensure_matches(&altered).is_err());
    }

    proptest! {
        #[test]
        fn prop_cyclical_encodings_lie_on_unit_circle(
            secs in 0i64..(50 * 365 * 24 * 3600),
        ) {
            let ts = Utc.timestamp_opt(1_000_000_000 + secs, 0).unwrap();
            let row = builder().build(&obs_at(ts)).unwrap();
            let hour = (row.get(Feature::HourSin).unwrap(), row.get(Feature::HourCos).unwrap());
            let month = (row.get(Feature::MonthSin).unwrap(), row.get(Feature::MonthCos).unwrap());
            prop_assert!((hour.0.powi(2) + hour.1.powi(2) - 1.0).abs() < 1e-9);
            prop_assert!((month.0.powi(2) + month.1.powi(2) - 1.0).abs() < 1e-9);
        }

        #[test]
        fn prop_adjacent_hours_are_equidistant(hour in 0u32..24) {
            let next = (hour + 1) % 24;
            let d = distance(cyclical(hour as f64, 24.0), cyclical(next as f64, 24.0));
            let reference = distance(cyclical(0.0, 24.0), cyclical(1.0, 24.0));
            prop_assert!((d - reference).abs() < 1e-9);
        }
    }
}
