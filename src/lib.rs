//! Solar, wind and demand forecasting with grid balance insight.
//!
//! Pipeline: weather observations are turned into feature rows
//! ([`forecast::FeatureBuilder`]), joined with measured generation for
//! training ([`forecast::DatasetAssembler`]), fitted per target
//! ([`ml::ModelTrainer`]), served through [`ml::ModelRegistry`] and
//! [`forecast::ForecastEngine`], and summarised by
//! [`forecast::GridInsightCalculator`]. [`service::ForecastService`] is the
//! single entry point for callers.

pub mod config;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod io;
pub mod ml;
pub mod service;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{ErrorKind, ForecastError};
