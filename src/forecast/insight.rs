//! Grid signals derived from a window of forecasts: per-target peaks,
//! generation mix and supply/demand balance.

use chrono::{DateTime, Utc};
use itertools::{Itertools, MinMaxResult};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::domain::{
    BalancePoint, Forecast, GridInsight, MixPoint, Target, TargetPeak, TimeWindow,
};

type Series = BTreeMap<DateTime<Utc>, f64>;

#[derive(Debug, Clone, Default)]
pub struct GridInsightCalculator;

impl GridInsightCalculator {
    pub fn new() -> Self {
        Self
    }

    /// Derive insight over all `forecasts`, flagging any of `expected` that
    /// has no forecasts as absent. Returns `None` for an empty input.
    pub fn compute(&self, forecasts: &[Forecast], expected: &[Target]) -> Option<GridInsight> {
        let window = match forecasts.iter().map(|f| f.timestamp).minmax() {
            MinMaxResult::NoElements => return None,
            MinMaxResult::OneElement(t) => TimeWindow { start: t, end: t },
            MinMaxResult::MinMax(start, end) => TimeWindow { start, end },
        };

        let mut series: BTreeMap<Target, Series> = BTreeMap::new();
        for f in forecasts {
            series
                .entry(f.target)
                .or_default()
                .entry(f.timestamp)
                .or_insert(f.value_mw);
        }

        let absent: Vec<Target> = expected
            .iter()
            .copied()
            .filter(|t| !series.contains_key(t))
            .sorted()
            .dedup()
            .collect();
        if !absent.is_empty() {
            debug!(?absent, "Insight computed with absent targets");
        }

        let peaks = series
            .iter()
            .filter_map(|(target, s)| peak(s).map(|p| (*target, p)))
            .collect();

        let generation: BTreeMap<Target, &Series> = series
            .iter()
            .filter(|(t, _)| t.is_generation())
            .map(|(t, s)| (*t, s))
            .collect();

        let generation_mix = (!generation.is_empty()).then(|| mix(&generation));

        let missing_generation = expected
            .iter()
            .any(|t| t.is_generation() && !series.contains_key(t));
        let balance = match series.get(&Target::Demand) {
            Some(demand) if !generation.is_empty() && !missing_generation => {
                Some(balance(demand, &generation))
            }
            _ => None,
        };

        Some(GridInsight {
            window_id: window.id(),
            window,
            peaks,
            absent,
            generation_mix,
            balance,
        })
    }
}

/// Argmax over the series; ties keep the earliest timestamp
fn peak(series: &Series) -> Option<TargetPeak> {
    let mut iter = series.iter();
    let (first_ts, first_value) = iter.next()?;
    let (timestamp, value_mw) = iter.fold((*first_ts, *first_value), |best, (ts, v)| {
        if *v > best.1 {
            (*ts, *v)
        } else {
            best
        }
    });
    Some(TargetPeak {
        timestamp,
        value_mw,
        mean_mw: series.values().sum::<f64>() / series.len() as f64,
        samples: series.len(),
    })
}

/// Timestamps at which every present generation target has a value
fn common_timestamps(generation: &BTreeMap<Target, &Series>) -> BTreeSet<DateTime<Utc>> {
    let mut sets = generation.values().map(|s| s.keys().copied().collect::<BTreeSet<_>>());
    let first = sets.next().unwrap_or_default();
    sets.fold(first, |acc, s| acc.intersection(&s).copied().collect())
}

fn mix(generation: &BTreeMap<Target, &Series>) -> Vec<MixPoint> {
    common_timestamps(generation)
        .into_iter()
        .map(|timestamp| {
            let values: Vec<(Target, f64)> = generation
                .iter()
                .filter_map(|(t, s)| s.get(&timestamp).map(|v| (*t, *v)))
                .collect();
            let total: f64 = values.iter().map(|(_, v)| v).sum();
            let shares = values
                .into_iter()
                .map(|(t, v)| {
                    let share = if total > 0.0 { v / total } else { 0.0 };
                    (t, share)
                })
                .collect();
            MixPoint {
                timestamp,
                total_generation_mw: total,
                shares,
            }
        })
        .collect()
}

fn balance(demand: &Series, generation: &BTreeMap<Target, &Series>) -> Vec<BalancePoint> {
    let common = common_timestamps(generation);
    demand
        .iter()
        .filter(|(ts, _)| common.contains(*ts))
        .map(|(ts, demand_mw)| {
            let generation_mw: f64 = generation.values().filter_map(|s| s.get(ts)).sum();
            BalancePoint {
                timestamp: *ts,
                demand_mw: *demand_mw,
                generation_mw,
                balance_mw: demand_mw - generation_mw,
            }
        })
        .collect()
}
