//! Gradient boosting on squared error with holdout early stopping

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone, Copy)]
pub struct BoostingParams {
    pub learning_rate: f64,
    pub max_rounds: usize,
    /// Rounds without holdout improvement before stopping
    pub patience: usize,
    pub tree: TreeParams,
}

/// Additive ensemble: `base_score + learning_rate * Σ tree(x)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostedTrees {
    base_score: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

/// Result of a boosting run
#[derive(Debug, Clone)]
pub struct BoostingFit {
    /// Ensemble truncated to `best_round` trees
    pub model: GradientBoostedTrees,
    /// Holdout RMSE after each round; index 0 is the base score alone
    pub holdout_rmse: Vec<f64>,
    pub best_round: usize,
    pub stopped_early: bool,
}

impl GradientBoostedTrees {
    pub fn predict(&self, row: &[f64]) -> f64 {
        self.base_score
            + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn rounds(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    /// Total split gain per feature, normalised to sum to 1 (all zero if no splits)
    pub fn gain_importances(&self) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_features];
        for tree in &self.trees {
            for (total, gain) in totals.iter_mut().zip(tree.split_gains(self.n_features)) {
                *total += gain;
            }
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter_mut().for_each(|g| *g /= sum);
        }
        totals
    }

    /// Fit on the training rows, tracking RMSE on the holdout rows each round
    pub fn fit(
        train_x: &[Vec<f64>],
        train_y: &[f64],
        holdout_x: &[Vec<f64>],
        holdout_y: &[f64],
        params: &BoostingParams,
    ) -> BoostingFit {
        let n_features = train_x.first().map_or(0, |row| row.len());
        let base_score = mean(train_y);

        let mut train_pred = vec![base_score; train_y.len()];
        let mut holdout_pred = vec![base_score; holdout_y.len()];
        let mut holdout_rmse = vec![rmse(holdout_y, &holdout_pred)];

        let mut trees = Vec::with_capacity(params.max_rounds);
        let mut best_round = 0;
        let mut best = holdout_rmse[0];
        let mut since_best = 0;
        let mut stopped_early = false;

        for round in 1..=params.max_rounds {
            let residuals: Vec<f64> = train_y
                .iter()
                .zip(&train_pred)
                .map(|(y, p)| y - p)
                .collect();
            let tree = RegressionTree::fit(train_x, &residuals, &params.tree);

            for (pred, row) in train_pred.iter_mut().zip(train_x) {
                *pred += params.learning_rate * tree.predict(row);
            }
            for (pred, row) in holdout_pred.iter_mut().zip(holdout_x) {
                *pred += params.learning_rate * tree.predict(row);
            }
            trees.push(tree);

            let score = rmse(holdout_y, &holdout_pred);
            holdout_rmse.push(score);
            if !score.is_finite() {
                break;
            }
            if score < best {
                best = score;
                best_round = round;
                since_best = 0;
            } else {
                since_best += 1;
                if since_best >= params.patience {
                    debug!(round, best_round, "Holdout RMSE stopped improving");
                    stopped_early = true;
                    break;
                }
            }
        }

        trees.truncate(best_round);

        BoostingFit {
            model: GradientBoostedTrees {
                base_score,
                learning_rate: params.learning_rate,
                trees,
                n_features,
            },
            holdout_rmse,
            best_round,
            stopped_early,
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn rmse(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.is_empty() {
        return f64::NAN;
    }
    let sse: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    (sse / actual.len() as f64).sqrt()
}
