//! Depth-bounded CART regression tree, the base learner of the boosted ensemble
//!
//! Splits are found by exact greedy search over every distinct threshold of
//! every feature. Gain is the reduction in squared error:
//! `S_l²/n_l + S_r²/n_r - S²/n` where `S` is the sum of targets in a node.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Splits with gain at or below this are not taken
    pub min_split_gain: f64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: 4,
            min_samples_leaf: 5,
            min_split_gain: 1e-9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
    },
    /// Rows with `x[feature] <= threshold` go left; everything else, NaN included, goes right
    Split {
        feature: usize,
        threshold: f64,
        gain: f64,
        left: usize,
        right: usize,
    },
}

/// Nodes are stored flat; index 0 is the root
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

struct Candidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl RegressionTree {
    /// Fit `y` on row-major `x`. An empty input yields a single zero leaf.
    pub fn fit(x: &[Vec<f64>], y: &[f64], params: &TreeParams) -> Self {
        let mut nodes = Vec::new();
        let indices: Vec<usize> = (0..y.len().min(x.len())).collect();
        grow(&mut nodes, x, y, indices, 0, params);
        Self { nodes }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match self.nodes.get(id) {
                Some(Node::Leaf { value }) => return *value,
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                }) => {
                    let value = row.get(*feature).copied().unwrap_or(f64::NAN);
                    id = if value <= *threshold { *left } else { *right };
                }
                None => return 0.0,
            }
        }
    }

    /// Total split gain attributed to each feature
    pub fn split_gains(&self, n_features: usize) -> Vec<f64> {
        let mut gains = vec![0.0; n_features];
        for node in &self.nodes {
            if let Node::Split { feature, gain, .. } = node {
                if let Some(total) = gains.get_mut(*feature) {
                    *total += gain;
                }
            }
        }
        gains
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn leaf_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, Node::Leaf { .. }))
            .count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], id: usize) -> usize {
            match nodes.get(id) {
                Some(Node::Split { left, right, .. }) => {
                    1 + walk(nodes, *left).max(walk(nodes, *right))
                }
                _ => 0,
            }
        }
        walk(&self.nodes, 0)
    }
}

fn grow(
    nodes: &mut Vec<Node>,
    x: &[Vec<f64>],
    y: &[f64],
    indices: Vec<usize>,
    depth: usize,
    params: &TreeParams,
) -> usize {
    let id = nodes.len();
    let n = indices.len();
    let sum: f64 = indices.iter().map(|&i| y[i]).sum();
    let value = if n == 0 { 0.0 } else { sum / n as f64 };
    nodes.push(Node::Leaf { value });

    let min_leaf = params.min_samples_leaf.max(1);
    if depth >= params.max_depth || n < 2 * min_leaf {
        return id;
    }
    let Some(best) = best_split(x, y, &indices, sum, min_leaf, params.min_split_gain) else {
        return id;
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| x[i][best.feature] <= best.threshold);

    let left = grow(nodes, x, y, left_rows, depth + 1, params);
    let right = grow(nodes, x, y, right_rows, depth + 1, params);
    nodes[id] = Node::Split {
        feature: best.feature,
        threshold: best.threshold,
        gain: best.gain,
        left,
        right,
    };
    id
}

fn best_split(
    x: &[Vec<f64>],
    y: &[f64],
    indices: &[usize],
    total: f64,
    min_leaf: usize,
    min_gain: f64,
) -> Option<Candidate> {
    let n = indices.len();
    let n_features = x[indices[0]].len();
    let parent = total * total / n as f64;

    let mut best: Option<Candidate> = None;
    let mut order = indices.to_vec();
    for feature in 0..n_features {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += y[order[k]];
            let n_left = k + 1;
            let n_right = n - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }
            let lo = x[order[k]][feature];
            let hi = x[order[k + 1]][feature];
            // No threshold separates equal values
            if lo >= hi {
                continue;
            }
            let right_sum = total - left_sum;
            let gain = left_sum * left_sum / n_left as f64 + right_sum * right_sum / n_right as f64
                - parent;
            if gain > min_gain && best.as_ref().map_or(true, |b| gain > b.gain) {
                let mut threshold = lo + (hi - lo) / 2.0;
                if threshold >= hi {
                    threshold = lo;
                }
                best = Some(Candidate {
                    feature,
                    threshold,
                    gain,
                });
            }
        }
    }
    best
}
