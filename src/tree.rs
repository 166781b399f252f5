use anyhow::Result;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{Value, json};

use crate::classifier::{CLASS_COUNT, ModelKind, OutcomeClassifier, check_training_shape, softmax};
use crate::dataset::Outcome;
use crate::features::{FEATURE_COUNT, FeatureVector};

const MIN_SAMPLES_SPLIT: usize = 2;

/// Axis-aligned split node shared by both tree flavors; the leaf payload
/// differs (class distribution vs. regression value).
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Node<L> {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node<L>>,
        right: Box<Node<L>>,
    },
    Leaf {
        value: L,
    },
}

impl<L: Clone> Node<L> {
    fn lookup(&self, x: &FeatureVector) -> &L {
        let mut node = self;
        loop {
            match node {
                Node::Leaf { value } => return value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if x[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// Candidate split chosen by exhaustive scan over sorted feature values.
struct BestSplit {
    feature: usize,
    threshold: f64,
    score: f64,
}

fn gini(counts: &[f64; CLASS_COUNT], total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let mut impurity = 1.0;
    for c in counts {
        let p = c / total;
        impurity -= p * p;
    }
    impurity
}

/// Classification tree grown by gini impurity over an optional feature
/// subset per split.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationTree {
    root: Node<[f64; CLASS_COUNT]>,
}

impl ClassificationTree {
    fn fit(
        x: &[FeatureVector],
        y: &[Outcome],
        indices: Vec<usize>,
        max_depth: usize,
        features_per_split: usize,
        rng: &mut StdRng,
    ) -> Self {
        let root = grow_classification(x, y, indices, max_depth, features_per_split, rng);
        Self { root }
    }

    pub fn class_probs(&self, x: &FeatureVector) -> [f64; CLASS_COUNT] {
        *self.root.lookup(x)
    }
}

fn class_leaf(y: &[Outcome], indices: &[usize]) -> Node<[f64; CLASS_COUNT]> {
    let mut counts = [0.0f64; CLASS_COUNT];
    for &i in indices {
        counts[y[i].label()] += 1.0;
    }
    let total: f64 = counts.iter().sum();
    if total > 0.0 {
        for c in &mut counts {
            *c /= total;
        }
    } else {
        counts = [1.0 / CLASS_COUNT as f64; CLASS_COUNT];
    }
    Node::Leaf { value: counts }
}

fn grow_classification(
    x: &[FeatureVector],
    y: &[Outcome],
    indices: Vec<usize>,
    depth_left: usize,
    features_per_split: usize,
    rng: &mut StdRng,
) -> Node<[f64; CLASS_COUNT]> {
    if depth_left == 0 || indices.len() < MIN_SAMPLES_SPLIT {
        return class_leaf(y, &indices);
    }

    let first = y[indices[0]];
    if indices.iter().all(|&i| y[i] == first) {
        return class_leaf(y, &indices);
    }

    let features = sample_features(features_per_split, rng);
    let mut best: Option<BestSplit> = None;

    for &feature in &features {
        let mut sorted = indices.clone();
        sorted.sort_by(|&a, &b| {
            x[a][feature]
                .partial_cmp(&x[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let total = sorted.len() as f64;
        let mut right_counts = [0.0f64; CLASS_COUNT];
        for &i in &sorted {
            right_counts[y[i].label()] += 1.0;
        }
        let mut left_counts = [0.0f64; CLASS_COUNT];

        for pos in 1..sorted.len() {
            let moved = sorted[pos - 1];
            left_counts[y[moved].label()] += 1.0;
            right_counts[y[moved].label()] -= 1.0;

            let prev = x[sorted[pos - 1]][feature];
            let next = x[sorted[pos]][feature];
            if next <= prev {
                continue;
            }

            let left_n = pos as f64;
            let right_n = total - left_n;
            let score = (left_n / total) * gini(&left_counts, left_n)
                + (right_n / total) * gini(&right_counts, right_n);

            if best.as_ref().is_none_or(|b| score < b.score) {
                best = Some(BestSplit {
                    feature,
                    threshold: (prev + next) / 2.0,
                    score,
                });
            }
        }
    }

    let Some(split) = best else {
        return class_leaf(y, &indices);
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| x[i][split.feature] <= split.threshold);
    if left_idx.is_empty() || right_idx.is_empty() {
        let mut merged = left_idx;
        merged.extend(right_idx);
        return class_leaf(y, &merged);
    }

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow_classification(
            x,
            y,
            left_idx,
            depth_left - 1,
            features_per_split,
            rng,
        )),
        right: Box::new(grow_classification(
            x,
            y,
            right_idx,
            depth_left - 1,
            features_per_split,
            rng,
        )),
    }
}

/// Without-replacement draw of split candidates; `count >= FEATURE_COUNT`
/// degenerates to considering every feature.
fn sample_features(count: usize, rng: &mut StdRng) -> Vec<usize> {
    if count >= FEATURE_COUNT {
        return (0..FEATURE_COUNT).collect();
    }
    let mut pool: Vec<usize> = (0..FEATURE_COUNT).collect();
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let pick = rng.gen_range(0..pool.len());
        out.push(pool.swap_remove(pick));
    }
    out
}

/// Bagged gini trees with sqrt-feature sampling; the per-tree builds run on
/// the rayon pool, which stays an internal detail of `fit`.
pub struct RandomForest {
    n_trees: usize,
    max_depth: usize,
    seed: u64,
    trees: Vec<ClassificationTree>,
}

impl RandomForest {
    pub fn new(seed: u64) -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            seed,
            trees: Vec::new(),
        }
    }
}

impl OutcomeClassifier for RandomForest {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn fit(&mut self, x: &[FeatureVector], y: &[Outcome]) -> Result<()> {
        check_training_shape(x, y)?;
        let n = x.len();
        let seed = self.seed;
        let max_depth = self.max_depth;
        let features_per_split = (FEATURE_COUNT as f64).sqrt().round() as usize;

        self.trees = (0..self.n_trees)
            .into_par_iter()
            .map(|tree_ix| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(tree_ix as u64));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                ClassificationTree::fit(x, y, bootstrap, max_depth, features_per_split, &mut rng)
            })
            .collect();
        Ok(())
    }

    fn predict_proba(&self, x: &[FeatureVector]) -> Vec<[f64; CLASS_COUNT]> {
        if self.trees.is_empty() {
            return vec![[1.0 / CLASS_COUNT as f64; CLASS_COUNT]; x.len()];
        }
        x.iter()
            .map(|row| {
                let mut acc = [0.0f64; CLASS_COUNT];
                for tree in &self.trees {
                    let probs = tree.class_probs(row);
                    for k in 0..CLASS_COUNT {
                        acc[k] += probs[k];
                    }
                }
                for v in &mut acc {
                    *v /= self.trees.len() as f64;
                }
                acc
            })
            .collect()
    }

    fn dump(&self) -> Value {
        json!({
            "model_type": "random_forest",
            "input_dim": FEATURE_COUNT,
            "num_classes": CLASS_COUNT,
            "n_estimators": self.n_trees,
            "max_depth": self.max_depth,
            "trees": serde_json::to_value(&self.trees).unwrap_or(Value::Null),
        })
    }
}

/// Regression tree over gradient/hessian pairs; leaves hold the Newton step
/// `sum(g) / (sum(h) + lambda)`.
#[derive(Debug, Clone, Serialize)]
pub struct RegressionTree {
    root: Node<f64>,
}

const LEAF_REGULARIZATION: f64 = 1.0;

impl RegressionTree {
    fn fit(
        x: &[FeatureVector],
        grad: &[f64],
        hess: &[f64],
        indices: Vec<usize>,
        max_depth: usize,
    ) -> Self {
        let root = grow_regression(x, grad, hess, indices, max_depth);
        Self { root }
    }

    pub fn value(&self, x: &FeatureVector) -> f64 {
        *self.root.lookup(x)
    }
}

fn regression_leaf(grad: &[f64], hess: &[f64], indices: &[usize]) -> Node<f64> {
    let g: f64 = indices.iter().map(|&i| grad[i]).sum();
    let h: f64 = indices.iter().map(|&i| hess[i]).sum();
    Node::Leaf {
        value: g / (h + LEAF_REGULARIZATION),
    }
}

fn grow_regression(
    x: &[FeatureVector],
    grad: &[f64],
    hess: &[f64],
    indices: Vec<usize>,
    depth_left: usize,
) -> Node<f64> {
    if depth_left == 0 || indices.len() < MIN_SAMPLES_SPLIT {
        return regression_leaf(grad, hess, &indices);
    }

    let total_g: f64 = indices.iter().map(|&i| grad[i]).sum();
    let total_h: f64 = indices.iter().map(|&i| hess[i]).sum();
    let parent_score = total_g * total_g / (total_h + LEAF_REGULARIZATION);

    let mut best: Option<BestSplit> = None;
    for feature in 0..FEATURE_COUNT {
        let mut sorted = indices.clone();
        sorted.sort_by(|&a, &b| {
            x[a][feature]
                .partial_cmp(&x[b][feature])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut left_g = 0.0;
        let mut left_h = 0.0;
        for pos in 1..sorted.len() {
            let moved = sorted[pos - 1];
            left_g += grad[moved];
            left_h += hess[moved];

            let prev = x[sorted[pos - 1]][feature];
            let next = x[sorted[pos]][feature];
            if next <= prev {
                continue;
            }

            let right_g = total_g - left_g;
            let right_h = total_h - left_h;
            let gain = left_g * left_g / (left_h + LEAF_REGULARIZATION)
                + right_g * right_g / (right_h + LEAF_REGULARIZATION)
                - parent_score;

            // Stored negated so the shared "lower is better" comparison works.
            if best.as_ref().is_none_or(|b| -gain < b.score) && gain > 1e-12 {
                best = Some(BestSplit {
                    feature,
                    threshold: (prev + next) / 2.0,
                    score: -gain,
                });
            }
        }
    }

    let Some(split) = best else {
        return regression_leaf(grad, hess, &indices);
    };

    let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
        .into_iter()
        .partition(|&i| x[i][split.feature] <= split.threshold);
    if left_idx.is_empty() || right_idx.is_empty() {
        let mut merged = left_idx;
        merged.extend(right_idx);
        return regression_leaf(grad, hess, &merged);
    }

    Node::Split {
        feature: split.feature,
        threshold: split.threshold,
        left: Box::new(grow_regression(x, grad, hess, left_idx, depth_left - 1)),
        right: Box::new(grow_regression(x, grad, hess, right_idx, depth_left - 1)),
    }
}

/// Multiclass gradient boosting: each round fits one regression tree per
/// class to the softmax gradient and shifts the class scores by a damped
/// Newton step.
pub struct GradientBoostedTrees {
    n_rounds: usize,
    learning_rate: f64,
    max_depth: usize,
    base_scores: [f64; CLASS_COUNT],
    rounds: Vec<[RegressionTree; CLASS_COUNT]>,
}

impl GradientBoostedTrees {
    pub fn new() -> Self {
        Self {
            n_rounds: 100,
            learning_rate: 0.1,
            max_depth: 6,
            base_scores: [0.0; CLASS_COUNT],
            rounds: Vec::new(),
        }
    }

    fn scores(&self, x: &FeatureVector) -> [f64; CLASS_COUNT] {
        let mut scores = self.base_scores;
        for round in &self.rounds {
            for k in 0..CLASS_COUNT {
                scores[k] += self.learning_rate * round[k].value(x);
            }
        }
        scores
    }
}

impl Default for GradientBoostedTrees {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeClassifier for GradientBoostedTrees {
    fn kind(&self) -> ModelKind {
        ModelKind::GradientBoosting
    }

    fn fit(&mut self, x: &[FeatureVector], y: &[Outcome]) -> Result<()> {
        check_training_shape(x, y)?;
        let n = x.len();

        // Class log-priors seed the scores so early rounds model residual
        // structure rather than the base rate.
        let mut counts = [0.0f64; CLASS_COUNT];
        for label in y {
            counts[label.label()] += 1.0;
        }
        for k in 0..CLASS_COUNT {
            self.base_scores[k] = (counts[k].max(1.0) / n as f64).ln();
        }
        self.rounds.clear();

        let mut scores: Vec<[f64; CLASS_COUNT]> = vec![self.base_scores; n];
        let indices: Vec<usize> = (0..n).collect();

        for _ in 0..self.n_rounds {
            let probs: Vec<[f64; CLASS_COUNT]> =
                scores.iter().map(|s| softmax(*s)).collect();

            let fit_class_tree = |k: usize| {
                let grad: Vec<f64> = probs
                    .iter()
                    .zip(y)
                    .map(|(p, label)| (if label.label() == k { 1.0 } else { 0.0 }) - p[k])
                    .collect();
                let hess: Vec<f64> = probs
                    .iter()
                    .map(|p| (p[k] * (1.0 - p[k])).max(1e-9))
                    .collect();
                RegressionTree::fit(x, &grad, &hess, indices.clone(), self.max_depth)
            };
            let round = [fit_class_tree(0), fit_class_tree(1), fit_class_tree(2)];

            for (i, row) in x.iter().enumerate() {
                for k in 0..CLASS_COUNT {
                    scores[i][k] += self.learning_rate * round[k].value(row);
                }
            }
            self.rounds.push(round);
        }

        Ok(())
    }

    fn predict_proba(&self, x: &[FeatureVector]) -> Vec<[f64; CLASS_COUNT]> {
        x.iter().map(|row| softmax(self.scores(row))).collect()
    }

    fn dump(&self) -> Value {
        json!({
            "model_type": "gradient_boosting",
            "input_dim": FEATURE_COUNT,
            "num_classes": CLASS_COUNT,
            "n_rounds": self.rounds.len(),
            "learning_rate": self.learning_rate,
            "max_depth": self.max_depth,
            "base_scores": self.base_scores.to_vec(),
            "rounds": serde_json::to_value(&self.rounds).unwrap_or(Value::Null),
        })
    }
}
