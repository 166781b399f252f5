use anyhow::{Result, bail};
use serde_json::{Value, json};

use crate::dataset::Outcome;
use crate::features::{FEATURE_COUNT, FeatureVector};
use crate::tree::{GradientBoostedTrees, RandomForest};

pub const CLASS_COUNT: usize = 3;

/// Model families available to the trainer. The family is chosen at
/// configuration time; nothing downstream inspects the concrete type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Logistic,
    RandomForest,
    GradientBoosting,
}

impl ModelKind {
    pub fn all() -> [ModelKind; 3] {
        [
            ModelKind::Logistic,
            ModelKind::RandomForest,
            ModelKind::GradientBoosting,
        ]
    }

    pub fn key(self) -> &'static str {
        match self {
            ModelKind::Logistic => "logistic",
            ModelKind::RandomForest => "random_forest",
            ModelKind::GradientBoosting => "gradient_boosting",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "logistic" | "logistic_regression" => Some(ModelKind::Logistic),
            "random_forest" | "forest" => Some(ModelKind::RandomForest),
            "gradient_boosting" | "boosting" => Some(ModelKind::GradientBoosting),
            _ => None,
        }
    }
}

/// The uniform capability contract every model family implements:
/// fit on a labeled matrix, predict labels, predict probability rows
/// summing to one.
pub trait OutcomeClassifier {
    fn kind(&self) -> ModelKind;

    fn fit(&mut self, x: &[FeatureVector], y: &[Outcome]) -> Result<()>;

    fn predict_proba(&self, x: &[FeatureVector]) -> Vec<[f64; CLASS_COUNT]>;

    fn predict(&self, x: &[FeatureVector]) -> Vec<Outcome> {
        self.predict_proba(x)
            .iter()
            .map(Outcome::argmax)
            .collect()
    }

    /// Native coefficient/tree dump for the export sidecar. Always includes
    /// a `model_type` discriminator.
    fn dump(&self) -> Value;
}

pub fn build_classifier(kind: ModelKind, random_state: u64) -> Box<dyn OutcomeClassifier> {
    match kind {
        ModelKind::Logistic => Box::new(SoftmaxRegression::new()),
        ModelKind::RandomForest => Box::new(RandomForest::new(random_state)),
        ModelKind::GradientBoosting => Box::new(GradientBoostedTrees::new()),
    }
}

pub(crate) fn check_training_shape(x: &[FeatureVector], y: &[Outcome]) -> Result<()> {
    if x.is_empty() {
        bail!("cannot fit on an empty dataset");
    }
    if x.len() != y.len() {
        bail!(
            "feature rows ({}) and labels ({}) differ in length",
            x.len(),
            y.len()
        );
    }
    Ok(())
}

/// Multinomial logistic regression trained with full-batch gradient descent
/// on standardized features. Weights start at zero, so an unfitted model
/// predicts the uniform distribution.
pub struct SoftmaxRegression {
    learning_rate: f64,
    epochs: usize,
    l2: f64,
    weights: Vec<[f64; CLASS_COUNT]>,
    bias: [f64; CLASS_COUNT],
    means: [f64; FEATURE_COUNT],
    stds: [f64; FEATURE_COUNT],
}

impl SoftmaxRegression {
    pub fn new() -> Self {
        Self {
            learning_rate: 0.1,
            epochs: 300,
            l2: 1e-3,
            weights: vec![[0.0; CLASS_COUNT]; FEATURE_COUNT],
            bias: [0.0; CLASS_COUNT],
            means: [0.0; FEATURE_COUNT],
            stds: [1.0; FEATURE_COUNT],
        }
    }

    fn standardize(&self, x: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            out[i] = (x[i] - self.means[i]) / self.stds[i];
        }
        out
    }

    fn logits(&self, z: &FeatureVector) -> [f64; CLASS_COUNT] {
        let mut scores = self.bias;
        for (i, v) in z.iter().enumerate() {
            for k in 0..CLASS_COUNT {
                scores[k] += self.weights[i][k] * v;
            }
        }
        scores
    }
}

impl Default for SoftmaxRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl OutcomeClassifier for SoftmaxRegression {
    fn kind(&self) -> ModelKind {
        ModelKind::Logistic
    }

    fn fit(&mut self, x: &[FeatureVector], y: &[Outcome]) -> Result<()> {
        check_training_shape(x, y)?;
        let n = x.len() as f64;

        // Standardization parameters are learned on the training matrix and
        // become part of the model.
        for i in 0..FEATURE_COUNT {
            let mean = x.iter().map(|row| row[i]).sum::<f64>() / n;
            let var = x.iter().map(|row| (row[i] - mean).powi(2)).sum::<f64>() / n;
            self.means[i] = mean;
            self.stds[i] = var.sqrt().max(1e-9);
        }
        let standardized: Vec<FeatureVector> = x.iter().map(|row| self.standardize(row)).collect();

        self.weights = vec![[0.0; CLASS_COUNT]; FEATURE_COUNT];
        self.bias = [0.0; CLASS_COUNT];

        for _ in 0..self.epochs {
            let mut grad_w = vec![[0.0f64; CLASS_COUNT]; FEATURE_COUNT];
            let mut grad_b = [0.0f64; CLASS_COUNT];

            for (row, label) in standardized.iter().zip(y) {
                let probs = softmax(self.logits(row));
                for k in 0..CLASS_COUNT {
                    let err = probs[k] - if label.label() == k { 1.0 } else { 0.0 };
                    grad_b[k] += err;
                    for (i, v) in row.iter().enumerate() {
                        grad_w[i][k] += err * v;
                    }
                }
            }

            for i in 0..FEATURE_COUNT {
                for k in 0..CLASS_COUNT {
                    let g = grad_w[i][k] / n + self.l2 * self.weights[i][k];
                    self.weights[i][k] -= self.learning_rate * g;
                }
            }
            for k in 0..CLASS_COUNT {
                self.bias[k] -= self.learning_rate * grad_b[k] / n;
            }
        }

        Ok(())
    }

    fn predict_proba(&self, x: &[FeatureVector]) -> Vec<[f64; CLASS_COUNT]> {
        x.iter()
            .map(|row| softmax(self.logits(&self.standardize(row))))
            .collect()
    }

    fn dump(&self) -> Value {
        // Coefficients are stored class-major to match the exported
        // [class][feature] layout.
        let coefficients: Vec<Vec<f64>> = (0..CLASS_COUNT)
            .map(|k| self.weights.iter().map(|w| w[k]).collect())
            .collect();
        json!({
            "model_type": "logistic_regression",
            "input_dim": FEATURE_COUNT,
            "num_classes": CLASS_COUNT,
            "coefficients": coefficients,
            "intercepts": self.bias.to_vec(),
            "feature_means": self.means.to_vec(),
            "feature_stds": self.stds.to_vec(),
        })
    }
}

pub(crate) fn softmax(scores: [f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut out = [0.0; CLASS_COUNT];
    let mut sum = 0.0;
    for k in 0..CLASS_COUNT {
        out[k] = (scores[k] - max).exp();
        sum += out[k];
    }
    for v in &mut out {
        *v /= sum.max(1e-12);
    }
    out
}
