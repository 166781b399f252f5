use std::path::PathBuf;

use anyhow::Result;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::acquire::{self, AcquisitionStage};
use crate::classifier::{self, ModelKind, OutcomeClassifier};
use crate::config::TrainingConfig;
use crate::dataset::Outcome;
use crate::evaluate::{self, ConfidenceBucket, EvaluationReport};
use crate::export;
use crate::features::FeatureVector;
use crate::poisson::PoissonGoalsModel;

pub struct TrainedModel {
    pub kind: ModelKind,
    pub report: EvaluationReport,
    pub confidence: Vec<ConfidenceBucket>,
    pub model: Box<dyn OutcomeClassifier>,
}

pub struct TrainingRunSummary {
    pub stage: AcquisitionStage,
    pub samples: usize,
    pub class_counts: [usize; 3],
    pub models: Vec<TrainedModel>,
    /// Poisson baseline scored on the same held-out split, when real store
    /// data (and so goal history) was available.
    pub poisson: Option<EvaluationReport>,
    pub best_model: Option<String>,
    pub exported: Vec<PathBuf>,
    pub errors: Vec<String>,
}

struct Split {
    train_x: Vec<FeatureVector>,
    train_y: Vec<Outcome>,
    test_x: Vec<FeatureVector>,
    test_y: Vec<Outcome>,
}

/// Sequence the full pipeline: acquisition, split, fit and evaluate every
/// configured family, export the survivors, write the summary file.
pub fn run_training(cfg: &TrainingConfig) -> Result<TrainingRunSummary> {
    let acquisition = acquire::acquire_training_data(cfg);
    let mut errors = acquisition.errors.clone();

    let split = split_dataset(
        &acquisition.dataset.features,
        &acquisition.dataset.labels,
        cfg.test_fraction,
        cfg.random_state,
    );

    let mut models: Vec<TrainedModel> = Vec::new();
    for kind in &cfg.models {
        let mut model = classifier::build_classifier(*kind, cfg.random_state);
        if let Err(err) = model.fit(&split.train_x, &split.train_y) {
            let msg = format!("{} fit failed: {err:#}", kind.key());
            eprintln!("warning: {msg}");
            errors.push(msg);
            continue;
        }

        let y_pred = model.predict(&split.test_x);
        let y_proba = model.predict_proba(&split.test_x);
        let report = evaluate::evaluate(&split.test_y, &y_pred, &y_proba);
        let confidence = evaluate::confidence_buckets(&split.test_y, &y_proba);

        models.push(TrainedModel {
            kind: *kind,
            report,
            confidence,
            model,
        });
    }

    let poisson = acquisition
        .goal_history
        .as_ref()
        .map(|(home, away)| evaluate_poisson_baseline(home, away, &split));

    let best_model = models
        .iter()
        .max_by(|a, b| a.report.accuracy.total_cmp(&b.report.accuracy))
        .map(|m| m.kind.key().to_string());

    let mut exported = Vec::new();
    for trained in &models {
        if trained.report.accuracy < cfg.min_accuracy_threshold {
            errors.push(format!(
                "{} accuracy {:.4} below export threshold {:.2}",
                trained.kind.key(),
                trained.report.accuracy,
                cfg.min_accuracy_threshold
            ));
            continue;
        }
        match export::export_model(&cfg.model_dir, trained.model.as_ref(), &trained.report) {
            Ok(artifacts) => {
                exported.push(artifacts.dump_path);
                exported.push(artifacts.metadata_path);
            }
            Err(err) => {
                // One family failing to export must not block the others.
                let msg = format!("{} export failed: {err:#}", trained.kind.key());
                eprintln!("warning: {msg}");
                errors.push(msg);
            }
        }
    }

    let results: Vec<(String, EvaluationReport)> = models
        .iter()
        .map(|m| (m.kind.key().to_string(), m.report.clone()))
        .collect();
    if let Err(err) = export::write_training_results(&cfg.results_path, &results) {
        let msg = format!("training results write failed: {err:#}");
        eprintln!("warning: {msg}");
        errors.push(msg);
    }

    Ok(TrainingRunSummary {
        stage: acquisition.stage,
        samples: acquisition.dataset.len(),
        class_counts: acquisition.dataset.class_counts(),
        models,
        poisson,
        best_model,
        exported,
        errors,
    })
}

/// Seeded shuffle split; the test side holds `test_fraction` of the rows,
/// at least one when there are at least two.
fn split_dataset(
    x: &[FeatureVector],
    y: &[Outcome],
    test_fraction: f64,
    seed: u64,
) -> Split {
    let n = x.len();
    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let mut test_len = (n as f64 * test_fraction.clamp(0.0, 0.5)).round() as usize;
    if n >= 2 {
        test_len = test_len.clamp(1, n - 1);
    } else {
        test_len = 0;
    }

    let (test_idx, train_idx) = indices.split_at(test_len);
    Split {
        train_x: train_idx.iter().map(|&i| x[i]).collect(),
        train_y: train_idx.iter().map(|&i| y[i]).collect(),
        test_x: test_idx.iter().map(|&i| x[i]).collect(),
        test_y: test_idx.iter().map(|&i| y[i]).collect(),
    }
}

/// Fit the closed-form goals model on the store's goal sequences and score
/// its outcome probabilities on the held-out rows. The league positions
/// ride in feature slots 6 and 7.
fn evaluate_poisson_baseline(
    home_goals: &[f64],
    away_goals: &[f64],
    split: &Split,
) -> EvaluationReport {
    let model = PoissonGoalsModel::fit(home_goals, away_goals);
    let y_proba: Vec<[f64; 3]> = split
        .test_x
        .iter()
        .map(|row| {
            let home_position = row[6].round().max(1.0) as u32;
            let away_position = row[7].round().max(1.0) as u32;
            model.outcome_probs(home_position, away_position)
        })
        .collect();
    let y_pred: Vec<Outcome> = y_proba.iter().map(Outcome::argmax).collect();
    evaluate::evaluate(&split.test_y, &y_pred, &y_proba)
}
