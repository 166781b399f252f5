use crate::dataset::{CLASS_NAMES, Outcome};

const LOG_LOSS_EPS: f64 = 1e-12;

/// Confidence bucket boundaries over the maximum predicted-class
/// probability. The final bucket includes 1.0.
pub const CONFIDENCE_BUCKETS: [(f64, f64); 5] = [
    (0.0, 0.4),
    (0.4, 0.5),
    (0.5, 0.6),
    (0.6, 0.7),
    (0.7, 1.0),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedAverages {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Full per-model metric bundle. Created once per trained model and used
/// read-only for comparison and export gating.
#[derive(Debug, Clone, Default)]
pub struct EvaluationReport {
    pub samples: usize,
    pub accuracy: f64,
    pub log_loss: f64,
    pub brier_score: f64,
    /// Rows are actual classes, columns predicted, both HOME/DRAW/AWAY.
    pub confusion: [[usize; 3]; 3],
    pub per_class: [ClassMetrics; 3],
    pub weighted: WeightedAverages,
}

/// Score one model's predictions. Mismatched or empty inputs yield the
/// zeroed report rather than a panic.
pub fn evaluate(y_true: &[Outcome], y_pred: &[Outcome], y_proba: &[[f64; 3]]) -> EvaluationReport {
    if y_true.is_empty() || y_true.len() != y_pred.len() || y_true.len() != y_proba.len() {
        return EvaluationReport::default();
    }

    let n = y_true.len() as f64;
    let mut correct = 0usize;
    let mut log_loss_sum = 0.0;
    let mut brier_sum = 0.0;
    let mut confusion = [[0usize; 3]; 3];

    for ((truth, pred), probs) in y_true.iter().zip(y_pred).zip(y_proba) {
        if truth == pred {
            correct += 1;
        }
        confusion[truth.label()][pred.label()] += 1;

        let true_prob = probs[truth.label()].clamp(LOG_LOSS_EPS, 1.0);
        log_loss_sum += -true_prob.ln();

        for k in 0..3 {
            let target = if truth.label() == k { 1.0 } else { 0.0 };
            brier_sum += (probs[k] - target).powi(2);
        }
    }

    let mut per_class = [ClassMetrics::default(); 3];
    for k in 0..3 {
        let support = confusion[k].iter().sum::<usize>();
        let predicted: usize = (0..3).map(|r| confusion[r][k]).sum();
        let hits = confusion[k][k] as f64;

        let precision = if predicted > 0 {
            hits / predicted as f64
        } else {
            0.0
        };
        let recall = if support > 0 { hits / support as f64 } else { 0.0 };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        per_class[k] = ClassMetrics {
            precision,
            recall,
            f1,
            support,
        };
    }

    let total_support: usize = per_class.iter().map(|c| c.support).sum();
    let weighted = if total_support > 0 {
        let w = |f: fn(&ClassMetrics) -> f64| {
            per_class
                .iter()
                .map(|c| f(c) * c.support as f64)
                .sum::<f64>()
                / total_support as f64
        };
        WeightedAverages {
            precision: w(|c| c.precision),
            recall: w(|c| c.recall),
            f1: w(|c| c.f1),
        }
    } else {
        WeightedAverages::default()
    };

    EvaluationReport {
        samples: y_true.len(),
        accuracy: correct as f64 / n,
        log_loss: log_loss_sum / n,
        brier_score: brier_sum / n,
        confusion,
        per_class,
        weighted,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ConfidenceBucket {
    pub lo: f64,
    pub hi: f64,
    pub count: usize,
    pub accuracy: f64,
    pub avg_confidence: f64,
}

/// Bucket samples by their maximum predicted-class probability and report
/// realized accuracy per bucket. Over-confidence shows up as buckets whose
/// accuracy trails their average confidence.
pub fn confidence_buckets(y_true: &[Outcome], y_proba: &[[f64; 3]]) -> Vec<ConfidenceBucket> {
    let mut counts = [0usize; CONFIDENCE_BUCKETS.len()];
    let mut hits = [0usize; CONFIDENCE_BUCKETS.len()];
    let mut confidence_sum = [0.0f64; CONFIDENCE_BUCKETS.len()];

    for (truth, probs) in y_true.iter().zip(y_proba) {
        let pred = Outcome::argmax(probs);
        let max_prob = probs[pred.label()];

        let last = CONFIDENCE_BUCKETS.len() - 1;
        for (b, (lo, hi)) in CONFIDENCE_BUCKETS.iter().enumerate() {
            let inside = max_prob >= *lo && (max_prob < *hi || (b == last && max_prob <= *hi));
            if inside {
                counts[b] += 1;
                confidence_sum[b] += max_prob;
                if pred == *truth {
                    hits[b] += 1;
                }
                break;
            }
        }
    }

    CONFIDENCE_BUCKETS
        .iter()
        .enumerate()
        .map(|(b, (lo, hi))| ConfidenceBucket {
            lo: *lo,
            hi: *hi,
            count: counts[b],
            accuracy: if counts[b] > 0 {
                hits[b] as f64 / counts[b] as f64
            } else {
                0.0
            },
            avg_confidence: if counts[b] > 0 {
                confidence_sum[b] / counts[b] as f64
            } else {
                0.0
            },
        })
        .collect()
}

/// Detailed single-model report for terminal output.
pub fn format_model_report(name: &str, report: &EvaluationReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("== {name} ==\n"));
    out.push_str(&format!(
        "accuracy {:.4}  log-loss {:.4}  brier {:.4}  ({} samples)\n",
        report.accuracy, report.log_loss, report.brier_score, report.samples
    ));
    out.push_str("class  precision  recall   f1       support\n");
    for (k, class) in report.per_class.iter().enumerate() {
        out.push_str(&format!(
            "{:<6} {:.4}     {:.4}   {:.4}   {}\n",
            CLASS_NAMES[k], class.precision, class.recall, class.f1, class.support
        ));
    }
    out.push_str(&format!(
        "wavg   {:.4}     {:.4}   {:.4}\n",
        report.weighted.precision, report.weighted.recall, report.weighted.f1
    ));
    out.push_str("confusion (rows actual, cols predicted):\n");
    for (k, row) in report.confusion.iter().enumerate() {
        out.push_str(&format!(
            "{:<5} {:>5} {:>5} {:>5}\n",
            CLASS_NAMES[k], row[0], row[1], row[2]
        ));
    }
    out
}

/// Side-by-side comparison naming the best model by accuracy.
pub fn comparison_report(results: &[(String, EvaluationReport)]) -> String {
    let mut out = String::new();
    out.push_str("model                 accuracy  log_loss  brier\n");
    for (name, report) in results {
        out.push_str(&format!(
            "{name:<20}  {:.4}    {:.4}    {:.4}\n",
            report.accuracy, report.log_loss, report.brier_score
        ));
    }
    let best = results
        .iter()
        .max_by(|a, b| a.1.accuracy.total_cmp(&b.1.accuracy));
    if let Some((name, report)) = best {
        out.push_str(&format!(
            "best by accuracy: {name} ({:.4})\n",
            report.accuracy
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_hot(outcome: Outcome) -> [f64; 3] {
        let mut row = [0.0; 3];
        row[outcome.label()] = 1.0;
        row
    }

    #[test]
    fn perfect_predictions_have_zero_brier_and_log_loss() {
        let truth = vec![Outcome::Home, Outcome::Draw, Outcome::Away];
        let proba: Vec<[f64; 3]> = truth.iter().map(|o| one_hot(*o)).collect();
        let preds = truth.clone();

        let report = evaluate(&truth, &preds, &proba);
        assert_eq!(report.samples, 3);
        assert!((report.accuracy - 1.0).abs() < 1e-12);
        assert!(report.brier_score < 1e-12);
        assert!(report.log_loss < 1e-9);
    }

    #[test]
    fn uniform_predictions_score_two_thirds_brier() {
        let truth = vec![Outcome::Home, Outcome::Draw, Outcome::Away, Outcome::Home];
        let proba = vec![[1.0 / 3.0; 3]; truth.len()];
        let preds: Vec<Outcome> = proba.iter().map(Outcome::argmax).collect();

        let report = evaluate(&truth, &preds, &proba);
        assert!((report.brier_score - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.log_loss - 3.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn confusion_matrix_is_actual_by_predicted() {
        let truth = vec![Outcome::Home, Outcome::Home, Outcome::Away];
        let preds = vec![Outcome::Draw, Outcome::Home, Outcome::Away];
        let proba: Vec<[f64; 3]> = preds.iter().map(|o| one_hot(*o)).collect();

        let report = evaluate(&truth, &preds, &proba);
        assert_eq!(report.confusion[0][1], 1);
        assert_eq!(report.confusion[0][0], 1);
        assert_eq!(report.confusion[2][2], 1);
        assert_eq!(report.per_class[0].support, 2);
        assert_eq!(report.per_class[1].support, 0);
    }

    #[test]
    fn per_class_precision_recall_and_weighted_average() {
        // Home: 2 of 2 recalled, 2 of 3 predicted-home correct.
        let truth = vec![
            Outcome::Home,
            Outcome::Home,
            Outcome::Draw,
            Outcome::Away,
        ];
        let preds = vec![
            Outcome::Home,
            Outcome::Home,
            Outcome::Home,
            Outcome::Away,
        ];
        let proba: Vec<[f64; 3]> = preds.iter().map(|o| one_hot(*o)).collect();
        let report = evaluate(&truth, &preds, &proba);

        let home = report.per_class[0];
        assert!((home.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((home.recall - 1.0).abs() < 1e-12);
        let draw = report.per_class[1];
        assert!((draw.precision - 0.0).abs() < 1e-12);
        assert!((draw.recall - 0.0).abs() < 1e-12);

        let expected_weighted_recall =
            (1.0 * 2.0 + 0.0 * 1.0 + 1.0 * 1.0) / 4.0;
        assert!((report.weighted.recall - expected_weighted_recall).abs() < 1e-12);
    }

    #[test]
    fn mismatched_inputs_yield_zeroed_report() {
        let report = evaluate(&[Outcome::Home], &[], &[]);
        assert_eq!(report.samples, 0);
        assert_eq!(report.accuracy, 0.0);
    }

    #[test]
    fn bucket_edges_route_correctly() {
        let truth = vec![Outcome::Home, Outcome::Home, Outcome::Home];
        let proba = vec![
            // Max prob 0.4 lands in the second bucket (lower bound closed).
            [0.4, 0.3, 0.3],
            // Max prob 0.55 lands in the third bucket.
            [0.55, 0.25, 0.2],
            // Certainty lands in the last, inclusive bucket.
            [1.0, 0.0, 0.0],
        ];
        let buckets = confidence_buckets(&truth, &proba);
        assert_eq!(buckets.len(), 5);
        assert_eq!(buckets[1].count, 1);
        assert_eq!(buckets[2].count, 1);
        assert_eq!(buckets[4].count, 1);
        assert!((buckets[4].accuracy - 1.0).abs() < 1e-12);
        assert_eq!(
            buckets.iter().map(|b| b.count).sum::<usize>(),
            truth.len()
        );
    }

    #[test]
    fn comparison_report_names_best_model() {
        let weak = EvaluationReport {
            accuracy: 0.41,
            ..EvaluationReport::default()
        };
        let strong = EvaluationReport {
            accuracy: 0.53,
            ..EvaluationReport::default()
        };
        let text = comparison_report(&[
            ("logistic".to_string(), weak),
            ("random_forest".to_string(), strong),
        ]);
        assert!(text.contains("best by accuracy: random_forest"));
    }
}
