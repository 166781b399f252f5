use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{Value, json};

use crate::classifier::{CLASS_COUNT, OutcomeClassifier};
use crate::dataset::CLASS_NAMES;
use crate::evaluate::EvaluationReport;
use crate::features::{FEATURE_COUNT, FEATURE_NAMES};

const ARTIFACT_VERSION: &str = "1.0.0";

#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub dump_path: PathBuf,
    pub metadata_path: PathBuf,
}

/// Write one model's inference dump and metadata sidecar. Both writes go
/// through a temp file and rename, so a failure leaves no partial artifact.
pub fn export_model(
    dir: &Path,
    model: &dyn OutcomeClassifier,
    report: &EvaluationReport,
) -> Result<ModelArtifacts> {
    fs::create_dir_all(dir)
        .with_context(|| format!("create model dir {}", dir.display()))?;

    let key = model.kind().key();
    let model_name = format!("{key}_v1");

    let dump_path = dir.join(format!("{model_name}.json"));
    write_json_atomic(&dump_path, &model.dump())
        .with_context(|| format!("write model dump for {model_name}"))?;

    let metadata = json!({
        "model_name": model_name,
        "model_type": key,
        "version": ARTIFACT_VERSION,
        "created_at": Utc::now().to_rfc3339(),
        "input_dim": FEATURE_COUNT,
        "num_classes": CLASS_COUNT,
        "metrics": {
            "accuracy": report.accuracy,
            "brier_score": report.brier_score,
            "log_loss": report.log_loss,
        },
        "features": {
            "count": FEATURE_COUNT,
            "names": FEATURE_NAMES.to_vec(),
        },
        "classes": CLASS_NAMES.to_vec(),
    });

    let metadata_path = dir.join(format!("{model_name}_metadata.json"));
    write_json_atomic(&metadata_path, &metadata)
        .with_context(|| format!("write metadata for {model_name}"))?;

    Ok(ModelArtifacts {
        dump_path,
        metadata_path,
    })
}

/// Summary JSON keyed by model name, `{accuracy, log_loss}` per entry.
pub fn write_training_results(
    path: &Path,
    results: &[(String, EvaluationReport)],
) -> Result<()> {
    let mut summary = serde_json::Map::new();
    for (name, report) in results {
        summary.insert(
            name.clone(),
            json!({
                "accuracy": report.accuracy,
                "log_loss": report.log_loss,
            }),
        );
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create results dir {}", parent.display()))?;
    }
    write_json_atomic(path, &Value::Object(summary)).context("write training results")
}

fn write_json_atomic(path: &Path, value: &Value) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("serialize json artifact")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("swap {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::SoftmaxRegression;

    fn temp_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("matchcast_export_{tag}_{}", std::process::id()))
    }

    #[test]
    fn export_writes_dump_and_metadata() {
        let dir = temp_dir("model");
        let model = SoftmaxRegression::new();
        let report = EvaluationReport {
            samples: 10,
            accuracy: 0.5,
            log_loss: 1.0,
            brier_score: 0.6,
            ..EvaluationReport::default()
        };

        let artifacts = export_model(&dir, &model, &report).unwrap();
        let dump: Value =
            serde_json::from_str(&fs::read_to_string(&artifacts.dump_path).unwrap()).unwrap();
        assert_eq!(dump["model_type"], "logistic_regression");

        let meta: Value =
            serde_json::from_str(&fs::read_to_string(&artifacts.metadata_path).unwrap()).unwrap();
        assert_eq!(meta["model_name"], "logistic_v1");
        assert_eq!(meta["input_dim"], FEATURE_COUNT);
        assert_eq!(meta["classes"], json!(["HOME", "DRAW", "AWAY"]));
        assert_eq!(meta["features"]["count"], FEATURE_COUNT);
        assert_eq!(
            meta["features"]["names"].as_array().unwrap().len(),
            FEATURE_COUNT
        );
        assert!((meta["metrics"]["accuracy"].as_f64().unwrap() - 0.5).abs() < 1e-12);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn training_results_are_keyed_by_model() {
        let dir = temp_dir("results");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("training_results.json");

        let results = vec![
            (
                "logistic".to_string(),
                EvaluationReport {
                    accuracy: 0.48,
                    log_loss: 1.02,
                    ..EvaluationReport::default()
                },
            ),
            (
                "random_forest".to_string(),
                EvaluationReport {
                    accuracy: 0.53,
                    log_loss: 0.98,
                    ..EvaluationReport::default()
                },
            ),
        ];
        write_training_results(&path, &results).unwrap();

        let value: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert!((value["logistic"]["accuracy"].as_f64().unwrap() - 0.48).abs() < 1e-12);
        assert!((value["random_forest"]["log_loss"].as_f64().unwrap() - 0.98).abs() < 1e-12);

        fs::remove_dir_all(&dir).ok();
    }
}
