use anyhow::Result;

use matchcast::config::TrainingConfig;
use matchcast::dataset::CLASS_NAMES;
use matchcast::evaluate;
use matchcast::train;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let cfg = TrainingConfig::from_env();
    println!("matchcast training run");
    println!(
        "db: {}  leagues: {:?}  gate: {} samples",
        cfg.db_path.display(),
        cfg.leagues,
        cfg.min_samples
    );

    let summary = train::run_training(&cfg)?;

    println!(
        "\ndata: {} samples via {} stage",
        summary.samples,
        summary.stage.as_str()
    );
    println!(
        "class distribution: {}={} {}={} {}={}",
        CLASS_NAMES[0],
        summary.class_counts[0],
        CLASS_NAMES[1],
        summary.class_counts[1],
        CLASS_NAMES[2],
        summary.class_counts[2]
    );

    for trained in &summary.models {
        println!();
        print!(
            "{}",
            evaluate::format_model_report(trained.kind.key(), &trained.report)
        );
    }

    if let Some(report) = &summary.poisson {
        println!();
        print!("{}", evaluate::format_model_report("poisson_goals", report));
    }

    let results: Vec<_> = summary
        .models
        .iter()
        .map(|m| (m.kind.key().to_string(), m.report.clone()))
        .collect();
    println!();
    print!("{}", evaluate::comparison_report(&results));

    if let Some(best) = &summary.best_model {
        if let Some(trained) = summary.models.iter().find(|m| m.kind.key() == best.as_str()) {
            println!("\nconfidence buckets ({best}):");
            for bucket in &trained.confidence {
                println!(
                    "  {:.1}-{:.1}: {:>4} samples  acc {:.2}  avg conf {:.3}",
                    bucket.lo, bucket.hi, bucket.count, bucket.accuracy, bucket.avg_confidence
                );
            }
        }
    }

    if !summary.exported.is_empty() {
        println!("\nexported:");
        for path in &summary.exported {
            println!("  {}", path.display());
        }
    }
    println!("results: {}", cfg.results_path.display());

    if !summary.errors.is_empty() {
        println!("\nwarnings: {}", summary.errors.len());
        for err in summary.errors.iter().take(8) {
            println!("  - {err}");
        }
    }

    Ok(())
}
