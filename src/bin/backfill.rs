use anyhow::{Context, Result, anyhow};

use matchcast::backfill::{self, HistoricalDataClient};
use matchcast::config::TrainingConfig;
use matchcast::store;

/// Standalone backfill: fetch the configured (league, season) pairs from the
/// remote historical source and upsert them into the local store.
fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    let mut cfg = TrainingConfig::from_env();
    if let Some(leagues) = parse_list_arg("--leagues") {
        cfg.leagues = leagues;
    }
    if let Some(seasons) = parse_list_arg("--seasons") {
        let parsed: Vec<u16> = seasons.iter().filter_map(|s| s.parse().ok()).collect();
        if !parsed.is_empty() {
            cfg.fetch_seasons = parsed;
        }
    }
    if let Some(db) = parse_value_arg("--db") {
        cfg.db_path = db.into();
    }

    let mut client = HistoricalDataClient::new(
        cfg.api_key.clone(),
        cfg.api_base_url.clone(),
        cfg.min_request_interval,
    );
    if !client.can_fetch() {
        return Err(anyhow!(
            "FOOTBALL_DATA_API_KEY is not set; nothing to fetch"
        ));
    }

    let pairs = cfg.fetch_pairs();
    if pairs.is_empty() {
        return Err(anyhow!("no league/season pairs resolved"));
    }

    let mut conn = store::open_db(&cfg.db_path).context("open match store")?;
    let summary = backfill::backfill_finished_matches(&mut conn, &mut client, &pairs);

    println!("backfill complete");
    println!("db: {}", cfg.db_path.display());
    println!(
        "seasons: {}/{}  matches upserted: {}",
        summary.seasons_succeeded, summary.seasons_total, summary.matches_upserted
    );
    println!(
        "finished matches in store: {}",
        store::count_finished_matches(&conn)?
    );
    if !summary.errors.is_empty() {
        println!("errors: {}", summary.errors.len());
        for err in summary.errors.iter().take(6) {
            println!("  - {err}");
        }
    }

    Ok(())
}

fn parse_value_arg(flag: &str) -> Option<String> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let prefix = format!("{flag}=");
    for (idx, arg) in args.iter().enumerate() {
        if let Some(value) = arg.strip_prefix(&prefix) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
        if arg == flag
            && let Some(next) = args.get(idx + 1)
            && !next.trim().is_empty()
        {
            return Some(next.trim().to_string());
        }
    }
    None
}

fn parse_list_arg(flag: &str) -> Option<Vec<String>> {
    let raw = parse_value_arg(flag)?;
    let items: Vec<String> = raw
        .split([',', ';', ' '])
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .collect();
    if items.is_empty() { None } else { Some(items) }
}
