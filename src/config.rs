use std::path::PathBuf;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};

use crate::backfill;
use crate::classifier::ModelKind;
use crate::store;

pub const DEFAULT_LEAGUES: [&str; 5] = ["PL", "PD", "BL1", "SA", "FL1"];
pub const DEFAULT_SEASONS: [u16; 2] = [2023, 2024];
pub const DEFAULT_MIN_SAMPLES: usize = 500;
pub const DEFAULT_MAX_SAMPLES: usize = 10_000;
pub const DEFAULT_LOOKBACK_DAYS: i64 = 730;
pub const DEFAULT_MIN_ACCURACY: f64 = 0.40;

/// Everything the training pipeline needs, passed in explicitly. The library
/// never reads the process environment itself; the binaries build this from
/// env vars and hand it over.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub random_state: u64,
    pub test_fraction: f64,
    /// Sample gate each acquisition stage must clear.
    pub min_samples: usize,
    pub max_samples: usize,
    pub synthetic_samples: usize,
    pub lookback_days: i64,
    pub leagues: Vec<String>,
    pub fetch_seasons: Vec<u16>,
    pub db_path: PathBuf,
    pub api_key: String,
    pub api_base_url: String,
    pub min_request_interval: Duration,
    pub model_dir: PathBuf,
    pub results_path: PathBuf,
    /// Models below this accuracy are not exported.
    pub min_accuracy_threshold: f64,
    pub models: Vec<ModelKind>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            random_state: 42,
            test_fraction: 0.2,
            min_samples: DEFAULT_MIN_SAMPLES,
            max_samples: DEFAULT_MAX_SAMPLES,
            synthetic_samples: crate::synthetic::DEFAULT_SAMPLES,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            leagues: DEFAULT_LEAGUES.iter().map(|s| s.to_string()).collect(),
            fetch_seasons: DEFAULT_SEASONS.to_vec(),
            db_path: store::default_db_path()
                .unwrap_or_else(|| PathBuf::from("matches.sqlite")),
            api_key: String::new(),
            api_base_url: backfill::DEFAULT_BASE_URL.to_string(),
            min_request_interval: backfill::MIN_REQUEST_INTERVAL,
            model_dir: PathBuf::from("models"),
            results_path: PathBuf::from("training_results.json"),
            min_accuracy_threshold: DEFAULT_MIN_ACCURACY,
            models: ModelKind::all().to_vec(),
        }
    }
}

impl TrainingConfig {
    /// Build a config from the environment, falling back to the documented
    /// defaults. Unparseable values fall back silently, matching how the
    /// rest of the tooling treats optional env knobs.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(key) = env_string("FOOTBALL_DATA_API_KEY") {
            cfg.api_key = key;
        }
        if let Some(url) = env_string("FOOTBALL_DATA_BASE_URL") {
            cfg.api_base_url = url;
        }
        if let Some(path) = env_string("TRAIN_DB_PATH") {
            cfg.db_path = PathBuf::from(path);
        }
        if let Some(dir) = env_string("TRAIN_MODEL_DIR") {
            cfg.model_dir = PathBuf::from(dir);
        }
        if let Some(path) = env_string("TRAIN_RESULTS_PATH") {
            cfg.results_path = PathBuf::from(path);
        }
        if let Some(leagues) = env_string("TRAIN_LEAGUES") {
            let parsed = parse_list(&leagues);
            if !parsed.is_empty() {
                cfg.leagues = parsed;
            }
        }
        if let Some(seasons) = env_string("TRAIN_SEASONS") {
            let parsed: Vec<u16> = parse_list(&seasons)
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            if !parsed.is_empty() {
                cfg.fetch_seasons = parsed;
            }
        }
        if let Some(models) = env_string("TRAIN_MODELS") {
            let parsed: Vec<ModelKind> = parse_list(&models)
                .iter()
                .filter_map(|s| ModelKind::parse(s))
                .collect();
            if !parsed.is_empty() {
                cfg.models = parsed;
            }
        }
        if let Some(n) = env_parse::<usize>("TRAIN_MIN_SAMPLES") {
            cfg.min_samples = n;
        }
        if let Some(n) = env_parse::<usize>("TRAIN_MAX_SAMPLES") {
            cfg.max_samples = n;
        }
        if let Some(n) = env_parse::<usize>("TRAIN_SYNTHETIC_SAMPLES") {
            cfg.synthetic_samples = n.max(1);
        }
        if let Some(n) = env_parse::<i64>("TRAIN_LOOKBACK_DAYS") {
            cfg.lookback_days = n.max(0);
        }
        if let Some(n) = env_parse::<u64>("TRAIN_RANDOM_STATE") {
            cfg.random_state = n;
        }

        cfg
    }

    /// Lower kickoff bound for the store query, as an RFC 3339 string.
    pub fn min_kickoff(&self) -> Option<String> {
        if self.lookback_days <= 0 {
            return None;
        }
        let cutoff = Utc::now() - ChronoDuration::days(self.lookback_days);
        Some(cutoff.to_rfc3339())
    }

    /// Every (league, season) combination the backfill should fetch.
    pub fn fetch_pairs(&self) -> Vec<(String, u16)> {
        let mut out = Vec::with_capacity(self.leagues.len() * self.fetch_seasons.len());
        for league in &self.leagues {
            for season in &self.fetch_seasons {
                out.push((league.clone(), *season));
            }
        }
        out
    }
}

fn env_string(key: &str) -> Option<String> {
    let raw = std::env::var(key).ok()?;
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env_string(key)?.parse().ok()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split([',', ';', ' '])
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .map(|part| part.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let cfg = TrainingConfig::default();
        assert_eq!(cfg.min_samples, 500);
        assert_eq!(cfg.max_samples, 10_000);
        assert_eq!(cfg.synthetic_samples, 5000);
        assert_eq!(cfg.leagues, vec!["PL", "PD", "BL1", "SA", "FL1"]);
        assert_eq!(cfg.models.len(), 3);
        assert!((cfg.min_accuracy_threshold - 0.40).abs() < 1e-12);
        assert_eq!(cfg.min_request_interval, Duration::from_secs(6));
    }

    #[test]
    fn fetch_pairs_cross_leagues_and_seasons() {
        let cfg = TrainingConfig {
            leagues: vec!["PL".to_string(), "SA".to_string()],
            fetch_seasons: vec![2023, 2024],
            ..TrainingConfig::default()
        };
        let pairs = cfg.fetch_pairs();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[0], ("PL".to_string(), 2023));
        assert_eq!(pairs[3], ("SA".to_string(), 2024));
    }

    #[test]
    fn min_kickoff_is_disabled_by_zero_lookback() {
        let cfg = TrainingConfig {
            lookback_days: 0,
            ..TrainingConfig::default()
        };
        assert!(cfg.min_kickoff().is_none());

        let cfg = TrainingConfig::default();
        let min = cfg.min_kickoff().unwrap();
        // RFC 3339 with a year prefix, comparable against stored kickoffs.
        assert!(min.len() > 10);
        assert!(min.starts_with('2'));
    }

    #[test]
    fn parse_list_splits_on_common_separators() {
        assert_eq!(parse_list("PL,PD; SA"), vec!["PL", "PD", "SA"]);
        assert!(parse_list("  ,; ").is_empty());
    }
}
