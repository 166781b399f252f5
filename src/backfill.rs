use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use rusqlite::Connection;
use serde_json::Value;

use crate::store::{self, StoredMatchRow, StoredTeam};

pub const DEFAULT_BASE_URL: &str = "https://api.football-data.org/v4";
/// Minimum spacing between remote requests, per the provider's free-tier
/// quota.
pub const MIN_REQUEST_INTERVAL: Duration = Duration::from_secs(6);

const REQUEST_TIMEOUT_SECS: u64 = 10;
const AUTH_HEADER: &str = "X-Auth-Token";

static CLIENT: OnceCell<Client> = OnceCell::new();

fn http_client() -> Result<&'static Client> {
    CLIENT.get_or_try_init(|| {
        Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("failed to build http client")
    })
}

/// Blocks the caller until at least the configured interval has elapsed
/// since the previous request.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    pub fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                std::thread::sleep(self.min_interval - elapsed);
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// Season-level match fetcher for the historical results API. The credential
/// and endpoint are injected; an empty credential disables fetching.
pub struct HistoricalDataClient {
    api_key: String,
    base_url: String,
    limiter: RateLimiter,
}

/// One remote match, already mapped onto store rows.
#[derive(Debug, Clone)]
pub struct RemoteMatch {
    pub row: StoredMatchRow,
    pub home: StoredTeam,
    pub away: StoredTeam,
}

#[derive(Debug, Clone, Default)]
pub struct BackfillSummary {
    pub seasons_total: usize,
    pub seasons_succeeded: usize,
    pub matches_upserted: usize,
    pub errors: Vec<String>,
}

impl HistoricalDataClient {
    pub fn new(api_key: String, base_url: String, min_interval: Duration) -> Self {
        let base_url = if base_url.trim().is_empty() {
            DEFAULT_BASE_URL.to_string()
        } else {
            base_url.trim_end_matches('/').to_string()
        };
        Self {
            api_key,
            base_url,
            limiter: RateLimiter::new(min_interval),
        }
    }

    pub fn can_fetch(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn fetch_season(&mut self, league_code: &str, season_year: u16) -> Result<Vec<RemoteMatch>> {
        if !self.can_fetch() {
            return Err(anyhow!("no api credential configured"));
        }
        let url = format!(
            "{}/competitions/{league_code}/matches?season={season_year}&status=FINISHED",
            self.base_url
        );

        self.limiter.wait();
        let resp = http_client()?
            .get(&url)
            .header(AUTH_HEADER, self.api_key.as_str())
            .send()
            .with_context(|| format!("request {league_code} season {season_year} failed"))?;
        let status = resp.status();
        let body = resp.text().context("failed reading response body")?;
        if !status.is_success() {
            return Err(anyhow!("http {status}: {body}"));
        }

        let value: Value =
            serde_json::from_str(body.trim()).context("invalid season matches json")?;
        Ok(parse_season_matches(&value, league_code, season_year))
    }
}

/// Fetch each (league, season) pair and upsert the results, one transaction
/// per pair. A failed pair rolls back and the loop continues; the summary
/// carries the error messages.
pub fn backfill_finished_matches(
    conn: &mut Connection,
    client: &mut HistoricalDataClient,
    pairs: &[(String, u16)],
) -> BackfillSummary {
    let mut summary = BackfillSummary {
        seasons_total: pairs.len(),
        ..BackfillSummary::default()
    };

    for (league_code, season_year) in pairs {
        match backfill_one_season(conn, client, league_code, *season_year) {
            Ok(upserted) => {
                summary.seasons_succeeded += 1;
                summary.matches_upserted += upserted;
            }
            Err(err) => {
                let msg = format!("{league_code} season {season_year}: {err:#}");
                eprintln!("warning: backfill {msg}");
                summary.errors.push(msg);
            }
        }
    }

    summary
}

fn backfill_one_season(
    conn: &mut Connection,
    client: &mut HistoricalDataClient,
    league_code: &str,
    season_year: u16,
) -> Result<usize> {
    let matches = client.fetch_season(league_code, season_year)?;
    if matches.is_empty() {
        return Ok(0);
    }

    // The transaction rolls back on drop if any upsert fails.
    let tx = conn.transaction().context("begin backfill transaction")?;
    let mut upserted = 0usize;
    for m in &matches {
        store::upsert_team(&tx, &m.home)?;
        store::upsert_team(&tx, &m.away)?;
        store::upsert_match(&tx, &m.row)?;
        upserted += 1;
    }
    tx.commit().context("commit backfill transaction")?;
    Ok(upserted)
}

pub fn parse_season_matches(value: &Value, league_code: &str, season_year: u16) -> Vec<RemoteMatch> {
    let Some(matches) = value.get("matches").and_then(|v| v.as_array()) else {
        return Vec::new();
    };
    matches
        .iter()
        .filter_map(|m| parse_remote_match(m, league_code, season_year))
        .collect()
}

fn parse_remote_match(v: &Value, fallback_league: &str, fallback_season: u16) -> Option<RemoteMatch> {
    let match_id = v.get("id")?.as_u64()?;
    let utc_kickoff = v.get("utcDate")?.as_str()?.to_string();
    let status = v
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("UNKNOWN")
        .to_string();
    let matchday = v.get("matchday").and_then(|m| m.as_i64());

    let league_code = v
        .get("competition")
        .and_then(|c| c.get("code"))
        .and_then(|c| c.as_str())
        .unwrap_or(fallback_league)
        .to_string();

    let home = parse_remote_team(v.get("homeTeam")?, &league_code)?;
    let away = parse_remote_team(v.get("awayTeam")?, &league_code)?;

    let score = v.get("score");
    let (home_goals, away_goals) = score_pair(score, "fullTime");
    let (home_ht_goals, away_ht_goals) = score_pair(score, "halfTime");
    let (home_et_goals, away_et_goals) = score_pair(score, "extraTime");
    let (home_penalties, away_penalties) = score_pair(score, "penalties");

    let row = StoredMatchRow {
        match_id,
        league_code,
        season: season_label(v, fallback_season),
        utc_kickoff,
        matchday,
        status,
        home_team_id: home.team_id,
        away_team_id: away.team_id,
        home_goals,
        away_goals,
        home_ht_goals,
        away_ht_goals,
        home_et_goals,
        away_et_goals,
        home_penalties,
        away_penalties,
    };

    Some(RemoteMatch { row, home, away })
}

fn parse_remote_team(v: &Value, league_code: &str) -> Option<StoredTeam> {
    let team_id = v.get("id")?.as_u64().and_then(|n| u32::try_from(n).ok())?;
    let name = v.get("name")?.as_str()?.to_string();
    if name.is_empty() {
        return None;
    }
    Some(StoredTeam {
        team_id,
        name,
        short_name: v
            .get("shortName")
            .and_then(|s| s.as_str())
            .map(|s| s.to_string()),
        tla: v.get("tla").and_then(|s| s.as_str()).map(|s| s.to_string()),
        league_code: Some(league_code.to_string()),
    })
}

fn score_pair(score: Option<&Value>, period: &str) -> (Option<i32>, Option<i32>) {
    let Some(pair) = score.and_then(|s| s.get(period)) else {
        return (None, None);
    };
    let get = |side: &str| {
        pair.get(side)
            .and_then(|v| v.as_i64())
            .and_then(|n| i32::try_from(n).ok())
    };
    (get("home"), get("away"))
}

/// "2024/2025" from the season's start and end dates, else the requested
/// year.
fn season_label(v: &Value, fallback: u16) -> String {
    let season = v.get("season");
    let year = |key: &str| {
        season
            .and_then(|s| s.get(key))
            .and_then(|d| d.as_str())
            .and_then(|d| d.get(..4))
            .map(|y| y.to_string())
    };
    match (year("startDate"), year("endDate")) {
        (Some(start), Some(end)) => format!("{start}/{end}"),
        _ => fallback.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_match() -> Value {
        json!({
            "id": 501234,
            "utcDate": "2024-08-17T14:00:00Z",
            "status": "FINISHED",
            "matchday": 1,
            "season": {"startDate": "2024-08-16", "endDate": "2025-05-25"},
            "competition": {"id": 2021, "code": "PL", "name": "Premier League"},
            "homeTeam": {"id": 57, "name": "Arsenal FC", "shortName": "Arsenal", "tla": "ARS"},
            "awayTeam": {"id": 76, "name": "Wolverhampton Wanderers FC", "shortName": "Wolves", "tla": "WOL"},
            "score": {
                "fullTime": {"home": 2, "away": 0},
                "halfTime": {"home": 1, "away": 0},
                "extraTime": {"home": null, "away": null},
                "penalties": {"home": null, "away": null}
            }
        })
    }

    #[test]
    fn parses_remote_match_payload() {
        let payload = json!({"matches": [sample_match()]});
        let rows = parse_season_matches(&payload, "PL", 2024);
        assert_eq!(rows.len(), 1);

        let m = &rows[0];
        assert_eq!(m.row.match_id, 501234);
        assert_eq!(m.row.league_code, "PL");
        assert_eq!(m.row.season, "2024/2025");
        assert_eq!(m.row.status, "FINISHED");
        assert_eq!(m.row.home_goals, Some(2));
        assert_eq!(m.row.away_goals, Some(0));
        assert_eq!(m.row.home_ht_goals, Some(1));
        assert_eq!(m.row.home_et_goals, None);
        assert_eq!(m.home.team_id, 57);
        assert_eq!(m.home.tla.as_deref(), Some("ARS"));
        assert_eq!(m.away.name, "Wolverhampton Wanderers FC");
    }

    #[test]
    fn season_label_falls_back_to_requested_year() {
        let mut v = sample_match();
        v.as_object_mut().unwrap().remove("season");
        let label = season_label(&v, 2023);
        assert_eq!(label, "2023");
    }

    #[test]
    fn malformed_matches_are_dropped() {
        let payload = json!({"matches": [{"id": 1}, sample_match()]});
        let rows = parse_season_matches(&payload, "PL", 2024);
        assert_eq!(rows.len(), 1);

        assert!(parse_season_matches(&json!({}), "PL", 2024).is_empty());
        assert!(parse_season_matches(&json!(null), "PL", 2024).is_empty());
    }

    #[test]
    fn rate_limiter_enforces_spacing() {
        let interval = Duration::from_millis(30);
        let mut limiter = RateLimiter::new(interval);
        limiter.wait();
        let start = Instant::now();
        limiter.wait();
        assert!(start.elapsed() >= interval);
    }

    #[test]
    fn client_without_credential_cannot_fetch() {
        let client = HistoricalDataClient::new(
            String::new(),
            DEFAULT_BASE_URL.to_string(),
            Duration::from_secs(0),
        );
        assert!(!client.can_fetch());

        let client = HistoricalDataClient::new(
            "token".to_string(),
            String::new(),
            Duration::from_secs(0),
        );
        assert!(client.can_fetch());
    }
}
