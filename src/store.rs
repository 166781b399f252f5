use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, Transaction, params, params_from_iter};

use crate::dataset::MatchRecord;
use crate::head_to_head::Meeting;
use crate::team_form::{TeamMatchRow, Venue};

const CACHE_DIR: &str = "matchcast";
const DB_FILE: &str = "matches.sqlite";

pub const STATUS_FINISHED: &str = "FINISHED";

/// Filters for the finished-match query. Kickoffs are RFC 3339 strings, so
/// plain string comparison gives chronological bounds.
#[derive(Debug, Clone, Default)]
pub struct MatchFilter {
    pub min_kickoff: Option<String>,
    pub max_kickoff: Option<String>,
    pub leagues: Vec<String>,
    pub limit: Option<usize>,
}

/// A match row as written by the backfill, before the finished-only view is
/// applied. Goal columns stay optional so scheduled fixtures can be stored.
#[derive(Debug, Clone)]
pub struct StoredMatchRow {
    pub match_id: u64,
    pub league_code: String,
    pub season: String,
    pub utc_kickoff: String,
    pub matchday: Option<i64>,
    pub status: String,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_goals: Option<i32>,
    pub away_goals: Option<i32>,
    pub home_ht_goals: Option<i32>,
    pub away_ht_goals: Option<i32>,
    pub home_et_goals: Option<i32>,
    pub away_et_goals: Option<i32>,
    pub home_penalties: Option<i32>,
    pub away_penalties: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct StoredTeam {
    pub team_id: u32,
    pub name: String,
    pub short_name: Option<String>,
    pub tla: Option<String>,
    pub league_code: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StandingRow {
    pub league_code: String,
    pub team_id: u32,
    pub position: u32,
    pub points: i64,
    pub won: i64,
    pub drawn: i64,
    pub lost: i64,
    pub goals_for: i64,
    pub goals_against: i64,
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_db_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(DB_FILE))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn =
        Connection::open(path).with_context(|| format!("open sqlite db {}", path.display()))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory sqlite db")?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        CREATE TABLE IF NOT EXISTS teams (
            team_id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            short_name TEXT NULL,
            tla TEXT NULL,
            league_code TEXT NULL,
            updated_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY,
            league_code TEXT NOT NULL,
            season TEXT NOT NULL,
            utc_kickoff TEXT NOT NULL,
            matchday INTEGER NULL,
            status TEXT NOT NULL,
            home_team_id INTEGER NOT NULL,
            away_team_id INTEGER NOT NULL,
            home_goals INTEGER NULL,
            away_goals INTEGER NULL,
            home_ht_goals INTEGER NULL,
            away_ht_goals INTEGER NULL,
            home_et_goals INTEGER NULL,
            away_et_goals INTEGER NULL,
            home_penalties INTEGER NULL,
            away_penalties INTEGER NULL,
            updated_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_league ON matches(league_code);
        CREATE INDEX IF NOT EXISTS idx_matches_kickoff ON matches(utc_kickoff);
        CREATE INDEX IF NOT EXISTS idx_matches_home ON matches(home_team_id);
        CREATE INDEX IF NOT EXISTS idx_matches_away ON matches(away_team_id);

        CREATE TABLE IF NOT EXISTS standings (
            league_code TEXT NOT NULL,
            team_id INTEGER NOT NULL,
            position INTEGER NOT NULL,
            points INTEGER NOT NULL,
            won INTEGER NOT NULL,
            drawn INTEGER NOT NULL,
            lost INTEGER NOT NULL,
            goals_for INTEGER NOT NULL,
            goals_against INTEGER NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (league_code, team_id)
        );
        "#,
    )
    .context("create sqlite schema")?;
    Ok(())
}

/// Finished matches with both goal counts present, most recent first.
pub fn load_finished_matches(conn: &Connection, filter: &MatchFilter) -> Result<Vec<MatchRecord>> {
    let mut sql = String::from(
        "SELECT match_id, league_code, utc_kickoff, home_team_id, away_team_id, \
                home_goals, away_goals \
         FROM matches \
         WHERE status = 'FINISHED' \
           AND home_goals IS NOT NULL \
           AND away_goals IS NOT NULL",
    );
    let mut args: Vec<String> = Vec::new();

    if let Some(min) = &filter.min_kickoff {
        sql.push_str(" AND utc_kickoff >= ?");
        args.push(min.clone());
    }
    if let Some(max) = &filter.max_kickoff {
        sql.push_str(" AND utc_kickoff <= ?");
        args.push(max.clone());
    }
    if !filter.leagues.is_empty() {
        let marks = vec!["?"; filter.leagues.len()].join(", ");
        sql.push_str(&format!(" AND league_code IN ({marks})"));
        args.extend(filter.leagues.iter().cloned());
    }
    sql.push_str(" ORDER BY utc_kickoff DESC, match_id DESC");
    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    let mut stmt = conn.prepare(&sql).context("prepare finished-match query")?;
    let rows = stmt
        .query_map(params_from_iter(args.iter()), |row| {
            Ok(MatchRecord {
                match_id: row.get::<_, u64>(0)?,
                league_code: row.get(1)?,
                utc_kickoff: row.get(2)?,
                home_team_id: row.get::<_, u32>(3)?,
                away_team_id: row.get::<_, u32>(4)?,
                home_goals: row.get(5)?,
                away_goals: row.get(6)?,
            })
        })
        .context("query finished matches")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode match row")?);
    }
    Ok(out)
}

/// The last `limit` finished matches for one team strictly before a cutoff,
/// most recent first, with the team's standings position joined in.
pub fn team_recent_matches(
    conn: &Connection,
    team_id: u32,
    before_kickoff: &str,
    limit: usize,
) -> Result<Vec<TeamMatchRow>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT
                m.utc_kickoff,
                m.home_goals,
                m.away_goals,
                CASE WHEN m.home_team_id = ?1 THEN 1 ELSE 0 END AS is_home,
                s.position
            FROM matches m
            LEFT JOIN standings s
                ON s.league_code = m.league_code AND s.team_id = ?1
            WHERE (m.home_team_id = ?1 OR m.away_team_id = ?1)
              AND m.status = 'FINISHED'
              AND m.home_goals IS NOT NULL
              AND m.away_goals IS NOT NULL
              AND m.utc_kickoff < ?2
            ORDER BY m.utc_kickoff DESC, m.match_id DESC
            LIMIT ?3
            "#,
        )
        .context("prepare team history query")?;

    let rows = stmt
        .query_map(
            params![team_id as i64, before_kickoff, limit as i64],
            |row| {
                Ok(TeamMatchRow {
                    utc_kickoff: row.get(0)?,
                    home_goals: row.get(1)?,
                    away_goals: row.get(2)?,
                    venue: if row.get::<_, i64>(3)? != 0 {
                        Venue::Home
                    } else {
                        Venue::Away
                    },
                    league_position: row.get::<_, Option<u32>>(4)?,
                })
            },
        )
        .context("query team history")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode team history row")?);
    }
    Ok(out)
}

/// The last `limit` finished meetings between two teams strictly before a
/// cutoff, most recent first.
pub fn head_to_head_meetings(
    conn: &Connection,
    team_a: u32,
    team_b: u32,
    before_kickoff: &str,
    limit: usize,
) -> Result<Vec<Meeting>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT home_team_id, away_team_id, home_goals, away_goals
            FROM matches
            WHERE ((home_team_id = ?1 AND away_team_id = ?2)
                OR (home_team_id = ?2 AND away_team_id = ?1))
              AND status = 'FINISHED'
              AND home_goals IS NOT NULL
              AND away_goals IS NOT NULL
              AND utc_kickoff < ?3
            ORDER BY utc_kickoff DESC, match_id DESC
            LIMIT ?4
            "#,
        )
        .context("prepare head-to-head query")?;

    let rows = stmt
        .query_map(
            params![team_a as i64, team_b as i64, before_kickoff, limit as i64],
            |row| {
                Ok(Meeting {
                    home_team_id: row.get::<_, u32>(0)?,
                    away_team_id: row.get::<_, u32>(1)?,
                    home_goals: row.get(2)?,
                    away_goals: row.get(3)?,
                })
            },
        )
        .context("query head-to-head meetings")?;

    let mut out = Vec::new();
    for row in rows {
        out.push(row.context("decode head-to-head row")?);
    }
    Ok(out)
}

pub fn count_finished_matches(conn: &Connection) -> Result<usize> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM matches \
             WHERE status = 'FINISHED' \
               AND home_goals IS NOT NULL AND away_goals IS NOT NULL",
            [],
            |row| row.get(0),
        )
        .context("count finished matches")?;
    Ok(count.max(0) as usize)
}

pub fn upsert_team(tx: &Transaction<'_>, team: &StoredTeam) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO teams (team_id, name, short_name, tla, league_code, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(team_id) DO UPDATE SET
            name = excluded.name,
            short_name = COALESCE(excluded.short_name, teams.short_name),
            tla = COALESCE(excluded.tla, teams.tla),
            league_code = COALESCE(excluded.league_code, teams.league_code),
            updated_at = excluded.updated_at
        "#,
        params![
            team.team_id as i64,
            team.name,
            team.short_name,
            team.tla,
            team.league_code,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert team")?;
    Ok(())
}

pub fn upsert_match(tx: &Transaction<'_>, m: &StoredMatchRow) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO matches (
            match_id, league_code, season, utc_kickoff, matchday, status,
            home_team_id, away_team_id,
            home_goals, away_goals,
            home_ht_goals, away_ht_goals,
            home_et_goals, away_et_goals,
            home_penalties, away_penalties,
            updated_at
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6,
            ?7, ?8,
            ?9, ?10,
            ?11, ?12,
            ?13, ?14,
            ?15, ?16,
            ?17
        )
        ON CONFLICT(match_id) DO UPDATE SET
            league_code = excluded.league_code,
            season = excluded.season,
            utc_kickoff = excluded.utc_kickoff,
            matchday = excluded.matchday,
            status = excluded.status,
            home_team_id = excluded.home_team_id,
            away_team_id = excluded.away_team_id,
            home_goals = excluded.home_goals,
            away_goals = excluded.away_goals,
            home_ht_goals = excluded.home_ht_goals,
            away_ht_goals = excluded.away_ht_goals,
            home_et_goals = excluded.home_et_goals,
            away_et_goals = excluded.away_et_goals,
            home_penalties = excluded.home_penalties,
            away_penalties = excluded.away_penalties,
            updated_at = excluded.updated_at
        "#,
        params![
            m.match_id as i64,
            m.league_code,
            m.season,
            m.utc_kickoff,
            m.matchday,
            m.status,
            m.home_team_id as i64,
            m.away_team_id as i64,
            m.home_goals,
            m.away_goals,
            m.home_ht_goals,
            m.away_ht_goals,
            m.home_et_goals,
            m.away_et_goals,
            m.home_penalties,
            m.away_penalties,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert match")?;
    Ok(())
}

pub fn upsert_standing(tx: &Transaction<'_>, row: &StandingRow) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO standings (
            league_code, team_id, position, points, won, drawn, lost,
            goals_for, goals_against, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        ON CONFLICT(league_code, team_id) DO UPDATE SET
            position = excluded.position,
            points = excluded.points,
            won = excluded.won,
            drawn = excluded.drawn,
            lost = excluded.lost,
            goals_for = excluded.goals_for,
            goals_against = excluded.goals_against,
            updated_at = excluded.updated_at
        "#,
        params![
            row.league_code,
            row.team_id as i64,
            row.position as i64,
            row.points,
            row.won,
            row.drawn,
            row.lost,
            row.goals_for,
            row.goals_against,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("upsert standing")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(
        match_id: u64,
        league: &str,
        kickoff: &str,
        home: u32,
        away: u32,
        hg: i32,
        ag: i32,
    ) -> StoredMatchRow {
        StoredMatchRow {
            match_id,
            league_code: league.to_string(),
            season: "2024/2025".to_string(),
            utc_kickoff: kickoff.to_string(),
            matchday: None,
            status: STATUS_FINISHED.to_string(),
            home_team_id: home,
            away_team_id: away,
            home_goals: Some(hg),
            away_goals: Some(ag),
            home_ht_goals: None,
            away_ht_goals: None,
            home_et_goals: None,
            away_et_goals: None,
            home_penalties: None,
            away_penalties: None,
        }
    }

    fn seed(conn: &mut Connection, rows: &[StoredMatchRow]) {
        let tx = conn.transaction().unwrap();
        for row in rows {
            upsert_match(&tx, row).unwrap();
        }
        tx.commit().unwrap();
    }

    #[test]
    fn finished_query_excludes_unfinished_and_orders_descending() {
        let mut conn = open_in_memory().unwrap();
        let mut scheduled = finished(3, "PL", "2024-03-01T15:00:00Z", 1, 2, 0, 0);
        scheduled.status = "SCHEDULED".to_string();
        scheduled.home_goals = None;
        scheduled.away_goals = None;
        seed(
            &mut conn,
            &[
                finished(1, "PL", "2024-01-01T15:00:00Z", 1, 2, 2, 0),
                finished(2, "PL", "2024-02-01T15:00:00Z", 2, 1, 1, 1),
                scheduled,
            ],
        );

        let rows = load_finished_matches(&conn, &MatchFilter::default()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].match_id, 2);
        assert_eq!(rows[1].match_id, 1);
    }

    #[test]
    fn filter_applies_league_dates_and_limit() {
        let mut conn = open_in_memory().unwrap();
        seed(
            &mut conn,
            &[
                finished(1, "PL", "2024-01-01T15:00:00Z", 1, 2, 2, 0),
                finished(2, "PD", "2024-02-01T15:00:00Z", 3, 4, 0, 1),
                finished(3, "PL", "2024-03-01T15:00:00Z", 2, 1, 3, 3),
                finished(4, "PL", "2024-04-01T15:00:00Z", 1, 2, 1, 0),
            ],
        );

        let filter = MatchFilter {
            min_kickoff: Some("2024-01-15T00:00:00Z".to_string()),
            max_kickoff: Some("2024-03-15T00:00:00Z".to_string()),
            leagues: vec!["PL".to_string()],
            limit: Some(5),
        };
        let rows = load_finished_matches(&conn, &filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].match_id, 3);

        let limited = MatchFilter {
            limit: Some(2),
            ..MatchFilter::default()
        };
        assert_eq!(load_finished_matches(&conn, &limited).unwrap().len(), 2);
    }

    #[test]
    fn team_history_respects_cutoff_and_joins_standing() {
        let mut conn = open_in_memory().unwrap();
        seed(
            &mut conn,
            &[
                finished(1, "PL", "2024-01-01T15:00:00Z", 10, 20, 2, 0),
                finished(2, "PL", "2024-02-01T15:00:00Z", 30, 10, 1, 1),
                finished(3, "PL", "2024-03-01T15:00:00Z", 10, 30, 0, 2),
            ],
        );
        {
            let tx = conn.transaction().unwrap();
            upsert_standing(
                &tx,
                &StandingRow {
                    league_code: "PL".to_string(),
                    team_id: 10,
                    position: 4,
                    points: 30,
                    won: 9,
                    drawn: 3,
                    lost: 2,
                    goals_for: 28,
                    goals_against: 14,
                },
            )
            .unwrap();
            tx.commit().unwrap();
        }

        // The cutoff is strict: the match at the cutoff itself is excluded.
        let rows = team_recent_matches(&conn, 10, "2024-03-01T15:00:00Z", 10).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].utc_kickoff, "2024-02-01T15:00:00Z");
        assert_eq!(rows[0].venue, Venue::Away);
        assert_eq!(rows[0].league_position, Some(4));
        assert_eq!(rows[1].venue, Venue::Home);
    }

    #[test]
    fn head_to_head_matches_both_orientations() {
        let mut conn = open_in_memory().unwrap();
        seed(
            &mut conn,
            &[
                finished(1, "PL", "2024-01-01T15:00:00Z", 10, 20, 2, 0),
                finished(2, "PL", "2024-02-01T15:00:00Z", 20, 10, 1, 1),
                finished(3, "PL", "2024-03-01T15:00:00Z", 10, 30, 0, 2),
            ],
        );

        let meetings =
            head_to_head_meetings(&conn, 10, 20, "2024-12-31T00:00:00Z", 5).unwrap();
        assert_eq!(meetings.len(), 2);
        assert_eq!(meetings[0].home_team_id, 20);
        assert_eq!(meetings[1].home_team_id, 10);
    }

    #[test]
    fn upsert_match_is_idempotent() {
        let mut conn = open_in_memory().unwrap();
        let row = finished(7, "PL", "2024-01-01T15:00:00Z", 1, 2, 1, 0);
        seed(&mut conn, &[row.clone()]);
        let mut updated = row;
        updated.home_goals = Some(3);
        seed(&mut conn, &[updated]);

        let rows = load_finished_matches(&conn, &MatchFilter::default()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].home_goals, 3);
    }
}
