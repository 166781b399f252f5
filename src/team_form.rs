/// Number of prior matches the rolling statistics cover.
pub const FORM_WINDOW: usize = 10;
/// The form string is trimmed to the most recent results.
pub const FORM_STRING_LEN: usize = 5;

const DEFAULT_LEAGUE_POSITION: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Venue {
    Home,
    Away,
}

/// One row of a team's match history, as returned by the store query:
/// most-recent-first, finished matches only.
#[derive(Debug, Clone)]
pub struct TeamMatchRow {
    pub utc_kickoff: String,
    pub venue: Venue,
    pub home_goals: i32,
    pub away_goals: i32,
    /// Standings position at query time, when a standings row exists.
    pub league_position: Option<u32>,
}

impl TeamMatchRow {
    pub fn scored(&self) -> i32 {
        match self.venue {
            Venue::Home => self.home_goals,
            Venue::Away => self.away_goals,
        }
    }

    pub fn conceded(&self) -> i32 {
        match self.venue {
            Venue::Home => self.away_goals,
            Venue::Away => self.home_goals,
        }
    }
}

/// Rolling form and strength statistics for one team as of a cutoff.
#[derive(Debug, Clone, PartialEq)]
pub struct TeamFormSnapshot {
    pub matches_played: usize,
    pub wins: usize,
    pub draws: usize,
    pub losses: usize,
    pub goals_scored: i64,
    pub goals_conceded: i64,
    pub points: u32,
    pub points_per_game: f64,
    pub goals_per_game: f64,
    pub goals_conceded_per_game: f64,
    /// Most-recent-first W/D/L string, at most five characters.
    pub form: String,
    /// Consecutive wins counted back from the most recent match.
    pub win_streak: usize,
    /// Consecutive unbeaten matches counted back from the most recent match.
    pub unbeaten_streak: usize,
    pub league_position: u32,
}

impl TeamFormSnapshot {
    /// Neutral snapshot for a team with no usable history. Downstream
    /// consumers always receive a complete vector, so this is a value, not
    /// an error.
    pub fn default_snapshot() -> Self {
        Self {
            matches_played: 0,
            wins: 0,
            draws: 0,
            losses: 0,
            goals_scored: 0,
            goals_conceded: 0,
            points: 0,
            points_per_game: 1.0,
            goals_per_game: 1.0,
            goals_conceded_per_game: 1.0,
            form: "DDDDD".to_string(),
            win_streak: 0,
            unbeaten_streak: 0,
            league_position: DEFAULT_LEAGUE_POSITION,
        }
    }

    pub fn goal_difference(&self) -> i64 {
        self.goals_scored - self.goals_conceded
    }
}

/// Derive a form snapshot from a most-recent-first match window. Rows beyond
/// `FORM_WINDOW` are ignored.
pub fn team_form_snapshot(window: &[TeamMatchRow]) -> TeamFormSnapshot {
    let rows: Vec<&TeamMatchRow> = window.iter().take(FORM_WINDOW).collect();
    if rows.is_empty() {
        return TeamFormSnapshot::default_snapshot();
    }

    let mut wins = 0usize;
    let mut draws = 0usize;
    let mut losses = 0usize;
    let mut goals_scored = 0i64;
    let mut goals_conceded = 0i64;
    let mut form = String::new();

    // The streaks are anchored at the most recent match: a non-win seals the
    // win streak, a loss seals the unbeaten streak.
    let mut win_streak = 0usize;
    let mut unbeaten_streak = 0usize;
    let mut win_run_open = true;
    let mut unbeaten_run_open = true;

    for row in &rows {
        let scored = row.scored();
        let conceded = row.conceded();
        goals_scored += scored as i64;
        goals_conceded += conceded as i64;

        if scored > conceded {
            wins += 1;
            form.push('W');
            if win_run_open {
                win_streak += 1;
            }
            if unbeaten_run_open {
                unbeaten_streak += 1;
            }
        } else if scored == conceded {
            draws += 1;
            form.push('D');
            win_run_open = false;
            if unbeaten_run_open {
                unbeaten_streak += 1;
            }
        } else {
            losses += 1;
            form.push('L');
            win_run_open = false;
            unbeaten_run_open = false;
        }
    }

    form.truncate(FORM_STRING_LEN);

    let matches_played = rows.len();
    let points = (3 * wins + draws) as u32;
    let n = matches_played as f64;

    // The standings snapshot rides on the most recent row when present.
    let league_position = rows[0]
        .league_position
        .unwrap_or(DEFAULT_LEAGUE_POSITION);

    TeamFormSnapshot {
        matches_played,
        wins,
        draws,
        losses,
        goals_scored,
        goals_conceded,
        points,
        points_per_game: points as f64 / n,
        goals_per_game: goals_scored as f64 / n,
        goals_conceded_per_game: goals_conceded as f64 / n,
        form,
        win_streak,
        unbeaten_streak,
        league_position,
    }
}
