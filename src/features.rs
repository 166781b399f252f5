use crate::head_to_head::HeadToHeadSnapshot;
use crate::team_form::TeamFormSnapshot;

/// Canonical feature-vector width. Every classifier, export artifact and
/// synthetic generator depends on this value.
pub const FEATURE_COUNT: usize = 31;

pub type FeatureVector = [f64; FEATURE_COUNT];

/// Ordered feature names. The position of each name is the position of its
/// value in every extracted vector; consumers map vector slots back to
/// semantics through this list.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    // Form
    "home_form_score",
    "away_form_score",
    "home_points_per_game",
    "away_points_per_game",
    "home_goals_per_game",
    "away_goals_per_game",
    // Strength
    "home_league_position",
    "away_league_position",
    "home_goal_difference",
    "away_goal_difference",
    "home_xg",
    "away_xg",
    // Head-to-head
    "h2h_form_score",
    "home_h2h_wins",
    "h2h_avg_goals",
    // Context
    "home_advantage",
    "home_rest_days",
    "away_rest_days",
    // Injuries
    "home_injury_count",
    "away_injury_count",
    "home_injury_impact",
    "away_injury_impact",
    // Momentum
    "home_win_streak",
    "away_win_streak",
    "home_unbeaten_streak",
    "away_unbeaten_streak",
    // Managerial
    "home_manager_tenure",
    "away_manager_tenure",
    // Environment
    "weather_impact",
    "temperature",
    // Market
    "market_home_prob",
];

const GOAL_DIFF_SCALE: f64 = 50.0;
const HOME_XG_DEFAULT: f64 = 1.5;
const AWAY_XG_DEFAULT: f64 = 1.2;
const REST_DAYS_DEFAULT: f64 = 7.0;
const REST_DAYS_SCALE: f64 = 14.0;
const INJURY_COUNT_SCALE: f64 = 5.0;
const WIN_STREAK_SCALE: f64 = 5.0;
const UNBEATEN_STREAK_SCALE: f64 = 10.0;
const MANAGER_TENURE_DEFAULT: f64 = 365.0;
const MANAGER_TENURE_SCALE: f64 = 1000.0;
const TEMPERATURE_DEFAULT_C: f64 = 15.0;
const MARKET_HOME_PRIOR: f64 = 0.45;

/// Everything the engineer knows about one side of a fixture. Optional
/// signals fall back to the documented defaults inside `extract_features`.
#[derive(Debug, Clone)]
pub struct TeamSide {
    pub form: TeamFormSnapshot,
    pub xg: Option<f64>,
    pub days_since_last_match: Option<f64>,
    pub manager_tenure_days: Option<f64>,
}

impl TeamSide {
    pub fn from_form(form: TeamFormSnapshot) -> Self {
        Self {
            form,
            xg: None,
            days_since_last_match: None,
            manager_tenure_days: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InjuryReport {
    pub home_count: f64,
    pub away_count: f64,
    /// Fraction of expected strength lost, in [0, 1].
    pub home_impact: f64,
    pub away_impact: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct WeatherReport {
    pub impact: f64,
    pub temperature_c: f64,
}

impl Default for WeatherReport {
    fn default() -> Self {
        Self {
            impact: 0.0,
            temperature_c: TEMPERATURE_DEFAULT_C,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MarketOdds {
    pub home_prob: f64,
}

impl Default for MarketOdds {
    fn default() -> Self {
        Self {
            home_prob: MARKET_HOME_PRIOR,
        }
    }
}

/// Score a W/D/L form string: wins count 1, draws 0.5, normalized by length.
/// An empty string is neutral.
pub fn form_score(form: &str) -> f64 {
    if form.is_empty() {
        return 0.5;
    }
    let mut score = 0.0;
    for ch in form.chars() {
        match ch {
            'W' => score += 1.0,
            'D' => score += 0.5,
            _ => {}
        }
    }
    score / form.chars().count() as f64
}

fn unit_cap(value: f64) -> f64 {
    value.min(1.0)
}

/// Map one fixture's inputs to the canonical feature vector. Pure and
/// deterministic: identical inputs produce bit-identical output.
pub fn extract_features(
    home: &TeamSide,
    away: &TeamSide,
    h2h: &HeadToHeadSnapshot,
    injuries: &InjuryReport,
    weather: &WeatherReport,
    odds: &MarketOdds,
) -> FeatureVector {
    let mut out = [0.0; FEATURE_COUNT];
    let mut i = 0;
    let mut push = |v: f64| {
        out[i] = v;
        i += 1;
    };

    // Form
    push(form_score(&home.form.form));
    push(form_score(&away.form.form));
    push(home.form.points_per_game);
    push(away.form.points_per_game);
    push(home.form.goals_per_game);
    push(away.form.goals_per_game);

    // Strength
    push(home.form.league_position as f64);
    push(away.form.league_position as f64);
    push(home.form.goal_difference() as f64 / GOAL_DIFF_SCALE);
    push(away.form.goal_difference() as f64 / GOAL_DIFF_SCALE);
    push(home.xg.unwrap_or(HOME_XG_DEFAULT));
    push(away.xg.unwrap_or(AWAY_XG_DEFAULT));

    // Head-to-head
    push(h2h.form_score);
    push(h2h.home_wins);
    push(h2h.avg_goals);

    // Context
    push(1.0);
    push(unit_cap(
        home.days_since_last_match.unwrap_or(REST_DAYS_DEFAULT) / REST_DAYS_SCALE,
    ));
    push(unit_cap(
        away.days_since_last_match.unwrap_or(REST_DAYS_DEFAULT) / REST_DAYS_SCALE,
    ));

    // Injuries
    push(unit_cap(injuries.home_count / INJURY_COUNT_SCALE));
    push(unit_cap(injuries.away_count / INJURY_COUNT_SCALE));
    push(1.0 - injuries.home_impact);
    push(1.0 - injuries.away_impact);

    // Momentum
    push(unit_cap(home.form.win_streak as f64 / WIN_STREAK_SCALE));
    push(unit_cap(away.form.win_streak as f64 / WIN_STREAK_SCALE));
    push(unit_cap(
        home.form.unbeaten_streak as f64 / UNBEATEN_STREAK_SCALE,
    ));
    push(unit_cap(
        away.form.unbeaten_streak as f64 / UNBEATEN_STREAK_SCALE,
    ));

    // Managerial
    push(unit_cap(
        home.manager_tenure_days.unwrap_or(MANAGER_TENURE_DEFAULT) / MANAGER_TENURE_SCALE,
    ));
    push(unit_cap(
        away.manager_tenure_days.unwrap_or(MANAGER_TENURE_DEFAULT) / MANAGER_TENURE_SCALE,
    ));

    // Environment; temperature is rescaled from the -30..30 Celsius band.
    push(weather.impact);
    push((weather.temperature_c + 30.0) / 60.0);

    // Market
    push(odds.home_prob);

    out
}
