/// Goal counts are truncated at this value; the distribution is renormalized
/// over 0..=MAX_GOALS and the tail mass beyond it is discarded outright.
pub const MAX_GOALS: usize = 10;

const AWAY_LAMBDA_FACTOR: f64 = 0.9;
const MIN_LAMBDA: f64 = 0.1;
const DEFAULT_HOME_LAMBDA: f64 = 1.5;
const DEFAULT_AWAY_LAMBDA: f64 = 1.2;

/// Closed-form Poisson model over per-team goal counts. Fitting is a plain
/// sample mean per side; there is no regression step.
#[derive(Debug, Clone, Copy)]
pub struct PoissonGoalsModel {
    pub home_lambda: f64,
    pub away_lambda: f64,
}

#[derive(Debug, Clone)]
pub struct GoalDistributions {
    pub home: [f64; MAX_GOALS + 1],
    pub away: [f64; MAX_GOALS + 1],
}

impl PoissonGoalsModel {
    pub fn fit(home_goals: &[f64], away_goals: &[f64]) -> Self {
        Self {
            home_lambda: mean_or(home_goals, DEFAULT_HOME_LAMBDA),
            away_lambda: mean_or(away_goals, DEFAULT_AWAY_LAMBDA),
        }
    }

    /// Per-side goal distributions for one fixture, with each lambda scaled
    /// by the table-position ratio and the away side damped.
    pub fn predict(&self, home_position: u32, away_position: u32) -> GoalDistributions {
        let home_lambda = adjust_lambda(self.home_lambda, home_position, away_position, false);
        let away_lambda = adjust_lambda(self.away_lambda, away_position, home_position, true);
        GoalDistributions {
            home: goal_distribution(home_lambda),
            away: goal_distribution(away_lambda),
        }
    }

    /// HOME/DRAW/AWAY probabilities; sums to 1 by construction.
    pub fn outcome_probs(&self, home_position: u32, away_position: u32) -> [f64; 3] {
        outcome_probs(&self.predict(home_position, away_position))
    }
}

fn mean_or(values: &[f64], fallback: f64) -> f64 {
    if values.is_empty() {
        return fallback;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// A better table position raises expected goals via
/// `(19 - team_pos) / (19 - opp_pos + 1)`; away sides are multiplied by 0.9
/// and the result is floored at 0.1.
fn adjust_lambda(base: f64, team_position: u32, opponent_position: u32, is_away: bool) -> f64 {
    let position_factor =
        (19.0 - team_position as f64) / (19.0 - opponent_position as f64 + 1.0);
    let mut lambda = base * position_factor;
    if is_away {
        lambda *= AWAY_LAMBDA_FACTOR;
    }
    lambda.max(MIN_LAMBDA)
}

/// Truncated Poisson pmf over 0..=MAX_GOALS, renormalized by its own sum.
pub fn goal_distribution(lambda: f64) -> [f64; MAX_GOALS + 1] {
    let lambda = lambda.max(0.0);
    let mut out = [0.0f64; MAX_GOALS + 1];
    out[0] = (-lambda).exp();
    for k in 1..=MAX_GOALS {
        out[k] = out[k - 1] * lambda / k as f64;
    }

    let sum: f64 = out.iter().sum();
    if sum > 0.0 {
        for v in &mut out {
            *v /= sum;
        }
    }
    out
}

pub fn outcome_probs(dists: &GoalDistributions) -> [f64; 3] {
    let mut p_home = 0.0;
    let mut p_draw = 0.0;
    let mut p_away = 0.0;

    for (h, p_h) in dists.home.iter().enumerate() {
        for (a, p_a) in dists.away.iter().enumerate() {
            let p = p_h * p_a;
            if h > a {
                p_home += p;
            } else if h == a {
                p_draw += p;
            } else {
                p_away += p;
            }
        }
    }

    [p_home, p_draw, p_away]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn goal_distribution_sums_to_one() {
        for lambda in [0.1, 0.9, 1.5, 3.8, 7.0] {
            let dist = goal_distribution(lambda);
            let sum: f64 = dist.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "lambda {lambda}: sum {sum}");
        }
    }

    #[test]
    fn outcome_probs_sum_to_one() {
        let model = PoissonGoalsModel {
            home_lambda: 1.6,
            away_lambda: 1.1,
        };
        let probs = model.outcome_probs(5, 12);
        let sum: f64 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-9);
        assert!(probs.iter().all(|p| *p >= 0.0));
    }

    #[test]
    fn fit_uses_sample_means() {
        let model = PoissonGoalsModel::fit(&[2.0, 1.0, 3.0], &[0.0, 1.0, 1.0, 2.0]);
        assert!((model.home_lambda - 2.0).abs() < 1e-12);
        assert!((model.away_lambda - 1.0).abs() < 1e-12);
    }

    #[test]
    fn empty_history_falls_back_to_league_priors() {
        let model = PoissonGoalsModel::fit(&[], &[]);
        assert!((model.home_lambda - 1.5).abs() < 1e-12);
        assert!((model.away_lambda - 1.2).abs() < 1e-12);
    }

    #[test]
    fn better_position_is_favored() {
        let model = PoissonGoalsModel::fit(&[1.5, 1.5], &[1.2, 1.2]);
        // Top-of-table home side against a struggling visitor.
        let strong_home = model.outcome_probs(1, 18);
        assert!(strong_home[0] > strong_home[2]);

        // The same matchup reversed should favor the away side relative to
        // the strong-home case.
        let weak_home = model.outcome_probs(18, 1);
        assert!(weak_home[2] > strong_home[2]);
    }

    #[test]
    fn adjusted_lambda_is_floored() {
        // A bottom-of-table side against the leader collapses to the floor
        // instead of going negative.
        let lambda = adjust_lambda(1.4, 20, 1, true);
        assert!((lambda - 0.1).abs() < 1e-12);
    }
}
