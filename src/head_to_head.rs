/// Number of prior meetings the head-to-head statistics consider.
pub const H2H_WINDOW: usize = 5;

// The win count always divides by the full window size, even when fewer
// meetings exist; the average-goals figure divides by every meeting on
// record, not just the summed window. Both denominators are part of the
// downstream feature contract and must not be "corrected".
const WIN_COUNT_DENOMINATOR: f64 = 5.0;
const GOALS_CEILING: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingResult {
    HomeWin,
    AwayWin,
    Draw,
}

/// One prior meeting between two specific teams.
#[derive(Debug, Clone)]
pub struct Meeting {
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_goals: i32,
    pub away_goals: i32,
}

impl Meeting {
    pub fn result(&self) -> MeetingResult {
        if self.home_goals > self.away_goals {
            MeetingResult::HomeWin
        } else if self.home_goals < self.away_goals {
            MeetingResult::AwayWin
        } else {
            MeetingResult::Draw
        }
    }

    pub fn total_goals(&self) -> i64 {
        self.home_goals as i64 + self.away_goals as i64
    }
}

/// Pairwise history summarized from the queried team's perspective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadToHeadSnapshot {
    /// Share of the considered meetings credited to the queried team:
    /// 1 for a home win they hosted, 0.5 for any draw.
    pub form_score: f64,
    /// Hosted home wins over the fixed five-match denominator.
    pub home_wins: f64,
    /// Total goals in the window over total meetings, against a five-goal
    /// ceiling.
    pub avg_goals: f64,
}

impl HeadToHeadSnapshot {
    pub fn neutral() -> Self {
        Self {
            form_score: 0.5,
            home_wins: 0.0,
            avg_goals: 0.5,
        }
    }
}

/// Summarize up to `limit` most-recent-first meetings for `team_id`.
/// An empty history yields the neutral snapshot.
pub fn head_to_head_snapshot(
    meetings: &[Meeting],
    team_id: u32,
    limit: usize,
) -> HeadToHeadSnapshot {
    if meetings.is_empty() {
        return HeadToHeadSnapshot::neutral();
    }

    let mut score = 0.0;
    let mut considered = 0usize;
    let mut hosted_wins = 0usize;
    let mut total_goals = 0i64;

    for meeting in meetings.iter().take(limit) {
        let hosted = meeting.home_team_id == team_id;
        match meeting.result() {
            MeetingResult::HomeWin => {
                if hosted {
                    score += 1.0;
                    hosted_wins += 1;
                }
            }
            MeetingResult::Draw => score += 0.5,
            MeetingResult::AwayWin => {}
        }
        total_goals += meeting.total_goals();
        considered += 1;
    }

    let form_score = if considered > 0 {
        score / considered as f64
    } else {
        0.5
    };
    let avg_per_meeting = total_goals as f64 / meetings.len() as f64;

    HeadToHeadSnapshot {
        form_score,
        home_wins: hosted_wins as f64 / WIN_COUNT_DENOMINATOR,
        avg_goals: avg_per_meeting / GOALS_CEILING,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meeting(home: u32, away: u32, hg: i32, ag: i32) -> Meeting {
        Meeting {
            home_team_id: home,
            away_team_id: away,
            home_goals: hg,
            away_goals: ag,
        }
    }

    #[test]
    fn empty_history_is_neutral() {
        let snap = head_to_head_snapshot(&[], 1, H2H_WINDOW);
        assert_eq!(snap, HeadToHeadSnapshot::neutral());
        assert!((snap.form_score - 0.5).abs() < 1e-12);
        assert!((snap.home_wins - 0.0).abs() < 1e-12);
        assert!((snap.avg_goals - 0.5).abs() < 1e-12);
    }

    #[test]
    fn hosted_wins_score_but_away_wins_do_not() {
        // Team 1 wins at home, wins away, draws. Only the hosted win and the
        // draw contribute to the form score.
        let meetings = vec![
            meeting(1, 2, 2, 0),
            meeting(2, 1, 0, 1),
            meeting(1, 2, 1, 1),
        ];
        let snap = head_to_head_snapshot(&meetings, 1, H2H_WINDOW);
        assert!((snap.form_score - 1.5 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn win_count_uses_fixed_denominator() {
        // Two hosted wins out of three meetings still divide by five.
        let meetings = vec![
            meeting(1, 2, 3, 1),
            meeting(1, 2, 2, 0),
            meeting(2, 1, 2, 2),
        ];
        let snap = head_to_head_snapshot(&meetings, 1, H2H_WINDOW);
        assert!((snap.home_wins - 2.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn avg_goals_divides_by_all_meetings_on_record() {
        // Six meetings on record; only the five most recent are summed, but
        // the divisor is six.
        let meetings = vec![
            meeting(1, 2, 2, 1),
            meeting(2, 1, 1, 1),
            meeting(1, 2, 0, 0),
            meeting(2, 1, 3, 0),
            meeting(1, 2, 1, 2),
            meeting(2, 1, 4, 4),
        ];
        let snap = head_to_head_snapshot(&meetings, 1, H2H_WINDOW);
        let summed = 3.0 + 2.0 + 0.0 + 3.0 + 3.0;
        assert!((snap.avg_goals - summed / 6.0 / 5.0).abs() < 1e-12);
    }

    #[test]
    fn result_classification_from_raw_goals() {
        assert_eq!(meeting(1, 2, 2, 0).result(), MeetingResult::HomeWin);
        assert_eq!(meeting(1, 2, 0, 2).result(), MeetingResult::AwayWin);
        assert_eq!(meeting(1, 2, 2, 2).result(), MeetingResult::Draw);
    }
}
