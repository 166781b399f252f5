use serde::{Deserialize, Serialize};

use crate::features::FeatureVector;

pub const CLASS_NAMES: [&str; 3] = ["HOME", "DRAW", "AWAY"];

/// Match outcome from the home side's perspective. The numeric labels
/// (HOME=0, DRAW=1, AWAY=2) are part of the external contract shared with
/// every classifier and exported artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Home,
    Draw,
    Away,
}

impl Outcome {
    pub fn from_goals(home_goals: i32, away_goals: i32) -> Self {
        if home_goals > away_goals {
            Outcome::Home
        } else if home_goals < away_goals {
            Outcome::Away
        } else {
            Outcome::Draw
        }
    }

    pub fn label(self) -> usize {
        match self {
            Outcome::Home => 0,
            Outcome::Draw => 1,
            Outcome::Away => 2,
        }
    }

    pub fn from_label(label: usize) -> Option<Self> {
        match label {
            0 => Some(Outcome::Home),
            1 => Some(Outcome::Draw),
            2 => Some(Outcome::Away),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        CLASS_NAMES[self.label()]
    }

    /// Highest-probability class, resolving ties toward the earlier label.
    pub fn argmax(row: &[f64; 3]) -> Self {
        if row[0] >= row[1] && row[0] >= row[2] {
            Outcome::Home
        } else if row[1] >= row[2] {
            Outcome::Draw
        } else {
            Outcome::Away
        }
    }
}

/// A finished match as loaded from the persisted store. Immutable source of
/// truth for labels and for every derived statistic.
#[derive(Debug, Clone)]
pub struct MatchRecord {
    pub match_id: u64,
    pub league_code: String,
    /// RFC 3339 UTC kickoff; lexicographic order matches chronological order.
    pub utc_kickoff: String,
    pub home_team_id: u32,
    pub away_team_id: u32,
    pub home_goals: i32,
    pub away_goals: i32,
}

impl MatchRecord {
    pub fn outcome(&self) -> Outcome {
        Outcome::from_goals(self.home_goals, self.away_goals)
    }
}

/// Feature matrix paired 1:1 with outcome labels. Built once per training
/// run, consumed read-only by the classifiers.
#[derive(Debug, Clone, Default)]
pub struct LabeledDataset {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<Outcome>,
}

impl LabeledDataset {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            features: Vec::with_capacity(n),
            labels: Vec::with_capacity(n),
        }
    }

    pub fn push(&mut self, features: FeatureVector, label: Outcome) {
        self.features.push(features);
        self.labels.push(label);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn class_counts(&self) -> [usize; 3] {
        let mut counts = [0usize; 3];
        for label in &self.labels {
            counts[label.label()] += 1;
        }
        counts
    }
}
