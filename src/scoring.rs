//! Round scoring and cumulative results
//!
//! A submission is scored against the round's target by a [`Comparator`].
//! The default [`ExactMatch`] gives a point when the first submitted value
//! names the target; embedders can plug in partial credit.

use serde::Serialize;

use crate::trial::{TrialObject, context::ContextType};

/// Scores a submission against the target of the current round
pub trait Comparator {
    /// Returns the score delta for `submission`
    fn score(&self, submission: &[String], target: &TrialObject) -> f64;
}

impl<F> Comparator for F
where
    F: Fn(&[String], &TrialObject) -> f64,
{
    fn score(&self, submission: &[String], target: &TrialObject) -> f64 {
        self(submission, target)
    }
}

/// One point when the first submitted value is the target's identifier
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactMatch;

impl Comparator for ExactMatch {
    fn score(&self, submission: &[String], target: &TrialObject) -> f64 {
        match submission.first() {
            Some(value) if value == target.id() => 1.,
            _ => 0.,
        }
    }
}

/// Outcome of a single round
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundScore {
    /// Index of the round, starting at 0
    pub round_index: usize,
    /// Context the round was played under
    pub context: ContextType,
    /// Identifier of the round's target
    pub target: String,
    /// Values the controlling participant submitted
    pub submission: Vec<String>,
    /// Score delta awarded for the round
    pub score: f64,
}

/// Cumulative results of a session
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scorecard {
    total: f64,
    rounds: Vec<RoundScore>,
}

impl Scorecard {
    /// Appends the outcome of a round
    pub fn record(&mut self, round: RoundScore) {
        self.total += round.score;
        self.rounds.push(round);
    }

    /// Sum of every round's score
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Scored rounds in play order
    pub fn rounds(&self) -> &[RoundScore] {
        &self.rounds
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::trial::{
        Trial,
        catalog::tests::object,
        geometry::{Cell, CellDimensions},
    };

    fn trial() -> Trial {
        Trial::new(
            ContextType::Sub,
            object("obj_3", "dog", "animal"),
            [
                object("obj_0", "dog", "animal"),
                object("obj_1", "tree", "plant"),
                object("obj_2", "flower", "plant"),
            ],
            Cell::ALL,
            Cell::ALL,
            CellDimensions::default(),
        )
    }

    fn submission(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_exact_match() {
        let trial = trial();
        assert_eq!(ExactMatch.score(&submission(&["obj_3"]), trial.target()), 1.);
        assert_eq!(ExactMatch.score(&submission(&["obj_1"]), trial.target()), 0.);
        assert_eq!(ExactMatch.score(&[], trial.target()), 0.);
        assert_eq!(
            ExactMatch.score(&submission(&["obj_1", "obj_3"]), trial.target()),
            0.
        );
    }

    #[test]
    fn test_closure_comparator() {
        let trial = trial();
        let half_credit = |submission: &[String], target: &TrialObject| {
            if submission.iter().any(|v| v == target.id()) { 0.5 } else { 0. }
        };
        assert_eq!(
            half_credit.score(&submission(&["obj_1", "obj_3"]), trial.target()),
            0.5
        );
    }

    #[test]
    fn test_scorecard_accumulates() {
        let mut scorecard = Scorecard::default();
        for (round_index, score) in [1., 0., 1.].into_iter().enumerate() {
            scorecard.record(RoundScore {
                round_index,
                context: ContextType::Basic,
                target: "obj_3".to_owned(),
                submission: submission(&["obj_3"]),
                score,
            });
        }

        assert_eq!(scorecard.total(), 2.);
        assert_eq!(scorecard.rounds().len(), 3);
        assert_eq!(scorecard.rounds()[1].round_index, 1);

        let json = serde_json::to_value(&scorecard).unwrap();
        assert_eq!(json["total"], 2.);
        assert_eq!(json["rounds"][0]["roundIndex"], 0);
    }
}
