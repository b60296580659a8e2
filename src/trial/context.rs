//! Experimental conditions and context types
//!
//! A condition fixes how many rounds of each context type a session plays.
//! The context type of a round decides which taxonomic level separates the
//! target from its distractors.

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

/// The taxonomic level distractors are discriminated on
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Enum,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum ContextType {
    /// Distractors differ from the target at the sub-ordinate level
    #[display("sub")]
    Sub,
    /// Distractors differ from the target at the basic level
    #[display("basic")]
    Basic,
    /// Distractors differ from the target at the super-ordinate level
    #[display("super")]
    Super,
}

impl ContextType {
    /// Every context type, finest level first
    pub const ALL: [ContextType; 3] = [Self::Sub, Self::Basic, Self::Super];

    /// The next coarser taxonomic level, if any
    ///
    /// At least one distractor of a `Sub` or `Basic` context has to share
    /// this level with the target, otherwise the round would really be a
    /// coarser context.
    pub fn coarser(self) -> Option<Self> {
        match self {
            Self::Sub => Some(Self::Basic),
            Self::Basic => Some(Self::Super),
            Self::Super => None,
        }
    }
}

/// A fraction of the total round count, floored when applied
#[derive(Debug, Clone, Copy)]
struct Share {
    numerator: usize,
    denominator: usize,
}

impl Share {
    const fn new(numerator: usize, denominator: usize) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    fn of(self, total: usize) -> usize {
        total * self.numerator / self.denominator
    }
}

/// The experimental condition of a session
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Enum,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    /// Sub and super contexts take a third each
    #[display("uniform")]
    Uniform,
    /// Mostly super-ordinate contexts
    #[display("over")]
    Over,
    /// Mostly sub-ordinate contexts
    #[display("under")]
    Under,
    /// Mostly basic-level contexts
    #[display("basic")]
    Basic,
}

impl Condition {
    /// Every condition
    pub const ALL: [Condition; 4] = [Self::Uniform, Self::Over, Self::Under, Self::Basic];

    /// Draws a condition uniformly at random
    pub fn sample(rng: &mut fastrand::Rng) -> Self {
        Self::ALL[rng.usize(..Self::ALL.len())]
    }

    /// Shares of the sub and super contexts; basic takes the rest
    fn shares(self) -> (Share, Share) {
        match self {
            Self::Uniform => (Share::new(1, 3), Share::new(1, 3)),
            Self::Over => (Share::new(1, 6), Share::new(2, 3)),
            Self::Under => (Share::new(2, 3), Share::new(1, 6)),
            Self::Basic => (Share::new(1, 6), Share::new(1, 6)),
        }
    }

    /// Number of rounds of each context type
    ///
    /// Sub and super counts are floored; basic receives whatever is left so
    /// the counts always add up to `num_rounds`.
    pub fn context_counts(self, num_rounds: usize) -> EnumMap<ContextType, usize> {
        let (sub, sup) = self.shares();
        let sub = sub.of(num_rounds);
        let sup = sup.of(num_rounds);

        enum_map::enum_map! {
            ContextType::Sub => sub,
            ContextType::Basic => num_rounds - sub - sup,
            ContextType::Super => sup,
        }
    }

    /// The ordered context list for a session: all sub rounds, then all
    /// basic rounds, then all super rounds
    pub fn context_sequence(self, num_rounds: usize) -> Vec<ContextType> {
        let counts = self.context_counts(num_rounds);

        ContextType::ALL
            .into_iter()
            .flat_map(|context| std::iter::repeat_n(context, counts[context]))
            .collect_vec()
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn counts(condition: Condition, num_rounds: usize) -> (usize, usize, usize) {
        let counts = condition.context_counts(num_rounds);
        (
            counts[ContextType::Sub],
            counts[ContextType::Basic],
            counts[ContextType::Super],
        )
    }

    #[test]
    fn test_default_round_count_splits() {
        assert_eq!(counts(Condition::Uniform, 60), (20, 20, 20));
        assert_eq!(counts(Condition::Over, 60), (10, 10, 40));
        assert_eq!(counts(Condition::Under, 60), (40, 10, 10));
        assert_eq!(counts(Condition::Basic, 60), (10, 40, 10));
    }

    #[test]
    fn test_rounding_leftover_goes_to_basic() {
        assert_eq!(counts(Condition::Uniform, 7), (2, 3, 2));
        assert_eq!(counts(Condition::Over, 7), (1, 2, 4));
        assert_eq!(counts(Condition::Under, 5), (3, 2, 0));
        assert_eq!(counts(Condition::Basic, 1), (0, 1, 0));
    }

    #[test]
    fn test_sequence_length_matches_rounds() {
        for condition in Condition::ALL {
            for num_rounds in [0, 1, 2, 5, 13, 60, 61, 100] {
                let sequence = condition.context_sequence(num_rounds);
                assert_eq!(sequence.len(), num_rounds);

                let expected = condition.context_counts(num_rounds);
                for context in ContextType::ALL {
                    assert_eq!(
                        sequence.iter().filter(|c| **c == context).count(),
                        expected[context]
                    );
                }
            }
        }
    }

    #[test]
    fn test_sequence_is_blocked_by_level() {
        let sequence = Condition::Uniform.context_sequence(6);
        assert_eq!(
            sequence,
            vec![
                ContextType::Sub,
                ContextType::Sub,
                ContextType::Basic,
                ContextType::Basic,
                ContextType::Super,
                ContextType::Super,
            ]
        );
    }

    #[test]
    fn test_coarser_levels() {
        assert_eq!(ContextType::Sub.coarser(), Some(ContextType::Basic));
        assert_eq!(ContextType::Basic.coarser(), Some(ContextType::Super));
        assert_eq!(ContextType::Super.coarser(), None);
    }

    #[test]
    fn test_sample_is_deterministic_per_seed() {
        let first = Condition::sample(&mut fastrand::Rng::with_seed(7));
        let second = Condition::sample(&mut fastrand::Rng::with_seed(7));
        assert_eq!(first, second);
    }

    #[test]
    fn test_names() {
        assert_eq!(Condition::Over.to_string(), "over");
        assert_eq!(ContextType::Super.to_string(), "super");
        assert_eq!(
            serde_json::to_string(&ContextType::Basic).unwrap(),
            "\"basic\""
        );
        assert_eq!(
            serde_json::from_str::<Condition>("\"under\"").unwrap(),
            Condition::Under
        );
    }
}
