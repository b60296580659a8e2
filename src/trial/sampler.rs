//! Trial list sampling
//!
//! A session's trials are sampled once, when the session is created. Each
//! round draws a target uniformly from the objects that can anchor the
//! round's context, then three distractors
//! that differ from the target at the round's context level, and finally
//! an independent grid layout for each role.

use itertools::Itertools;
use thiserror::Error;
use tracing::debug;

use crate::constants::trial::{DISTRACTOR_COUNT, OBJECTS_PER_TRIAL};

use super::{
    Trial,
    catalog::{Catalog, Object},
    context::{Condition, ContextType},
    geometry::{Cell, CellDimensions},
};

/// Errors that can occur while sampling trials
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No catalog object can be the target of a trial under `context`
    #[error("catalog has no object that can be the target of a {context} context")]
    NoEligibleTarget {
        /// The context that cannot be sampled
        context: ContextType,
    },
    /// No distractor set satisfying the context could be found
    ///
    /// This points at a catalog that cannot support the condition and is
    /// reported when the session is created, never mid-session.
    #[error(
        "no valid distractors for target {target} in a {context} context after {attempts} attempts"
    )]
    SamplingExhausted {
        /// The context being sampled
        context: ContextType,
        /// Identifier of the target that could not be matched
        target: String,
        /// How many distractor sets were drawn before giving up
        attempts: usize,
    },
}

/// Checks that `catalog` can supply every context `condition` uses over
/// `num_rounds` rounds
///
/// # Errors
///
/// Returns `Error::NoEligibleTarget` for the first context needed by the
/// condition that no catalog object can anchor.
pub fn ensure_supported(
    catalog: &Catalog,
    condition: Condition,
    num_rounds: usize,
) -> Result<(), Error> {
    let counts = condition.context_counts(num_rounds);
    match ContextType::ALL
        .into_iter()
        .find(|&context| counts[context] > 0 && catalog.targets(context).is_empty())
    {
        Some(context) => Err(Error::NoEligibleTarget { context }),
        None => Ok(()),
    }
}

/// Checks that `distractors` form a valid set for `target` under `context`
///
/// A valid set has exactly three distinct objects, each of them different
/// from the target at the context's level, and (for sub and basic contexts)
/// at least one of them sharing the next coarser level with the target.
pub fn is_valid_distractor_set(
    target: &Object,
    distractors: &[&Object],
    context: ContextType,
) -> bool {
    distractors.len() == DISTRACTOR_COUNT
        && distractors.iter().map(|d| d.id()).all_unique()
        && distractors
            .iter()
            .all(|d| d.label(context) != target.label(context))
        && shares_coarser_level(target, distractors, context)
}

fn shares_coarser_level(target: &Object, distractors: &[&Object], context: ContextType) -> bool {
    match context.coarser() {
        Some(level) => distractors
            .iter()
            .any(|d| d.label(level) == target.label(level)),
        None => true,
    }
}

/// Samples trials from a catalog
pub struct TrialSampler<'a> {
    catalog: &'a Catalog,
    dimensions: CellDimensions,
    max_attempts: usize,
    rng: &'a mut fastrand::Rng,
}

impl<'a> TrialSampler<'a> {
    /// Creates a sampler drawing from `catalog` with `rng`
    ///
    /// `max_attempts` bounds how many distractor sets are drawn for a
    /// single round before giving up.
    pub fn new(
        catalog: &'a Catalog,
        dimensions: CellDimensions,
        max_attempts: usize,
        rng: &'a mut fastrand::Rng,
    ) -> Self {
        Self {
            catalog,
            dimensions,
            max_attempts,
            rng,
        }
    }

    /// Samples the full trial list of a session
    ///
    /// # Errors
    ///
    /// Returns `Error::NoEligibleTarget` if the catalog cannot anchor one
    /// of the condition's contexts and `Error::SamplingExhausted` if any
    /// round cannot be given a valid distractor set.
    pub fn trial_list(
        &mut self,
        condition: Condition,
        num_rounds: usize,
    ) -> Result<Vec<Trial>, Error> {
        ensure_supported(self.catalog, condition, num_rounds)?;

        condition
            .context_sequence(num_rounds)
            .into_iter()
            .map(|context| self.sample_trial(context))
            .collect()
    }

    /// Samples a single trial under `context`
    ///
    /// # Errors
    ///
    /// Returns `Error::NoEligibleTarget` if no object can be the target
    /// under `context` and `Error::SamplingExhausted` if no valid
    /// distractor set is found for the drawn target.
    pub fn sample_trial(&mut self, context: ContextType) -> Result<Trial, Error> {
        let target = self
            .rng
            .choice(self.catalog.targets(context))
            .ok_or(Error::NoEligibleTarget { context })?
            .clone();
        let distractors = self.sample_distractors(&target, context)?;
        let (speaker_cells, listener_cells) = self.sample_locations();

        Ok(Trial::new(
            context,
            target,
            distractors,
            speaker_cells,
            listener_cells,
            self.dimensions,
        ))
    }

    /// Draws distractors for `target` until the set is valid
    fn sample_distractors(
        &mut self,
        target: &Object,
        context: ContextType,
    ) -> Result<[Object; DISTRACTOR_COUNT], Error> {
        let exhausted = |attempts| Error::SamplingExhausted {
            context,
            target: target.id().to_owned(),
            attempts,
        };

        let pool = self
            .catalog
            .objects()
            .iter()
            .filter(|o| o.label(context) != target.label(context))
            .collect_vec();

        if pool.len() < DISTRACTOR_COUNT || !shares_coarser_level(target, &pool, context) {
            return Err(exhausted(0));
        }

        for attempt in 1..=self.max_attempts {
            let chosen = self
                .rng
                .choose_multiple(pool.iter().copied(), DISTRACTOR_COUNT);

            if shares_coarser_level(target, &chosen, context) {
                if attempt > 1 {
                    debug!(%context, target = target.id(), attempt, "resampled distractors");
                }
                let chosen: [&Object; DISTRACTOR_COUNT] =
                    chosen.try_into().map_err(|_| exhausted(attempt))?;
                return Ok(chosen.map(Object::clone));
            }
        }

        Err(exhausted(self.max_attempts))
    }

    /// Shuffles the grid independently for the speaker and the listener
    fn sample_locations(&mut self) -> ([Cell; OBJECTS_PER_TRIAL], [Cell; OBJECTS_PER_TRIAL]) {
        let mut speaker = Cell::ALL;
        let mut listener = Cell::ALL;
        self.rng.shuffle(&mut speaker);
        self.rng.shuffle(&mut listener);
        (speaker, listener)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::{
        super::catalog::tests::{object, test_catalog},
        *,
    };
    use crate::registry::Role;

    fn sample(condition: Condition, num_rounds: usize, seed: u64) -> Result<Vec<Trial>, Error> {
        let catalog = test_catalog();
        let mut rng = fastrand::Rng::with_seed(seed);
        TrialSampler::new(&catalog, CellDimensions::default(), 1000, &mut rng)
            .trial_list(condition, num_rounds)
    }

    #[test]
    fn test_trial_list_follows_context_sequence() {
        for condition in Condition::ALL {
            let trials = sample(condition, 60, 1).unwrap();
            assert_eq!(trials.len(), 60);
            assert_eq!(
                trials.iter().map(Trial::context).collect_vec(),
                condition.context_sequence(60)
            );
        }
    }

    #[test]
    fn test_every_trial_has_valid_distractors() {
        for seed in 0..20 {
            for condition in Condition::ALL {
                for trial in sample(condition, 30, seed).unwrap() {
                    let distractors = trial.distractors().iter().map(|d| &d.object).collect_vec();
                    assert!(is_valid_distractor_set(
                        &trial.target().object,
                        &distractors,
                        trial.context()
                    ));
                    assert!(distractors.iter().all(|d| d.id() != trial.target().id()));
                    assert_eq!(
                        trial.objects().iter().filter(|o| o.is_target()).count(),
                        1
                    );
                }
            }
        }
    }

    #[test]
    fn test_cells_are_a_permutation_per_role() {
        for trial in sample(Condition::Uniform, 60, 3).unwrap() {
            for role in [Role::Speaker, Role::Listener] {
                let cells = trial
                    .objects()
                    .iter()
                    .map(|o| o.placement(role).cell())
                    .sorted()
                    .collect_vec();
                assert_eq!(cells, Cell::ALL.into_iter().sorted().collect_vec());
            }
        }
    }

    #[test]
    fn test_roles_are_shuffled_independently() {
        let trials = sample(Condition::Uniform, 60, 5).unwrap();
        assert!(trials.iter().any(|trial| {
            trial
                .objects()
                .iter()
                .any(|o| o.speaker_coords.cell() != o.listener_coords.cell())
        }));
    }

    #[test]
    fn test_same_seed_same_trials() {
        assert_eq!(
            sample(Condition::Over, 40, 42).unwrap(),
            sample(Condition::Over, 40, 42).unwrap()
        );
    }

    #[test]
    fn test_different_seeds_differ() {
        assert_ne!(
            sample(Condition::Over, 40, 1).unwrap(),
            sample(Condition::Over, 40, 2).unwrap()
        );
    }

    #[test]
    fn test_basic_context_without_other_basics_has_no_target() {
        let catalog = Catalog::new(vec![
            object("a", "dog", "animal"),
            object("b", "dog", "animal"),
            object("c", "dog", "animal"),
            object("d", "dog", "animal"),
        ])
        .unwrap();
        let mut rng = fastrand::Rng::with_seed(0);
        let result = TrialSampler::new(&catalog, CellDimensions::default(), 1000, &mut rng)
            .sample_trial(ContextType::Basic);

        assert!(matches!(
            result,
            Err(Error::NoEligibleTarget {
                context: ContextType::Basic
            })
        ));
    }

    #[test]
    fn test_sub_context_without_shared_basic_has_no_target() {
        let catalog = Catalog::new(vec![
            object("a", "dog", "animal"),
            object("b", "bird", "animal"),
            object("c", "tree", "plant"),
            object("d", "flower", "plant"),
        ])
        .unwrap();
        let mut rng = fastrand::Rng::with_seed(0);
        let result = TrialSampler::new(&catalog, CellDimensions::default(), 1000, &mut rng)
            .trial_list(Condition::Under, 6);

        assert!(matches!(
            result,
            Err(Error::NoEligibleTarget {
                context: ContextType::Sub
            })
        ));
    }

    #[test]
    fn test_lone_basic_category_never_targets_sub_rounds() {
        let mut objects = test_catalog().objects().to_vec();
        objects.push(object("cactus0", "cactus", "plant"));
        let catalog = Catalog::new(objects).unwrap();

        for seed in 0..50 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let trials = TrialSampler::new(&catalog, CellDimensions::default(), 1000, &mut rng)
                .trial_list(Condition::Under, 60)
                .unwrap();
            assert!(
                trials
                    .iter()
                    .filter(|t| t.context() == ContextType::Sub)
                    .all(|t| t.target().id() != "cactus0")
            );
        }
    }

    #[test]
    fn test_ensure_supported_checks_needed_contexts_only() {
        let catalog = Catalog::new(vec![
            object("a", "dog", "animal"),
            object("b", "bird", "animal"),
            object("c", "tree", "plant"),
            object("d", "flower", "plant"),
        ])
        .unwrap();

        assert_eq!(
            ensure_supported(&catalog, Condition::Uniform, 60),
            Err(Error::NoEligibleTarget {
                context: ContextType::Sub
            })
        );
        // Two rounds under the basic condition are both basic.
        assert_eq!(ensure_supported(&catalog, Condition::Basic, 2), Ok(()));
        assert_eq!(ensure_supported(&test_catalog(), Condition::Under, 60), Ok(()));
    }

    #[test]
    fn test_retry_bound_is_respected() {
        // Only one of the nine candidates shares the target's super category,
        // so a single draw usually misses it.
        let mut objects = vec![object("target", "dog", "animal"), object("eagle", "bird", "animal")];
        objects.extend((0..8).map(|i| object(&format!("plant{i}"), &format!("p{i}"), "plant")));
        let catalog = Catalog::new(objects).unwrap();
        let target = catalog.get("target").unwrap().clone();

        let mut failures = 0;
        for seed in 0..50 {
            let mut rng = fastrand::Rng::with_seed(seed);
            let mut sampler = TrialSampler::new(&catalog, CellDimensions::default(), 1, &mut rng);
            if let Err(Error::SamplingExhausted { attempts, .. }) =
                sampler.sample_distractors(&target, ContextType::Basic)
            {
                assert_eq!(attempts, 1);
                failures += 1;
            }
        }
        assert!(failures > 0);

        let mut rng = fastrand::Rng::with_seed(0);
        let mut sampler = TrialSampler::new(&catalog, CellDimensions::default(), 10_000, &mut rng);
        let distractors = sampler
            .sample_distractors(&target, ContextType::Basic)
            .unwrap();
        assert!(distractors.iter().any(|d| d.id() == "eagle"));
    }

    #[test]
    fn test_validity_check() {
        let target = object("dalmatian", "dog", "animal");
        let husky = object("husky", "dog", "animal");
        let eagle = object("eagle", "bird", "animal");
        let oak = object("oak", "tree", "plant");
        let rose = object("rose", "flower", "plant");

        assert!(is_valid_distractor_set(&target, &[&husky, &oak, &rose], ContextType::Sub));
        assert!(!is_valid_distractor_set(&target, &[&eagle, &oak, &rose], ContextType::Sub));
        assert!(is_valid_distractor_set(&target, &[&eagle, &oak, &rose], ContextType::Basic));
        assert!(!is_valid_distractor_set(&target, &[&husky, &oak, &rose], ContextType::Basic));
        assert!(!is_valid_distractor_set(&target, &[&eagle, &oak, &rose], ContextType::Super));
        assert!(!is_valid_distractor_set(&target, &[&oak, &oak, &rose], ContextType::Super));
        assert!(!is_valid_distractor_set(&target, &[&oak, &rose], ContextType::Super));
    }
}
