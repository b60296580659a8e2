//! Session configuration
//!
//! Every knob of a session lives in [`Options`]. Options deserialize from
//! JSON with every field optional, and are validated with `garde` before a
//! session is built from them.

use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use web_time::Duration;

use crate::{
    constants::{grid, session, trial},
    registry::Role,
    trial::{context::Condition, geometry::CellDimensions},
};

type ValidationResult = garde::Result;

/// Validates that a duration falls within whole-second bounds
///
/// # Arguments
///
/// * `field` - Name of the field being validated (for error messages)
/// * `val` - The duration value to validate
fn validate_duration<const MIN_SECONDS: u64, const MAX_SECONDS: u64>(
    field: &'static str,
    val: &Duration,
) -> ValidationResult {
    if (MIN_SECONDS..=MAX_SECONDS).contains(&val.as_secs()) {
        Ok(())
    } else {
        Err(garde::Error::new(format!(
            "{field} is outside of the bounds [{MIN_SECONDS},{MAX_SECONDS}]",
        )))
    }
}

fn validate_feedback_delay(val: &Duration) -> ValidationResult {
    validate_duration::<0, { session::MAX_FEEDBACK_DELAY }>("feedback_delay", val)
}

fn validate_abandonment_timeout(val: &Duration) -> ValidationResult {
    validate_duration::<
        { session::MIN_ABANDONMENT_TIMEOUT },
        { session::MAX_ABANDONMENT_TIMEOUT },
    >("abandonment_timeout", val)
}

/// Configuration of a single session
#[serde_with::serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default, rename_all = "camelCase")]
pub struct Options {
    /// Number of rounds played before the session completes
    #[garde(range(min = 1, max = session::MAX_ROUNDS))]
    pub num_rounds: usize,
    /// Width of a grid cell in pixels
    #[garde(range(min = grid::MIN_CELL_SIDE, max = grid::MAX_CELL_SIDE))]
    pub cell_width: f64,
    /// Height of a grid cell in pixels
    #[garde(range(min = grid::MIN_CELL_SIDE, max = grid::MAX_CELL_SIDE))]
    pub cell_height: f64,
    /// Padding around the grid in pixels
    #[garde(range(min = 0., max = grid::MAX_CELL_PADDING))]
    pub cell_padding: f64,
    /// Fixed condition; drawn at random when absent
    #[garde(skip)]
    pub condition: Option<Condition>,
    /// Seed for trial sampling; sessions built with the same seed, catalog
    /// and condition play the same trials
    #[garde(skip)]
    pub seed: Option<u64>,
    /// The role whose submission ends a round
    #[garde(skip)]
    pub controlling_role: Role,
    /// Pause between feedback and the next round
    #[garde(custom(|v, _| validate_feedback_delay(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub feedback_delay: Duration,
    /// How long a lone participant waits for a partner
    #[garde(custom(|v, _| validate_abandonment_timeout(v)))]
    #[serde_as(as = "serde_with::DurationMilliSeconds<u64>")]
    pub abandonment_timeout: Duration,
    /// Distractor draws per round before sampling gives up
    #[garde(range(min = 1, max = trial::MAX_SAMPLING_ATTEMPTS))]
    pub max_sampling_attempts: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            num_rounds: session::DEFAULT_NUM_ROUNDS,
            cell_width: grid::DEFAULT_CELL_WIDTH,
            cell_height: grid::DEFAULT_CELL_HEIGHT,
            cell_padding: 0.,
            condition: None,
            seed: None,
            controlling_role: Role::Listener,
            feedback_delay: Duration::from_millis(session::DEFAULT_FEEDBACK_DELAY_MS),
            abandonment_timeout: Duration::from_secs(session::DEFAULT_ABANDONMENT_TIMEOUT),
            max_sampling_attempts: trial::DEFAULT_MAX_SAMPLING_ATTEMPTS,
        }
    }
}

impl Options {
    /// Grid geometry derived from the cell settings
    pub fn cell_dimensions(&self) -> CellDimensions {
        CellDimensions {
            width: self.cell_width,
            height: self.cell_height,
            padding: self.cell_padding,
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let options = Options::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.num_rounds, 60);
        assert_eq!(options.controlling_role, Role::Listener);
        assert_eq!(options.feedback_delay, Duration::from_millis(300));
        assert_eq!(options.abandonment_timeout, Duration::from_secs(900));
        assert_eq!(options.cell_dimensions(), CellDimensions::default());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let options: Options = serde_json::from_str(
            r#"{"numRounds": 8, "condition": "over", "seed": 7, "feedbackDelay": 0}"#,
        )
        .unwrap();

        assert_eq!(options.num_rounds, 8);
        assert_eq!(options.condition, Some(Condition::Over));
        assert_eq!(options.seed, Some(7));
        assert_eq!(options.feedback_delay, Duration::ZERO);
        assert_eq!(options.cell_width, 300.);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_serialization_skips_unset_fields() {
        let json = serde_json::to_value(Options::default()).unwrap();
        assert!(json.get("condition").is_none());
        assert!(json.get("seed").is_none());
        assert_eq!(json["abandonmentTimeout"], 900_000);
        assert_eq!(json["controllingRole"], "listener");
    }

    #[test]
    fn test_out_of_range_values_rejected() {
        let invalid = [
            Options {
                num_rounds: 0,
                ..Options::default()
            },
            Options {
                num_rounds: session::MAX_ROUNDS + 1,
                ..Options::default()
            },
            Options {
                cell_width: 1.,
                ..Options::default()
            },
            Options {
                cell_padding: -1.,
                ..Options::default()
            },
            Options {
                feedback_delay: Duration::from_secs(60),
                ..Options::default()
            },
            Options {
                abandonment_timeout: Duration::from_millis(10),
                ..Options::default()
            },
            Options {
                max_sampling_attempts: 0,
                ..Options::default()
            },
        ];

        for options in invalid {
            assert!(options.validate().is_err(), "{options:?} should be invalid");
        }
    }
}
