//! Configuration constants for the reference game engine
//!
//! This module contains the defaults and limits used throughout the crate
//! so that configuration validation, sampling and geometry agree on the
//! same boundaries.

/// Session-wide constants
pub mod session {
    /// Number of participants needed before rounds start
    pub const PARTICIPANT_THRESHOLD: usize = 2;
    /// Default number of rounds played in one session
    pub const DEFAULT_NUM_ROUNDS: usize = 60;
    /// Maximum number of rounds a session can be configured with
    pub const MAX_ROUNDS: usize = 500;
    /// Default delay in milliseconds between feedback and the next round
    pub const DEFAULT_FEEDBACK_DELAY_MS: u64 = 300;
    /// Maximum delay in seconds between feedback and the next round
    pub const MAX_FEEDBACK_DELAY: u64 = 10;
    /// Default time in seconds a lone participant waits for a partner
    pub const DEFAULT_ABANDONMENT_TIMEOUT: u64 = 15 * 60;
    /// Minimum time in seconds a lone participant waits for a partner
    pub const MIN_ABANDONMENT_TIMEOUT: u64 = 1;
    /// Maximum time in seconds a lone participant waits for a partner
    pub const MAX_ABANDONMENT_TIMEOUT: u64 = 60 * 60;
}

/// Trial content constants
pub mod trial {
    /// Number of distractors shown alongside the target
    pub const DISTRACTOR_COUNT: usize = 3;
    /// Number of objects in a single trial (target included)
    pub const OBJECTS_PER_TRIAL: usize = DISTRACTOR_COUNT + 1;
    /// Default bound on distractor resampling for a single round
    pub const DEFAULT_MAX_SAMPLING_ATTEMPTS: usize = 1000;
    /// Upper bound on distractor resampling for a single round
    pub const MAX_SAMPLING_ATTEMPTS: usize = 100_000;
}

/// Grid and pixel geometry constants
pub mod grid {
    /// Number of horizontal cells
    pub const HORIZONTAL_CELLS: u8 = 2;
    /// Number of vertical cells
    pub const VERTICAL_CELLS: u8 = 2;
    /// Default cell width in pixels
    pub const DEFAULT_CELL_WIDTH: f64 = 300.;
    /// Default cell height in pixels
    pub const DEFAULT_CELL_HEIGHT: f64 = 300.;
    /// Smallest allowed cell side in pixels
    pub const MIN_CELL_SIDE: f64 = 10.;
    /// Largest allowed cell side in pixels
    pub const MAX_CELL_SIDE: f64 = 2000.;
    /// Largest allowed cell padding in pixels
    pub const MAX_CELL_PADDING: f64 = 200.;
    /// Fraction of the cell an object is drawn at
    pub const OBJECT_SCALE: f64 = 0.75;
    /// Distance from the cell centre to the highlight box corner
    pub const HIGHLIGHT_OFFSET: f64 = 100.;
}

/// Catalog constants
pub mod catalog {
    /// Maximum length of a catalog label
    pub const MAX_LABEL_LENGTH: usize = 200;
    /// Maximum length of an object URL
    pub const MAX_URL_LENGTH: usize = 2000;
}

/// Chat constants
pub mod chat {
    /// Escape sequence standing in for a literal dot inside free text
    pub const DOT_ESCAPE: &str = "~~~";
}
