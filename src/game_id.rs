//! Session identifiers
//!
//! A session is identified by a four digit prefix followed by a UUID, e.g.
//! `0421-9f1c2d3e-...`. The prefix makes sessions easy to tell apart in
//! logs; the first six characters form the short id written to records.

use std::{fmt::Display, num::ParseIntError, str::FromStr};

use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

/// Exclusive upper bound of the numeric prefix
const PREFIX_BOUND: u16 = 10_000;
/// Number of digits in the numeric prefix
const PREFIX_DIGITS: usize = 4;
/// Length of the short form used in records
const SHORT_LENGTH: usize = 6;

/// Errors that can occur when parsing a session identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// No dash separates the prefix from the UUID
    #[error("missing separator")]
    MissingSeparator,
    /// The prefix is not exactly four digits
    #[error("prefix must be four digits")]
    PrefixLength,
    /// The prefix is not a number
    #[error("invalid prefix: {0}")]
    Prefix(#[from] ParseIntError),
    /// The remainder is not a UUID
    #[error("invalid uuid: {0}")]
    Uuid(#[from] uuid::Error),
}

/// A unique identifier for a session
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, SerializeDisplay, DeserializeFromStr,
)]
pub struct GameId {
    prefix: u16,
    uuid: Uuid,
}

impl GameId {
    /// Creates a new random session ID
    pub fn new() -> Self {
        Self {
            prefix: fastrand::u16(..PREFIX_BOUND),
            uuid: Uuid::new_v4(),
        }
    }

    /// The first six characters, as written to session records
    pub fn short(&self) -> String {
        self.to_string().chars().take(SHORT_LENGTH).collect()
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for GameId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:0width$}-{}", self.prefix, self.uuid, width = PREFIX_DIGITS)
    }
}

impl FromStr for GameId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, uuid) = s.split_once('-').ok_or(Error::MissingSeparator)?;

        if prefix.len() != PREFIX_DIGITS || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::PrefixLength);
        }

        Ok(Self {
            prefix: prefix.parse()?,
            uuid: uuid.parse()?,
        })
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    const UUID: &str = "67e55044-10b1-426f-9247-bb680e5fe0c8";

    #[test]
    fn test_new_prefix_in_range() {
        for _ in 0..100 {
            assert!(GameId::new().prefix < PREFIX_BOUND);
        }
    }

    #[test]
    fn test_display_pads_prefix() {
        let id: GameId = format!("0042-{UUID}").parse().unwrap();
        assert_eq!(id.prefix, 42);
        assert_eq!(id.to_string(), format!("0042-{UUID}"));
        assert_eq!(id.short(), "0042-6");
    }

    #[test]
    fn test_round_trip() {
        let id = GameId::new();
        assert_eq!(id.to_string().parse::<GameId>().unwrap(), id);
    }

    #[test]
    fn test_from_str_invalid() {
        assert_eq!("".parse::<GameId>(), Err(Error::MissingSeparator));
        assert_eq!(
            format!("42-{UUID}").parse::<GameId>(),
            Err(Error::PrefixLength)
        );
        assert_eq!(
            format!("+042-{UUID}").parse::<GameId>(),
            Err(Error::PrefixLength)
        );
        assert!(matches!(
            "0042-not-a-uuid".parse::<GameId>(),
            Err(Error::Uuid(_))
        ));
    }

    #[test]
    fn test_serialization() {
        let id: GameId = format!("1234-{UUID}").parse().unwrap();
        let serialized = serde_json::to_string(&id).unwrap();
        assert_eq!(serialized, format!("\"1234-{UUID}\""));
        assert_eq!(serde_json::from_str::<GameId>(&serialized).unwrap(), id);
        assert!(serde_json::from_str::<GameId>("1234").is_err());
    }
}
