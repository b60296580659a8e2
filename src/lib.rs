//! # Reference Game Engine
//!
//! This library implements the server side of a two-player reference game.
//! A speaker sees a target object among three distractors and describes it;
//! a listener, who sees the same objects in a different layout, picks the
//! object they think was meant. Trials are sampled up front from an object
//! catalog according to an experimental condition, rounds are advanced by
//! the controlling participant's submission, and every outcome and chat
//! line is written to a structured log.
//!
//! The engine is transport agnostic: connected participants are reached
//! through the [`session::Tunnel`] trait and timed transitions are
//! requested through a scheduling closure. [`runtime`] provides a `tokio`
//! host that owns one task per session and pairs incoming connections.

#![cfg_attr(all(coverage_nightly, test), feature(coverage_attribute))]
#![deny(missing_docs)]
#![deny(rustdoc::missing_crate_level_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::struct_field_names)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::wildcard_imports)]
#![allow(clippy::missing_panics_doc)]
use serde::{Deserialize, Serialize};

pub mod constants;

pub mod config;
pub mod game;
pub mod game_id;
pub mod message;
pub mod records;
pub mod registry;
pub mod runtime;
pub mod scoring;
pub mod session;
pub mod sync;
pub mod telemetry;
pub mod trial;

use registry::{Id, Role};

/// Messages carrying the full shared state of a session
#[derive(Debug, Serialize, Clone, PartialEq)]
pub enum SyncMessage {
    /// A complete snapshot, sent whenever the session starts or a round
    /// begins
    StateUpdate(Box<sync::Snapshot>),
}

impl SyncMessage {
    /// Converts the sync message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Events addressed to one or more participants
///
/// Unlike [`SyncMessage`] these carry no session state, only the change
/// the recipient should react to.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub enum UpdateMessage {
    /// Confirms a join and tells the participant their role
    RoleAssign {
        /// The assigned role
        role: Role,
        /// Participants registered after this join
        participant_count: usize,
    },
    /// The partner joined and rounds are about to start
    PartnerJoined {
        /// Role of the participant who joined
        role: Role,
    },
    /// The controlling participant submitted for the current round
    Feedback {
        /// Index of the round that was scored
        round_index: usize,
        /// Who submitted
        participant: Id,
        /// What was submitted
        submission: Vec<String>,
        /// Identifier of the target
        target: String,
        /// Score delta awarded
        score: f64,
    },
    /// The partner started or stopped typing
    Typing {
        /// Whether the partner is typing
        typing: bool,
    },
    /// A chat line from the partner
    Chat {
        /// Role of the sender
        role: Role,
        /// The unescaped text
        text: String,
    },
    /// The session is over; the connection will be closed
    SessionEnded,
    /// No partner joined in time; the connection will be closed
    Abandoned,
}

impl UpdateMessage {
    /// Converts the update message to a JSON string for transmission
    ///
    /// # Panics
    ///
    /// This method panics if serialization fails, which should never happen
    /// with the default JSON serializer for well-formed data.
    pub fn to_message(&self) -> String {
        serde_json::to_string(self).expect("default serializer cannot fail")
    }
}

/// Timed events a session asks its host to deliver later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmMessage {
    /// The feedback pause after round `index` is over
    AdvanceRound {
        /// Round the alarm was scheduled for
        index: usize,
    },
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    #[test]
    fn test_update_message_to_message() {
        let message = UpdateMessage::RoleAssign {
            role: Role::Speaker,
            participant_count: 1,
        };
        let json: serde_json::Value = serde_json::from_str(&message.to_message()).unwrap();

        assert_eq!(json["RoleAssign"]["role"], "speaker");
        assert_eq!(json["RoleAssign"]["participant_count"], 1);
        assert_eq!(UpdateMessage::SessionEnded.to_message(), "\"SessionEnded\"");
    }

    #[test]
    fn test_chat_to_message() {
        let message = UpdateMessage::Chat {
            role: Role::Listener,
            text: "left one.".to_owned(),
        };
        let json = message.to_message();

        assert!(json.contains("Chat"));
        assert!(json.contains("left one."));
    }

    #[test]
    fn test_alarm_round_trip() {
        let alarm = AlarmMessage::AdvanceRound { index: 3 };
        let json = serde_json::to_string(&alarm).unwrap();
        assert_eq!(serde_json::from_str::<AlarmMessage>(&json).unwrap(), alarm);
    }
}
