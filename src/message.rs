//! Inbound message vocabulary
//!
//! Participants talk to a session with short dot-separated strings: a
//! command name followed by its arguments, e.g. `advanceRound.obj_3` or
//! `playerTyping.true`. Free text cannot contain a literal dot, so clients
//! escape dots as `~~~` and [`Command::from_str`] reverses that.

use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::chat::DOT_ESCAPE;

/// Whether a participant's page is in the foreground
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// The page is visible
    #[display("visible")]
    Visible,
    /// The page is hidden, e.g. another tab is focused
    #[display("hidden")]
    Hidden,
}

/// A parsed inbound command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Request to take part in the session
    ///
    /// Recognized so clients sending it on connect are not reported as
    /// unknown, but ignored by the router: participants are registered
    /// when their connection is handed to the session, through
    /// `SessionHandle::join` or `Lobby::connect`.
    Join,
    /// Submission ending the current round
    Advance(Vec<String>),
    /// Typing indicator
    Typing(bool),
    /// Chat line for the partner
    Chat(String),
    /// Page visibility change
    Visibility(Visibility),
}

impl Command {
    /// Wire name of the command, used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::Advance(_) => "advanceRound",
            Self::Typing(_) => "playerTyping",
            Self::Chat(_) => "chatMessage",
            Self::Visibility(_) => "h",
        }
    }
}

/// Errors that can occur when parsing an inbound message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The command name is not part of the vocabulary
    #[error("unknown command {0:?}")]
    UnknownCommand(String),
    /// The command is known but its arguments are not usable
    #[error("malformed {command} message: {reason}")]
    MalformedMessage {
        /// Wire name of the command
        command: &'static str,
        /// What was wrong with the arguments
        reason: &'static str,
    },
}

/// Replaces escaped dots with literal ones
pub fn unescape(text: &str) -> String {
    text.replace(DOT_ESCAPE, ".")
}

/// Escapes literal dots so `text` survives the dot-separated framing
pub fn escape(text: &str) -> String {
    text.replace('.', DOT_ESCAPE)
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (name, arguments) = match raw.split_once('.') {
            Some((name, rest)) => (name, rest.split('.').collect_vec()),
            None => (raw, Vec::new()),
        };

        match name {
            "join" => Ok(Self::Join),
            "advanceRound" | "clickedObj" => {
                if arguments.is_empty() || arguments.iter().all(|a| a.is_empty()) {
                    return Err(Error::MalformedMessage {
                        command: "advanceRound",
                        reason: "missing submission",
                    });
                }
                Ok(Self::Advance(
                    arguments.into_iter().map(unescape).collect_vec(),
                ))
            }
            "playerTyping" => match arguments.as_slice() {
                ["true"] => Ok(Self::Typing(true)),
                ["false"] => Ok(Self::Typing(false)),
                _ => Err(Error::MalformedMessage {
                    command: "playerTyping",
                    reason: "expected true or false",
                }),
            },
            "chatMessage" => {
                let text = unescape(&arguments.join("."));
                if text.is_empty() {
                    return Err(Error::MalformedMessage {
                        command: "chatMessage",
                        reason: "empty text",
                    });
                }
                Ok(Self::Chat(text))
            }
            "h" => match arguments.as_slice() {
                ["visible"] => Ok(Self::Visibility(Visibility::Visible)),
                ["hidden"] => Ok(Self::Visibility(Visibility::Hidden)),
                _ => Err(Error::MalformedMessage {
                    command: "h",
                    reason: "expected visible or hidden",
                }),
            },
            other => Err(Error::UnknownCommand(other.to_owned())),
        }
    }
}
