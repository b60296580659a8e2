//! Participant registry
//!
//! This module tracks who takes part in a session and in which role. The
//! registry only knows identities and roles; connection handles are looked
//! up on demand through a tunnel finder, so a participant whose connection
//! is gone is simply not "active" any more.

use std::{collections::HashMap, fmt::Display, str::FromStr};

use enum_map::{Enum, EnumMap};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

use super::{SyncMessage, UpdateMessage, session::Tunnel};

/// A unique identifier for a participant
#[derive(
    Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, DeserializeFromStr, SerializeDisplay,
)]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random participant ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::from_str(s)?))
    }
}

/// The two roles of a reference game
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
pub enum Role {
    /// Sees the target highlighted and describes it
    #[display("speaker")]
    Speaker,
    /// Picks an object based on the description
    #[display("listener")]
    Listener,
}

impl Role {
    /// Roles in the order they are handed out to joining participants
    pub const JOIN_ORDER: [Role; 2] = [Self::Speaker, Self::Listener];
}

/// A registered participant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    role: Role,
    visible: bool,
    score: f64,
}

impl Participant {
    fn new(role: Role) -> Self {
        Self {
            role,
            visible: true,
            score: 0.,
        }
    }

    /// The role assigned at join time
    pub fn role(&self) -> Role {
        self.role
    }

    /// Whether the participant's page was last reported visible
    pub fn visible(&self) -> bool {
        self.visible
    }

    /// Points earned by this participant's submissions
    pub fn score(&self) -> f64 {
        self.score
    }

    pub(crate) fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub(crate) fn add_score(&mut self, delta: f64) {
        self.score += delta;
    }
}

/// Errors that can occur when managing participants
#[derive(Error, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Both roles are already assigned
    #[error("all roles are already assigned")]
    InvalidRole,
    /// The participant already holds a role in this session
    #[error("participant {0} is already registered")]
    AlreadyRegistered(Id),
    /// The participant is not part of this session
    #[error("participant {0} is not registered")]
    UnknownParticipant(Id),
}

/// Tracks the participants of one session and their roles
#[derive(Debug, Default)]
pub struct Registry {
    participants: HashMap<Id, Participant>,
    holders: EnumMap<Role, Option<Id>>,
}

impl Registry {
    /// Registers a participant under the first free role
    ///
    /// # Errors
    ///
    /// Returns `Error::AlreadyRegistered` if `id` already holds a role and
    /// `Error::InvalidRole` if both roles are taken. Neither mutates the
    /// registry.
    pub fn register(&mut self, id: Id) -> Result<Role, Error> {
        if self.participants.contains_key(&id) {
            return Err(Error::AlreadyRegistered(id));
        }

        let role = Role::JOIN_ORDER
            .into_iter()
            .find(|role| self.holders[*role].is_none())
            .ok_or(Error::InvalidRole)?;

        self.holders[role] = Some(id);
        self.participants.insert(id, Participant::new(role));

        Ok(role)
    }

    /// Looks up a participant
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownParticipant` if `id` is not registered.
    pub fn lookup(&self, id: Id) -> Result<&Participant, Error> {
        self.participants
            .get(&id)
            .ok_or(Error::UnknownParticipant(id))
    }

    /// Looks up a participant for modification
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownParticipant` if `id` is not registered.
    pub fn lookup_mut(&mut self, id: Id) -> Result<&mut Participant, Error> {
        self.participants
            .get_mut(&id)
            .ok_or(Error::UnknownParticipant(id))
    }

    /// Number of registered participants
    pub fn count(&self) -> usize {
        self.participants.len()
    }

    /// The participant holding `role`, if any
    pub fn holder(&self, role: Role) -> Option<Id> {
        self.holders[role]
    }

    /// Registered participants in join order
    pub fn roster(&self) -> Vec<(Id, Role)> {
        Role::JOIN_ORDER
            .into_iter()
            .filter_map(|role| self.holders[role].map(|id| (id, role)))
            .collect_vec()
    }

    /// Participants with a live connection, in join order
    pub fn active<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) -> Vec<(Id, T, Role)> {
        self.roster()
            .into_iter()
            .filter_map(|(id, role)| tunnel_finder(id).map(|tunnel| (id, tunnel, role)))
            .collect_vec()
    }

    /// Participants with a live connection other than `id`
    pub fn others<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        id: Id,
        tunnel_finder: F,
    ) -> Vec<(Id, T, Role)> {
        self.active(tunnel_finder)
            .into_iter()
            .filter(|(other, _, _)| *other != id)
            .collect_vec()
    }

    /// Sends an update message to a single participant
    pub fn send_message<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        id: Id,
        tunnel_finder: F,
    ) {
        let Some(tunnel) = tunnel_finder(id) else {
            return;
        };

        tunnel.send_message(message);
    }

    /// Sends an update message to every active participant
    pub fn announce<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        for (_, tunnel, _) in self.active(tunnel_finder) {
            tunnel.send_message(message);
        }
    }

    /// Sends an update message to every active participant except `id`
    pub fn announce_others<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        id: Id,
        message: &UpdateMessage,
        tunnel_finder: F,
    ) {
        for (_, tunnel, _) in self.others(id, tunnel_finder) {
            tunnel.send_message(message);
        }
    }

    /// Sends a state message to every active participant
    ///
    /// Returns how many participants it was handed to.
    pub fn announce_state<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &self,
        state: &SyncMessage,
        tunnel_finder: F,
    ) -> usize {
        let recipients = self.active(tunnel_finder);
        for (_, tunnel, _) in &recipients {
            tunnel.send_state(state);
        }
        recipients.len()
    }

    /// Closes the connection of every active participant
    pub fn close_all<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) {
        for (_, tunnel, _) in self.active(tunnel_finder) {
            tunnel.close();
        }
    }
}
