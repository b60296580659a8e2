//! State snapshots and broadcasting
//!
//! Whenever the session's state changes in a way both participants must
//! agree on (the session starts, a new round begins) the full state is
//! captured in a [`Snapshot`] and pushed to every active participant.
//! Snapshots are complete, so a client never has to merge them.

use serde::Serialize;
use tracing::trace;

use crate::{
    SyncMessage,
    game_id::GameId,
    registry::{Id, Registry, Role},
    scoring::Scorecard,
    session::Tunnel,
    trial::Trial,
};

/// A participant as seen in snapshots
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    /// Assigned role
    pub role: Role,
    /// Points earned by the participant's own submissions
    pub score: f64,
}

/// Cumulative data carried by every snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeData {
    /// The session the data belongs to
    pub game_id: GameId,
    /// Scores so far
    pub scorecard: Scorecard,
}

/// The full shared state of a session at one point in time
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Whether rounds have started
    pub started: bool,
    /// Participants needed before rounds start
    pub participant_threshold: usize,
    /// Participants currently registered
    pub participant_count: usize,
    /// Registered participants in join order
    pub participants: Vec<ParticipantSummary>,
    /// Session id and scores
    pub cumulative_data: CumulativeData,
    /// Index of the current round, absent before the session starts
    pub round_index: Option<usize>,
    /// Total number of rounds
    pub num_rounds: usize,
    /// Content of the current round, absent before the session starts
    pub current_trial: Option<Trial>,
}

/// Sends `snapshot` to every participant with a live connection
///
/// Every call sends; identical consecutive snapshots are not filtered.
/// Returns how many participants the snapshot was handed to.
pub fn broadcast<T: Tunnel, F: Fn(Id) -> Option<T>>(
    registry: &Registry,
    snapshot: Snapshot,
    tunnel_finder: F,
) -> usize {
    let round_index = snapshot.round_index;
    let recipients = registry.announce_state(
        &SyncMessage::StateUpdate(Box::new(snapshot)),
        tunnel_finder,
    );
    trace!(?round_index, recipients, "broadcast snapshot");
    recipients
}
