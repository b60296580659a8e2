//! Session state machine
//!
//! A [`Game`] owns one session: its sampled trial list, the participant
//! registry, the round counter and the cumulative scores. It moves through
//! three states:
//!
//! * `Waiting` until both roles are taken,
//! * `Active` while rounds are played,
//! * `Complete` once the last round is over, a participant leaves, or no
//!   partner joined in time.
//!
//! The game never touches the network or the clock directly. Participants
//! are reached through a tunnel finder and delayed transitions are handed
//! to a scheduling closure, which delivers them back via
//! [`Game::receive_alarm`].

use std::fmt::Debug;

use garde::Validate;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use web_time::SystemTime;

use crate::{
    AlarmMessage, UpdateMessage,
    config::Options,
    constants::session::PARTICIPANT_THRESHOLD,
    game_id::GameId,
    message::{Command, Visibility},
    records::{LogRecord, LogSink, TracingSink},
    registry::{self, Id, Registry, Role},
    scoring::{Comparator, ExactMatch, RoundScore, Scorecard},
    session::Tunnel,
    sync::{self, CumulativeData, ParticipantSummary, Snapshot},
    trial::{
        Trial,
        catalog::Catalog,
        context::Condition,
        sampler::{self, TrialSampler},
    },
};

/// The phase a session is in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    /// Waiting for both roles to be taken
    Waiting,
    /// Rounds are being played
    Active,
    /// The session is over
    Complete,
}

/// Errors that can occur when creating or joining a session
#[derive(Error, Debug)]
pub enum Error {
    /// The options failed validation
    #[error("invalid options: {0}")]
    Config(#[from] garde::Report),
    /// The catalog cannot support the session's condition
    #[error(transparent)]
    Sampling(#[from] sampler::Error),
    /// A participant could not be registered
    #[error(transparent)]
    Registry(#[from] registry::Error),
}

/// A single reference game session
pub struct Game {
    id: GameId,
    options: Options,
    condition: Condition,
    trials: Vec<Trial>,
    registry: Registry,
    state: State,
    round_index: Option<usize>,
    submitted: bool,
    scorecard: Scorecard,
    comparator: Box<dyn Comparator + Send>,
    log_sink: Box<dyn LogSink + Send>,
}

impl Debug for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Game")
            .field("id", &self.id)
            .field("condition", &self.condition)
            .field("state", &self.state)
            .field("round_index", &self.round_index)
            .field("participants", &self.registry.count())
            .finish_non_exhaustive()
    }
}

impl Game {
    /// Creates a session and samples its full trial list
    ///
    /// The condition is taken from the options or drawn at random. With a
    /// seed in the options, the condition and every trial are reproducible.
    ///
    /// # Arguments
    ///
    /// * `id` - Identifier of the new session
    /// * `catalog` - Objects trials are sampled from
    /// * `options` - Session configuration
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the options are out of range and
    /// `Error::Sampling` if the catalog cannot produce a valid trial for
    /// some round.
    pub fn new(id: GameId, catalog: &Catalog, options: Options) -> Result<Self, Error> {
        options.validate()?;

        let mut rng = options
            .seed
            .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
        let condition = options
            .condition
            .unwrap_or_else(|| Condition::sample(&mut rng));

        let trials = TrialSampler::new(
            catalog,
            options.cell_dimensions(),
            options.max_sampling_attempts,
            &mut rng,
        )
        .trial_list(condition, options.num_rounds)?;

        info!(game = %id, %condition, rounds = trials.len(), "session created");

        Ok(Self {
            id,
            options,
            condition,
            trials,
            registry: Registry::default(),
            state: State::Waiting,
            round_index: None,
            submitted: false,
            scorecard: Scorecard::default(),
            comparator: Box::new(ExactMatch),
            log_sink: Box::new(TracingSink),
        })
    }

    /// Replaces the default exact-match scoring
    #[must_use]
    pub fn with_comparator(mut self, comparator: impl Comparator + Send + 'static) -> Self {
        self.comparator = Box::new(comparator);
        self
    }

    /// Replaces the default `tracing` record sink
    #[must_use]
    pub fn with_log_sink(mut self, log_sink: impl LogSink + Send + 'static) -> Self {
        self.log_sink = Box::new(log_sink);
        self
    }

    /// Identifier of the session
    pub fn id(&self) -> GameId {
        self.id
    }

    /// Options the session was created with
    pub fn options(&self) -> &Options {
        &self.options
    }

    /// The session's condition
    pub fn condition(&self) -> Condition {
        self.condition
    }

    /// The full trial list, in play order
    pub fn trials(&self) -> &[Trial] {
        &self.trials
    }

    /// Current phase
    pub fn state(&self) -> State {
        self.state
    }

    /// Index of the current round, absent before the session starts
    pub fn round_index(&self) -> Option<usize> {
        self.round_index
    }

    /// Content of the current round
    pub fn current_trial(&self) -> Option<&Trial> {
        self.round_index.and_then(|index| self.trials.get(index))
    }

    /// Participant registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Cumulative scores
    pub fn scorecard(&self) -> &Scorecard {
        &self.scorecard
    }

    /// Whether the session is over
    pub fn is_done(&self) -> bool {
        matches!(self.state, State::Complete)
    }

    /// Whether exactly the first participant is waiting for a partner
    ///
    /// This is the window in which the abandonment timer runs.
    pub fn awaiting_partner(&self) -> bool {
        matches!(self.state, State::Waiting) && self.registry.count() > 0
    }

    /// Registers a participant and starts the session once both roles are
    /// taken
    ///
    /// The participant receives a role confirmation. The join that fills
    /// the second role notifies the first participant, activates the
    /// session and broadcasts the first snapshot.
    ///
    /// # Arguments
    ///
    /// * `id` - The joining participant
    /// * `tunnel_finder` - Function to find communication tunnels for participants
    ///
    /// # Errors
    ///
    /// Returns `Error::Registry` with `InvalidRole` if both roles are taken
    /// or the session is over, and with `AlreadyRegistered` for a repeated
    /// join. Neither changes the session.
    pub fn add_participant<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        id: Id,
        tunnel_finder: F,
    ) -> Result<Role, Error> {
        if self.is_done() {
            return Err(registry::Error::InvalidRole.into());
        }

        let role = self.registry.register(id).inspect_err(|error| {
            debug!(game = %self.id, participant = %id, %error, "join rejected");
        })?;
        let participant_count = self.registry.count();

        info!(game = %self.id, participant = %id, %role, participant_count, "participant joined");

        self.registry.send_message(
            &UpdateMessage::RoleAssign {
                role,
                participant_count,
            },
            id,
            &tunnel_finder,
        );

        if participant_count == PARTICIPANT_THRESHOLD {
            self.registry.announce_others(
                id,
                &UpdateMessage::PartnerJoined { role },
                &tunnel_finder,
            );
            self.start(&tunnel_finder);
        }

        Ok(role)
    }

    fn start<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        self.state = State::Active;
        self.round_index = Some(0);
        self.submitted = false;

        info!(game = %self.id, condition = %self.condition, "session started");

        self.broadcast(tunnel_finder);
    }

    /// Handles a parsed message from a participant
    ///
    /// Messages from unregistered senders and messages arriving after the
    /// session is over are dropped.
    ///
    /// # Arguments
    ///
    /// * `id` - ID of the participant sending the message
    /// * `command` - The parsed message
    /// * `schedule_message` - Function to schedule delayed messages for timing
    /// * `tunnel_finder` - Function to find communication tunnels for participants
    pub fn receive_message<
        T: Tunnel,
        F: Fn(Id) -> Option<T>,
        S: FnMut(AlarmMessage, web_time::Duration),
    >(
        &mut self,
        id: Id,
        command: Command,
        schedule_message: S,
        tunnel_finder: F,
    ) {
        let role = match self.registry.lookup(id) {
            Ok(participant) => participant.role(),
            Err(error) => {
                warn!(game = %self.id, %error, command = command.name(), "dropping message");
                return;
            }
        };

        if self.is_done() {
            debug!(game = %self.id, command = command.name(), "session over, ignoring message");
            return;
        }

        match command {
            Command::Join => {
                debug!(game = %self.id, participant = %id, "ignoring join command");
            }
            Command::Advance(submission) => {
                self.submit(id, role, submission, schedule_message, tunnel_finder);
            }
            Command::Typing(typing) => {
                self.registry
                    .announce_others(id, &UpdateMessage::Typing { typing }, tunnel_finder);
            }
            Command::Chat(text) => self.relay_chat(id, role, text, tunnel_finder),
            Command::Visibility(visibility) => {
                if let Ok(participant) = self.registry.lookup_mut(id) {
                    participant.set_visible(matches!(visibility, Visibility::Visible));
                }
                debug!(game = %self.id, participant = %id, %visibility, "visibility changed");
            }
        }
    }

    fn relay_chat<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        id: Id,
        role: Role,
        text: String,
        tunnel_finder: F,
    ) {
        if let (State::Active, Some(round_index)) = (self.state, self.round_index) {
            self.log_sink.record(&LogRecord::Message {
                session_id: self.id.short(),
                timestamp: SystemTime::now(),
                round_index,
                role,
                text: text.clone(),
            });
        }

        self.registry
            .announce_others(id, &UpdateMessage::Chat { role, text }, tunnel_finder);
    }

    /// Scores the controlling participant's submission for the current
    /// round and schedules the next one
    fn submit<T: Tunnel, F: Fn(Id) -> Option<T>, S: FnMut(AlarmMessage, web_time::Duration)>(
        &mut self,
        id: Id,
        role: Role,
        submission: Vec<String>,
        mut schedule_message: S,
        tunnel_finder: F,
    ) {
        let (State::Active, Some(round_index)) = (self.state, self.round_index) else {
            debug!(game = %self.id, participant = %id, "ignoring submission outside of rounds");
            return;
        };

        if role != self.options.controlling_role {
            debug!(game = %self.id, %role, "ignoring submission from non-controlling role");
            return;
        }

        if self.submitted {
            debug!(game = %self.id, round_index, "ignoring duplicate submission");
            return;
        }

        let Some(trial) = self.trials.get(round_index) else {
            return;
        };
        let context = trial.context();
        let target = trial.target().id().to_owned();
        let score = self.comparator.score(&submission, trial.target());

        self.submitted = true;
        if let Ok(participant) = self.registry.lookup_mut(id) {
            participant.add_score(score);
        }

        self.log_sink.record(&LogRecord::Outcome {
            session_id: self.id.short(),
            timestamp: SystemTime::now(),
            round_index,
            trial_context: context,
            target: target.clone(),
            submitted_value: submission.iter().join(","),
            score,
        });
        self.scorecard.record(RoundScore {
            round_index,
            context,
            target: target.clone(),
            submission: submission.clone(),
            score,
        });

        info!(game = %self.id, round_index, %context, score, "round scored");

        self.registry.announce(
            &UpdateMessage::Feedback {
                round_index,
                participant: id,
                submission,
                target,
                score,
            },
            tunnel_finder,
        );

        schedule_message(
            AlarmMessage::AdvanceRound { index: round_index },
            self.options.feedback_delay,
        );
    }

    /// Handles a previously scheduled alarm
    ///
    /// An alarm only acts if it belongs to the current, already scored
    /// round. Late or repeated alarms are ignored.
    ///
    /// # Arguments
    ///
    /// * `message` - The alarm message to process
    /// * `tunnel_finder` - Function to find communication tunnels for participants
    pub fn receive_alarm<T: Tunnel, F: Fn(Id) -> Option<T>>(
        &mut self,
        message: AlarmMessage,
        tunnel_finder: F,
    ) {
        match message {
            AlarmMessage::AdvanceRound { index }
                if matches!(self.state, State::Active)
                    && self.round_index == Some(index)
                    && self.submitted =>
            {
                self.advance(tunnel_finder);
            }
            AlarmMessage::AdvanceRound { index } => {
                debug!(game = %self.id, index, "ignoring stale alarm");
            }
        }
    }

    /// Moves to the next round, or completes the session after the last
    fn advance<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        let Some(index) = self.round_index else {
            return;
        };

        let next = index + 1;
        if next >= self.trials.len() {
            self.mark_as_done(tunnel_finder);
            return;
        }

        self.round_index = Some(next);
        self.submitted = false;

        debug!(game = %self.id, round_index = next, "round started");

        self.broadcast(tunnel_finder);
    }

    /// Ends the session for everyone still connected
    ///
    /// Sends `SessionEnded` and closes every tunnel. No snapshot follows.
    pub fn mark_as_done<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        if self.is_done() {
            return;
        }
        self.state = State::Complete;

        info!(
            game = %self.id,
            rounds_played = self.scorecard.rounds().len(),
            score = self.scorecard.total(),
            "session complete"
        );

        self.registry
            .announce(&UpdateMessage::SessionEnded, &tunnel_finder);
        self.registry.close_all(tunnel_finder);
    }

    /// Gives up on a session whose partner never arrived
    ///
    /// Does nothing unless a lone participant is waiting.
    pub fn abandon<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, tunnel_finder: F) {
        if !self.awaiting_partner() {
            return;
        }
        self.state = State::Complete;

        warn!(game = %self.id, "no partner joined in time, abandoning session");

        self.registry
            .announce(&UpdateMessage::Abandoned, &tunnel_finder);
        self.registry.close_all(tunnel_finder);
    }

    /// Handles a participant whose connection went away
    ///
    /// The session cannot continue with a single participant, so it ends
    /// for whoever is left.
    pub fn disconnect<T: Tunnel, F: Fn(Id) -> Option<T>>(&mut self, id: Id, tunnel_finder: F) {
        if self.registry.lookup(id).is_err() || self.is_done() {
            return;
        }

        info!(game = %self.id, participant = %id, "participant disconnected");

        self.mark_as_done(tunnel_finder);
    }

    /// Captures the full shared state
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            started: !matches!(self.state, State::Waiting),
            participant_threshold: PARTICIPANT_THRESHOLD,
            participant_count: self.registry.count(),
            participants: self
                .registry
                .roster()
                .into_iter()
                .filter_map(|(id, _)| self.registry.lookup(id).ok())
                .map(|participant| ParticipantSummary {
                    role: participant.role(),
                    score: participant.score(),
                })
                .collect_vec(),
            cumulative_data: CumulativeData {
                game_id: self.id,
                scorecard: self.scorecard.clone(),
            },
            round_index: self.round_index,
            num_rounds: self.trials.len(),
            current_trial: self.current_trial().cloned(),
        }
    }

    /// Sends the current snapshot to every active participant
    ///
    /// Returns how many participants it was handed to.
    pub fn broadcast<T: Tunnel, F: Fn(Id) -> Option<T>>(&self, tunnel_finder: F) -> usize {
        sync::broadcast(&self.registry, self.snapshot(), tunnel_finder)
    }
}
