//! Tokio host for sessions
//!
//! Each session runs in its own task that owns the [`Game`] and the
//! participants' tunnels. Everything touching a session (joins, raw
//! messages, disconnects, alarms, the abandonment timer) is funnelled into
//! that task, so a session's state is only ever mutated from one place.
//!
//! [`Lobby`] sits in front of the tasks: it pairs incoming connections into
//! sessions that are still waiting for a partner and forgets sessions once
//! their task has finished.

use std::{
    collections::HashMap,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use dashmap::DashMap;
use derive_where::derive_where;
use garde::Validate;
use itertools::Itertools;
use thiserror::Error;
use tokio::{
    sync::{Mutex, mpsc, oneshot},
    task::JoinHandle,
    time::{Sleep, sleep},
};
use tracing::{debug, info, warn};
use web_time::Duration;

use crate::{
    AlarmMessage,
    config::Options,
    game::{self, Game, State},
    game_id::GameId,
    message::{self, Command},
    registry::{Id, Role},
    session::Tunnel,
    trial::{catalog::Catalog, context::Condition, sampler},
};

/// Errors that can occur when talking to a session
#[derive(Error, Debug)]
pub enum Error {
    /// The session's task has finished
    #[error("session {0} has ended")]
    Closed(GameId),
    /// The lobby knows no session with this id
    #[error("no session {0}")]
    UnknownSession(GameId),
    /// The session refused the request
    #[error(transparent)]
    Game(#[from] game::Error),
}

enum Inbound<T> {
    Join {
        id: Id,
        tunnel: T,
        reply: oneshot::Sender<Result<Role, game::Error>>,
    },
    Message {
        id: Id,
        raw: String,
    },
    Disconnect {
        id: Id,
    },
}

/// Cheaply cloneable handle to a running session
#[derive_where(Clone, Debug)]
pub struct SessionHandle<T> {
    game_id: GameId,
    inbox: mpsc::UnboundedSender<Inbound<T>>,
    accepting: Arc<AtomicBool>,
}

impl<T> SessionHandle<T> {
    /// Identifier of the session
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Whether the session is still waiting for participants
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::Acquire) && !self.inbox.is_closed()
    }

    /// Registers a participant reachable through `tunnel`
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the session has ended and `Error::Game`
    /// if the session rejected the join.
    pub async fn join(&self, id: Id, tunnel: T) -> Result<Role, Error> {
        let (reply, response) = oneshot::channel();
        self.inbox
            .send(Inbound::Join { id, tunnel, reply })
            .map_err(|_| Error::Closed(self.game_id))?;

        let result = response.await.map_err(|_| Error::Closed(self.game_id))?;
        Ok(result?)
    }

    /// Forwards a raw wire message from a participant
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the session has ended.
    pub fn send(&self, id: Id, raw: impl Into<String>) -> Result<(), Error> {
        self.inbox
            .send(Inbound::Message {
                id,
                raw: raw.into(),
            })
            .map_err(|_| Error::Closed(self.game_id))
    }

    /// Reports that a participant's connection went away
    ///
    /// # Errors
    ///
    /// Returns `Error::Closed` if the session has ended.
    pub fn disconnect(&self, id: Id) -> Result<(), Error> {
        self.inbox
            .send(Inbound::Disconnect { id })
            .map_err(|_| Error::Closed(self.game_id))
    }
}

/// Spawns the task driving `game`
///
/// The task ends once the session is complete or every handle is dropped.
pub fn spawn_session<T: Tunnel + Clone + Send + 'static>(
    game: Game,
) -> (SessionHandle<T>, JoinHandle<()>) {
    let (inbox, receiver) = mpsc::unbounded_channel();
    let accepting = Arc::new(AtomicBool::new(true));
    let handle = SessionHandle {
        game_id: game.id(),
        inbox,
        accepting: Arc::clone(&accepting),
    };

    let task = tokio::spawn(run_session(game, receiver, accepting));

    (handle, task)
}

/// One-shot timer for a lone participant waiting for a partner
#[derive(Default)]
struct AbandonmentTimer {
    sleep: Option<Pin<Box<Sleep>>>,
    armed: bool,
}

impl AbandonmentTimer {
    /// Starts the countdown the first time it is called
    fn arm(&mut self, timeout: Duration) {
        if !self.armed {
            self.armed = true;
            self.sleep = Some(Box::pin(sleep(timeout)));
        }
    }

    /// Stops a running countdown, returning whether one was running
    fn cancel(&mut self) -> bool {
        self.sleep.take().is_some()
    }

    /// Resolves when a running countdown elapses; pending otherwise
    async fn expired(&mut self) {
        let Some(sleep) = self.sleep.as_mut() else {
            return std::future::pending().await;
        };
        sleep.await;
        self.sleep = None;
    }
}

fn schedule_alarm(
    alarms: &mpsc::UnboundedSender<AlarmMessage>,
) -> impl FnMut(AlarmMessage, Duration) + '_ {
    move |alarm, delay| {
        let alarms = alarms.clone();
        tokio::spawn(async move {
            sleep(delay).await;
            // the session may have ended meanwhile
            let _ = alarms.send(alarm);
        });
    }
}

async fn run_session<T: Tunnel + Clone + Send + 'static>(
    mut game: Game,
    mut inbox: mpsc::UnboundedReceiver<Inbound<T>>,
    accepting: Arc<AtomicBool>,
) {
    let game_id = game.id();
    let abandonment_timeout = game.options().abandonment_timeout;
    let mut tunnels: HashMap<Id, T> = HashMap::new();
    let (alarm_sender, mut alarms) = mpsc::unbounded_channel();
    let mut abandonment = AbandonmentTimer::default();

    loop {
        tokio::select! {
            event = inbox.recv() => {
                let Some(event) = event else {
                    debug!(game = %game_id, "all handles dropped");
                    break;
                };

                match event {
                    Inbound::Join { id, tunnel, reply } => {
                        let fresh = !tunnels.contains_key(&id);
                        if fresh {
                            tunnels.insert(id, tunnel);
                        }
                        let result = game.add_participant(id, |id| tunnels.get(&id).cloned());
                        if result.is_err() && fresh {
                            tunnels.remove(&id);
                        }
                        let _ = reply.send(result);
                    }
                    Inbound::Message { id, raw } => match raw.parse::<Command>() {
                        Ok(command) => game.receive_message(
                            id,
                            command,
                            schedule_alarm(&alarm_sender),
                            |id| tunnels.get(&id).cloned(),
                        ),
                        Err(error @ message::Error::UnknownCommand(_)) => {
                            debug!(game = %game_id, participant = %id, %error, "ignoring message");
                        }
                        Err(error) => {
                            warn!(game = %game_id, participant = %id, %error, "dropping malformed message");
                        }
                    },
                    Inbound::Disconnect { id } => {
                        tunnels.remove(&id);
                        game.disconnect(id, |id| tunnels.get(&id).cloned());
                    }
                }
            }
            Some(alarm) = alarms.recv() => {
                game.receive_alarm(alarm, |id| tunnels.get(&id).cloned());
            }
            () = abandonment.expired() => {
                game.abandon(|id| tunnels.get(&id).cloned());
            }
        }

        if game.awaiting_partner() {
            abandonment.arm(abandonment_timeout);
        } else if abandonment.cancel() {
            debug!(game = %game_id, "abandonment timer cancelled");
        }

        accepting.store(matches!(game.state(), State::Waiting), Ordering::Release);

        if game.is_done() {
            break;
        }
    }

    accepting.store(false, Ordering::Release);
    info!(game = %game_id, "session task finished");
}

/// Pairs incoming connections into sessions
///
/// A connection joins the first session still waiting for a partner, or
/// starts a new one when there is none.
pub struct Lobby<T> {
    catalog: Arc<Catalog>,
    options: Options,
    sessions: Arc<DashMap<GameId, SessionHandle<T>>>,
    pairing: Mutex<()>,
}

impl<T: Tunnel + Clone + Send + 'static> Lobby<T> {
    /// Creates a lobby building every session from `catalog` and `options`
    ///
    /// # Errors
    ///
    /// Returns `Error::Game` if the options fail validation or the catalog
    /// cannot supply every context of the conditions sessions may draw.
    pub fn new(catalog: Catalog, options: Options) -> Result<Self, Error> {
        options.validate().map_err(game::Error::from)?;

        let conditions = options
            .condition
            .map_or_else(|| Condition::ALL.to_vec(), |condition| vec![condition]);
        for condition in conditions {
            sampler::ensure_supported(&catalog, condition, options.num_rounds)
                .map_err(game::Error::from)?;
        }

        Ok(Self {
            catalog: Arc::new(catalog),
            options,
            sessions: Arc::new(DashMap::new()),
            pairing: Mutex::new(()),
        })
    }

    /// Places a new connection into a session
    ///
    /// Returns the session it landed in, the participant's new id and the
    /// role it was given.
    ///
    /// # Errors
    ///
    /// Returns `Error::Game` if a new session was needed and its trials
    /// could not be sampled.
    pub async fn connect(&self, tunnel: T) -> Result<(GameId, Id, Role), Error> {
        let _pairing = self.pairing.lock().await;
        let id = Id::new();

        let waiting = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_accepting())
            .map(|entry| entry.value().clone())
            .collect_vec();

        for handle in waiting {
            match handle.join(id, tunnel.clone()).await {
                Ok(role) => return Ok((handle.game_id(), id, role)),
                Err(error) => {
                    debug!(game = %handle.game_id(), %error, "session no longer accepting");
                }
            }
        }

        let game = Game::new(GameId::new(), &self.catalog, self.options)?;
        let game_id = game.id();
        let (handle, task) = spawn_session(game);
        self.sessions.insert(game_id, handle.clone());

        let sessions = Arc::clone(&self.sessions);
        tokio::spawn(async move {
            if let Err(error) = task.await {
                warn!(game = %game_id, %error, "session task failed");
            }
            sessions.remove(&game_id);
            debug!(game = %game_id, "session removed from lobby");
        });

        let role = handle.join(id, tunnel).await?;
        Ok((game_id, id, role))
    }

    fn session(&self, game_id: GameId) -> Result<SessionHandle<T>, Error> {
        self.sessions
            .get(&game_id)
            .map(|entry| entry.value().clone())
            .ok_or(Error::UnknownSession(game_id))
    }

    /// Forwards a raw wire message to a participant's session
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSession` or `Error::Closed` if the session is
    /// gone.
    pub fn dispatch(&self, game_id: GameId, id: Id, raw: impl Into<String>) -> Result<(), Error> {
        self.session(game_id)?.send(id, raw)
    }

    /// Reports a closed connection to its session
    ///
    /// # Errors
    ///
    /// Returns `Error::UnknownSession` or `Error::Closed` if the session is
    /// gone.
    pub fn disconnect(&self, game_id: GameId, id: Id) -> Result<(), Error> {
        self.session(game_id)?.disconnect(id)
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is live
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
