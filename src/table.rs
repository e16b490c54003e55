//! One task per match: commands arrive on a queue and are applied one at a
//! time, and the match clock ticks in between while it is running.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::scrabble::{self, MatchState, Move, Notification, Phase, PlayerKey, Tile, Turn};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Play { placements: Vec<Tile> },
    Pass,
    Swap { tiles: Vec<Tile> },
    Challenge { challenged: PlayerKey },
    TakeBack,
    ConfirmGameOver {
        #[serde(default = "game_over")]
        end_state: Phase,
    },
    Undo,
    Redo,
    Pause,
    Unpause,
}

fn game_over() -> Phase {
    Phase::GameOver
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Play { .. } => "PLAY",
            Command::Pass => "PASS",
            Command::Swap { .. } => "SWAP",
            Command::Challenge { .. } => "CHALLENGE",
            Command::TakeBack => "TAKE_BACK",
            Command::ConfirmGameOver { .. } => "CONFIRM_GAME_OVER",
            Command::Undo => "UNDO",
            Command::Redo => "REDO",
            Command::Pause => "PAUSE",
            Command::Unpause => "UNPAUSE",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("table is closed")]
    Closed,
    #[error(transparent)]
    Game(#[from] scrabble::Error),
}

type Reply = Result<Option<Turn>, scrabble::Error>;

#[derive(Debug)]
struct Request {
    player: PlayerKey,
    command: Command,
    reply: oneshot::Sender<Reply>,
}

/// Cheap to clone; every clone talks to the same table.
#[derive(Debug, Clone)]
pub struct TableHandle {
    key: String,
    requests: mpsc::Sender<Request>,
    events: broadcast::Sender<Notification>,
}

impl TableHandle {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Apply a command and wait for its outcome. Commands that change no
    /// turn (pause, unpause, a game over that was already over) give `None`.
    pub async fn send(&self, player: impl Into<PlayerKey>, command: Command) -> Result<Option<Turn>, Error> {
        let (reply, outcome) = oneshot::channel();
        let request = Request {
            player: player.into(),
            command,
            reply,
        };

        self.requests.send(request).await.map_err(|_| Error::Closed)?;
        Ok(outcome.await.map_err(|_| Error::Closed)??)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }
}

pub struct Table {
    state: MatchState,
    requests: mpsc::Receiver<Request>,
    stale_after: Option<Duration>,
}

const QUEUE_DEPTH: usize = 32;

impl Table {
    /// Run `state` on its own task. The task ends, handing back the match,
    /// when every handle is dropped or the match goes stale.
    pub fn spawn(state: MatchState, stale_after: Option<Duration>) -> (TableHandle, JoinHandle<MatchState>) {
        let (sender, requests) = mpsc::channel(QUEUE_DEPTH);
        let handle = TableHandle {
            key: state.key.clone(),
            requests: sender,
            events: state.event_sender(),
        };

        let table = Table {
            state,
            requests,
            stale_after,
        };

        (handle, tokio::spawn(table.run()))
    }

    async fn run(mut self) -> MatchState {
        let mut clock = tokio::time::interval(Duration::from_secs(1));
        clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut age = tokio::time::interval(Duration::from_secs(60));
        age.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(game = %self.state.key, "table open");

        loop {
            tokio::select! {
                request = self.requests.recv() => match request {
                    Some(request) => self.handle(request).await,
                    None => break,
                },
                _ = clock.tick(), if self.state.clock_running() => {
                    self.state.tick().await;
                }
                _ = age.tick(), if self.stale_after.is_some() => {
                    if let Some(stale_after) = self.stale_after {
                        if self.state.check_age(stale_after).await {
                            break;
                        }
                    }
                }
            }
        }

        info!(game = %self.state.key, phase = ?self.state.phase(), "table closed");
        self.state
    }

    async fn handle(&mut self, request: Request) {
        let name = request.command.name();
        debug!(game = %self.state.key, player = %request.player, command = name, "command");

        let outcome = self.apply(&request.player, request.command).await;
        if let Err(e) = &outcome {
            warn!(game = %self.state.key, player = %request.player, command = name, "refused: {}", e);
        }

        // the caller may have stopped waiting
        let _ = request.reply.send(outcome);
    }

    async fn apply(&mut self, player: &PlayerKey, command: Command) -> Reply {
        let state = &mut self.state;

        match command {
            Command::Play { placements } => {
                let mv = Move {
                    placements,
                    words: vec![],
                    score: 0,
                };
                state.play(player, mv).await.map(Some)
            }
            Command::Pass => state.pass(player).await.map(Some),
            Command::Swap { tiles } => state.swap(player, &tiles).await.map(Some),
            Command::Challenge { challenged } => state.challenge(player, &challenged).await.map(Some),
            Command::TakeBack => state.take_back(player).await.map(Some),
            Command::ConfirmGameOver { end_state } => state.confirm_game_over(player, end_state).await,
            Command::Undo => {
                if !state.can_undo() {
                    return Err(scrabble::Error::UndoUnavailable);
                }
                Ok(Some(state.undo().await))
            }
            Command::Redo => state.redo().await.map(Some),
            Command::Pause => state.pause(player).await.map(|_| None),
            Command::Unpause => state.unpause(player).await.map(|_| None),
        }
    }
}
