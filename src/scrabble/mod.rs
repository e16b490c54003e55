//! The game engine: board, tiles, scoring and the match state machine.
//!
//! A [`MatchState`] owns everything about one game and is driven by its
//! command handlers (`play`, `pass`, `swap`, `challenge`, `take_back`,
//! `confirm_game_over`, `another_game`). Every handler appends exactly one
//! [`Turn`] to the match log, which is what undo, redo and [`Replay`] work
//! from.

use thiserror::Error;

mod commands;
mod edition;
mod events;
mod grid;
mod player;
mod rack;
mod replay;
mod robot;
mod rules;
mod scoring;
mod state;
mod supply;
mod tile;
mod turn;
mod undo;

pub use commands::{PassKind, TakeBackKind};
pub use edition::{Builtin, Edition, EditionDir, EditionLoader, LetterCount};
pub use events::{Notification, Services};
pub use grid::{Cell, Coord, Grid};
pub use player::{Player, PlayerKey};
pub use rack::Rack;
pub use replay::Replay;
pub use robot::BestPlay;
pub use rules::{MatchConfig, Penalty, Phase, Timer, WordCheck};
pub use scoring::{analyse, score_play, Move, PlayRejection, WordScore};
pub use state::{MatchState, SCHEMA_VERSION};
pub use supply::TileSupply;
pub use tile::{Face, Tile};
pub use turn::{Prior, Turn, TurnKind};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("could not parse board: {0}")]
    BoardParse(String),
    #[error("edition: {0}")]
    Edition(String),
    #[error("match has no edition yet")]
    NotCreated,
    #[error("game has not started")]
    NotStarted,
    #[error("game has already started")]
    AlreadyStarted,
    #[error("game is over")]
    GameOver,
    #[error("game is paused")]
    Paused,
    #[error("not your turn")]
    NotYourTurn,
    #[error("player {0} is not in this game")]
    UnknownPlayer(PlayerKey),
    #[error("player {0} has already joined")]
    DuplicatePlayer(PlayerKey),
    #[error("game is full")]
    TooManyPlayers,
    #[error("no {0:?} tile to spend")]
    NoTileToSpend(Face),
    #[error("square {0} is off the board")]
    OffBoard(Coord),
    #[error("square {0} is occupied")]
    CellOccupied(Coord),
    #[error(transparent)]
    Rejected(#[from] PlayRejection),
    #[error("cannot swap {requested} tiles, the bag has {remaining}")]
    BagTooSmall { requested: usize, remaining: usize },
    #[error("cannot swap more than {0} tiles")]
    SwapTooLarge(usize),
    #[error("there is no play to act on")]
    NoPreviousMove,
    #[error("only the player who made the last play can take it back")]
    NotYourPlay,
    #[error("cannot challenge your own play")]
    OwnPlay,
    #[error("the last play was not made by that player")]
    ChallengeMismatch,
    #[error("no dictionary to check words against")]
    NoDictionary,
    #[error("not in the dictionary: {}", .0.join(", "))]
    WordsRejected(Vec<String>),
    #[error("a follow-on game already exists")]
    FollowOnExists,
    #[error("undo is not available")]
    UndoUnavailable,
    #[error("nothing to redo")]
    NothingToRedo,
}
