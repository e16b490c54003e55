use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use super::player::PlayerKey;
use super::rules::Phase;
use super::scoring::WordScore;
use super::tile::Tile;

/// What a turn did, with the data needed to reverse or repeat it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TurnKind {
    Played {
        placements: Vec<Tile>,
        replacements: Vec<Tile>,
        words: Vec<WordScore>,
    },
    Swapped {
        /// Tiles put back in the bag.
        placements: Vec<Tile>,
        replacements: Vec<Tile>,
    },
    Passed,
    TimedOut,
    TookBack {
        placements: Vec<Tile>,
        replacements: Vec<Tile>,
    },
    ChallengeWon {
        challenger: PlayerKey,
        placements: Vec<Tile>,
        replacements: Vec<Tile>,
    },
    ChallengeLost {
        challenger: PlayerKey,
        /// The challenger was flagged to miss their next turn.
        #[serde(default)]
        sets_miss: bool,
    },
    GameEnded {
        end_state: Phase,
        deltas: BTreeMap<PlayerKey, i32>,
    },
}

impl TurnKind {
    pub fn name(&self) -> &'static str {
        match self {
            TurnKind::Played { .. } => "PLAYED",
            TurnKind::Swapped { .. } => "SWAPPED",
            TurnKind::Passed => "PASSED",
            TurnKind::TimedOut => "TIMED_OUT",
            TurnKind::TookBack { .. } => "TOOK_BACK",
            TurnKind::ChallengeWon { .. } => "CHALLENGE_WON",
            TurnKind::ChallengeLost { .. } => "CHALLENGE_LOST",
            TurnKind::GameEnded { .. } => "GAME_ENDED",
        }
    }
}

/// State overwritten by a turn, kept so undo can put it back exactly.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Prior {
    /// Whose turn it was when this turn began.
    pub actor: Option<PlayerKey>,
    /// `passes` of the turn's player before the turn.
    pub passes: u32,
    /// Players whose miss-next-turn flag was used up moving to the next actor.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged: Vec<PlayerKey>,
}

/// One entry in the match log. Never changed once appended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Turn {
    #[serde(flatten)]
    pub kind: TurnKind,
    /// The player the turn is about: who played, passed or swapped, whose
    /// play was taken back or challenged, or who confirmed the end.
    pub player: PlayerKey,
    pub next_to_go: Option<PlayerKey>,
    /// Change to the score of `player` (of the challenger for a lost
    /// challenge). Zero for the end of the game, see the per-player deltas.
    pub score: i32,
    pub timestamp: u64,
    #[serde(default)]
    pub prior: Prior,
}

impl Turn {
    pub fn new(kind: TurnKind, player: PlayerKey) -> Self {
        Turn {
            kind,
            player,
            next_to_go: None,
            score: 0,
            timestamp: now(),
            prior: Prior::default(),
        }
    }

    pub fn scored(mut self, score: i32) -> Self {
        self.score = score;
        self
    }

    pub fn next(mut self, next_to_go: Option<PlayerKey>) -> Self {
        self.next_to_go = next_to_go;
        self
    }

    pub fn with_prior(mut self, prior: Prior) -> Self {
        self.prior = prior;
        self
    }

    pub fn is_play(&self) -> bool {
        matches!(self.kind, TurnKind::Played { .. })
    }

    pub fn words(&self) -> &[WordScore] {
        match &self.kind {
            TurnKind::Played { words, .. } => words,
            _ => &[],
        }
    }
}

pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
