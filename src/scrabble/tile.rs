use serde::{Deserialize, Serialize};

use super::grid::Coord;

/// What is printed on a tile. A blank carries the letter it stands for once played.
#[derive(Serialize, Deserialize, PartialEq, Eq, Hash, Copy, Clone)]
pub enum Face {
    Char(char),
    Blank(Option<char>),
}

impl std::fmt::Debug for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Face::Char(char) => write!(f, "[{}]", char),
            Face::Blank(None) => write!(f, "[ ]"),
            Face::Blank(Some(char)) => write!(f, "[({})]", char),
        }
    }
}

impl Face {
    pub fn as_char(&self) -> Option<char> {
        match *self {
            Face::Char(char) => Some(char),
            Face::Blank(Some(char)) => Some(char),
            _ => None,
        }
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Face::Blank(_))
    }
}

macro_rules! l {
    () => {
        $crate::scrabble::Face::Blank(None)
    };

    ($c:expr) => {
        $crate::scrabble::Face::Char($c)
    };
}

pub(crate) use l;

/// A letter tile. Tiles are values: moving one between the bag, a rack and the
/// grid copies it, and identity is recovered by matching face (and coordinate
/// when on the grid).
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Copy, Clone)]
pub struct Tile {
    pub face: Face,
    pub score: u32,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at: Option<Coord>,
}

impl Tile {
    pub fn new(face: Face, score: u32) -> Self {
        // a blank never scores, whatever the edition says
        let score = if face.is_blank() { 0 } else { score };

        Tile {
            face,
            score,
            locked: false,
            at: None,
        }
    }

    pub fn letter(&self) -> Option<char> {
        self.face.as_char()
    }

    pub fn is_blank(&self) -> bool {
        self.face.is_blank()
    }

    /// Same kind of tile: both blanks, or the same printed letter.
    pub fn matches(&self, other: &Tile) -> bool {
        match (self.face, other.face) {
            (Face::Blank(_), Face::Blank(_)) => true,
            (Face::Char(a), Face::Char(b)) => a == b,
            _ => false,
        }
    }

    /// Copy of this tile placed at `at`, with a blank standing for `letter`.
    pub fn placed(&self, at: Coord, letter: Option<char>) -> Tile {
        let face = match self.face {
            Face::Blank(assigned) => Face::Blank(letter.or(assigned)),
            face => face,
        };

        Tile {
            face,
            score: self.score,
            locked: false,
            at: Some(at),
        }
    }

    /// Copy suitable for a rack or the bag: unlocked, off the board, blanks reset.
    pub fn lifted(&self) -> Tile {
        let face = match self.face {
            Face::Blank(_) => Face::Blank(None),
            face => face,
        };

        Tile {
            face,
            score: self.score,
            locked: false,
            at: None,
        }
    }

    pub fn locked(mut self) -> Tile {
        self.locked = true;
        self
    }
}
