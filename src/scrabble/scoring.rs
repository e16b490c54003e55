//! Scoring and validation of plays against a [`Grid`].
//!
//! Nothing here mutates the grid: a candidate play is described by the tiles
//! it would add, so the same functions serve both the check made before a play
//! is committed and any search that wants to score many candidates.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::grid::{Coord, Grid};
use super::tile::Tile;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct WordScore {
    pub word: String,
    pub score: i32,
}

/// A play that passed [`analyse`]: the tiles to put down (each with its
/// coordinate), every word formed, and the score before any length bonus.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub placements: Vec<Tile>,
    pub words: Vec<WordScore>,
    pub score: i32,
}

impl Move {
    pub fn word_list(&self) -> Vec<String> {
        self.words.iter().map(|w| w.word.clone()).collect()
    }
}

#[derive(Serialize, Deserialize, Error, Debug, Clone, PartialEq, Eq)]
pub enum PlayRejection {
    #[error("no tiles placed")]
    NoTiles,
    #[error("tile placed off the board")]
    OffBoard,
    #[error("square {0} is already occupied")]
    Occupied(Coord),
    #[error("tiles must be in a single row or column")]
    NotStraight,
    #[error("tiles must form a single unbroken word")]
    Gap,
    #[error("play must connect to tiles already on the board")]
    Disconnected,
    #[error("first play must cover the centre square")]
    NotOnCentre,
    #[error("first play must use at least two tiles")]
    TooFewTiles,
    #[error("a blank must be given a letter")]
    BlankUnassigned,
}

/// Score a straight play whose word ends at `last`, running in direction
/// `(dcol, drow)` (one of them 0, the other 1).
///
/// `tiles` holds the whole word in order. Cells already holding a tile score
/// that tile at face value; cells still empty take the matching entry of
/// `tiles` and apply their letter and word multipliers. Cross words formed by
/// each new tile are scored with that cell's multipliers only. When `words`
/// is given, every cross word and then the main word are appended to it.
pub fn score_play(
    grid: &Grid,
    last: Coord,
    dcol: isize,
    drow: isize,
    tiles: &[Tile],
    mut words: Option<&mut Vec<WordScore>>,
) -> i32 {
    let back = tiles.len() as isize - 1;
    let Some(start) = last.offset(-dcol * back, -drow * back) else {
        return 0;
    };

    let mut word_score = 0;
    let mut word_multiplier = 1;
    let mut cross_score = 0;
    let mut text = words.is_some().then(String::new);

    for (i, tile) in tiles.iter().enumerate() {
        let i = i as isize;
        let Some(cell) = start
            .offset(dcol * i, drow * i)
            .and_then(|at| grid.at(at).map(|cell| (at, cell)))
        else {
            return 0;
        };
        let (at, cell) = cell;

        let letter = match cell.tile() {
            Some(existing) => {
                word_score += existing.score as i32;
                existing.letter()
            }
            None => {
                word_score += (tile.score * cell.letter_multiplier()) as i32;
                word_multiplier *= cell.word_multiplier() as i32;

                if let Some(cross) = score_cross(grid, at, drow, dcol, tile, words.is_some()) {
                    cross_score += cross.score;
                    if let Some(words) = words.as_deref_mut() {
                        words.push(cross);
                    }
                }

                tile.letter()
            }
        };

        if let (Some(text), Some(letter)) = (text.as_mut(), letter) {
            text.push(letter);
        }
    }

    // a lone tile only scores through its cross word
    if tiles.len() < 2 {
        return cross_score;
    }

    let main_score = word_score * word_multiplier;
    if let (Some(words), Some(word)) = (words, text) {
        words.push(WordScore {
            word,
            score: main_score,
        });
    }

    cross_score + main_score
}

// Word through `at` running along (dcol, drow), with `tile` about to land on `at`.
fn score_cross(
    grid: &Grid,
    at: Coord,
    dcol: isize,
    drow: isize,
    tile: &Tile,
    want_text: bool,
) -> Option<WordScore> {
    let mut first = at;
    while let Some(prev) = grid.step(first, -dcol, -drow).filter(|c| grid.is_occupied(*c)) {
        first = prev;
    }

    let cell = grid.at(at)?;
    let mut length = 0;
    let mut score = 0;
    let mut word = String::new();
    let mut cursor = Some(first);

    while let Some(c) = cursor {
        let letter = if c == at {
            score += (tile.score * cell.letter_multiplier()) as i32;
            tile.letter()
        } else {
            match grid.tile(c) {
                Some(existing) => {
                    score += existing.score as i32;
                    existing.letter()
                }
                None => break,
            }
        };

        if want_text {
            word.extend(letter);
        }
        length += 1;
        cursor = grid.step(c, dcol, drow);
    }

    (length > 1).then(|| WordScore {
        word,
        score: score * cell.word_multiplier() as i32,
    })
}

/// Check a pending play against the grid and work out what it would score.
///
/// Every placement must carry its coordinate. The first play of a match (no
/// locked tile on the grid yet) must cover the centre and use at least two
/// tiles; any later play must touch a locked tile.
pub fn analyse(grid: &Grid, placements: &[Tile]) -> Result<Move, PlayRejection> {
    if placements.is_empty() {
        return Err(PlayRejection::NoTiles);
    }

    let mut sorted: Vec<(Coord, Tile)> = Vec::with_capacity(placements.len());
    for tile in placements {
        let at = tile
            .at
            .filter(|at| grid.contains(*at))
            .ok_or(PlayRejection::OffBoard)?;
        if grid.is_occupied(at) || sorted.iter().any(|(c, _)| *c == at) {
            return Err(PlayRejection::Occupied(at));
        }
        if tile.letter().is_none() {
            return Err(PlayRejection::BlankUnassigned);
        }
        sorted.push((at, *tile));
    }
    sorted.sort_by_key(|(at, _)| (at.row, at.col));

    let (first, _) = sorted[0];
    let (last, _) = sorted[sorted.len() - 1];

    let (dcol, drow) = if sorted.len() == 1 {
        let touches = |dc: isize, dr: isize| {
            [grid.step(first, -dc, -dr), grid.step(first, dc, dr)]
                .into_iter()
                .flatten()
                .any(|c| grid.is_occupied(c))
        };
        if !touches(1, 0) && touches(0, 1) {
            (0, 1)
        } else {
            (1, 0)
        }
    } else if sorted.iter().all(|(at, _)| at.row == first.row) {
        (1, 0)
    } else if sorted.iter().all(|(at, _)| at.col == first.col) {
        (0, 1)
    } else {
        return Err(PlayRejection::NotStraight);
    };

    // no holes between the first and last placement
    let mut cursor = first;
    while cursor != last {
        cursor = grid.step(cursor, dcol, drow).ok_or(PlayRejection::Gap)?;
        if !grid.is_occupied(cursor) && !sorted.iter().any(|(at, _)| *at == cursor) {
            return Err(PlayRejection::Gap);
        }
    }

    let mut start = first;
    while let Some(prev) = grid.step(start, -dcol, -drow).filter(|c| grid.is_occupied(*c)) {
        start = prev;
    }
    let mut end = last;
    while let Some(next) = grid.step(end, dcol, drow).filter(|c| grid.is_occupied(*c)) {
        end = next;
    }

    let first_play = !grid.tiles().any(|t| t.locked);
    if first_play {
        let centre = grid.centre();
        if !sorted.iter().any(|(at, _)| *at == centre) {
            return Err(PlayRejection::NotOnCentre);
        }
        if sorted.len() < 2 {
            return Err(PlayRejection::TooFewTiles);
        }
    } else {
        let locked_at = |c: Option<Coord>| c.and_then(|c| grid.tile(c)).map_or(false, |t| t.locked);
        let touches = sorted.iter().any(|(at, _)| {
            locked_at(at.offset(-1, 0))
                || locked_at(at.offset(1, 0))
                || locked_at(at.offset(0, -1))
                || locked_at(at.offset(0, 1))
        });
        if !touches {
            return Err(PlayRejection::Disconnected);
        }
    }

    let mut tiles = Vec::new();
    let mut cursor = Some(start);
    while let Some(c) = cursor {
        let tile = match sorted.iter().find(|(at, _)| *at == c) {
            Some((_, tile)) => *tile,
            None => *grid.tile(c).ok_or(PlayRejection::Gap)?,
        };
        tiles.push(tile);
        cursor = if c == end { None } else { grid.step(c, dcol, drow) };
    }

    let mut words = Vec::new();
    let score = score_play(grid, end, dcol, drow, &tiles, Some(&mut words));

    Ok(Move {
        placements: sorted.into_iter().map(|(_, tile)| tile).collect(),
        words,
        score,
    })
}
