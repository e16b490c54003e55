use std::collections::VecDeque;

use rand::prelude::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::tile::Tile;

/// The bag of undrawn tiles.
///
/// Draws are uniform over the tiles left, so each letter comes out in
/// proportion to how many of it remain. A scripted draw sequence can be queued
/// to make the next draws reproduce an earlier game; it belongs to this bag
/// alone.
#[derive(Serialize, Deserialize, Clone)]
pub struct TileSupply {
    tiles: Vec<Tile>,
    #[serde(skip, default = "StdRng::from_entropy")]
    rng: StdRng,
    #[serde(skip)]
    scripted: VecDeque<Tile>,
}

impl std::fmt::Debug for TileSupply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TileSupply")
            .field("tiles", &self.tiles.len())
            .field("scripted", &self.scripted)
            .finish()
    }
}

impl Default for TileSupply {
    fn default() -> Self {
        TileSupply::new(vec![], None)
    }
}

impl TileSupply {
    pub fn new(tiles: Vec<Tile>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        TileSupply {
            tiles: tiles.into_iter().map(|t| t.lifted()).collect(),
            rng,
            scripted: VecDeque::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Make the next draws return tiles matching `tiles`, in order.
    pub fn script(&mut self, tiles: impl IntoIterator<Item = Tile>) {
        self.scripted.extend(tiles);
    }

    /// Forget any scripted draws not yet made.
    pub fn clear_script(&mut self) {
        self.scripted.clear();
    }

    pub fn is_scripted(&self) -> bool {
        !self.scripted.is_empty()
    }

    pub fn draw(&mut self) -> Option<Tile> {
        if let Some(wanted) = self.scripted.pop_front() {
            // a script naming a tile the bag no longer holds is a corrupt replay
            let Some(tile) = self.take(&wanted) else {
                panic!("scripted draw of {:?} but the bag has none", wanted.face);
            };
            return Some(tile);
        }

        if self.tiles.is_empty() {
            return None;
        }

        let index = self.rng.gen_range(0..self.tiles.len());
        Some(self.tiles.swap_remove(index))
    }

    pub fn draw_many(&mut self, count: usize) -> Vec<Tile> {
        (0..count).map_while(|_| self.draw()).collect()
    }

    pub fn put(&mut self, tile: Tile) {
        self.tiles.push(tile.lifted());
    }

    /// Take a specific kind of tile out of the bag.
    pub fn take(&mut self, wanted: &Tile) -> Option<Tile> {
        let index = self.tiles.iter().position(|t| t.matches(wanted))?;
        Some(self.tiles.swap_remove(index))
    }

    /// Letters left, sorted; blanks sort first as spaces.
    pub fn letters(&self) -> String {
        let mut letters: Vec<char> = self.tiles.iter().map(|t| t.letter().unwrap_or(' ')).collect();
        letters.sort_unstable();
        letters.into_iter().collect()
    }
}
