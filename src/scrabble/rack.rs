use serde::{Deserialize, Serialize};

use super::tile::Tile;
use super::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Rack(Vec<Tile>);

impl Rack {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.0
    }

    pub fn add(&mut self, tile: Tile) {
        self.0.push(tile.lifted());
    }

    /// Remove a tile of the same kind; blanks match any blank.
    pub fn remove(&mut self, tile: &Tile) -> Option<Tile> {
        let index = self.0.iter().position(|t| t.matches(tile))?;
        Some(self.0.remove(index))
    }

    pub fn find(&self, tile: &Tile) -> Option<&Tile> {
        self.0.iter().find(|t| t.matches(tile))
    }

    /// Remove all of `tiles`, or nothing if any is missing.
    pub fn spend(&mut self, tiles: &[Tile]) -> Result<Vec<Tile>, Error> {
        let mut rack = self.clone();
        let mut spent = Vec::with_capacity(tiles.len());

        for tile in tiles {
            let removed = rack.remove(tile).ok_or(Error::NoTileToSpend(tile.face))?;
            spent.push(removed);
        }

        *self = rack;
        Ok(spent)
    }

    /// Sum of the face values still held.
    pub fn score(&self) -> i32 {
        self.0.iter().map(|t| t.score as i32).sum()
    }

    pub fn clear(&mut self) -> Vec<Tile> {
        std::mem::take(&mut self.0)
    }

    /// Letters held, sorted, blanks as spaces.
    pub fn letters(&self) -> String {
        let mut letters: Vec<char> = self.0.iter().map(|t| t.letter().unwrap_or(' ')).collect();
        letters.sort_unstable();
        letters.into_iter().collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scrabble::tile::{l, Face};

    fn rack(letters: &str) -> Rack {
        let mut rack = Rack::default();
        for c in letters.chars() {
            let face = if c == ' ' { l!() } else { Face::Char(c) };
            rack.add(Tile::new(face, 2));
        }
        rack
    }

    #[test]
    fn test_spend_is_all_or_nothing() {
        let mut r = rack("STILQ");

        assert_eq!(
            r.spend(&[Tile::new(l!('S'), 1), Tile::new(l!('A'), 1)]),
            Err(Error::NoTileToSpend(l!('A')))
        );
        assert_eq!(r.len(), 5);

        let spent = r.spend(&[Tile::new(l!('S'), 1), Tile::new(l!('Q'), 10)]).unwrap();
        assert_eq!(spent.len(), 2);
        assert_eq!(r.letters(), "ILT");
    }

    #[test]
    fn test_blank_stands_for_any_blank() {
        let mut r = rack("A ");
        let played_blank = Tile::new(l!(), 0).placed(crate::scrabble::Coord::new(0, 0), Some('Z'));

        assert!(r.remove(&played_blank).unwrap().is_blank());
        assert!(r.remove(&played_blank).is_none());
    }

    #[test]
    fn test_rack_score() {
        let r = rack("AB ");
        assert_eq!(r.score(), 4);
    }
}
