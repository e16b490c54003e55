use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::grid::Grid;
use super::tile::{l, Tile};
use super::Error;

/// How many of a letter the bag starts with, and what each is worth.
/// A blank is written as a space.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct LetterCount {
    pub letter: char,
    pub count: usize,
    pub score: u32,
}

/// Everything a match needs to know about the physical game: board layout,
/// tile distribution, rack and swap sizes and the bonus for placing many
/// tiles at once.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Edition {
    pub name: String,
    pub layout: String,
    pub letters: Vec<LetterCount>,
    pub rack_size: usize,
    pub swap_size: usize,
    #[serde(default)]
    pub bonuses: BTreeMap<usize, i32>,
}

impl Edition {
    pub fn standard() -> Self {
        STANDARD.clone()
    }

    pub fn grid(&self) -> Result<Grid, Error> {
        Grid::parse(&self.layout)
    }

    /// The full starting multiset of tiles.
    pub fn tiles(&self) -> Vec<Tile> {
        let mut tiles = vec![];

        for letter in &self.letters {
            let face = if letter.letter == ' ' { l!() } else { l!(letter.letter) };

            for _ in 0..letter.count {
                tiles.push(Tile::new(face, letter.score));
            }
        }

        tiles
    }

    pub fn score(&self, letter: char) -> u32 {
        self.letters
            .iter()
            .find(|l| l.letter == letter)
            .map_or(0, |l| l.score)
    }

    /// Extra points for putting down `tiles_placed` tiles in one play.
    pub fn bonus(&self, tiles_placed: usize) -> i32 {
        self.bonuses.get(&tiles_placed).copied().unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), Error> {
        let grid = self.grid()?;
        if grid.cols() == 0 || grid.rows() == 0 {
            return Err(Error::Edition(format!("{}: empty layout", self.name)));
        }
        if self.rack_size == 0 {
            return Err(Error::Edition(format!("{}: zero rack size", self.name)));
        }
        if !grid.is_empty() {
            return Err(Error::Edition(format!("{}: layout has tiles on it", self.name)));
        }
        Ok(())
    }
}

macro_rules! letters {
    ($(($letter:expr, $count:expr, $score:expr)),* $(,)?) => {
        vec![$(LetterCount { letter: $letter, count: $count, score: $score }),*]
    };
}

lazy_static::lazy_static! {
    static ref STANDARD: Edition = Edition {
        name: "English_Scrabble".to_string(),
        layout: "
            3w .  .  2l .  .  .  3w .  .  .  2l .  .  3w
            .  2w .  .  .  3l .  .  .  3l .  .  .  2w .
            .  .  2w .  .  .  2l .  2l .  .  .  2w .  .
            2l .  .  2w .  .  .  2l .  .  .  2w .  .  2l
            .  .  .  .  2w .  .  .  .  .  2w .  .  .  .
            .  3l .  .  .  3l .  .  .  3l .  .  .  3l .
            .  .  2l .  .  .  2l .  2l .  .  .  2l .  .
            3w .  .  2l .  .  .  2w .  .  .  2l .  .  3w
            .  .  2l .  .  .  2l .  2l .  .  .  2l .  .
            .  3l .  .  .  3l .  .  .  3l .  .  .  3l .
            .  .  .  .  2w .  .  .  .  .  2w .  .  .  .
            2l .  .  2w .  .  .  2l .  .  .  2w .  .  2l
            .  .  2w .  .  .  2l .  2l .  .  .  2w .  .
            .  2w .  .  .  3l .  .  .  3l .  .  .  2w .
            3w .  .  2l .  .  .  3w .  .  .  2l .  .  3w
        "
        .to_string(),
        letters: letters![
            ('A', 9, 1),
            ('B', 2, 3),
            ('C', 2, 3),
            ('D', 4, 2),
            ('E', 12, 1),
            ('F', 2, 4),
            ('G', 3, 2),
            ('H', 2, 4),
            ('I', 9, 1),
            ('J', 1, 8),
            ('K', 1, 5),
            ('L', 4, 1),
            ('M', 2, 3),
            ('N', 6, 1),
            ('O', 8, 1),
            ('P', 2, 3),
            ('Q', 1, 10),
            ('R', 6, 1),
            ('S', 4, 1),
            ('T', 6, 1),
            ('U', 4, 1),
            ('V', 2, 4),
            ('W', 2, 4),
            ('X', 1, 8),
            ('Y', 2, 4),
            ('Z', 1, 10),
            (' ', 2, 0),
        ],
        rack_size: 7,
        swap_size: 7,
        bonuses: [(7, 50)].into_iter().collect(),
    };
}

/// Source of edition definitions, consulted once when a match is created.
#[async_trait]
pub trait EditionLoader: Send + Sync {
    async fn load(&self, name: &str) -> Result<Edition, Error>;
}

/// Editions compiled into the binary, plus any registered at runtime.
#[derive(Debug, Default, Clone)]
pub struct Builtin {
    extra: Vec<Edition>,
}

impl Builtin {
    pub fn with(mut self, edition: Edition) -> Self {
        self.extra.push(edition);
        self
    }
}

#[async_trait]
impl EditionLoader for Builtin {
    async fn load(&self, name: &str) -> Result<Edition, Error> {
        if let Some(edition) = self.extra.iter().find(|e| e.name == name) {
            return Ok(edition.clone());
        }

        if name == STANDARD.name {
            return Ok(Edition::standard());
        }

        Err(Error::Edition(format!("unknown edition {}", name)))
    }
}

/// Editions stored as `<dir>/<name>.json`.
#[derive(Debug, Clone)]
pub struct EditionDir(pub PathBuf);

#[async_trait]
impl EditionLoader for EditionDir {
    async fn load(&self, name: &str) -> Result<Edition, Error> {
        let path = self.0.join(format!("{}.json", name));
        let body = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::Edition(format!("{}: {}", path.display(), e)))?;
        let edition: Edition =
            serde_json::from_str(&body).map_err(|e| Error::Edition(format!("{}: {}", path.display(), e)))?;

        edition.validate()?;
        Ok(edition)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_standard_edition() {
        let edition = Edition::standard();
        let tiles = edition.tiles();

        assert_eq!(tiles.len(), 100);
        assert_eq!(tiles.iter().filter(|t| t.is_blank()).count(), 2);
        assert_eq!(edition.score('Q'), 10);
        assert_eq!(edition.bonus(7), 50);
        assert_eq!(edition.bonus(3), 0);

        let grid = edition.grid().unwrap();
        assert_eq!((grid.cols(), grid.rows()), (15, 15));
        assert_eq!(grid.at(grid.centre()).unwrap().word_multiplier(), 2);
        assert!(edition.validate().is_ok());
    }

    #[tokio::test]
    async fn test_builtin_loader() {
        let mut small = Edition::standard();
        small.name = "Tiny".into();
        small.rack_size = 3;

        let loader = Builtin::default().with(small);

        assert_eq!(loader.load("Tiny").await.unwrap().rack_size, 3);
        assert_eq!(loader.load("English_Scrabble").await.unwrap().rack_size, 7);
        assert!(matches!(loader.load("Klingon").await, Err(Error::Edition(_))));
    }

    #[tokio::test]
    async fn test_edition_dir() {
        let dir = tempfile::tempdir().unwrap();
        let edition = Edition::standard();
        std::fs::write(
            dir.path().join("English_Scrabble.json"),
            serde_json::to_string(&edition).unwrap(),
        )
        .unwrap();

        let loader = EditionDir(dir.path().to_path_buf());
        assert_eq!(loader.load("English_Scrabble").await.unwrap(), edition);
        assert!(loader.load("missing").await.is_err());
    }
}
