use serde::{Deserialize, Serialize};

use super::tile::{Face, Tile};
use super::Error;

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Copy, Clone)]
pub struct Coord {
    pub col: usize,
    pub row: usize,
}

impl Coord {
    pub fn new(col: usize, row: usize) -> Self {
        Coord { col, row }
    }

    /// Step by a signed offset; `None` when that would leave the first quadrant.
    pub fn offset(self, dcol: isize, drow: isize) -> Option<Coord> {
        Some(Coord {
            col: self.col.checked_add_signed(dcol)?,
            row: self.row.checked_add_signed(drow)?,
        })
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{})", self.col, self.row)
    }
}

/// One square of the grid. Multipliers are fixed when the grid is built;
/// only the tile changes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Cell {
    letter_multiplier: u32,
    word_multiplier: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tile: Option<Tile>,
}

impl Cell {
    fn plain() -> Self {
        Cell::with(1, 1)
    }

    fn with(letter_multiplier: u32, word_multiplier: u32) -> Self {
        Cell {
            letter_multiplier,
            word_multiplier,
            tile: None,
        }
    }

    pub fn letter_multiplier(&self) -> u32 {
        self.letter_multiplier
    }

    pub fn word_multiplier(&self) -> u32 {
        self.word_multiplier
    }

    pub fn tile(&self) -> Option<&Tile> {
        self.tile.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.tile.is_none()
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Grid {
    cols: usize,
    rows: usize,
    cells: Vec<Cell>,
}

impl Grid {
    /// Parse a layout made of whitespace separated tokens, one line per row:
    /// `.` is a plain square, `2l`/`3l`/`4l` multiply the letter, `2w`/`3w`/`4w`
    /// the word. A single character places a locked tile (used by tests and
    /// for sketching positions).
    pub fn parse(layout: &str) -> Result<Self, Error> {
        Self::parse_with(layout, |_| 0)
    }

    /// As [`Grid::parse`], scoring sketched tiles with `value`.
    pub fn parse_with(layout: &str, value: impl Fn(char) -> u32) -> Result<Self, Error> {
        let mut cells = vec![];
        let mut cols = 0;
        let mut rows = 0;

        for line in layout.lines() {
            let mut width = 0;

            for token in line.split_whitespace() {
                let cell = match token {
                    "." => Cell::plain(),
                    "2l" => Cell::with(2, 1),
                    "3l" => Cell::with(3, 1),
                    "4l" => Cell::with(4, 1),
                    "2w" => Cell::with(1, 2),
                    "3w" => Cell::with(1, 3),
                    "4w" => Cell::with(1, 4),
                    c => {
                        let mut chars = c.chars();
                        match (chars.next(), chars.next()) {
                            (Some(letter), None) => {
                                let at = Coord::new(width, rows);
                                let mut cell = Cell::plain();
                                cell.tile = Some(Tile::new(Face::Char(letter), value(letter))
                                    .placed(at, None)
                                    .locked());
                                cell
                            }
                            _ => return Err(Error::BoardParse(c.to_string())),
                        }
                    }
                };
                cells.push(cell);
                width += 1;
            }

            if width == 0 {
                continue;
            }

            if cols != 0 && width != cols {
                return Err(Error::BoardParse(format!("row {} has {} squares, expected {}", rows, width, cols)));
            }

            cols = width;
            rows += 1;
        }

        Ok(Grid { cols, rows, cells })
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn centre(&self) -> Coord {
        Coord::new(self.cols / 2, self.rows / 2)
    }

    fn index(&self, at: Coord) -> Option<usize> {
        if at.col < self.cols && at.row < self.rows {
            Some(at.row * self.cols + at.col)
        } else {
            None
        }
    }

    pub fn contains(&self, at: Coord) -> bool {
        self.index(at).is_some()
    }

    pub fn at(&self, at: Coord) -> Option<&Cell> {
        self.index(at).map(|i| &self.cells[i])
    }

    pub fn tile(&self, at: Coord) -> Option<&Tile> {
        self.at(at).and_then(Cell::tile)
    }

    /// Cell reached by stepping from `at`, if it is on the grid.
    pub fn step(&self, at: Coord, dcol: isize, drow: isize) -> Option<Coord> {
        at.offset(dcol, drow).filter(|c| self.contains(*c))
    }

    pub fn is_occupied(&self, at: Coord) -> bool {
        self.tile(at).is_some()
    }

    /// Put a tile on an empty cell. The tile keeps its own `locked` flag.
    pub fn place(&mut self, at: Coord, tile: Tile) -> Result<(), Error> {
        let index = self.index(at).ok_or(Error::OffBoard(at))?;
        let cell = &mut self.cells[index];

        match cell.tile {
            Some(_) => Err(Error::CellOccupied(at)),
            None => {
                let mut tile = tile;
                tile.at = Some(at);
                cell.tile = Some(tile);
                Ok(())
            }
        }
    }

    pub fn remove(&mut self, at: Coord) -> Option<Tile> {
        let index = self.index(at)?;
        self.cells[index].tile.take()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.cells.iter().filter_map(Cell::tile)
    }

    pub fn is_empty(&self) -> bool {
        self.tiles().next().is_none()
    }

    /// Grid with the same multipliers and no tiles.
    pub fn cleared(&self) -> Grid {
        Grid {
            cols: self.cols,
            rows: self.rows,
            cells: self
                .cells
                .iter()
                .map(|c| Cell::with(c.letter_multiplier, c.word_multiplier))
                .collect(),
        }
    }

    pub fn as_board_string(&self) -> String {
        let mut result = String::new();
        for (index, cell) in self.cells.iter().enumerate() {
            result.push_str(&format_cell(cell));
            if index % self.cols == self.cols - 1 {
                result.push('\n');
            }
        }

        result
    }
}

fn format_cell(cell: &Cell) -> String {
    match (cell.tile, cell.letter_multiplier, cell.word_multiplier) {
        (Some(tile), _, _) => match tile.face {
            Face::Char(char) => format!("{}  ", char),
            Face::Blank(Some(char)) => format!(":{} ", char),
            Face::Blank(None) => ":: ".to_string(),
        },
        (None, 1, 1) => ".  ".to_string(),
        (None, m, 1) => format!("{}l ", m),
        (None, _, m) => format!("{}w ", m),
    }
}
