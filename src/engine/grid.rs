use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ops;

/// Side length of the square grid.
pub const SIZE: usize = 4;

/// Largest tile a 4x4 game can produce (2^17); validated input may not exceed it.
pub const MAX_TILE: u32 = 1 << MAX_EXPONENT;
pub const MAX_EXPONENT: u8 = 17;

pub(crate) type Line = [u32; SIZE];
pub(crate) type Cells = [Line; SIZE];
pub(crate) type Score = u64;

/// A direction to slide/merge tiles toward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All four directions in trace-code order.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Compact code used by the run trace format.
    #[inline]
    pub fn code(self) -> u8 {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    #[inline]
    pub fn from_code(code: u8) -> Option<Self> {
        Direction::ALL.get(code as usize).copied()
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(s)
    }
}

impl FromStr for Direction {
    type Err = GridError;

    /// Accepts direction names, arrow key names, WASD and vi keys (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "arrowup" | "w" | "k" => Ok(Direction::Up),
            "down" | "arrowdown" | "s" | "j" => Ok(Direction::Down),
            "left" | "arrowleft" | "a" | "h" => Ok(Direction::Left),
            "right" | "arrowright" | "d" | "l" => Ok(Direction::Right),
            other => Err(GridError::UnknownDirection(other.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("grid must have 4 rows, got {0}")]
    RowCount(usize),
    #[error("row {row} must have 4 cells, got {len}")]
    RowLength { row: usize, len: usize },
    #[error("cell ({row}, {col}) holds {value}, which is not 0 or a power of two up to {}", MAX_TILE)]
    InvalidTile { row: usize, col: usize, value: u32 },
    #[error("cell ({row}, {col}) has exponent {exponent}, above {}", MAX_EXPONENT)]
    InvalidExponent { row: usize, col: usize, exponent: u8 },
    #[error("unknown direction: {0:?}")]
    UnknownDirection(String),
}

/// A 4x4 2048 grid of tile values; 0 marks an empty cell.
///
/// Grids are plain values: every operation returns a new `Grid` and leaves
/// the receiver untouched. Equality is cell-wise.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "[[u32; SIZE]; SIZE]", into = "[[u32; SIZE]; SIZE]")]
pub struct Grid(pub(crate) Cells);

/// Outcome of sliding a grid in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveResult {
    pub grid: Grid,
    pub score_gained: Score,
    pub moved: bool,
}

impl Grid {
    /// A constant empty grid.
    pub const EMPTY: Grid = Grid([[0; SIZE]; SIZE]);

    /// Build a grid from rows, checking that every value is 0 or a power of
    /// two no larger than [`MAX_TILE`].
    ///
    /// ```
    /// use grid_2048::engine::Grid;
    /// let g = Grid::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// assert_eq!(g.count_empty(), 14);
    /// assert!(Grid::from_rows([[3, 0, 0, 0], [0; 4], [0; 4], [0; 4]]).is_err());
    /// ```
    pub fn from_rows(rows: [[u32; SIZE]; SIZE]) -> Result<Self, GridError> {
        for (row, line) in rows.iter().enumerate() {
            for (col, &value) in line.iter().enumerate() {
                if !is_tile_value(value) || value > MAX_TILE {
                    return Err(GridError::InvalidTile { row, col, value });
                }
            }
        }
        Ok(Grid(rows))
    }

    /// Borrow the rows of this grid.
    #[inline]
    pub fn rows(&self) -> &[[u32; SIZE]; SIZE] {
        &self.0
    }

    /// Value at `(row, col)`; 0 when empty.
    #[inline]
    pub fn tile(&self, row: usize, col: usize) -> u32 {
        self.0[row][col]
    }

    /// Slide/merge tiles in `dir` without inserting a new tile.
    ///
    /// ```
    /// use grid_2048::engine::{Direction, Grid};
    /// let g = Grid::from_rows([[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]).unwrap();
    /// let r = g.slide(Direction::Left);
    /// assert_eq!(r.grid.rows()[0], [4, 0, 0, 0]);
    /// assert_eq!(r.score_gained, 4);
    /// assert!(r.moved);
    /// ```
    #[inline]
    pub fn slide(self, dir: Direction) -> MoveResult {
        ops::slide(self, dir)
    }

    /// Insert a 2 (90%) or 4 (10%) into a uniformly chosen empty cell.
    /// A full grid is returned unchanged.
    ///
    /// ```
    /// use grid_2048::engine::Grid;
    /// use rand::{SeedableRng, rngs::StdRng};
    /// let mut rng = StdRng::seed_from_u64(123);
    /// let g = Grid::EMPTY.with_random_tile(&mut rng).with_random_tile(&mut rng);
    /// assert_eq!(g.count_empty(), 14);
    /// ```
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Self {
        ops::with_random_tile(self, rng)
    }

    /// Convenience: like `with_random_tile` but uses the thread-local RNG.
    #[inline]
    pub fn with_random_tile_thread(self) -> Self {
        let mut rng = rand::thread_rng();
        self.with_random_tile(&mut rng)
    }

    /// Slide, then insert a random tile if the slide changed the grid.
    #[inline]
    pub fn make_move<R: Rng + ?Sized>(self, dir: Direction, rng: &mut R) -> MoveResult {
        ops::apply_move(self, dir, rng)
    }

    /// True when no empty cell and no adjacent equal pair remain.
    #[inline]
    pub fn is_terminal(self) -> bool {
        ops::is_terminal(self)
    }

    /// True when sliding in at least one direction changes the grid.
    #[inline]
    pub fn has_legal_move(self) -> bool {
        ops::has_legal_move(self)
    }

    #[inline]
    pub fn count_empty(&self) -> usize {
        self.0.iter().flatten().filter(|&&v| v == 0).count()
    }

    /// Empty cells as `(row, col)` in row-major order.
    pub fn empty_cells(&self) -> Vec<(usize, usize)> {
        let mut cells = Vec::with_capacity(SIZE * SIZE);
        for (r, line) in self.0.iter().enumerate() {
            for (c, &v) in line.iter().enumerate() {
                if v == 0 {
                    cells.push((r, c));
                }
            }
        }
        cells
    }

    /// Highest tile value on the grid (0 for an empty grid).
    #[inline]
    pub fn highest_tile(&self) -> u32 {
        self.0.iter().flatten().copied().max().unwrap_or(0)
    }

    /// Rows become columns.
    pub fn transpose(self) -> Self {
        let mut out = [[0; SIZE]; SIZE];
        for (r, line) in self.0.iter().enumerate() {
            for (c, &v) in line.iter().enumerate() {
                out[c][r] = v;
            }
        }
        Grid(out)
    }

    /// Mirror every row left-to-right.
    pub fn reverse_rows(self) -> Self {
        let mut out = self.0;
        for line in out.iter_mut() {
            line.reverse();
        }
        Grid(out)
    }

    /// Pack as 16 base-2 exponents, row-major (0 for empty cells).
    pub fn to_exponents(&self) -> [u8; SIZE * SIZE] {
        let mut out = [0u8; SIZE * SIZE];
        for (i, &v) in self.0.iter().flatten().enumerate() {
            out[i] = if v == 0 { 0 } else { v.trailing_zeros() as u8 };
        }
        out
    }

    /// Inverse of [`Grid::to_exponents`]. Exponents above [`MAX_EXPONENT`] are rejected.
    pub fn from_exponents(exps: &[u8; SIZE * SIZE]) -> Result<Self, GridError> {
        let mut cells = [[0; SIZE]; SIZE];
        for (i, &e) in exps.iter().enumerate() {
            let (row, col) = (i / SIZE, i % SIZE);
            cells[row][col] = match e {
                0 => 0,
                1..=MAX_EXPONENT => 1u32 << e,
                exponent => return Err(GridError::InvalidExponent { row, col, exponent }),
            };
        }
        Ok(Grid(cells))
    }
}

impl TryFrom<Vec<Vec<u32>>> for Grid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<u32>>) -> Result<Self, Self::Error> {
        if rows.len() != SIZE {
            return Err(GridError::RowCount(rows.len()));
        }
        let mut cells = [[0; SIZE]; SIZE];
        for (r, line) in rows.iter().enumerate() {
            if line.len() != SIZE {
                return Err(GridError::RowLength { row: r, len: line.len() });
            }
            cells[r].copy_from_slice(line);
        }
        Grid::from_rows(cells)
    }
}

impl TryFrom<[[u32; SIZE]; SIZE]> for Grid {
    type Error = GridError;

    fn try_from(rows: [[u32; SIZE]; SIZE]) -> Result<Self, Self::Error> {
        Grid::from_rows(rows)
    }
}

impl From<Grid> for [[u32; SIZE]; SIZE] {
    fn from(g: Grid) -> Self {
        g.0
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid({:?})", self.0)
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "-".repeat(SIZE * 8 - 1);
        for (r, line) in self.0.iter().enumerate() {
            if r > 0 {
                writeln!(f, "{rule}")?;
            }
            let cells: Vec<String> = line.iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

#[inline]
pub(crate) fn is_tile_value(value: u32) -> bool {
    value == 0 || (value >= 2 && value.is_power_of_two())
}

fn format_val(val: u32) -> String {
    match val {
        0 => " ".repeat(7),
        x => format!("{x:^7}"),
    }
}
