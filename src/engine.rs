use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type Tile = u32;
pub type Score = u64;

/// Default winning tile.
pub const DEFAULT_TARGET: Tile = 2048;
/// Board dimension used by the product.
pub const DEFAULT_SIZE: usize = 4;
/// Largest tile value. Two `MAX_TILE` tiles never merge, so moves cannot
/// overflow a [`Tile`].
pub const MAX_TILE: Tile = 1 << 31;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Stable wire code (0 = up, 1 = down, 2 = left, 3 = right).
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
        match code {
            0 => Some(Direction::Up),
            1 => Some(Direction::Down),
            2 => Some(Direction::Left),
            3 => Some(Direction::Right),
            _ => None,
        }
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

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "u" => Ok(Direction::Up),
            "down" | "d" => Ok(Direction::Down),
            "left" | "l" => Ok(Direction::Left),
            "right" | "r" => Ok(Direction::Right),
            other => Err(GridError::UnknownDirection(other.to_string())),
        }
    }
}

/// Rejected grid input. Grids are never repaired, only refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("grid is not square: row {row} has {len} cells, expected {expected}")]
    NotSquare { row: usize, len: usize, expected: usize },
    #[error("grid of size {size} needs {expected} cells, got {len}")]
    CellCount { size: usize, expected: usize, len: usize },
    #[error("invalid tile {value} at row {row}, col {col}")]
    InvalidTile { row: usize, col: usize, value: Tile },
    #[error("cell ({row}, {col}) is outside a {size}x{size} grid")]
    OutOfBounds { row: usize, col: usize, size: usize },
    #[error("unknown direction {0:?}")]
    UnknownDirection(String),
}

/// Row/column address of a cell; row 0 is the top, col 0 the left edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Position { row, col }
    }
}

/// Square N×N board of tile values stored row-major. `0` is an empty cell,
/// every other cell holds a power of two ≥ 2.
///
/// Serialized as a list of rows; deserializing validates like [`Grid::from_rows`].
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Tile>>", into = "Vec<Vec<Tile>>")]
pub struct Grid {
    size: usize,
    cells: Vec<Tile>,
}

impl Grid {
    /// An `n`×`n` grid of zeros.
    pub fn empty(n: usize) -> Self {
        Grid { size: n, cells: vec![0; n * n] }
    }

    /// Build a grid from rows, rejecting non-square shapes and tiles that are
    /// not powers of two in `2..=MAX_TILE`.
    ///
    /// ```
    /// use cover_2048::engine::Grid;
    /// let g = Grid::from_rows(vec![vec![2, 0], vec![0, 4]]).unwrap();
    /// assert_eq!(g.size(), 2);
    /// assert!(Grid::from_rows(vec![vec![3, 0], vec![0, 0]]).is_err());
    /// ```
    pub fn from_rows(rows: Vec<Vec<Tile>>) -> Result<Self, GridError> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for (row, line) in rows.into_iter().enumerate() {
            if line.len() != size {
                return Err(GridError::NotSquare { row, len: line.len(), expected: size });
            }
            cells.extend(line);
        }
        Self::from_cells(size, cells)
    }

    /// Build a grid from row-major cells.
    pub fn from_cells(size: usize, cells: Vec<Tile>) -> Result<Self, GridError> {
        if cells.len() != size * size {
            return Err(GridError::CellCount { size, expected: size * size, len: cells.len() });
        }
        for (idx, &value) in cells.iter().enumerate() {
            if !is_valid_tile(value) {
                return Err(GridError::InvalidTile { row: idx / size, col: idx % size, value });
            }
        }
        Ok(Grid { size, cells })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Row-major view of all cells.
    #[inline]
    pub fn cells(&self) -> &[Tile] {
        &self.cells
    }

    pub fn rows(&self) -> Vec<Vec<Tile>> {
        if self.size == 0 {
            return Vec::new();
        }
        self.cells.chunks(self.size).map(<[Tile]>::to_vec).collect()
    }

    /// Value at `pos`, or `None` when out of bounds.
    #[inline]
    pub fn get(&self, pos: Position) -> Option<Tile> {
        if pos.row < self.size && pos.col < self.size {
            Some(self.cells[pos.row * self.size + pos.col])
        } else {
            None
        }
    }

    /// Copy of this grid with `pos` set to `value`.
    pub fn with_tile(&self, pos: Position, value: Tile) -> Result<Self, GridError> {
        if pos.row >= self.size || pos.col >= self.size {
            return Err(GridError::OutOfBounds { row: pos.row, col: pos.col, size: self.size });
        }
        if !is_valid_tile(value) {
            return Err(GridError::InvalidTile { row: pos.row, col: pos.col, value });
        }
        let mut next = self.clone();
        next.cells[pos.row * self.size + pos.col] = value;
        Ok(next)
    }

    pub fn count_empty(&self) -> usize {
        self.cells.iter().filter(|&&v| v == 0).count()
    }

    /// Number of non-empty cells.
    pub fn tile_count(&self) -> usize {
        self.cells.len() - self.count_empty()
    }

    /// Positions of all empty cells in row-major order.
    pub fn empty_positions(&self) -> impl Iterator<Item = Position> + '_ {
        let size = self.size;
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, &v)| v == 0)
            .map(move |(idx, _)| Position::new(idx / size, idx % size))
    }

    /// Highest tile value present, 0 on an empty grid.
    pub fn highest_tile(&self) -> Tile {
        self.cells.iter().copied().max().unwrap_or(0)
    }

    /// Sum of all cell values.
    pub fn sum(&self) -> u64 {
        self.cells.iter().map(|&v| v as u64).sum()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count_empty() == 0
    }

    /// Slide and merge in `direction`; see [`apply_move`].
    #[inline]
    pub fn shift(&self, direction: Direction) -> MoveOutcome {
        apply_move(self, direction)
    }
}

impl TryFrom<Vec<Vec<Tile>>> for Grid {
    type Error = GridError;
    fn try_from(rows: Vec<Vec<Tile>>) -> Result<Self, Self::Error> {
        Grid::from_rows(rows)
    }
}

impl From<Grid> for Vec<Vec<Tile>> {
    fn from(g: Grid) -> Self {
        g.rows()
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Grid{:?}", self.rows())
    }
}

impl fmt::Display for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sep = "-".repeat(self.size * 8);
        for (i, row) in self.rows().iter().enumerate() {
            if i > 0 {
                writeln!(f, "{}", sep)?;
            }
            let cols: Vec<String> = row.iter().map(|&v| format_val(v)).collect();
            writeln!(f, "{}", cols.join("|"))?;
        }
        Ok(())
    }
}

fn format_val(val: Tile) -> String {
    match val {
        0 => String::from("       "),
        x => format!("{:^7}", x),
    }
}

#[inline]
fn is_valid_tile(value: Tile) -> bool {
    value == 0 || ((2..=MAX_TILE).contains(&value) && value.is_power_of_two())
}

/// One line after sliding toward its front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollapsedLine {
    pub line: Vec<Tile>,
    pub score_delta: Score,
}

/// Result of applying one direction to a grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveOutcome {
    pub grid: Grid,
    pub score_delta: Score,
    pub moved: bool,
}

/// Slide non-zero tiles to the front of `line`, merging equal neighbours
/// pairwise from the front. A merged tile does not merge again in the same
/// move, so `[2, 2, 2]` becomes `[4, 2, 0]`. Tiles already at [`MAX_TILE`]
/// stay apart.
///
/// ```
/// use cover_2048::engine::collapse_line;
/// let c = collapse_line(&[2, 2, 2, 0]);
/// assert_eq!(c.line, vec![4, 2, 0, 0]);
/// assert_eq!(c.score_delta, 4);
/// ```
pub fn collapse_line(line: &[Tile]) -> CollapsedLine {
    let mut out = Vec::with_capacity(line.len());
    let mut score_delta = 0;
    let mut pending: Option<Tile> = None;
    for &val in line.iter().filter(|&&v| v != 0) {
        match pending {
            Some(acc) if can_merge(acc, val) => {
                let merged = acc * 2;
                out.push(merged);
                score_delta += merged as Score;
                pending = None;
            }
            Some(acc) => {
                out.push(acc);
                pending = Some(val);
            }
            None => pending = Some(val),
        }
    }
    if let Some(acc) = pending {
        out.push(acc);
    }
    out.resize(line.len(), 0);
    CollapsedLine { line: out, score_delta }
}

#[inline]
fn can_merge(a: Tile, b: Tile) -> bool {
    a == b && a < MAX_TILE
}

/// Row-major index of the `k`-th cell of `line`, counted from the edge that
/// tiles slide toward when moving in `direction`.
#[inline]
fn cell_index(size: usize, direction: Direction, line: usize, k: usize) -> usize {
    match direction {
        Direction::Left => line * size + k,
        Direction::Right => line * size + (size - 1 - k),
        Direction::Up => k * size + line,
        Direction::Down => (size - 1 - k) * size + line,
    }
}

/// Slide/merge every line toward the `direction` edge. No randomness.
///
/// `up` moves tiles toward row 0, `down` toward the last row, `left` toward
/// column 0 and `right` toward the last column.
///
/// ```
/// use cover_2048::engine::{apply_move, Direction, Grid};
/// let g = Grid::from_rows(vec![
///     vec![0, 0, 0, 0],
///     vec![0, 0, 0, 0],
///     vec![0, 0, 0, 0],
///     vec![2, 0, 0, 2],
/// ]).unwrap();
/// let up = apply_move(&g, Direction::Up);
/// assert!(up.moved);
/// assert_eq!(up.grid.rows()[0], vec![2, 0, 0, 2]);
/// assert!(!apply_move(&g, Direction::Down).moved);
/// ```
pub fn apply_move(grid: &Grid, direction: Direction) -> MoveOutcome {
    let size = grid.size;
    let mut cells = grid.cells.clone();
    let mut score_delta = 0;
    let mut line = Vec::with_capacity(size);
    for line_idx in 0..size {
        line.clear();
        line.extend((0..size).map(|k| grid.cells[cell_index(size, direction, line_idx, k)]));
        let collapsed = collapse_line(&line);
        score_delta += collapsed.score_delta;
        for (k, val) in collapsed.line.into_iter().enumerate() {
            cells[cell_index(size, direction, line_idx, k)] = val;
        }
    }
    if cells == grid.cells {
        return MoveOutcome { grid: grid.clone(), score_delta: 0, moved: false };
    }
    MoveOutcome { grid: Grid { size, cells }, score_delta, moved: true }
}

/// True if some cell is empty or two orthogonal neighbours hold the same tile
/// below [`MAX_TILE`].
pub fn has_any_legal_move(grid: &Grid) -> bool {
    let size = grid.size;
    let cells = &grid.cells;
    if cells.iter().any(|&v| v == 0) {
        return true;
    }
    for row in 0..size {
        for col in 0..size {
            let val = cells[row * size + col];
            if col + 1 < size && can_merge(val, cells[row * size + col + 1]) {
                return true;
            }
            if row + 1 < size && can_merge(val, cells[(row + 1) * size + col]) {
                return true;
            }
        }
    }
    false
}

/// True if any cell is at least `target`.
pub fn has_reached_target(grid: &Grid, target: Tile) -> bool {
    grid.cells.iter().any(|&v| v != 0 && v >= target)
}

/// Uniformly chosen empty cell, or `None` on a full grid.
pub fn random_empty_cell<R: Rng + ?Sized>(grid: &Grid, rng: &mut R) -> Option<Position> {
    let empty = grid.count_empty();
    if empty == 0 {
        return None;
    }
    let index = rng.gen_range(0..empty);
    grid.empty_positions().nth(index)
}

/// A new tile value: 2 with probability 0.9, 4 with probability 0.1.
#[inline]
pub fn generate_random_tile<R: Rng + ?Sized>(rng: &mut R) -> Tile {
    if rng.gen_range(0..10) < 9 { 2 } else { 4 }
}

/// Copy of `grid` with one random 2 (90%) or 4 (10%) placed in a random empty
/// cell. A full grid comes back unchanged.
///
/// ```
/// use cover_2048::engine::{spawn_random_tile, Grid};
/// use rand::{SeedableRng, rngs::StdRng};
/// let mut rng = StdRng::seed_from_u64(123);
/// let g = spawn_random_tile(&Grid::empty(4), &mut rng);
/// assert_eq!(g.tile_count(), 1);
/// ```
pub fn spawn_random_tile<R: Rng + ?Sized>(grid: &Grid, rng: &mut R) -> Grid {
    let Some(pos) = random_empty_cell(grid, rng) else {
        return grid.clone();
    };
    let mut next = grid.clone();
    next.cells[pos.row * grid.size + pos.col] = generate_random_tile(rng);
    next
}

/// Fresh `n`×`n` grid holding two random tiles in distinct cells.
pub fn initialize<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Grid {
    let grid = spawn_random_tile(&Grid::empty(n), rng);
    spawn_random_tile(&grid, rng)
}
