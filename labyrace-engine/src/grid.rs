//! Grid model: cell codes, coordinates and placement primitives.
//!
//! The grid is a flat, fixed-size arena indexed by `y * GRID_SIZE + x`. Every
//! public mutation re-asserts the entrance/exit openings before it returns.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::constants::{CELL_COUNT, ENTRANCE_X, GRID_SIZE, GRID_SIZE_I32};
use crate::numbers::{i32_to_f64, i32_to_usize, usize_to_i32};
use crate::path;

/// Integer grid coordinate. Virtual boundary nodes sit one row outside the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Entrance cell on the bottom row.
    #[must_use]
    pub const fn entrance() -> Self {
        Self::new(ENTRANCE_X, GRID_SIZE_I32 - 1)
    }

    /// Exit cell on the top row.
    #[must_use]
    pub const fn exit() -> Self {
        Self::new(ENTRANCE_X, 0)
    }

    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    #[must_use]
    pub const fn is_inside(self) -> bool {
        self.x >= 0 && self.y >= 0 && self.x < GRID_SIZE_I32 && self.y < GRID_SIZE_I32
    }

    /// Flat arena index, `None` outside the grid.
    #[must_use]
    pub fn index(self) -> Option<usize> {
        if !self.is_inside() {
            return None;
        }
        let x = i32_to_usize(self.x)?;
        let y = i32_to_usize(self.y)?;
        Some(y * GRID_SIZE + x)
    }

    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self::new(usize_to_i32(index % GRID_SIZE), usize_to_i32(index / GRID_SIZE))
    }

    /// Continuous centre of the cell.
    #[must_use]
    pub fn center(self) -> Point {
        Point::new(i32_to_f64(self.x) + 0.5, i32_to_f64(self.y) + 0.5)
    }

    /// Whether the cell is one of the two fixed openings.
    #[must_use]
    pub const fn is_opening(self) -> bool {
        self.x == ENTRANCE_X && (self.y == 0 || self.y == GRID_SIZE_I32 - 1)
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Continuous position in cell units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

/// Single-cell effect tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PadKind {
    Speed,
    Slow,
    Detour,
    Stone,
    Rewind,
}

impl PadKind {
    pub const ALL: [Self; 5] = [
        Self::Speed,
        Self::Slow,
        Self::Detour,
        Self::Stone,
        Self::Rewind,
    ];

    /// Pads that slow the runner down when triggered.
    #[must_use]
    pub const fn is_beneficial(self) -> bool {
        !matches!(self, Self::Speed)
    }
}

/// Cell contents. Walkability is a pure function of the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Cell {
    #[default]
    Empty,
    /// Map-generated obstacle, never removed by the builder.
    Static,
    /// Part of a refundable 2×2 player wall.
    Wall,
    /// Refundable 1×1 block.
    Single,
    /// Placed hazard marker.
    Hazard,
    /// Map-generated neutral hazard marker.
    StaticHazard,
    /// Pad that fires on the next pass.
    Pad(PadKind),
    /// Pad that already fired this pass.
    SpentPad(PadKind),
}

impl Cell {
    #[must_use]
    pub const fn is_walkable(self) -> bool {
        matches!(self, Self::Empty | Self::Pad(_) | Self::SpentPad(_))
    }

    #[must_use]
    pub const fn is_active_pad(self) -> bool {
        matches!(self, Self::Pad(_))
    }

    /// Pad kind for active or spent pads.
    #[must_use]
    pub const fn pad_kind(self) -> Option<PadKind> {
        match self {
            Self::Pad(kind) | Self::SpentPad(kind) => Some(kind),
            _ => None,
        }
    }

    /// Refundable structure placed by a builder.
    #[must_use]
    pub const fn is_placed_block(self) -> bool {
        matches!(self, Self::Wall | Self::Single)
    }

    /// Spent variant of an active pad; other cells are unchanged.
    #[must_use]
    pub const fn spent(self) -> Self {
        match self {
            Self::Pad(kind) => Self::SpentPad(kind),
            other => other,
        }
    }

    /// Active variant of a spent pad; other cells are unchanged.
    #[must_use]
    pub const fn restored(self) -> Self {
        match self {
            Self::SpentPad(kind) => Self::Pad(kind),
            other => other,
        }
    }

    const fn symbol(self) -> char {
        match self {
            Self::Empty => '.',
            Self::Static => '#',
            Self::Wall => 'W',
            Self::Single => 'o',
            Self::Hazard => 'H',
            Self::StaticHazard => 'N',
            Self::Pad(PadKind::Speed) => 'F',
            Self::Pad(PadKind::Slow) => 'L',
            Self::Pad(PadKind::Detour) => 'D',
            Self::Pad(PadKind::Stone) => 'M',
            Self::Pad(PadKind::Rewind) => 'R',
            Self::SpentPad(PadKind::Speed) => 'f',
            Self::SpentPad(PadKind::Slow) => 'l',
            Self::SpentPad(PadKind::Detour) => 'd',
            Self::SpentPad(PadKind::Stone) => 'm',
            Self::SpentPad(PadKind::Rewind) => 'r',
        }
    }

    fn from_symbol(symbol: char) -> Option<Self> {
        let cell = match symbol {
            '.' => Self::Empty,
            '#' => Self::Static,
            'W' => Self::Wall,
            'o' => Self::Single,
            'H' => Self::Hazard,
            'N' => Self::StaticHazard,
            'F' => Self::Pad(PadKind::Speed),
            'L' => Self::Pad(PadKind::Slow),
            'D' => Self::Pad(PadKind::Detour),
            'M' => Self::Pad(PadKind::Stone),
            'R' => Self::Pad(PadKind::Rewind),
            'f' => Self::SpentPad(PadKind::Speed),
            'l' => Self::SpentPad(PadKind::Slow),
            'd' => Self::SpentPad(PadKind::Detour),
            'm' => Self::SpentPad(PadKind::Stone),
            'r' => Self::SpentPad(PadKind::Rewind),
            _ => return None,
        };
        Some(cell)
    }
}

impl From<Cell> for u8 {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Empty => 0,
            Cell::Static => 1,
            Cell::Wall => 2,
            Cell::Pad(PadKind::Speed) => 3,
            Cell::Pad(PadKind::Slow) => 4,
            Cell::SpentPad(PadKind::Speed) => 5,
            Cell::SpentPad(PadKind::Slow) => 6,
            Cell::Hazard => 7,
            Cell::Pad(PadKind::Detour) => 8,
            Cell::Pad(PadKind::Stone) => 9,
            Cell::Pad(PadKind::Rewind) => 10,
            Cell::SpentPad(PadKind::Detour) => 11,
            Cell::SpentPad(PadKind::Stone) => 12,
            Cell::SpentPad(PadKind::Rewind) => 13,
            Cell::Single => 14,
            Cell::StaticHazard => 15,
        }
    }
}

impl TryFrom<u8> for Cell {
    type Error = GridError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        let cell = match code {
            0 => Self::Empty,
            1 => Self::Static,
            2 => Self::Wall,
            3 => Self::Pad(PadKind::Speed),
            4 => Self::Pad(PadKind::Slow),
            5 => Self::SpentPad(PadKind::Speed),
            6 => Self::SpentPad(PadKind::Slow),
            7 => Self::Hazard,
            8 => Self::Pad(PadKind::Detour),
            9 => Self::Pad(PadKind::Stone),
            10 => Self::Pad(PadKind::Rewind),
            11 => Self::SpentPad(PadKind::Detour),
            12 => Self::SpentPad(PadKind::Stone),
            13 => Self::SpentPad(PadKind::Rewind),
            14 => Self::Single,
            15 => Self::StaticHazard,
            other => return Err(GridError::UnknownCellCode(other)),
        };
        Ok(cell)
    }
}

/// Errors raised while decoding a grid payload.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GridError {
    #[error("unknown cell code {0}")]
    UnknownCellCode(u8),
    #[error("unknown cell symbol {0:?}")]
    UnknownSymbol(char),
    #[error("grid must have {expected} rows (got {actual})")]
    RowCount { expected: usize, actual: usize },
    #[error("row {row} must have {expected} cells (got {actual})")]
    RowWidth {
        row: usize,
        expected: usize,
        actual: usize,
    },
}

/// Why a transactional placement was refused.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("cells at {0} are not free for this placement")]
    Occupied(Pos),
    #[error("placement at {0} would disconnect the entrance from the exit")]
    Disconnects(Pos),
    #[error("no {0:?} budget left")]
    BudgetExhausted(PlacementKind),
    #[error("this build has no hazard to place")]
    NoHazard,
}

/// Structure kinds a builder can place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementKind {
    /// 2×2 wall anchored at its top-left cell.
    Wall,
    /// 1×1 block.
    Single,
    /// Hazard marker.
    Hazard,
}

/// Record of cells overwritten by [`Grid::apply`], consumed by [`Grid::revert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Undo {
    kind: PlacementKind,
    origin: Pos,
    previous: [Cell; 4],
}

const WALL_OFFSETS: [(i32, i32); 4] = [(0, 0), (1, 0), (0, 1), (1, 1)];

/// Fixed-size maze grid.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<Cell>>", into = "Vec<Vec<Cell>>")]
pub struct Grid {
    cells: [Cell; CELL_COUNT],
}

impl Default for Grid {
    fn default() -> Self {
        Self::empty()
    }
}

impl Grid {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            cells: [Cell::Empty; CELL_COUNT],
        }
    }

    /// Parse a 21-line picture of the grid (see [`Grid`]'s `Debug` output).
    ///
    /// # Errors
    ///
    /// Returns a `GridError` for a wrong shape or an unknown symbol.
    pub fn from_ascii(picture: &str) -> Result<Self, GridError> {
        let rows: Vec<&str> = picture
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect();
        if rows.len() != GRID_SIZE {
            return Err(GridError::RowCount {
                expected: GRID_SIZE,
                actual: rows.len(),
            });
        }
        let mut grid = Self::empty();
        for (y, row) in rows.iter().enumerate() {
            let symbols: Vec<char> = row.chars().collect();
            if symbols.len() != GRID_SIZE {
                return Err(GridError::RowWidth {
                    row: y,
                    expected: GRID_SIZE,
                    actual: symbols.len(),
                });
            }
            for (x, symbol) in symbols.into_iter().enumerate() {
                grid.cells[y * GRID_SIZE + x] =
                    Cell::from_symbol(symbol).ok_or(GridError::UnknownSymbol(symbol))?;
            }
        }
        grid.ensure_openings();
        Ok(grid)
    }

    /// Cell at `pos`, `None` outside the grid.
    #[must_use]
    pub fn get(&self, pos: Pos) -> Option<Cell> {
        pos.index().map(|index| self.cells[index])
    }

    /// Whether a runner may stand on `pos`. Outside cells are never walkable.
    #[must_use]
    pub fn is_walkable(&self, pos: Pos) -> bool {
        self.get(pos).is_some_and(Cell::is_walkable)
    }

    /// Iterate every cell with its coordinate, row by row.
    pub fn iter(&self) -> impl Iterator<Item = (Pos, Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(index, cell)| (Pos::from_index(index), *cell))
    }

    /// Number of cells matching `predicate`.
    #[must_use]
    pub fn count(&self, predicate: impl Fn(Cell) -> bool) -> usize {
        self.cells.iter().filter(|cell| predicate(**cell)).count()
    }

    /// Overwrite one cell and re-assert the openings.
    pub fn set_cell(&mut self, pos: Pos, cell: Cell) {
        self.put(pos, cell);
        self.ensure_openings();
    }

    pub(crate) fn put(&mut self, pos: Pos, cell: Cell) {
        if let Some(index) = pos.index() {
            self.cells[index] = cell;
        }
    }

    /// Re-open both openings: placed blocks are cleared, static cells kept.
    pub fn ensure_openings(&mut self) {
        for opening in [Pos::exit(), Pos::entrance()] {
            self.clear_blocking_at(opening);
            if self.get(opening) != Some(Cell::Static) {
                self.put(opening, Cell::Empty);
            }
        }
    }

    fn clear_blocking_at(&mut self, pos: Pos) {
        match self.get(pos) {
            Some(Cell::Wall) => {
                let anchor_x = if self.get(pos.offset(-1, 0)) == Some(Cell::Wall) {
                    pos.x - 1
                } else {
                    pos.x
                };
                let anchor_y = if self.get(pos.offset(0, -1)) == Some(Cell::Wall) {
                    pos.y - 1
                } else {
                    pos.y
                };
                self.clear_wall_cells(Pos::new(anchor_x, anchor_y));
            }
            Some(Cell::Single) => self.put(pos, Cell::Empty),
            _ => {}
        }
    }

    fn clear_wall_cells(&mut self, origin: Pos) {
        for (dx, dy) in WALL_OFFSETS {
            let cell = origin.offset(dx, dy);
            if self.get(cell) == Some(Cell::Wall) {
                self.put(cell, Cell::Empty);
            }
        }
    }

    /// Restore every spent pad to its active variant.
    pub fn reset_pads(&mut self) {
        for cell in &mut self.cells {
            *cell = cell.restored();
        }
    }

    /// Whether a 2×2 block anchored at `origin` fits on empty, non-opening cells.
    #[must_use]
    pub fn can_place_wall(&self, origin: Pos) -> bool {
        WALL_OFFSETS.iter().all(|(dx, dy)| {
            let cell = origin.offset(*dx, *dy);
            !cell.is_opening() && self.get(cell) == Some(Cell::Empty)
        })
    }

    /// Whether a single block fits at `pos`.
    #[must_use]
    pub fn can_place_single(&self, pos: Pos) -> bool {
        !pos.is_opening() && self.get(pos) == Some(Cell::Empty)
    }

    /// Whether a hazard marker may occupy `pos`.
    #[must_use]
    pub fn is_available_for_hazard(&self, pos: Pos) -> bool {
        !pos.is_opening() && self.get(pos) == Some(Cell::Empty)
    }

    /// Whether a complete player wall is anchored at `origin`.
    #[must_use]
    pub fn has_wall_at(&self, origin: Pos) -> bool {
        WALL_OFFSETS
            .iter()
            .all(|(dx, dy)| self.get(origin.offset(*dx, *dy)) == Some(Cell::Wall))
    }

    /// Apply a placement if its cells are free, without checking connectivity.
    pub(crate) fn apply(&mut self, kind: PlacementKind, origin: Pos) -> Option<Undo> {
        let fits = match kind {
            PlacementKind::Wall => self.can_place_wall(origin),
            PlacementKind::Single => self.can_place_single(origin),
            PlacementKind::Hazard => self.is_available_for_hazard(origin),
        };
        if !fits {
            return None;
        }
        let mut previous = [Cell::Empty; 4];
        match kind {
            PlacementKind::Wall => {
                for (slot, (dx, dy)) in previous.iter_mut().zip(WALL_OFFSETS) {
                    let cell = origin.offset(dx, dy);
                    *slot = self.get(cell).unwrap_or_default();
                    self.put(cell, Cell::Wall);
                }
            }
            PlacementKind::Single => {
                previous[0] = self.get(origin).unwrap_or_default();
                self.put(origin, Cell::Single);
            }
            PlacementKind::Hazard => {
                previous[0] = self.get(origin).unwrap_or_default();
                self.put(origin, Cell::Hazard);
            }
        }
        self.ensure_openings();
        Some(Undo {
            kind,
            origin,
            previous,
        })
    }

    /// Undo a placement made by [`Grid::apply`].
    pub(crate) fn revert(&mut self, undo: Undo) {
        match undo.kind {
            PlacementKind::Wall => {
                for (previous, (dx, dy)) in undo.previous.iter().zip(WALL_OFFSETS) {
                    self.put(undo.origin.offset(dx, dy), *previous);
                }
            }
            PlacementKind::Single | PlacementKind::Hazard => {
                self.put(undo.origin, undo.previous[0]);
            }
        }
        self.ensure_openings();
    }

    /// Place a structure only if it keeps the maze traversable.
    ///
    /// # Errors
    ///
    /// Returns `PlacementError::Occupied` when the cells are not free and
    /// `PlacementError::Disconnects` when the placement would block every path;
    /// in both cases the grid is left unchanged.
    pub fn try_place(&mut self, kind: PlacementKind, origin: Pos) -> Result<(), PlacementError> {
        let undo = self
            .apply(kind, origin)
            .ok_or(PlacementError::Occupied(origin))?;
        if path::has_path(self) {
            Ok(())
        } else {
            self.revert(undo);
            Err(PlacementError::Disconnects(origin))
        }
    }

    /// Remove a structure previously placed at `origin`.
    ///
    /// Returns false when no matching structure is there.
    pub fn remove(&mut self, kind: PlacementKind, origin: Pos) -> bool {
        let removed = match kind {
            PlacementKind::Wall => {
                if self.has_wall_at(origin) {
                    self.clear_wall_cells(origin);
                    true
                } else {
                    false
                }
            }
            PlacementKind::Single => self.take(origin, Cell::Single),
            PlacementKind::Hazard => self.take(origin, Cell::Hazard),
        };
        self.ensure_openings();
        removed
    }

    /// Put a removed structure back; the caller re-validates connectivity.
    pub(crate) fn restore(&mut self, kind: PlacementKind, origin: Pos) {
        match kind {
            PlacementKind::Wall => {
                for (dx, dy) in WALL_OFFSETS {
                    self.put(origin.offset(dx, dy), Cell::Wall);
                }
            }
            PlacementKind::Single => self.put(origin, Cell::Single),
            PlacementKind::Hazard => self.put(origin, Cell::Hazard),
        }
        self.ensure_openings();
    }

    fn take(&mut self, pos: Pos, expected: Cell) -> bool {
        if self.get(pos) == Some(expected) {
            self.put(pos, Cell::Empty);
            true
        } else {
            false
        }
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(GRID_SIZE) {
            let line: String = row.iter().map(|cell| cell.symbol()).collect();
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}

impl TryFrom<Vec<Vec<Cell>>> for Grid {
    type Error = GridError;

    fn try_from(rows: Vec<Vec<Cell>>) -> Result<Self, Self::Error> {
        if rows.len() != GRID_SIZE {
            return Err(GridError::RowCount {
                expected: GRID_SIZE,
                actual: rows.len(),
            });
        }
        let mut grid = Self::empty();
        for (y, row) in rows.into_iter().enumerate() {
            if row.len() != GRID_SIZE {
                return Err(GridError::RowWidth {
                    row: y,
                    expected: GRID_SIZE,
                    actual: row.len(),
                });
            }
            for (x, cell) in row.into_iter().enumerate() {
                grid.cells[y * GRID_SIZE + x] = cell;
            }
        }
        grid.ensure_openings();
        Ok(grid)
    }
}

impl From<Grid> for Vec<Vec<Cell>> {
    fn from(grid: Grid) -> Self {
        grid.cells.chunks(GRID_SIZE).map(<[Cell]>::to_vec).collect()
    }
}
