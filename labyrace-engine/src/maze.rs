//! Procedural base grids.
//!
//! A base grid is drawn in three layers: static 2×2 blocks kept clear of the
//! entrance column, pads shuffled onto the remaining interior cells, and any
//! neutral hazards the match asks for. Grids without an entrance-to-exit path
//! are thrown away and drawn again.
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::{ENTRANCE_X, GRID_SIZE_I32, LOG_MAZE};
use crate::grid::{Cell, Grid, PadKind, Pos};
use crate::hazard::{Hazard, HazardKind};
use crate::path::has_path;
use crate::seed::{DeterministicRng, MAZE_STREAM};

/// How many pads of each kind a base grid gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PadCounts {
    pub speed: usize,
    pub slow: usize,
    pub detour: usize,
    pub stone: usize,
    pub rewind: usize,
}

impl Default for PadCounts {
    fn default() -> Self {
        Self {
            speed: 4,
            slow: 2,
            detour: 1,
            stone: 1,
            rewind: 0,
        }
    }
}

impl PadCounts {
    /// Pads in placement order.
    fn sequence(&self) -> impl Iterator<Item = PadKind> + '_ {
        [
            (PadKind::Speed, self.speed),
            (PadKind::Slow, self.slow),
            (PadKind::Detour, self.detour),
            (PadKind::Stone, self.stone),
            (PadKind::Rewind, self.rewind),
        ]
        .into_iter()
        .flat_map(|(kind, count)| std::iter::repeat_n(kind, count))
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.speed + self.slow + self.detour + self.stone + self.rewind
    }
}

/// Procedural generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MazeGenConfig {
    pub min_blocks: usize,
    pub max_blocks: usize,
    /// Every cell of a block stays at least this many columns from the
    /// entrance column. The rule applies to both block columns, so the
    /// excluded origins are `ENTRANCE_X - block_clearance` through
    /// `ENTRANCE_X + block_clearance - 1`.
    pub block_clearance: i32,
    /// Pads and neutral hazards keep at least this many columns from the entrance column.
    pub pad_clearance: i32,
    pub pads: PadCounts,
    pub neutral_hazards: Vec<HazardKind>,
    pub max_attempts: usize,
}

impl Default for MazeGenConfig {
    fn default() -> Self {
        Self {
            min_blocks: 8,
            max_blocks: 18,
            block_clearance: 3,
            pad_clearance: 2,
            pads: PadCounts::default(),
            neutral_hazards: Vec::new(),
            max_attempts: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MazeError {
    #[error("block range {min}..={max} is empty")]
    EmptyBlockRange { min: usize, max: usize },
    #[error("max_attempts must be at least 1")]
    NoAttempts,
    #[error("no grid with a path after {attempts} attempts")]
    Exhausted { attempts: usize },
}

impl MazeGenConfig {
    /// Check the settings before any draw is made.
    ///
    /// # Errors
    ///
    /// Returns `MazeError` when the block range is inverted or no attempt is allowed.
    pub const fn validate(&self) -> Result<(), MazeError> {
        if self.min_blocks > self.max_blocks {
            return Err(MazeError::EmptyBlockRange {
                min: self.min_blocks,
                max: self.max_blocks,
            });
        }
        if self.max_attempts == 0 {
            return Err(MazeError::NoAttempts);
        }
        Ok(())
    }
}

/// Base grid plus the neutral hazards placed on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BaseMaze {
    pub grid: Grid,
    pub neutral_hazards: Vec<Hazard>,
    /// Draws that were rejected for lacking a path.
    pub rejected: usize,
}

/// Generate the base grid for a match seed.
///
/// # Errors
///
/// Returns `MazeError` for invalid settings or when every attempt left the
/// maze without a path.
pub fn generate_base_grid(seed: u64, config: &MazeGenConfig) -> Result<BaseMaze, MazeError> {
    config.validate()?;
    let mut rng = DeterministicRng::for_stream(seed, MAZE_STREAM);
    for attempt in 0..config.max_attempts {
        let mut grid = Grid::empty();
        place_static_blocks(&mut grid, config, &mut rng);
        place_pads(&mut grid, config, &mut rng);
        let neutral_hazards = place_neutral_hazards(&mut grid, config, &mut rng);
        grid.ensure_openings();
        if has_path(&grid) {
            debug!(
                target: LOG_MAZE,
                "seed {seed}: grid after {attempt} rejected draws ({} rng draws)",
                rng.draws()
            );
            return Ok(BaseMaze {
                grid,
                neutral_hazards,
                rejected: attempt,
            });
        }
    }
    Err(MazeError::Exhausted {
        attempts: config.max_attempts,
    })
}

fn place_static_blocks(grid: &mut Grid, config: &MazeGenConfig, rng: &mut DeterministicRng) {
    let lo = i32::try_from(config.min_blocks).unwrap_or(i32::MAX);
    let hi = i32::try_from(config.max_blocks).unwrap_or(i32::MAX);
    let target = usize::try_from(rng.range_inclusive(lo, hi)).unwrap_or_default();
    let mut placed = 0;
    let mut attempts = 0;
    while attempts < target * 6 && placed < target {
        attempts += 1;
        let x = rng.range_inclusive(0, GRID_SIZE_I32 - 2);
        let y = rng.range_inclusive(2, GRID_SIZE_I32 - 4);
        if blocks_entrance_lane(x, config.block_clearance) {
            continue;
        }
        let origin = Pos::new(x, y);
        if grid.can_place_wall(origin) {
            for (dx, dy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
                grid.put(origin.offset(dx, dy), Cell::Static);
            }
            placed += 1;
        }
    }
}

/// True when a block with its left column at `x` has a cell within
/// `clearance - 1` columns of the entrance column.
const fn blocks_entrance_lane(x: i32, clearance: i32) -> bool {
    x + 1 > ENTRANCE_X - clearance && x < ENTRANCE_X + clearance
}

/// Empty interior cells far enough from the entrance column, row by row.
fn open_interior_cells(grid: &Grid, clearance: i32) -> Vec<Pos> {
    (1..GRID_SIZE_I32 - 1)
        .flat_map(|y| (0..GRID_SIZE_I32).map(move |x| Pos::new(x, y)))
        .filter(|pos| (pos.x - ENTRANCE_X).abs() >= clearance)
        .filter(|pos| grid.get(*pos) == Some(Cell::Empty))
        .collect()
}

fn place_pads(grid: &mut Grid, config: &MazeGenConfig, rng: &mut DeterministicRng) {
    let mut cells = open_interior_cells(grid, config.pad_clearance);
    rng.shuffle(&mut cells);
    for (pos, kind) in cells.into_iter().zip(config.pads.sequence()) {
        grid.put(pos, Cell::Pad(kind));
    }
}

fn place_neutral_hazards(
    grid: &mut Grid,
    config: &MazeGenConfig,
    rng: &mut DeterministicRng,
) -> Vec<Hazard> {
    let mut hazards = Vec::with_capacity(config.neutral_hazards.len());
    for kind in &config.neutral_hazards {
        let cells = open_interior_cells(grid, config.pad_clearance);
        if cells.is_empty() {
            break;
        }
        let pos = cells[rng.below(cells.len())];
        grid.put(pos, Cell::StaticHazard);
        hazards.push(Hazard::neutral_at(*kind, pos));
    }
    hazards
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_maze() {
        let config = MazeGenConfig::default();
        let a = generate_base_grid(17, &config).unwrap();
        let b = generate_base_grid(17, &config).unwrap();
        assert_eq!(a, b);
        assert!(has_path(&a.grid));
    }

    #[test]
    fn blocks_stay_clear_of_the_entrance_column() {
        let config = MazeGenConfig::default();
        for seed in 0..8 {
            let maze = generate_base_grid(seed, &config).unwrap();
            for (pos, cell) in maze.grid.iter() {
                if cell == Cell::Static {
                    assert!((pos.x - ENTRANCE_X).abs() >= 3, "seed {seed}: static at {pos}");
                    assert!((2..=GRID_SIZE_I32 - 3).contains(&pos.y));
                }
                if cell.pad_kind().is_some() {
                    assert!((pos.x - ENTRANCE_X).abs() >= 2);
                }
            }
            let statics = maze.grid.count(|cell| cell == Cell::Static);
            assert_eq!(statics % 4, 0);
            assert!(statics / 4 <= 18);
        }
    }

    #[test]
    fn entrance_lane_covers_both_block_columns() {
        let excluded: Vec<i32> = (0..GRID_SIZE_I32 - 1)
            .filter(|x| blocks_entrance_lane(*x, 3))
            .collect();
        assert_eq!(excluded, (ENTRANCE_X - 3..=ENTRANCE_X + 2).collect::<Vec<_>>());
        assert!(!blocks_entrance_lane(ENTRANCE_X - 4, 3));
        assert!(!blocks_entrance_lane(ENTRANCE_X + 3, 3));
    }

    #[test]
    fn pad_counts_follow_the_config() {
        let maze = generate_base_grid(5, &MazeGenConfig::default()).unwrap();
        let count = |kind: PadKind| maze.grid.count(|cell| cell == Cell::Pad(kind));
        assert_eq!(count(PadKind::Speed), 4);
        assert_eq!(count(PadKind::Slow), 2);
        assert_eq!(count(PadKind::Detour), 1);
        assert_eq!(count(PadKind::Stone), 1);
        assert_eq!(count(PadKind::Rewind), 0);
        assert_eq!(PadCounts::default().total(), 8);
    }

    #[test]
    fn neutral_hazards_sit_on_their_markers() {
        let config = MazeGenConfig {
            neutral_hazards: vec![HazardKind::Radius, HazardKind::Row],
            ..MazeGenConfig::default()
        };
        let maze = generate_base_grid(11, &config).unwrap();
        assert_eq!(maze.neutral_hazards.len(), 2);
        for hazard in &maze.neutral_hazards {
            assert!(hazard.neutral);
            let cell = hazard.cell.unwrap();
            assert_eq!(maze.grid.get(cell), Some(Cell::StaticHazard));
        }
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let inverted = MazeGenConfig {
            min_blocks: 5,
            max_blocks: 2,
            ..MazeGenConfig::default()
        };
        assert_eq!(
            generate_base_grid(1, &inverted),
            Err(MazeError::EmptyBlockRange { min: 5, max: 2 })
        );
        let none = MazeGenConfig {
            max_attempts: 0,
            ..MazeGenConfig::default()
        };
        assert_eq!(generate_base_grid(1, &none), Err(MazeError::NoAttempts));
    }
}
