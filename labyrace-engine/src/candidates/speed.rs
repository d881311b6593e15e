//! Mandatory speed pads and the single-block pass that routes around them.
//!
//! A speed pad is mandatory when every entrance-to-exit path crosses it, which
//! guarantees the runner a five second boost. Spare singles are spent near
//! such pads when the evaluator prefers the diverted layout.
use log::debug;
use smallvec::SmallVec;

use super::CellSet;
use super::blocks::rank_singles_among;
use crate::constants::{LOG_BUILDER, SPEED_PAD_DIVERSION_RADIUS};
use crate::eval::{ScoreContext, score};
use crate::grid::{Cell, Grid, PadKind, PlacementKind, Pos};
use crate::hazard::Hazard;
use crate::path::{analyze_path, has_path};

fn is_speed_pad(grid: &Grid, pos: Pos) -> bool {
    grid.get(pos).and_then(Cell::pad_kind) == Some(PadKind::Speed)
}

/// Whether the speed pad at `pos` (active or spent) cannot be avoided.
#[must_use]
pub fn is_mandatory_pad(grid: &Grid, pos: Pos) -> bool {
    if !is_speed_pad(grid, pos) {
        return false;
    }
    let mut probe = grid.clone();
    probe.set_cell(pos, Cell::Wall);
    !has_path(&probe)
}

/// Distinct mandatory speed pads along `path`.
#[must_use]
pub fn count_mandatory_speed_pads(grid: &Grid, path: &[Pos]) -> usize {
    let mut seen = CellSet::new();
    path.iter()
        .filter(|pos| seen.insert(**pos))
        .filter(|pos| is_mandatory_pad(grid, **pos))
        .count()
}

/// Mandatory speed pads on the current path, in path order.
#[must_use]
pub fn mandatory_speed_pads(grid: &Grid) -> Vec<Pos> {
    let Some(info) = analyze_path(grid) else {
        return Vec::new();
    };
    let mut seen = CellSet::new();
    info.cells()
        .filter(|pos| seen.insert(*pos))
        .filter(|pos| is_mandatory_pad(grid, *pos))
        .collect()
}

fn diversion_cells(grid: &Grid, pad: Pos) -> SmallVec<[Pos; 64]> {
    let radius = SPEED_PAD_DIVERSION_RADIUS;
    let mut cells = SmallVec::new();
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if dx == 0 && dy == 0 {
                continue;
            }
            let pos = pad.offset(dx, dy);
            if grid.get(pos) == Some(Cell::Empty) {
                cells.push(pos);
            }
        }
    }
    cells
}

/// Spend up to `singles_left` singles near mandatory speed pads.
///
/// A single is placed only when the best nearby cell beats the current score.
/// Returns the cells that received a single, in placement order.
pub fn divert_mandatory_speed_pads(
    grid: &mut Grid,
    hazard: Option<&Hazard>,
    ctx: &ScoreContext<'_>,
    singles_left: &mut u32,
) -> Vec<Pos> {
    let mut placed = Vec::new();
    let mut current = score(grid, hazard, ctx);
    for pad in mandatory_speed_pads(grid) {
        if *singles_left == 0 {
            break;
        }
        let cells = diversion_cells(grid, pad);
        if cells.is_empty() {
            continue;
        }
        let pool = rank_singles_among(grid, &cells, hazard, ctx, 1);
        let Some(best) = pool.first().copied() else {
            continue;
        };
        if best.score <= current {
            continue;
        }
        if grid.try_place(PlacementKind::Single, best.pos).is_ok() {
            debug!(target: LOG_BUILDER, "diverted speed pad {pad} with single at {}", best.pos);
            *singles_left -= 1;
            current = best.score;
            placed.push(best.pos);
        }
    }
    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weights::Weights;

    /// Corridor at x = 10 with a speed pad the runner cannot avoid.
    fn corridor_with_pad() -> Grid {
        let mut rows = Vec::new();
        for y in 0..21 {
            let row: String = (0..21)
                .map(|x| match (x, y) {
                    (10, 10) => 'F',
                    (10, _) => '.',
                    (9 | 11, 10) => '.',
                    _ => '#',
                })
                .collect();
            rows.push(row);
        }
        Grid::from_ascii(&rows.join("\n")).unwrap()
    }

    #[test]
    fn pad_in_a_corridor_is_mandatory() {
        let mut grid = Grid::empty();
        for x in 0..21 {
            if x != 10 {
                grid.set_cell(Pos::new(x, 10), Cell::Static);
            }
        }
        grid.set_cell(Pos::new(10, 10), Cell::Pad(PadKind::Speed));
        assert!(is_mandatory_pad(&grid, Pos::new(10, 10)));
        assert_eq!(mandatory_speed_pads(&grid), vec![Pos::new(10, 10)]);
        let info = analyze_path(&grid).unwrap();
        assert_eq!(count_mandatory_speed_pads(&grid, &info.path), 1);
        grid.set_cell(Pos::new(10, 10), Cell::SpentPad(PadKind::Speed));
        assert!(is_mandatory_pad(&grid, Pos::new(10, 10)));
        grid.set_cell(Pos::new(10, 10), Cell::Pad(PadKind::Slow));
        assert!(!is_mandatory_pad(&grid, Pos::new(10, 10)));
    }

    #[test]
    fn open_pad_is_not_mandatory() {
        let mut grid = Grid::empty();
        grid.set_cell(Pos::new(10, 10), Cell::Pad(PadKind::Speed));
        assert!(!is_mandatory_pad(&grid, Pos::new(10, 10)));
        assert!(mandatory_speed_pads(&grid).is_empty());
    }

    #[test]
    fn diversion_spends_singles_only_when_it_helps() {
        let weights = Weights::default();
        let ctx = ScoreContext {
            neutral: &[],
            weights: &weights,
            base_grid: None,
        };
        let mut grid = corridor_with_pad();
        assert!(is_mandatory_pad(&grid, Pos::new(10, 10)));
        let mut singles = 2;
        let placed = divert_mandatory_speed_pads(&mut grid, None, &ctx, &mut singles);
        assert_eq!(placed.len() + usize::try_from(singles).unwrap(), 2);
        assert!(has_path(&grid));
        for pos in &placed {
            assert_eq!(grid.get(*pos), Some(Cell::Single));
            assert!((pos.x - 10).abs() <= 3 && (pos.y - 10).abs() <= 3);
        }

        let mut none_left = 0;
        let mut untouched = corridor_with_pad();
        assert!(divert_mandatory_speed_pads(&mut untouched, None, &ctx, &mut none_left).is_empty());
        assert_eq!(untouched, corridor_with_pad());
    }
}
