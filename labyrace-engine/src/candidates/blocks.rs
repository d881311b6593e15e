//! Wall and single-block candidates.
use log::trace;

use super::{Candidate, CandidatePool, CellSet, insert_ranked, score_placement};
use crate::constants::{
    CANDIDATE_RADIUS, FALLBACK_POOL_TRIES, GRID_SIZE, LOG_PLANNER, RANDOM_WALL_DRAWS,
};
use crate::eval::ScoreContext;
use crate::grid::{Cell, Grid, PadKind, PlacementKind, Pos};
use crate::hazard::Hazard;
use crate::numbers::usize_to_i32;
use crate::path::compute_path;
use crate::seed::DeterministicRng;

const CARDINAL_OFFSETS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];

fn attracts_blocks(cell: Cell) -> bool {
    match cell {
        Cell::Wall | Cell::Single | Cell::StaticHazard => true,
        Cell::Pad(kind) => kind.is_beneficial(),
        _ => false,
    }
}

/// Cells near the path, near placed blocks, near slowing pads and neutral hazards.
fn structured_cells(grid: &Grid, path: &[Pos]) -> CellSet {
    let mut cells = CellSet::new();
    for node in path {
        cells.insert(*node);
        cells.insert_square(*node, CANDIDATE_RADIUS);
    }
    for (pos, cell) in grid.iter() {
        if attracts_blocks(cell) {
            cells.insert_square(pos, CANDIDATE_RADIUS);
        }
    }
    cells
}

/// Random wall origins in the interior rows.
fn random_cells(rng: &mut DeterministicRng, count: usize) -> Vec<Pos> {
    (0..count)
        .map(|_| {
            let x = usize_to_i32(rng.below(GRID_SIZE - 1));
            let y = 1 + usize_to_i32(rng.below(GRID_SIZE - 2));
            Pos::new(x, y)
        })
        .collect()
}

fn rank_cells(
    grid: &mut Grid,
    kind: PlacementKind,
    cells: impl IntoIterator<Item = Pos>,
    hazard: Option<&Hazard>,
    ctx: &ScoreContext<'_>,
    limit: usize,
    pool: &mut CandidatePool,
) {
    for pos in cells {
        if let Some(value) = score_placement(grid, kind, pos, hazard, ctx) {
            insert_ranked(pool, Candidate::new(kind, pos, value), limit);
        }
    }
}

/// Best `limit` wall origins by evaluator score.
///
/// Falls back to random origins when no structured cell yields a legal wall.
pub fn top_wall_candidates(
    grid: &mut Grid,
    hazard: Option<&Hazard>,
    ctx: &ScoreContext<'_>,
    limit: usize,
    rng: &mut DeterministicRng,
) -> CandidatePool {
    let mut pool = CandidatePool::new();
    let path = compute_path(grid);
    if path.is_empty() {
        return pool;
    }
    let cells = structured_cells(grid, &path);
    trace!(target: LOG_PLANNER, "wall scan over {} cells", cells.len());
    rank_cells(grid, PlacementKind::Wall, cells.iter(), hazard, ctx, limit, &mut pool);
    if pool.is_empty() {
        let random = random_cells(rng, RANDOM_WALL_DRAWS);
        rank_cells(grid, PlacementKind::Wall, random, hazard, ctx, limit, &mut pool);
    }
    pool
}

/// Best `limit` single-block cells by evaluator score.
///
/// `forced` cells are always considered in addition to the structured set.
pub fn top_single_candidates(
    grid: &mut Grid,
    hazard: Option<&Hazard>,
    ctx: &ScoreContext<'_>,
    forced: &[Pos],
    limit: usize,
    rng: &mut DeterministicRng,
) -> CandidatePool {
    let mut pool = CandidatePool::new();
    let path = compute_path(grid);
    if path.is_empty() {
        return pool;
    }
    let mut cells = structured_cells(grid, &path);
    for pos in forced {
        cells.insert(*pos);
    }
    trace!(target: LOG_PLANNER, "single scan over {} cells", cells.len());
    rank_cells(grid, PlacementKind::Single, cells.iter(), hazard, ctx, limit, &mut pool);
    if pool.is_empty() {
        let random = random_cells(rng, RANDOM_WALL_DRAWS);
        rank_cells(grid, PlacementKind::Single, random, hazard, ctx, limit, &mut pool);
    }
    pool
}

/// Best `limit` singles drawn only from `cells`.
pub(crate) fn rank_singles_among(
    grid: &mut Grid,
    cells: &[Pos],
    hazard: Option<&Hazard>,
    ctx: &ScoreContext<'_>,
    limit: usize,
) -> CandidatePool {
    let mut pool = CandidatePool::new();
    rank_cells(grid, PlacementKind::Single, cells.iter().copied(), hazard, ctx, limit, &mut pool);
    pool
}

/// Free cells orthogonally adjacent to active speed pads on the current path.
#[must_use]
pub fn speed_pad_steer_cells(grid: &Grid) -> Vec<Pos> {
    let mut cells = CellSet::new();
    for node in compute_path(grid) {
        if grid.get(node) != Some(Cell::Pad(PadKind::Speed)) {
            continue;
        }
        for (dx, dy) in CARDINAL_OFFSETS {
            let pos = node.offset(dx, dy);
            if grid.can_place_single(pos) {
                cells.insert(pos);
            }
        }
    }
    cells.iter().collect()
}

/// Randomized candidate pool used when the structured pools come back empty.
pub fn fallback_candidates(
    grid: &mut Grid,
    hazard: Option<&Hazard>,
    ctx: &ScoreContext<'_>,
    allow_walls: bool,
    allow_singles: bool,
    limit: usize,
    rng: &mut DeterministicRng,
) -> CandidatePool {
    let mut pool = CandidatePool::new();
    if allow_walls {
        for _ in 0..FALLBACK_POOL_TRIES {
            let x = usize_to_i32(rng.below(GRID_SIZE - 2));
            let y = 1 + usize_to_i32(rng.below(GRID_SIZE - 3));
            let pos = Pos::new(x, y);
            if let Some(value) = score_placement(grid, PlacementKind::Wall, pos, hazard, ctx) {
                insert_ranked(&mut pool, Candidate::new(PlacementKind::Wall, pos, value), limit);
            }
        }
    }
    if allow_singles {
        for _ in 0..FALLBACK_POOL_TRIES {
            let x = usize_to_i32(rng.below(GRID_SIZE - 1));
            let y = 1 + usize_to_i32(rng.below(GRID_SIZE - 2));
            let pos = Pos::new(x, y);
            if let Some(value) = score_placement(grid, PlacementKind::Single, pos, hazard, ctx) {
                insert_ranked(&mut pool, Candidate::new(PlacementKind::Single, pos, value), limit);
            }
        }
    }
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::analyze_path;
    use crate::weights::Weights;

    fn context(weights: &Weights) -> ScoreContext<'_> {
        ScoreContext {
            neutral: &[],
            weights,
            base_grid: None,
        }
    }

    #[test]
    fn wall_candidates_are_legal_and_ranked() {
        let weights = Weights::default();
        let mut grid = Grid::empty();
        let mut rng = DeterministicRng::from_seed(3);
        let pool = top_wall_candidates(&mut grid, None, &context(&weights), 3, &mut rng);
        assert_eq!(pool.len(), 3);
        assert!(pool.windows(2).all(|pair| pair[0].score >= pair[1].score));
        assert_eq!(grid, Grid::empty());
        for candidate in &pool {
            let mut probe = grid.clone();
            assert!(probe.try_place(PlacementKind::Wall, candidate.pos).is_ok());
        }
    }

    #[test]
    fn best_wall_lengthens_the_straight_path() {
        let weights = Weights::default();
        let mut grid = Grid::empty();
        let mut rng = DeterministicRng::from_seed(11);
        let pool = top_wall_candidates(&mut grid, None, &context(&weights), 3, &mut rng);
        let best = pool[0];
        let mut placed = grid.clone();
        placed.try_place(PlacementKind::Wall, best.pos).unwrap();
        let before = analyze_path(&grid).unwrap().total_distance;
        let after = analyze_path(&placed).unwrap().total_distance;
        assert!(after > before);
        assert!((best.pos.x..=best.pos.x + 1).contains(&10));
    }

    #[test]
    fn single_candidates_include_forced_cells() {
        let weights = Weights::default();
        let mut grid = Grid::empty();
        let mut rng = DeterministicRng::from_seed(5);
        let far = Pos::new(0, 10);
        let ctx = context(&weights);
        let pool = top_single_candidates(&mut grid, None, &ctx, &[far], 200, &mut rng);
        assert!(pool.iter().any(|candidate| candidate.pos == far));
        assert!(pool.iter().all(|candidate| candidate.kind == PlacementKind::Single));
    }

    #[test]
    fn steer_cells_surround_speed_pads_on_the_path() {
        let mut grid = Grid::empty();
        grid.set_cell(Pos::new(10, 10), Cell::Pad(PadKind::Speed));
        grid.set_cell(Pos::new(11, 10), Cell::Static);
        let cells = speed_pad_steer_cells(&grid);
        assert_eq!(cells, vec![Pos::new(9, 10), Pos::new(10, 11), Pos::new(10, 9)]);
        grid.set_cell(Pos::new(10, 10), Cell::SpentPad(PadKind::Speed));
        assert!(speed_pad_steer_cells(&grid).is_empty());
    }

    #[test]
    fn fallback_pool_respects_permissions() {
        let weights = Weights::default();
        let mut grid = Grid::empty();
        let mut rng = DeterministicRng::from_seed(8);
        let ctx = context(&weights);
        let pool = fallback_candidates(&mut grid, None, &ctx, false, true, 3, &mut rng);
        assert!(!pool.is_empty());
        assert!(pool.iter().all(|candidate| candidate.kind == PlacementKind::Single));
        let none = fallback_candidates(&mut grid, None, &ctx, false, false, 3, &mut rng);
        assert!(none.is_empty());
    }
}
