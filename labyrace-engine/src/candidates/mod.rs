//! Candidate generation for walls, singles and the hazard.
//!
//! Every legal candidate is applied to the grid in place, scored once with the
//! evaluator and reverted. Pools are stable top-K lists: among equal scores the
//! candidate discovered first keeps its rank.

pub mod blocks;
pub mod hazard;
pub mod speed;

pub use blocks::{
    fallback_candidates, speed_pad_steer_cells, top_single_candidates, top_wall_candidates,
};
pub use hazard::{
    HazardBaseline, HazardCandidate, choose_hazard_cell, evaluate_hazard_candidate, place_hazard,
    top_hazard_hotspots,
};
pub use speed::{
    count_mandatory_speed_pads, divert_mandatory_speed_pads, is_mandatory_pad,
    mandatory_speed_pads,
};

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::constants::CELL_COUNT;
use crate::eval::{ScoreContext, score};
use crate::grid::{Grid, PlacementKind, Pos};
use crate::hazard::Hazard;

/// One scored placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub kind: PlacementKind,
    pub pos: Pos,
    pub score: f64,
}

impl Candidate {
    #[must_use]
    pub const fn new(kind: PlacementKind, pos: Pos, score: f64) -> Self {
        Self { kind, pos, score }
    }
}

/// Ranked candidate list, best first.
pub type CandidatePool = SmallVec<[Candidate; 4]>;

/// Insert `candidate` behind every entry scoring at least as well, keeping at
/// most `limit` entries.
pub fn insert_ranked(pool: &mut CandidatePool, candidate: Candidate, limit: usize) {
    let index = pool.partition_point(|existing| existing.score >= candidate.score);
    if index >= limit {
        return;
    }
    pool.insert(index, candidate);
    pool.truncate(limit);
}

/// Score `grid` with `kind` applied at `pos`, leaving the grid unchanged.
///
/// `None` when the cells are not free or the placement blocks the maze.
pub(crate) fn score_placement(
    grid: &mut Grid,
    kind: PlacementKind,
    pos: Pos,
    hazard: Option<&Hazard>,
    ctx: &ScoreContext<'_>,
) -> Option<f64> {
    let undo = grid.apply(kind, pos)?;
    let value = score(grid, hazard, ctx);
    grid.revert(undo);
    value.is_finite().then_some(value)
}

/// Grid cells in first-seen order without duplicates.
#[derive(Debug, Clone)]
pub(crate) struct CellSet {
    seen: [bool; CELL_COUNT],
    order: Vec<Pos>,
}

impl CellSet {
    pub(crate) fn new() -> Self {
        Self {
            seen: [false; CELL_COUNT],
            order: Vec::new(),
        }
    }

    /// Record `pos` unless it is off the grid or already present.
    pub(crate) fn insert(&mut self, pos: Pos) -> bool {
        let Some(index) = pos.index() else {
            return false;
        };
        if self.seen[index] {
            return false;
        }
        self.seen[index] = true;
        self.order.push(pos);
        true
    }

    /// Add every cell within Chebyshev `radius` of `center`, column by column.
    pub(crate) fn insert_square(&mut self, center: Pos, radius: i32) {
        for dx in -radius..=radius {
            for dy in -radius..=radius {
                self.insert(center.offset(dx, dy));
            }
        }
    }

    pub(crate) fn contains(&self, pos: Pos) -> bool {
        pos.index().is_some_and(|index| self.seen[index])
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = Pos> + '_ {
        self.order.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(x: i32, score: f64) -> Candidate {
        Candidate::new(PlacementKind::Single, Pos::new(x, 5), score)
    }

    #[test]
    fn ranked_insert_keeps_first_among_equals() {
        let mut pool = CandidatePool::new();
        insert_ranked(&mut pool, single(1, 5.0), 3);
        insert_ranked(&mut pool, single(2, 7.0), 3);
        insert_ranked(&mut pool, single(3, 5.0), 3);
        insert_ranked(&mut pool, single(4, 1.0), 3);
        let order: Vec<i32> = pool.iter().map(|candidate| candidate.pos.x).collect();
        assert_eq!(order, vec![2, 1, 3]);
        insert_ranked(&mut pool, single(5, 9.0), 3);
        let order: Vec<i32> = pool.iter().map(|candidate| candidate.pos.x).collect();
        assert_eq!(order, vec![5, 2, 1]);
    }

    #[test]
    fn cell_set_deduplicates_and_skips_outside() {
        let mut cells = CellSet::new();
        assert!(cells.insert(Pos::new(3, 3)));
        assert!(!cells.insert(Pos::new(3, 3)));
        assert!(!cells.insert(Pos::new(-1, 3)));
        cells.insert_square(Pos::new(0, 0), 1);
        assert_eq!(cells.len(), 5);
        assert!(cells.contains(Pos::new(1, 1)));
        assert!(!cells.contains(Pos::new(2, 2)));
        assert_eq!(cells.iter().next(), Some(Pos::new(3, 3)));
    }

    #[test]
    fn scoring_a_placement_restores_the_grid() {
        let mut grid = Grid::empty();
        let weights = crate::weights::Weights::default();
        let ctx = ScoreContext {
            neutral: &[],
            weights: &weights,
            base_grid: None,
        };
        let before = grid.clone();
        let value = score_placement(&mut grid, PlacementKind::Wall, Pos::new(9, 9), None, &ctx);
        assert!(value.is_some());
        assert_eq!(grid, before);
        let entrance = Pos::entrance();
        assert!(score_placement(&mut grid, PlacementKind::Single, entrance, None, &ctx).is_none());
    }
}
