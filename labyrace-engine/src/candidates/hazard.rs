//! Hazard hotspots.
//!
//! Hotspots are cells where the hazard marker scores best: path nodes, their
//! eight neighbours and a handful of random interior cells. The marker itself
//! is an obstacle, so a hotspot may also lengthen the path or push it off a
//! mandatory speed pad.
use serde::{Deserialize, Serialize};

use super::CellSet;
use super::speed::count_mandatory_speed_pads;
use crate::constants::{GRID_SIZE_I32, HAZARD_PATH_GAIN_THRESHOLD, HOTSPOT_RANDOM_DRAWS};
use crate::eval::{ScoreContext, evaluate_path};
use crate::grid::{Grid, PlacementError, PlacementKind, Pos};
use crate::hazard::{Hazard, HazardKind};
use crate::path::{analyze_path, compute_path, neighbor_offsets};
use crate::seed::DeterministicRng;

/// Scored hazard placement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HazardCandidate {
    pub pos: Pos,
    pub score: f64,
    /// Path length added by the marker.
    pub path_gain: f64,
    /// The marker removes at least one mandatory speed pad.
    pub avoids_speed_pad: bool,
}

/// Path measurements of the grid before the marker goes down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardBaseline {
    distance: f64,
    mandatory_speed_pads: usize,
}

impl HazardBaseline {
    /// `None` when the grid has no path.
    #[must_use]
    pub fn measure(grid: &Grid) -> Option<Self> {
        let info = analyze_path(grid)?;
        Some(Self {
            distance: info.total_distance,
            mandatory_speed_pads: count_mandatory_speed_pads(grid, &info.path),
        })
    }
}

/// Score a hazard of `kind` at `pos`; the grid is left unchanged.
pub fn evaluate_hazard_candidate(
    grid: &mut Grid,
    kind: HazardKind,
    pos: Pos,
    baseline: &HazardBaseline,
    ctx: &ScoreContext<'_>,
) -> Option<HazardCandidate> {
    let undo = grid.apply(PlacementKind::Hazard, pos)?;
    let candidate = analyze_path(grid).map(|info| {
        let hazard = Hazard::placed_at(kind, pos);
        let score = evaluate_path(grid, &info, Some(&hazard), ctx).score;
        let mandatory = count_mandatory_speed_pads(grid, &info.path);
        HazardCandidate {
            pos,
            score,
            path_gain: info.total_distance - baseline.distance,
            avoids_speed_pad: mandatory < baseline.mandatory_speed_pads,
        }
    });
    grid.revert(undo);
    candidate.filter(|candidate| candidate.score.is_finite())
}

/// Path nodes, their neighbours, then random interior cells.
fn hotspot_cells(grid: &Grid, rng: &mut DeterministicRng) -> CellSet {
    let mut cells = CellSet::new();
    for node in compute_path(grid) {
        cells.insert(node);
        for (dx, dy) in neighbor_offsets() {
            cells.insert(node.offset(dx, dy));
        }
    }
    for _ in 0..HOTSPOT_RANDOM_DRAWS {
        let x = rng.range_inclusive(0, GRID_SIZE_I32 - 1);
        let y = rng.range_inclusive(1, GRID_SIZE_I32 - 2);
        cells.insert(Pos::new(x, y));
    }
    cells
}

/// Best `limit` hazard cells, highest score first.
pub fn top_hazard_hotspots(
    grid: &mut Grid,
    kind: HazardKind,
    ctx: &ScoreContext<'_>,
    limit: usize,
    rng: &mut DeterministicRng,
) -> Vec<HazardCandidate> {
    let Some(baseline) = HazardBaseline::measure(grid) else {
        return Vec::new();
    };
    let cells = hotspot_cells(grid, rng);
    let mut hotspots: Vec<HazardCandidate> = cells
        .iter()
        .filter_map(|pos| evaluate_hazard_candidate(grid, kind, pos, &baseline, ctx))
        .collect();
    hotspots.sort_by(|a, b| b.score.total_cmp(&a.score));
    hotspots.truncate(limit);
    hotspots
}

fn best_of(current: Option<HazardCandidate>, next: HazardCandidate) -> Option<HazardCandidate> {
    match current {
        Some(best) if best.score >= next.score => Some(best),
        _ => Some(next),
    }
}

/// Pick the hazard cell, preferring the caller's `preferred` cells.
///
/// A general cell overrides the preferred ones when it lengthens the path by at
/// least ten cells or takes a mandatory speed pad off the route.
pub fn choose_hazard_cell(
    grid: &mut Grid,
    kind: HazardKind,
    ctx: &ScoreContext<'_>,
    preferred: &[Pos],
    rng: &mut DeterministicRng,
) -> Option<HazardCandidate> {
    let baseline = HazardBaseline::measure(grid)?;
    let mut preferred_set = CellSet::new();
    let mut best_preferred = None;
    for pos in preferred {
        preferred_set.insert(*pos);
        if let Some(candidate) = evaluate_hazard_candidate(grid, kind, *pos, &baseline, ctx) {
            best_preferred = best_of(best_preferred, candidate);
        }
    }
    let mut best_general = None;
    for pos in hotspot_cells(grid, rng).iter() {
        if preferred_set.contains(pos) {
            continue;
        }
        if let Some(candidate) = evaluate_hazard_candidate(grid, kind, pos, &baseline, ctx) {
            best_general = best_of(best_general, candidate);
        }
    }
    match (best_preferred, best_general) {
        (Some(_), Some(general))
            if general.path_gain >= HAZARD_PATH_GAIN_THRESHOLD || general.avoids_speed_pad =>
        {
            Some(general)
        }
        (Some(preferred), _) => Some(preferred),
        (None, general) => general,
    }
}

/// Put the hazard marker down at `pos` and arm `hazard` there.
///
/// # Errors
///
/// Returns `PlacementError` when the cell is taken or the marker would block
/// the maze; `hazard` is untouched in that case.
pub fn place_hazard(grid: &mut Grid, hazard: &mut Hazard, pos: Pos) -> Result<(), PlacementError> {
    grid.try_place(PlacementKind::Hazard, pos)?;
    *hazard = Hazard::placed_at(hazard.kind, pos);
    Ok(())
}
