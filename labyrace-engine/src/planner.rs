//! Placement choice with a short joint-move lookahead.
//!
//! Single-step ranking is greedy. When the two best candidates are nearly tied
//! the planner searches every sequence of up to `lookahead_depth` moves drawn
//! from the wall, single and hazard pools, scores the resulting grids and
//! returns the first move of the best sequence.

use log::trace;

use crate::candidates::{
    Candidate, CandidatePool, HazardCandidate, fallback_candidates, speed_pad_steer_cells,
    top_single_candidates, top_wall_candidates,
};
use crate::config::EngineConfig;
use crate::constants::LOG_PLANNER;
use crate::eval::{ScoreContext, score};
use crate::grid::{Grid, PlacementKind};
use crate::hazard::Hazard;
use crate::path::has_path;
use crate::seed::DeterministicRng;

/// Inputs to one placement decision.
#[derive(Debug, Clone, Copy)]
pub struct PlacementRequest<'a> {
    /// The builder's hazard, placed or not; `None` when the build has no hazard.
    pub hazard: Option<&'a Hazard>,
    pub ctx: ScoreContext<'a>,
    pub walls_left: u32,
    pub singles_left: u32,
    /// Hazard cells the lookahead may try while the hazard is unplaced.
    pub hotspots: &'a [HazardCandidate],
    pub config: &'a EngineConfig,
}

/// The move to make next.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementChoice {
    pub candidate: Candidate,
    /// Whether the lookahead decided this move.
    pub used_lookahead: bool,
}

/// Whether two scores are within `tolerance` of each other, relative to the larger.
#[must_use]
pub fn is_close_call(best: f64, runner_up: f64, tolerance: f64) -> bool {
    let scale = best.abs().max(runner_up.abs());
    (best - runner_up).abs() <= tolerance * scale
}

/// Pick the next placement, or `None` when nothing legal is left.
pub fn choose_placement(
    grid: &mut Grid,
    request: &PlacementRequest<'_>,
    rng: &mut DeterministicRng,
) -> Option<PlacementChoice> {
    let limit = request.config.candidate_pool;
    let walls = if request.walls_left > 0 {
        top_wall_candidates(grid, request.hazard, &request.ctx, limit, rng)
    } else {
        CandidatePool::new()
    };
    let singles = if request.singles_left > 0 {
        let steer = speed_pad_steer_cells(grid);
        top_single_candidates(grid, request.hazard, &request.ctx, &steer, limit, rng)
    } else {
        CandidatePool::new()
    };

    let mut ranked: Vec<Candidate> = walls.iter().chain(singles.iter()).copied().collect();
    if ranked.is_empty() {
        ranked.extend(fallback_candidates(
            grid,
            request.hazard,
            &request.ctx,
            request.walls_left > 0,
            request.singles_left > 0,
            limit,
            rng,
        ));
    }
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
    let greedy = *ranked.first()?;

    let tolerance = request.config.lookahead_tolerance;
    let close = ranked
        .get(1)
        .is_some_and(|second| is_close_call(greedy.score, second.score, tolerance));
    if request.config.uses_lookahead() && close {
        let mut planner = SequencePlanner::new(request, &walls, &singles);
        if let Some(candidate) = planner.plan(grid) {
            trace!(
                target: LOG_PLANNER,
                "lookahead picked {:?} at {} (greedy {:?} at {}, {} nodes)",
                candidate.kind,
                candidate.pos,
                greedy.kind,
                greedy.pos,
                planner.nodes
            );
            return Some(PlacementChoice {
                candidate,
                used_lookahead: true,
            });
        }
    }
    Some(PlacementChoice {
        candidate: greedy,
        used_lookahead: false,
    })
}

/// Depth-first search over joint moves.
struct SequencePlanner<'a> {
    request: &'a PlacementRequest<'a>,
    walls: Vec<Candidate>,
    singles: Vec<Candidate>,
    hotspots: Vec<Candidate>,
    best: Option<(f64, Option<Candidate>)>,
    nodes: usize,
}

struct Node<'g> {
    grid: &'g Grid,
    hazard: Option<&'g Hazard>,
    walls_left: u32,
    singles_left: u32,
    depth: usize,
    first: Option<Candidate>,
    used_hazard: bool,
}

impl<'a> SequencePlanner<'a> {
    fn new(request: &'a PlacementRequest<'a>, walls: &[Candidate], singles: &[Candidate]) -> Self {
        let limit = request.config.candidate_pool;
        let hazard_open = request.hazard.is_some_and(|hazard| !hazard.is_placed());
        let hotspots = if hazard_open {
            request
                .hotspots
                .iter()
                .take(limit)
                .map(|spot| Candidate::new(PlacementKind::Hazard, spot.pos, spot.score))
                .collect()
        } else {
            Vec::new()
        };
        Self {
            request,
            walls: walls.iter().take(limit).copied().collect(),
            singles: singles.iter().take(limit).copied().collect(),
            hotspots,
            best: None,
            nodes: 0,
        }
    }

    fn max_depth(&self) -> usize {
        let hazard_move = usize::from(!self.hotspots.is_empty());
        let blocks = self.request.walls_left.saturating_add(self.request.singles_left);
        let moves = usize::try_from(blocks)
            .unwrap_or(usize::MAX)
            .saturating_add(hazard_move);
        moves.min(self.request.config.lookahead_depth).max(1)
    }

    fn plan(&mut self, grid: &Grid) -> Option<Candidate> {
        let depth = self.max_depth();
        let root = Node {
            grid,
            hazard: self.request.hazard,
            walls_left: self.request.walls_left,
            singles_left: self.request.singles_left,
            depth,
            first: None,
            used_hazard: self.hotspots.is_empty(),
        };
        self.search(&root);
        self.best.and_then(|(_, first)| first)
    }

    fn search(&mut self, node: &Node<'_>) {
        self.nodes += 1;
        let value = score(node.grid, node.hazard, &self.request.ctx);
        let out_of_moves = node.walls_left == 0 && node.singles_left == 0 && node.used_hazard;
        if node.depth == 0 || out_of_moves {
            if self.best.is_none_or(|(best, _)| value > best) {
                self.best = Some((value, node.first));
            }
            return;
        }
        if node.walls_left > 0 {
            for index in 0..self.walls.len() {
                let wall = self.walls[index];
                self.descend(node, wall, node.walls_left - 1, node.singles_left);
            }
        }
        if node.singles_left > 0 {
            for index in 0..self.singles.len() {
                let single = self.singles[index];
                self.descend(node, single, node.walls_left, node.singles_left - 1);
            }
        }
        if !node.used_hazard {
            for index in 0..self.hotspots.len() {
                let spot = self.hotspots[index];
                self.descend(node, spot, node.walls_left, node.singles_left);
            }
        }
    }

    fn descend(&mut self, node: &Node<'_>, step: Candidate, walls_left: u32, singles_left: u32) {
        let mut grid = node.grid.clone();
        if grid.apply(step.kind, step.pos).is_none() || !has_path(&grid) {
            return;
        }
        let placed_hazard = node
            .hazard
            .filter(|_| step.kind == PlacementKind::Hazard)
            .map(|hazard| Hazard::placed_at(hazard.kind, step.pos));
        let child = Node {
            grid: &grid,
            hazard: placed_hazard.as_ref().or(node.hazard),
            walls_left,
            singles_left,
            depth: node.depth - 1,
            first: node.first.or(Some(step)),
            used_hazard: node.used_hazard || step.kind == PlacementKind::Hazard,
        };
        self.search(&child);
    }
}
