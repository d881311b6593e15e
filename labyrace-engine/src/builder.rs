//! Layout builder.
//!
//! A build places one block per step until the budget runs out or nothing legal
//! is left. While the hazard is still in hand, steps near the start or the end
//! of the build fork a branch that drops the hazard on the best hotspot right
//! away. Branches live as owned [`BuildState`] values on an explicit work stack;
//! each finished branch is simulated once and the slowest run wins.

use std::time::Instant;

use log::{debug, info};

use crate::candidates::{
    Candidate, HazardBaseline, HazardCandidate, choose_hazard_cell, divert_mandatory_speed_pads,
    evaluate_hazard_candidate, score_placement, top_hazard_hotspots,
};
use crate::config::EngineConfig;
use crate::constants::{BRANCH_WINDOW, FALLBACK_PLACEMENT_TRIES, GRID_SIZE, LOG_BUILDER};
use crate::eval::ScoreContext;
use crate::grid::{Grid, PlacementKind, Pos};
use crate::hazard::Hazard;
use crate::layout::{
    BranchPoint, BuildError, BuildProfile, BuildReport, Budget, LayoutDraft, PlacementEntry,
    Snapshot,
};
use crate::numbers::{duration_ms, usize_to_i32};
use crate::path::has_path;
use crate::planner::{PlacementRequest, choose_placement};
use crate::reclaim::{annotate_impacts, reclaim};
use crate::seed::{BUILDER_STREAM, DeterministicRng};
use crate::sim::RunResult;
use crate::weights::Weights;

/// Read-only inputs shared by every branch of one build.
#[derive(Debug, Clone)]
pub(crate) struct BuildEnv<'a> {
    pub base_grid: &'a Grid,
    pub neutral: &'a [Hazard],
    pub weights: Weights,
    pub config: &'a EngineConfig,
    pub hotspot_override: Option<&'a [Pos]>,
}

impl BuildEnv<'_> {
    pub(crate) fn ctx(&self) -> ScoreContext<'_> {
        ScoreContext {
            neutral: self.neutral,
            weights: &self.weights,
            base_grid: Some(self.base_grid),
        }
    }
}

/// One branch of the build in progress.
#[derive(Debug, Clone)]
struct BuildState {
    draft: LayoutDraft,
    rng: DeterministicRng,
    hotspots: Vec<HazardCandidate>,
    branch: Option<BranchPoint>,
}

/// A branch that ran to completion.
#[derive(Debug, Clone)]
struct FinishedBranch {
    draft: LayoutDraft,
    rng: DeterministicRng,
    result: RunResult,
    branch: Option<BranchPoint>,
}

enum Step {
    Continue(Option<BuildState>),
    Finished,
}

/// Build a layout for `snapshot`.
///
/// # Errors
///
/// Returns `BuildError` when the snapshot fails validation.
pub fn build_layout(snapshot: &Snapshot) -> Result<BuildReport, BuildError> {
    let started = Instant::now();
    snapshot.validate()?;
    let base_grid = snapshot.checked_base_grid()?;
    let env = BuildEnv {
        base_grid: &base_grid,
        neutral: &snapshot.neutral_hazards,
        weights: snapshot.weights()?,
        config: &snapshot.config,
        hotspot_override: snapshot.hotspot_override.as_deref(),
    };
    let mut profile = BuildProfile::default();

    let initial = BuildState {
        draft: LayoutDraft::new(
            base_grid.clone(),
            snapshot.hazard_kind.map(Hazard::new),
            Budget::new(snapshot.wall_budget, snapshot.single_budget),
        ),
        rng: DeterministicRng::for_stream(snapshot.seed, BUILDER_STREAM),
        hotspots: Vec::new(),
        branch: None,
    };
    let finished = run_branches(&env, initial, &mut profile);
    let Some(best) = pick_best(finished) else {
        return Err(BuildError::Blocked);
    };
    debug!(
        target: LOG_BUILDER,
        "best branch {:?} finished with {:?}",
        best.branch,
        best.result
    );

    let reclaim_started = Instant::now();
    let FinishedBranch {
        mut draft,
        mut rng,
        mut result,
        branch,
    } = best;
    if env.config.uses_reclaim() {
        let outcome = reclaim(&env, &mut draft, result, &mut rng);
        profile.reallocations = outcome.reallocations;
        profile.reclaim_passes = outcome.passes;
        result = outcome.result;
    }
    annotate_impacts(&mut draft, env.neutral, env.config.simulation_time_cap);
    profile.reclaim_ms = duration_ms(reclaim_started.elapsed());
    profile.total_ms = duration_ms(started.elapsed());

    let layout = draft.into_layout(env.neutral, result, branch);
    info!(
        target: LOG_BUILDER,
        "built layout: {} placements, {:?}, {} branches, {:.1} ms",
        layout.placements.len(),
        layout.result,
        profile.branches_explored,
        profile.total_ms
    );
    Ok(BuildReport { layout, profile })
}

/// Run every branch to completion, in depth-first order.
fn run_branches(
    env: &BuildEnv<'_>,
    initial: BuildState,
    profile: &mut BuildProfile,
) -> Vec<FinishedBranch> {
    let mut stack = vec![initial];
    let mut finished = Vec::new();
    profile.branches_explored = 1;
    while let Some(mut state) = stack.pop() {
        let step_started = Instant::now();
        let step = advance(env, &mut state, profile);
        profile.placement_ms += duration_ms(step_started.elapsed());
        match step {
            Step::Continue(fork) => {
                stack.push(state);
                if let Some(fork) = fork {
                    profile.branches_explored += 1;
                    stack.push(fork);
                }
            }
            Step::Finished => {
                let finish_started = Instant::now();
                finished.push(finish(env, state));
                profile.finish_ms += duration_ms(finish_started.elapsed());
            }
        }
    }
    finished
}

/// Make one placement; may fork a hazard branch.
fn advance(env: &BuildEnv<'_>, state: &mut BuildState, profile: &mut BuildProfile) -> Step {
    if state.draft.budget.is_exhausted() || !has_path(&state.draft.grid) {
        return Step::Finished;
    }
    let ctx = env.ctx();
    let request = PlacementRequest {
        hazard: state.draft.hazard.as_ref(),
        ctx,
        walls_left: state.draft.budget.walls_left,
        singles_left: state.draft.budget.singles_left,
        hotspots: &state.hotspots,
        config: env.config,
    };
    let choice = choose_placement(&mut state.draft.grid, &request, &mut state.rng);
    let candidate = match choice {
        Some(choice) => {
            if choice.used_lookahead {
                profile.lookahead_used += 1;
            }
            Some(choice.candidate)
        }
        None => fallback_placement(state, &ctx),
    };
    let Some(candidate) = candidate else {
        debug!(target: LOG_BUILDER, "no legal placement left");
        return Step::Finished;
    };

    let placed = match candidate.kind {
        PlacementKind::Hazard => state.draft.place_hazard(candidate.pos),
        kind => state.draft.place_block(kind, candidate.pos),
    };
    if let Err(err) = placed {
        debug!(target: LOG_BUILDER, "placement rejected: {err}");
        return Step::Finished;
    }
    debug!(
        target: LOG_BUILDER,
        "placed {:?} at {} (score {:.2}, {} left)",
        candidate.kind,
        candidate.pos,
        candidate.score,
        state.draft.budget.remaining()
    );

    state.hotspots = refresh_hotspots(env, state);
    let made = state.draft.budget.spent();
    let remaining = state.draft.budget.remaining();
    let should_branch = env.config.uses_branching()
        && state.draft.hazard_open()
        && !state.hotspots.is_empty()
        && (made <= BRANCH_WINDOW || remaining <= BRANCH_WINDOW);
    if !should_branch {
        return Step::Continue(None);
    }
    let mut fork = state.clone();
    if let Some(point) = BranchPoint::at(made, state.draft.budget.initial_total(), BRANCH_WINDOW) {
        fork.branch = Some(point);
    }
    let spot = state.hotspots[0].pos;
    match fork.draft.place_hazard(spot) {
        Ok(()) => {
            debug!(target: LOG_BUILDER, "forked hazard branch at {spot} ({:?})", fork.branch);
            Step::Continue(Some(fork))
        }
        Err(err) => {
            debug!(target: LOG_BUILDER, "hazard branch skipped: {err}");
            Step::Continue(None)
        }
    }
}

/// Hotspots for the next step; empty once the hazard is down.
fn refresh_hotspots(env: &BuildEnv<'_>, state: &mut BuildState) -> Vec<HazardCandidate> {
    let Some(kind) = state
        .draft
        .hazard
        .as_ref()
        .filter(|hazard| !hazard.is_placed())
        .map(|hazard| hazard.kind)
    else {
        return Vec::new();
    };
    if !env.config.uses_branching() {
        return Vec::new();
    }
    let ctx = env.ctx();
    if let Some(cells) = env.hotspot_override {
        let Some(baseline) = HazardBaseline::measure(&state.draft.grid) else {
            return Vec::new();
        };
        let grid = &mut state.draft.grid;
        return cells
            .iter()
            .filter_map(|pos| evaluate_hazard_candidate(grid, kind, *pos, &baseline, &ctx))
            .take(env.config.hotspot_limit)
            .collect();
    }
    top_hazard_hotspots(
        &mut state.draft.grid,
        kind,
        &ctx,
        env.config.hotspot_limit,
        &mut state.rng,
    )
}

/// Random legal block when every candidate pool came back empty.
fn fallback_placement(state: &mut BuildState, ctx: &ScoreContext<'_>) -> Option<Candidate> {
    for _ in 0..FALLBACK_PLACEMENT_TRIES {
        let wall_try = state.draft.budget.walls_left > 0;
        let single_try = state.draft.budget.singles_left > 0;
        if !wall_try && !single_try {
            break;
        }
        let is_wall = wall_try && (!single_try || state.rng.next_unit() > 0.5);
        let (kind, pos) = if is_wall {
            let x = usize_to_i32(state.rng.below(GRID_SIZE - 1));
            let y = 1 + usize_to_i32(state.rng.below(GRID_SIZE - 2));
            (PlacementKind::Wall, Pos::new(x, y))
        } else {
            let x = usize_to_i32(state.rng.below(GRID_SIZE));
            let y = 1 + usize_to_i32(state.rng.below(GRID_SIZE - 2));
            (PlacementKind::Single, Pos::new(x, y))
        };
        let hazard = state.draft.hazard.as_ref();
        if let Some(score) = score_placement(&mut state.draft.grid, kind, pos, hazard, ctx) {
            return Some(Candidate::new(kind, pos, score));
        }
    }
    None
}

/// Final hazard pass, speed pad diversion and one full simulation.
fn finish(env: &BuildEnv<'_>, mut state: BuildState) -> FinishedBranch {
    let ctx = env.ctx();
    if let Some(kind) = state
        .draft
        .hazard
        .as_ref()
        .filter(|hazard| !hazard.is_placed())
        .map(|hazard| hazard.kind)
    {
        let preferred: Vec<Pos> = state.hotspots.iter().map(|spot| spot.pos).collect();
        let chosen =
            choose_hazard_cell(&mut state.draft.grid, kind, &ctx, &preferred, &mut state.rng);
        if let Some(spot) = chosen {
            if let Err(err) = state.draft.place_hazard(spot.pos) {
                debug!(target: LOG_BUILDER, "final hazard pass failed: {err}");
            }
        }
    }

    let draft = &mut state.draft;
    let diverted = divert_mandatory_speed_pads(
        &mut draft.grid,
        draft.hazard.as_ref(),
        &ctx,
        &mut draft.budget.singles_left,
    );
    draft
        .placements
        .extend(diverted.into_iter().map(|pos| PlacementEntry::new(PlacementKind::Single, pos)));

    let result = state
        .draft
        .simulate(env.neutral, env.config.simulation_time_cap);
    debug!(
        target: LOG_BUILDER,
        "branch {:?} finished: {} placements, {:?}",
        state.branch,
        state.draft.placements.len(),
        result
    );
    FinishedBranch {
        draft: state.draft,
        rng: state.rng,
        result,
        branch: state.branch,
    }
}

fn run_time(result: RunResult) -> f64 {
    result.time().unwrap_or(f64::NEG_INFINITY)
}

/// Slowest finished branch; the earliest one wins ties.
fn pick_best(finished: Vec<FinishedBranch>) -> Option<FinishedBranch> {
    let mut best: Option<FinishedBranch> = None;
    for candidate in finished {
        let better = best
            .as_ref()
            .is_none_or(|current| run_time(candidate.result) > run_time(current.result));
        if better {
            best = Some(candidate);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Fidelity;
    use crate::grid::Cell;
    use crate::hazard::HazardKind;

    fn snapshot(walls: u32, singles: u32) -> Snapshot {
        Snapshot::new(Grid::empty())
            .with_budget(walls, singles)
            .with_seed(42)
    }

    #[test]
    fn one_wall_on_an_empty_grid_blocks_the_straight_path() {
        let report = build_layout(&snapshot(1, 0)).unwrap();
        let layout = &report.layout;
        assert_eq!(layout.placements.len(), 1);
        let wall = layout.placements[0];
        assert_eq!(wall.kind, PlacementKind::Wall);
        assert!((wall.pos.x..=wall.pos.x + 1).contains(&10));
        assert_eq!(layout.budget.walls_left, 0);
        let straight = 22.0 / crate::constants::RUNNER_SPEED;
        assert!(layout.time().unwrap() > straight);
    }

    #[test]
    fn builds_are_deterministic() {
        let snap = snapshot(3, 3).with_hazard(HazardKind::Row);
        let first = build_layout(&snap).unwrap();
        let second = build_layout(&snap).unwrap();
        assert_eq!(first.layout, second.layout);
    }

    #[test]
    fn budget_is_conserved_and_path_kept() {
        let snap = snapshot(4, 4).with_hazard(HazardKind::Radius);
        let layout = build_layout(&snap).unwrap().layout;
        assert!(has_path(&layout.grid));
        let walls = u32::try_from(layout.count(PlacementKind::Wall)).unwrap();
        let singles = u32::try_from(layout.count(PlacementKind::Single)).unwrap();
        assert_eq!(walls + layout.budget.walls_left, 4);
        assert_eq!(singles + layout.budget.singles_left, 4);
        assert!(layout.hazard.as_ref().is_some_and(Hazard::is_placed));
        assert_eq!(layout.count(PlacementKind::Hazard), 1);
    }

    #[test]
    fn branching_explores_hazard_forks() {
        let snap = snapshot(2, 2).with_hazard(HazardKind::Gravity);
        let report = build_layout(&snap).unwrap();
        assert!(report.profile.branches_explored > 1);
        let greedy = snap.with_config(EngineConfig {
            fidelity: Fidelity::Greedy,
            ..EngineConfig::default()
        });
        let report = build_layout(&greedy).unwrap();
        assert_eq!(report.profile.branches_explored, 1);
        assert_eq!(report.profile.reclaim_passes, 0);
    }

    #[test]
    fn snapshot_without_hazard_never_places_one() {
        let layout = build_layout(&snapshot(2, 1)).unwrap().layout;
        assert!(layout.hazard.is_none());
        assert_eq!(layout.grid.count(|cell| cell == Cell::Hazard), 0);
    }

    #[test]
    fn invalid_snapshots_are_rejected() {
        let mut grid = Grid::empty();
        for x in 0..21 {
            grid.set_cell(Pos::new(x, 9), Cell::Static);
        }
        assert_eq!(
            build_layout(&Snapshot::new(grid)).unwrap_err(),
            BuildError::Blocked
        );
    }

    #[test]
    fn oversized_budget_fails_before_building() {
        let huge = Snapshot::new(Grid::empty()).with_budget(u32::MAX, 1);
        assert!(matches!(
            build_layout(&huge).unwrap_err(),
            BuildError::BudgetTooLarge { walls: u32::MAX, singles: 1, .. }
        ));
    }

    #[test]
    fn pick_best_prefers_first_on_ties() {
        let draft = LayoutDraft::new(Grid::empty(), None, Budget::new(0, 0));
        let make = |time: RunResult, branch| FinishedBranch {
            draft: draft.clone(),
            rng: DeterministicRng::from_seed(1),
            result: time,
            branch,
        };
        let best = pick_best(vec![
            make(RunResult::NoPath, None),
            make(RunResult::Finished(9.0), Some(BranchPoint::Early(1))),
            make(RunResult::Finished(9.0), Some(BranchPoint::Late(1))),
            make(RunResult::DidNotFinish, None),
        ])
        .unwrap();
        assert_eq!(best.branch, Some(BranchPoint::Early(1)));
    }
}
