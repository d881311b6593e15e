//! Budget reclaim.
//!
//! After the winning branch is finished, every placement is taken out once and
//! the layout is re-simulated. Structures whose removal costs less than the
//! reclaim threshold are refunded and the freed budget is spent again through
//! the normal placement choice, first demanding a real gain and then accepting
//! anything that does not slow the runner down. A refined layout that ends up
//! noticeably faster than the one it started from is thrown away.

use log::{debug, trace};

use crate::builder::BuildEnv;
use crate::candidates::{choose_hazard_cell, top_hazard_hotspots};
use crate::constants::{
    LOG_RECLAIM, REINVEST_LENIENT_EXTRA_ATTEMPTS, REINVEST_STRICT_EXTRA_ATTEMPTS,
};
use crate::grid::{Grid, PlacementKind, Pos};
use crate::hazard::Hazard;
use crate::layout::{LayoutDraft, PlacementEntry};
use crate::path::has_path;
use crate::planner::{PlacementRequest, choose_placement};
use crate::seed::DeterministicRng;
use crate::sim::{RunResult, simulate_with_cap};

/// What a reclaim run did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ReclaimOutcome {
    pub result: RunResult,
    /// Reinvested placements that were kept.
    pub reallocations: u32,
    pub passes: u32,
}

/// Budget and hazard cell freed by one strip pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Freed {
    walls: u32,
    singles: u32,
    hazard: Option<Pos>,
}

impl Freed {
    const fn is_empty(&self) -> bool {
        self.walls == 0 && self.singles == 0 && self.hazard.is_none()
    }

    fn take(&mut self, kind: PlacementKind) {
        match kind {
            PlacementKind::Wall => self.walls = self.walls.saturating_sub(1),
            PlacementKind::Single => self.singles = self.singles.saturating_sub(1),
            PlacementKind::Hazard => {}
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Reinvest {
    /// Keep a placement only when it gains at least the threshold.
    Strict,
    /// Keep any placement that does not lose time.
    Lenient,
}

impl Reinvest {
    const fn extra_attempts(self) -> u32 {
        match self {
            Self::Strict => REINVEST_STRICT_EXTRA_ATTEMPTS,
            Self::Lenient => REINVEST_LENIENT_EXTRA_ATTEMPTS,
        }
    }
}

/// Refine `draft` in place, starting from its simulated `result`.
pub(crate) fn reclaim(
    env: &BuildEnv<'_>,
    draft: &mut LayoutDraft,
    result: RunResult,
    rng: &mut DeterministicRng,
) -> ReclaimOutcome {
    let mut outcome = ReclaimOutcome {
        result,
        reallocations: 0,
        passes: 0,
    };
    if draft.placements.len() < env.config.reclaim_min_placements {
        return outcome;
    }
    let Some(start_time) = result.time() else {
        return outcome;
    };
    let threshold = env.config.reclaim_threshold;
    let cap = env.config.simulation_time_cap;
    let original = draft.clone();

    for _ in 0..env.config.reclaim_max_passes {
        let Some(baseline) = draft.simulate(env.neutral, cap).time() else {
            break;
        };
        outcome.passes += 1;
        let mut freed = strip_weak_placements(env, draft, baseline);
        if freed.is_empty() {
            break;
        }
        debug!(
            target: LOG_RECLAIM,
            "pass {}: freed {} walls, {} singles, hazard {:?}",
            outcome.passes,
            freed.walls,
            freed.singles,
            freed.hazard
        );
        let mut current = draft.simulate(env.neutral, cap).time();
        for mode in [Reinvest::Strict, Reinvest::Lenient] {
            outcome.reallocations += reinvest(env, draft, &mut freed, &mut current, mode, rng);
        }
        if let Some(cell) = freed.hazard {
            replace_hazard(env, draft, cell, rng);
        }
    }

    let refined = draft.simulate(env.neutral, cap);
    let regressed = refined.time().is_none_or(|time| time < start_time - threshold);
    if regressed {
        debug!(
            target: LOG_RECLAIM,
            "refined layout ran {:?}, keeping the {start_time:.3}s original",
            refined.time()
        );
        *draft = original;
        outcome.result = result;
    } else {
        outcome.result = refined;
    }
    outcome
}

/// Remove every placement whose absence costs less than the threshold.
fn strip_weak_placements(env: &BuildEnv<'_>, draft: &mut LayoutDraft, baseline: f64) -> Freed {
    let threshold = env.config.reclaim_threshold;
    let cap = env.config.simulation_time_cap;
    let mut freed = Freed::default();
    let mut kept = Vec::with_capacity(draft.placements.len());

    for entry in std::mem::take(&mut draft.placements) {
        let armed = draft
            .hazard
            .as_ref()
            .is_some_and(|hazard| hazard.cell == Some(entry.pos));
        if entry.kind == PlacementKind::Hazard && !armed {
            continue;
        }
        if !draft.grid.remove(entry.kind, entry.pos) {
            kept.push(entry);
            continue;
        }
        if !has_path(&draft.grid) {
            draft.grid.restore(entry.kind, entry.pos);
            kept.push(entry);
            continue;
        }
        let hazard = if entry.kind == PlacementKind::Hazard {
            None
        } else {
            draft.hazard.as_ref()
        };
        let without = simulate_with_cap(&draft.grid, hazard, env.neutral, cap).time();
        if without.is_some_and(|time| baseline - time < threshold) {
            trace!(
                target: LOG_RECLAIM,
                "reclaimed {:?} at {} ({:.3}s without it)",
                entry.kind,
                entry.pos,
                without.unwrap_or_default()
            );
            match entry.kind {
                PlacementKind::Hazard => {
                    if let Some(hazard) = draft.hazard.as_mut() {
                        *hazard = Hazard::new(hazard.kind);
                    }
                    freed.hazard = Some(entry.pos);
                }
                PlacementKind::Wall => {
                    draft.budget.refund(PlacementKind::Wall);
                    freed.walls += 1;
                }
                PlacementKind::Single => {
                    draft.budget.refund(PlacementKind::Single);
                    freed.singles += 1;
                }
            }
        } else {
            draft.grid.restore(entry.kind, entry.pos);
            kept.push(entry);
        }
    }
    draft.placements = kept;
    freed
}

/// Spend freed budget, keeping only placements `mode` accepts.
fn reinvest(
    env: &BuildEnv<'_>,
    draft: &mut LayoutDraft,
    freed: &mut Freed,
    current: &mut Option<f64>,
    mode: Reinvest,
    rng: &mut DeterministicRng,
) -> u32 {
    let threshold = env.config.reclaim_threshold;
    let cap = env.config.simulation_time_cap;
    let ctx = env.ctx();
    let mut rejected: Vec<(PlacementKind, Pos)> = Vec::new();
    let mut attempts = freed.walls + freed.singles + mode.extra_attempts();
    let mut accepted = 0;

    while (freed.walls > 0 || freed.singles > 0) && attempts > 0 {
        attempts -= 1;
        let request = PlacementRequest {
            hazard: draft.hazard.as_ref(),
            ctx,
            walls_left: freed.walls,
            singles_left: freed.singles,
            hotspots: &[],
            config: env.config,
        };
        let Some(choice) = choose_placement(&mut draft.grid, &request, rng) else {
            break;
        };
        let pick = choice.candidate;
        if pick.kind == PlacementKind::Hazard {
            break;
        }
        if mode == Reinvest::Strict && rejected.contains(&(pick.kind, pick.pos)) {
            attempts = attempts.saturating_sub(1);
            continue;
        }
        if draft.place_block(pick.kind, pick.pos).is_err() {
            rejected.push((pick.kind, pick.pos));
            continue;
        }
        let time = draft.simulate(env.neutral, cap).time();
        let keep = match (time, *current) {
            (Some(next), Some(prev)) => match mode {
                Reinvest::Strict => next - prev >= threshold,
                Reinvest::Lenient => next >= prev,
            },
            (Some(_), None) => true,
            (None, _) => false,
        };
        if keep {
            freed.take(pick.kind);
            *current = time;
            accepted += 1;
            trace!(
                target: LOG_RECLAIM,
                "reinvested {:?} at {} ({mode:?})",
                pick.kind,
                pick.pos
            );
        } else {
            draft.remove_block(pick.kind, pick.pos);
            rejected.push((pick.kind, pick.pos));
        }
    }
    accepted
}

/// Put a reclaimed hazard back, on a fresh hotspot if that is at least as slow.
fn replace_hazard(
    env: &BuildEnv<'_>,
    draft: &mut LayoutDraft,
    previous: Pos,
    rng: &mut DeterministicRng,
) {
    let Some(kind) = draft.hazard.as_ref().map(|hazard| hazard.kind) else {
        return;
    };
    let cap = env.config.simulation_time_cap;
    let ctx = env.ctx();

    let mut fallback = draft.clone();
    let fallback_time = fallback
        .place_hazard(previous)
        .ok()
        .and_then(|()| fallback.simulate(env.neutral, cap).time());

    let hotspots = top_hazard_hotspots(&mut draft.grid, kind, &ctx, env.config.hotspot_limit, rng);
    let preferred: Vec<Pos> = hotspots.iter().map(|spot| spot.pos).collect();
    let fresh_time = choose_hazard_cell(&mut draft.grid, kind, &ctx, &preferred, rng)
        .and_then(|spot| draft.place_hazard(spot.pos).ok())
        .and_then(|()| draft.simulate(env.neutral, cap).time());

    let keep_fresh = match (fresh_time, fallback_time) {
        (Some(fresh), Some(old)) => fresh >= old,
        (Some(_), None) => true,
        (None, _) => false,
    };
    if !keep_fresh && fallback_time.is_some() {
        debug!(target: LOG_RECLAIM, "hazard back at {previous}");
        *draft = fallback;
    }
}

/// Record on each placement how much time the layout loses without it.
pub(crate) fn annotate_impacts(draft: &mut LayoutDraft, neutral: &[Hazard], time_cap: f64) {
    let Some(baseline) = draft.simulate(neutral, time_cap).time() else {
        return;
    };
    let grid = &draft.grid;
    let hazard = draft.hazard.as_ref();
    for entry in &mut draft.placements {
        entry.impact_delta = impact_of(grid, hazard, neutral, time_cap, baseline, entry);
    }
}

fn impact_of(
    grid: &Grid,
    hazard: Option<&Hazard>,
    neutral: &[Hazard],
    time_cap: f64,
    baseline: f64,
    entry: &PlacementEntry,
) -> f64 {
    let mut probe = grid.clone();
    if !probe.remove(entry.kind, entry.pos) || !has_path(&probe) {
        return 0.0;
    }
    let hazard = if entry.kind == PlacementKind::Hazard {
        None
    } else {
        hazard
    };
    simulate_with_cap(&probe, hazard, neutral, time_cap)
        .time()
        .map_or(0.0, |time| baseline - time)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::hazard::HazardKind;
    use crate::layout::Budget;
    use crate::weights::Weights;

    fn env<'a>(grid: &'a Grid, config: &'a EngineConfig) -> BuildEnv<'a> {
        BuildEnv {
            base_grid: grid,
            neutral: &[],
            weights: Weights::default(),
            config,
            hotspot_override: None,
        }
    }

    #[test]
    fn short_traces_are_left_alone() {
        let base = Grid::empty();
        let config = EngineConfig::default();
        let mut draft = LayoutDraft::new(base.clone(), None, Budget::new(2, 0));
        draft.place_block(PlacementKind::Wall, Pos::new(9, 10)).unwrap();
        let before = draft.clone();
        let result = draft.simulate(&[], config.simulation_time_cap);
        let mut rng = DeterministicRng::from_seed(1);
        let outcome = reclaim(&env(&base, &config), &mut draft, result, &mut rng);
        assert_eq!(outcome.passes, 0);
        assert_eq!(outcome.result, result);
        assert_eq!(draft, before);
    }

    #[test]
    fn useless_walls_are_refunded_and_respent() {
        let base = Grid::empty();
        let config = EngineConfig {
            reclaim_min_placements: 1,
            ..EngineConfig::default()
        };
        let mut draft = LayoutDraft::new(base.clone(), None, Budget::new(2, 0));
        draft.place_block(PlacementKind::Wall, Pos::new(1, 1)).unwrap();
        draft.place_block(PlacementKind::Wall, Pos::new(17, 3)).unwrap();
        let result = draft.simulate(&[], config.simulation_time_cap);
        let start = result.time().unwrap();
        let mut rng = DeterministicRng::from_seed(3);
        let outcome = reclaim(&env(&base, &config), &mut draft, result, &mut rng);
        assert!(outcome.passes >= 1);
        assert!(!draft.placements.iter().any(|entry| entry.pos == Pos::new(1, 1)));
        assert!(outcome.result.time().unwrap() >= start - config.reclaim_threshold);
        let walls = draft
            .placements
            .iter()
            .filter(|entry| entry.kind == PlacementKind::Wall)
            .count();
        assert_eq!(walls + draft.budget.walls_left as usize, 2);
        assert!(has_path(&draft.grid));
    }

    #[test]
    fn impacts_measure_lost_time() {
        let config = EngineConfig::default();
        let mut draft = LayoutDraft::new(Grid::empty(), None, Budget::new(2, 0));
        draft.place_block(PlacementKind::Wall, Pos::new(9, 10)).unwrap();
        draft.place_block(PlacementKind::Wall, Pos::new(1, 1)).unwrap();
        annotate_impacts(&mut draft, &[], config.simulation_time_cap);
        assert!(draft.placements[0].impact_delta > 0.0);
        assert!(draft.placements[1].impact_delta.abs() < 1e-9);
    }

    #[test]
    fn hazard_impact_drops_the_hazard() {
        let config = EngineConfig::default();
        let hazard = Some(Hazard::new(HazardKind::Radius));
        let mut draft = LayoutDraft::new(Grid::empty(), hazard, Budget::new(0, 0));
        draft.place_hazard(Pos::new(10, 10)).unwrap();
        annotate_impacts(&mut draft, &[], config.simulation_time_cap);
        assert!(draft.placements[0].impact_delta > 0.0);
    }
}
