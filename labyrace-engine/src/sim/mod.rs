//! Fixed-timestep runner simulation.
//!
//! The simulator is the ground truth used to rank finished layouts and to
//! decide races. Each call works on its own clones of the grid and hazards,
//! so pads fired during one run never leak into the caller's grid.

pub mod effects;
pub mod runner;

pub use effects::{Effects, GravityPull, Heading, Medusa};
pub use runner::Runner;

use serde::{Deserialize, Serialize};

use crate::constants::{FIXED_TIMESTEP, SIMULATION_EXTRA_STEPS, SIMULATION_TIME_CAP};
use crate::grid::Grid;
use crate::hazard::{Hazard, fresh_neutrals};
use crate::numbers::ceil_f64_to_u64;

/// Outcome of one simulated traversal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "time", rename_all = "snake_case")]
pub enum RunResult {
    /// Reached the exit after this many seconds.
    Finished(f64),
    /// Still running when the step cap ran out.
    DidNotFinish,
    /// The grid has no entrance-to-exit path.
    NoPath,
}

impl RunResult {
    /// Finish time, if the runner finished.
    #[must_use]
    pub const fn time(self) -> Option<f64> {
        match self {
            Self::Finished(time) => Some(time),
            Self::DidNotFinish | Self::NoPath => None,
        }
    }

    #[must_use]
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Step budget for a run capped at `time_cap` simulated seconds.
#[must_use]
pub fn step_limit(time_cap: f64) -> u64 {
    ceil_f64_to_u64(time_cap / FIXED_TIMESTEP).saturating_add(SIMULATION_EXTRA_STEPS)
}

/// Simulate a traversal of `grid` with the default time cap.
#[must_use]
pub fn simulate(grid: &Grid, hazard: Option<&Hazard>, neutral: &[Hazard]) -> RunResult {
    simulate_with_cap(grid, hazard, neutral, SIMULATION_TIME_CAP)
}

/// Simulate a traversal of `grid`, giving up after `time_cap` simulated seconds.
#[must_use]
pub fn simulate_with_cap(
    grid: &Grid,
    hazard: Option<&Hazard>,
    neutral: &[Hazard],
    time_cap: f64,
) -> RunResult {
    let mut sim_grid = grid.clone();
    sim_grid.ensure_openings();
    let mut runner = Runner::new(
        sim_grid,
        hazard.map(Hazard::fresh_copy),
        fresh_neutrals(neutral),
    );
    if !runner.has_path() {
        return RunResult::NoPath;
    }
    let max_steps = step_limit(time_cap);
    let mut steps = 0u64;
    while !runner.is_finished() && steps < max_steps {
        runner.advance(FIXED_TIMESTEP);
        steps += 1;
    }
    if runner.is_finished() {
        RunResult::Finished(runner.elapsed())
    } else {
        RunResult::DidNotFinish
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::RUNNER_SPEED;
    use crate::grid::{Cell, PadKind, Pos};
    use crate::hazard::HazardKind;

    #[test]
    fn empty_grid_runs_at_base_speed() {
        let time = simulate(&Grid::empty(), None, &[]).time().unwrap();
        assert!((time - 22.0 / RUNNER_SPEED).abs() <= FIXED_TIMESTEP);
    }

    #[test]
    fn blocked_grid_reports_no_path() {
        let mut grid = Grid::empty();
        for x in 0..21 {
            grid.set_cell(Pos::new(x, 12), Cell::Static);
        }
        assert_eq!(simulate(&grid, None, &[]), RunResult::NoPath);
    }

    #[test]
    fn tiny_cap_does_not_finish() {
        assert_eq!(
            simulate_with_cap(&Grid::empty(), None, &[], 0.0),
            RunResult::DidNotFinish
        );
        let limit = step_limit(600.0);
        assert!((72_100..=72_101).contains(&limit));
    }

    #[test]
    fn caller_grid_keeps_active_pads() {
        let mut grid = Grid::empty();
        grid.set_cell(Pos::new(10, 8), Cell::Pad(PadKind::Slow));
        let first = simulate(&grid, None, &[]);
        let second = simulate(&grid, None, &[]);
        assert_eq!(first, second);
        assert_eq!(grid.get(Pos::new(10, 8)), Some(Cell::Pad(PadKind::Slow)));
    }

    #[test]
    fn freeze_aura_slows_the_run() {
        let hazard = Hazard::placed_at(HazardKind::Radius, Pos::new(10, 10));
        let frozen = simulate(&Grid::empty(), Some(&hazard), &[]).time().unwrap();
        let plain = simulate(&Grid::empty(), None, &[]).time().unwrap();
        assert!(frozen > plain + 1.0);
    }

    #[test]
    fn result_serializes_with_outcome_tag() {
        let json = serde_json::to_string(&RunResult::Finished(7.5)).unwrap();
        assert_eq!(json, r#"{"outcome":"finished","time":7.5}"#);
        let json = serde_json::to_string(&RunResult::NoPath).unwrap();
        assert_eq!(json, r#"{"outcome":"no_path"}"#);
    }
}
