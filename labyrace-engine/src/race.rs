//! Head-to-head races between two finished mazes.
//!
//! Each maze gets its own runner and its own fresh copies of the shared neutral
//! hazards. The maze that holds its runner longer wins.
use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::layout::Layout;
use crate::hazard::Hazard;
use crate::sim::{RunResult, simulate_with_cap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaceWinner {
    First,
    Second,
    Tie,
    /// Neither runner finished.
    NoValidRuns,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RaceOutcome {
    pub first: RunResult,
    pub second: RunResult,
    pub winner: RaceWinner,
}

impl RaceOutcome {
    /// Seconds the winner outlasted the loser, when both finished.
    #[must_use]
    pub fn margin(&self) -> Option<f64> {
        Some((self.first.time()? - self.second.time()?).abs())
    }
}

/// Winner of two runs: the longer time wins and a missing time loses.
#[must_use]
pub fn decide(first: RunResult, second: RunResult) -> RaceWinner {
    match (first.time(), second.time()) {
        (None, None) => RaceWinner::NoValidRuns,
        (Some(_), None) => RaceWinner::First,
        (None, Some(_)) => RaceWinner::Second,
        (Some(a), Some(b)) => match a.total_cmp(&b) {
            Ordering::Greater => RaceWinner::First,
            Ordering::Less => RaceWinner::Second,
            Ordering::Equal => RaceWinner::Tie,
        },
    }
}

/// Race two layouts against the same neutral hazards.
#[must_use]
pub fn race(first: &Layout, second: &Layout, neutral: &[Hazard], time_cap: f64) -> RaceOutcome {
    let first_run = simulate_with_cap(&first.grid, first.hazard.as_ref(), neutral, time_cap);
    let second_run = simulate_with_cap(&second.grid, second.hazard.as_ref(), neutral, time_cap);
    RaceOutcome {
        first: first_run,
        second: second_run,
        winner: decide(first_run, second_run),
    }
}
