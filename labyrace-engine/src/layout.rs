//! Build inputs and outputs: snapshots, budgets, placement traces and reports.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::config::{ConfigError, EngineConfig};
use crate::constants::MAX_BLOCK_BUDGET;
use crate::grid::{Grid, PlacementError, PlacementKind, Pos};
use crate::hazard::{Hazard, HazardKind};
use crate::path::has_path;
use crate::sim::{RunResult, simulate_with_cap};
use crate::weights::{WeightError, Weights};

/// Errors that stop a build before it starts.
#[derive(Debug, Error, PartialEq)]
pub enum BuildError {
    #[error("snapshot has no base grid")]
    MissingBaseGrid,
    #[error("base grid has no path from the entrance to the exit")]
    Blocked,
    #[error("budget of {walls} walls and {singles} singles exceeds {max} blocks")]
    BudgetTooLarge { walls: u32, singles: u32, max: u32 },
    #[error("neutral hazard #{index} has no cell")]
    NeutralHazardUnplaced { index: usize },
    #[error(transparent)]
    Weights(#[from] WeightError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Everything a build needs, as sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub base_grid: Option<Grid>,
    #[serde(default)]
    pub neutral_hazards: Vec<Hazard>,
    /// Kind of the builder's own hazard; `None` builds without one.
    #[serde(default)]
    pub hazard_kind: Option<HazardKind>,
    #[serde(default)]
    pub wall_budget: u32,
    #[serde(default)]
    pub single_budget: u32,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub weight_overrides: BTreeMap<String, f64>,
    /// Fixed hotspot list replacing the computed one.
    #[serde(default)]
    pub hotspot_override: Option<Vec<Pos>>,
    #[serde(default)]
    pub config: EngineConfig,
}

impl Snapshot {
    #[must_use]
    pub fn new(base_grid: Grid) -> Self {
        Self {
            base_grid: Some(base_grid),
            neutral_hazards: Vec::new(),
            hazard_kind: None,
            wall_budget: 0,
            single_budget: 0,
            seed: 0,
            weight_overrides: BTreeMap::new(),
            hotspot_override: None,
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub fn with_budget(mut self, walls: u32, singles: u32) -> Self {
        self.wall_budget = walls;
        self.single_budget = singles;
        self
    }

    #[must_use]
    pub fn with_hazard(mut self, kind: HazardKind) -> Self {
        self.hazard_kind = Some(kind);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    #[must_use]
    pub fn with_neutral_hazards(mut self, hazards: Vec<Hazard>) -> Self {
        self.neutral_hazards = hazards;
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Base grid with its openings normalized.
    ///
    /// # Errors
    ///
    /// `MissingBaseGrid` when absent, `Blocked` when it has no path.
    pub fn checked_base_grid(&self) -> Result<Grid, BuildError> {
        let mut grid = self.base_grid.clone().ok_or(BuildError::MissingBaseGrid)?;
        grid.ensure_openings();
        if !has_path(&grid) {
            return Err(BuildError::Blocked);
        }
        Ok(grid)
    }

    /// Default weights with this snapshot's overrides applied.
    ///
    /// # Errors
    ///
    /// Propagates `WeightError` for unknown or non-finite overrides.
    pub fn weights(&self) -> Result<Weights, BuildError> {
        Ok(Weights::default().with_overrides(&self.weight_overrides)?)
    }

    /// Check every precondition of a build.
    ///
    /// # Errors
    ///
    /// Returns the first `BuildError` found.
    pub fn validate(&self) -> Result<(), BuildError> {
        self.checked_base_grid()?;
        let total = u64::from(self.wall_budget) + u64::from(self.single_budget);
        if total > u64::from(MAX_BLOCK_BUDGET) {
            return Err(BuildError::BudgetTooLarge {
                walls: self.wall_budget,
                singles: self.single_budget,
                max: MAX_BLOCK_BUDGET,
            });
        }
        if let Some(index) = self.neutral_hazards.iter().position(|hazard| !hazard.is_placed()) {
            return Err(BuildError::NeutralHazardUnplaced { index });
        }
        self.weights()?;
        self.config.validate()?;
        Ok(())
    }
}

/// Remaining and original block allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub walls_left: u32,
    pub singles_left: u32,
    pub initial_walls: u32,
    pub initial_singles: u32,
}

impl Budget {
    #[must_use]
    pub const fn new(walls: u32, singles: u32) -> Self {
        Self {
            walls_left: walls,
            singles_left: singles,
            initial_walls: walls,
            initial_singles: singles,
        }
    }

    #[must_use]
    pub const fn initial_total(&self) -> u32 {
        self.initial_walls.saturating_add(self.initial_singles)
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.walls_left.saturating_add(self.singles_left)
    }

    /// Blocks placed so far.
    #[must_use]
    pub const fn spent(&self) -> u32 {
        self.initial_total().saturating_sub(self.remaining())
    }

    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    /// Take one unit for `kind`; hazards are free. False when none is left.
    pub fn spend(&mut self, kind: PlacementKind) -> bool {
        let slot = match kind {
            PlacementKind::Wall => &mut self.walls_left,
            PlacementKind::Single => &mut self.singles_left,
            PlacementKind::Hazard => return true,
        };
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    /// Return one unit for `kind`, never above the original allocation.
    pub fn refund(&mut self, kind: PlacementKind) {
        match kind {
            PlacementKind::Wall => {
                self.walls_left = self.walls_left.saturating_add(1).min(self.initial_walls);
            }
            PlacementKind::Single => {
                self.singles_left = self.singles_left.saturating_add(1).min(self.initial_singles);
            }
            PlacementKind::Hazard => {}
        }
    }
}

/// One step of the placement trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementEntry {
    pub kind: PlacementKind,
    /// Cell of the structure; a wall's top-left origin.
    pub pos: Pos,
    /// Simulated seconds lost if this structure were removed.
    #[serde(default)]
    pub impact_delta: f64,
}

impl PlacementEntry {
    #[must_use]
    pub const fn new(kind: PlacementKind, pos: Pos) -> Self {
        Self {
            kind,
            pos,
            impact_delta: 0.0,
        }
    }
}

/// Where a hazard branch split off the main build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "phase", content = "index")]
pub enum BranchPoint {
    /// After this many placements.
    Early(u32),
    /// With this many placements still to make.
    Late(u32),
}

impl BranchPoint {
    /// Branch tag for a split after `made` placements out of `total`.
    #[must_use]
    pub const fn at(made: u32, total: u32, window: u32) -> Option<Self> {
        let remaining = total.saturating_sub(made);
        if made > 0 && made <= window {
            Some(Self::Early(made))
        } else if remaining >= 1 && remaining <= window {
            Some(Self::Late(remaining))
        } else {
            None
        }
    }
}

/// Finished layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub grid: Grid,
    pub hazard: Option<Hazard>,
    pub neutral_hazards: Vec<Hazard>,
    pub placements: Vec<PlacementEntry>,
    pub budget: Budget,
    pub result: RunResult,
    pub branch: Option<BranchPoint>,
}

impl Layout {
    /// Simulated finish time, if the runner finished.
    #[must_use]
    pub const fn time(&self) -> Option<f64> {
        self.result.time()
    }

    #[must_use]
    pub fn count(&self, kind: PlacementKind) -> usize {
        self.placements
            .iter()
            .filter(|entry| entry.kind == kind)
            .count()
    }
}

/// Timing and search counters of one build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildProfile {
    pub total_ms: f64,
    pub placement_ms: f64,
    /// Final hazard pass, speed pad diversion and simulation of every branch.
    pub finish_ms: f64,
    pub reclaim_ms: f64,
    pub branches_explored: u32,
    pub lookahead_used: u32,
    pub reallocations: u32,
    pub reclaim_passes: u32,
}

/// Final layout plus how it was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    pub layout: Layout,
    pub profile: BuildProfile,
}

/// Layout under construction, shared by the builder and reclaim.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LayoutDraft {
    pub grid: Grid,
    pub hazard: Option<Hazard>,
    pub budget: Budget,
    pub placements: Vec<PlacementEntry>,
}

impl LayoutDraft {
    pub(crate) fn new(grid: Grid, hazard: Option<Hazard>, budget: Budget) -> Self {
        Self {
            grid,
            hazard,
            budget,
            placements: Vec::new(),
        }
    }

    pub(crate) fn hazard_open(&self) -> bool {
        self.hazard.as_ref().is_some_and(|hazard| !hazard.is_placed())
    }

    /// Place a wall or single, spend its budget and record it.
    pub(crate) fn place_block(
        &mut self,
        kind: PlacementKind,
        pos: Pos,
    ) -> Result<(), PlacementError> {
        if !self.budget.spend(kind) {
            return Err(PlacementError::BudgetExhausted(kind));
        }
        if let Err(err) = self.grid.try_place(kind, pos) {
            self.budget.refund(kind);
            return Err(err);
        }
        self.placements.push(PlacementEntry::new(kind, pos));
        Ok(())
    }

    /// Put the hazard marker at `pos` and record it.
    pub(crate) fn place_hazard(&mut self, pos: Pos) -> Result<(), PlacementError> {
        let Some(hazard) = self.hazard.as_mut() else {
            return Err(PlacementError::NoHazard);
        };
        crate::candidates::place_hazard(&mut self.grid, hazard, pos)?;
        self.placements.push(PlacementEntry::new(PlacementKind::Hazard, pos));
        Ok(())
    }

    /// Take back the latest placement of a wall or single at `pos`.
    pub(crate) fn remove_block(&mut self, kind: PlacementKind, pos: Pos) -> bool {
        let Some(index) = self
            .placements
            .iter()
            .rposition(|entry| entry.kind == kind && entry.pos == pos)
        else {
            return false;
        };
        if !self.grid.remove(kind, pos) {
            return false;
        }
        self.placements.remove(index);
        self.budget.refund(kind);
        true
    }

    pub(crate) fn simulate(&self, neutral: &[Hazard], time_cap: f64) -> RunResult {
        simulate_with_cap(&self.grid, self.hazard.as_ref(), neutral, time_cap)
    }

    pub(crate) fn into_layout(
        self,
        neutral: &[Hazard],
        result: RunResult,
        branch: Option<BranchPoint>,
    ) -> Layout {
        Layout {
            grid: self.grid,
            hazard: self.hazard,
            neutral_hazards: neutral.to_vec(),
            placements: self.placements,
            budget: self.budget,
            result,
            branch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;

    #[test]
    fn snapshot_validation_reports_first_problem() {
        let missing = Snapshot {
            base_grid: None,
            ..Snapshot::new(Grid::empty())
        };
        assert_eq!(missing.validate(), Err(BuildError::MissingBaseGrid));

        let mut blocked = Grid::empty();
        for x in 0..21 {
            blocked.set_cell(Pos::new(x, 4), Cell::Static);
        }
        assert_eq!(Snapshot::new(blocked).validate(), Err(BuildError::Blocked));

        let unplaced = Snapshot::new(Grid::empty())
            .with_neutral_hazards(vec![Hazard::new(HazardKind::Row)]);
        assert_eq!(unplaced.validate(), Err(BuildError::NeutralHazardUnplaced { index: 0 }));

        let mut bad_weight = Snapshot::new(Grid::empty());
        bad_weight.weight_overrides.insert("teleport".to_string(), 1.0);
        assert!(matches!(bad_weight.validate(), Err(BuildError::Weights(_))));

        assert!(Snapshot::new(Grid::empty()).with_budget(3, 2).validate().is_ok());
    }

    #[test]
    fn oversized_budgets_are_rejected() {
        let huge = Snapshot::new(Grid::empty()).with_budget(u32::MAX, 1);
        assert_eq!(
            huge.validate(),
            Err(BuildError::BudgetTooLarge {
                walls: u32::MAX,
                singles: 1,
                max: MAX_BLOCK_BUDGET,
            })
        );
        let at_limit = Snapshot::new(Grid::empty()).with_budget(MAX_BLOCK_BUDGET - 1, 1);
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn budget_totals_saturate() {
        let mut budget = Budget::new(u32::MAX, 1);
        assert_eq!(budget.initial_total(), u32::MAX);
        assert_eq!(budget.remaining(), u32::MAX);
        assert_eq!(budget.spent(), 0);
        assert!(!budget.is_exhausted());
        assert!(budget.spend(PlacementKind::Single));
        budget.refund(PlacementKind::Wall);
        assert_eq!(budget.walls_left, u32::MAX);
    }

    #[test]
    fn snapshot_json_fills_defaults() {
        let grid_json = serde_json::to_string(&Grid::empty()).unwrap();
        let json = format!(
            r#"{{"base_grid": {grid_json}, "wall_budget": 4, "hazard_kind": "gravity"}}"#
        );
        let snapshot: Snapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(snapshot.wall_budget, 4);
        assert_eq!(snapshot.single_budget, 0);
        assert_eq!(snapshot.hazard_kind, Some(HazardKind::Gravity));
        assert_eq!(snapshot.config, EngineConfig::default());
    }

    #[test]
    fn budget_spend_and_refund_are_bounded() {
        let mut budget = Budget::new(1, 2);
        assert!(budget.spend(PlacementKind::Wall));
        assert!(!budget.spend(PlacementKind::Wall));
        assert!(budget.spend(PlacementKind::Hazard));
        assert_eq!(budget.spent(), 1);
        budget.refund(PlacementKind::Wall);
        budget.refund(PlacementKind::Wall);
        assert_eq!(budget.walls_left, 1);
        assert_eq!(budget.remaining(), 3);
    }

    #[test]
    fn branch_points_cover_both_windows() {
        assert_eq!(BranchPoint::at(0, 10, 3), None);
        assert_eq!(BranchPoint::at(2, 10, 3), Some(BranchPoint::Early(2)));
        assert_eq!(BranchPoint::at(5, 10, 3), None);
        assert_eq!(BranchPoint::at(8, 10, 3), Some(BranchPoint::Late(2)));
        assert_eq!(BranchPoint::at(10, 10, 3), None);
        let json = serde_json::to_string(&BranchPoint::Late(1)).unwrap();
        assert_eq!(json, r#"{"phase":"late","index":1}"#);
    }

    #[test]
    fn draft_keeps_budget_and_trace_in_step() {
        let hazard = Some(Hazard::new(HazardKind::Radius));
        let mut draft = LayoutDraft::new(Grid::empty(), hazard, Budget::new(1, 1));
        draft.place_block(PlacementKind::Wall, Pos::new(3, 3)).unwrap();
        assert_eq!(
            draft.place_block(PlacementKind::Wall, Pos::new(6, 6)),
            Err(PlacementError::BudgetExhausted(PlacementKind::Wall))
        );
        assert!(draft.place_block(PlacementKind::Single, Pos::new(3, 3)).is_err());
        assert_eq!(draft.budget.singles_left, 1);
        draft.place_hazard(Pos::new(12, 12)).unwrap();
        assert!(!draft.hazard_open());
        assert_eq!(draft.placements.len(), 2);
        let layout = draft.into_layout(&[], RunResult::NoPath, None);
        assert_eq!(layout.count(PlacementKind::Wall), 1);
        assert_eq!(layout.count(PlacementKind::Hazard), 1);
    }

    #[test]
    fn hazard_placement_without_a_hazard_is_refused() {
        let mut draft = LayoutDraft::new(Grid::empty(), None, Budget::new(0, 0));
        assert_eq!(draft.place_hazard(Pos::new(5, 5)), Err(PlacementError::NoHazard));
        assert!(draft.placements.is_empty());
    }
}
