use anyhow::{Context, Result, ensure};
use labyrace_engine::{
    BaseMaze, BuildReport, Cell, EngineConfig, Fidelity, HazardKind, LayoutEngine, PlacementKind,
    ProceduralGrids, RaceWinner, Snapshot, has_path,
};

/// QA scenarios the tester knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    Build,
    Determinism,
    Reclaim,
    Race,
}

impl Scenario {
    pub const ALL: [Self; 4] = [Self::Build, Self::Determinism, Self::Reclaim, Self::Race];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Determinism => "determinism",
            Self::Reclaim => "reclaim",
            Self::Race => "race",
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Build => "Build a layout and check path, budget and trace consistency",
            Self::Determinism => "Build twice from one snapshot and compare the layouts",
            Self::Reclaim => "Compare refined and unrefined builds against the reclaim threshold",
            Self::Race => "Race the built maze against its bare base grid",
        }
    }

    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|scenario| scenario.key().eq_ignore_ascii_case(key.trim()))
    }
}

/// Build settings shared by every scenario of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildPlan {
    pub walls: u32,
    pub singles: u32,
    pub hazard: Option<HazardKind>,
    pub fidelity: Fidelity,
}

impl BuildPlan {
    fn config(&self) -> EngineConfig {
        EngineConfig {
            fidelity: self.fidelity,
            ..EngineConfig::default()
        }
    }

    fn snapshot(&self, maze: &BaseMaze, seed: u64, config: EngineConfig) -> Snapshot {
        let snapshot = Snapshot::new(maze.grid.clone())
            .with_neutral_hazards(maze.neutral_hazards.clone())
            .with_budget(self.walls, self.singles)
            .with_seed(seed)
            .with_config(config);
        match self.hazard {
            Some(kind) => snapshot.with_hazard(kind),
            None => snapshot,
        }
    }
}

/// What one passing iteration measured.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationSummary {
    pub seed: u64,
    pub time: Option<f64>,
    pub placements: usize,
    pub branches: u32,
    pub note: String,
}

impl IterationSummary {
    fn from_report(seed: u64, report: &BuildReport, note: String) -> Self {
        Self {
            seed,
            time: report.layout.time(),
            placements: report.layout.placements.len(),
            branches: report.profile.branches_explored,
            note,
        }
    }
}

/// Run one iteration of `scenario` on the maze for `seed`.
///
/// # Errors
///
/// Returns the first failed check, with the seed in its context.
pub fn run_iteration(scenario: Scenario, plan: &BuildPlan, seed: u64) -> Result<IterationSummary> {
    let engine = LayoutEngine::new(ProceduralGrids::default(), plan.config());
    let maze = engine
        .prepare_match(seed)
        .with_context(|| format!("generating base grid for seed {seed}"))?;
    let checked = match scenario {
        Scenario::Build => check_build(&engine, plan, &maze, seed),
        Scenario::Determinism => check_determinism(&engine, plan, &maze, seed),
        Scenario::Reclaim => check_reclaim(&engine, plan, &maze, seed),
        Scenario::Race => check_race(&engine, plan, &maze, seed),
    };
    checked.with_context(|| format!("{} scenario, seed {seed}", scenario.key()))
}

fn check_build(
    engine: &LayoutEngine<ProceduralGrids>,
    plan: &BuildPlan,
    maze: &BaseMaze,
    seed: u64,
) -> Result<IterationSummary> {
    let report = engine.build(&plan.snapshot(maze, seed, engine.config().clone()))?;
    let layout = &report.layout;
    ensure!(has_path(&layout.grid), "built grid has no path");
    let walls = layout.count(PlacementKind::Wall) + layout.budget.walls_left as usize;
    ensure!(walls == plan.walls as usize, "wall budget not conserved");
    ensure!(
        layout.count(PlacementKind::Single) + layout.budget.singles_left as usize
            == plan.singles as usize,
        "single budget not conserved"
    );
    ensure!(layout.count(PlacementKind::Hazard) <= 1, "hazard placed more than once");
    for entry in &layout.placements {
        let present = match entry.kind {
            PlacementKind::Wall => layout.grid.has_wall_at(entry.pos),
            PlacementKind::Single => layout.grid.get(entry.pos) == Some(Cell::Single),
            PlacementKind::Hazard => layout.grid.get(entry.pos) == Some(Cell::Hazard),
        };
        ensure!(present, "{:?} at {} missing from the grid", entry.kind, entry.pos);
    }
    ensure!(layout.result.is_finished(), "runner did not finish: {:?}", layout.result);
    let replay = engine.simulate(&layout.grid, layout.hazard.as_ref(), &layout.neutral_hazards);
    ensure!(replay == layout.result, "replay {replay:?} differs from {:?}", layout.result);
    Ok(IterationSummary::from_report(
        seed,
        &report,
        format!(
            "{} walls left, {} singles left",
            layout.budget.walls_left, layout.budget.singles_left
        ),
    ))
}

fn check_determinism(
    engine: &LayoutEngine<ProceduralGrids>,
    plan: &BuildPlan,
    maze: &BaseMaze,
    seed: u64,
) -> Result<IterationSummary> {
    let snapshot = plan.snapshot(maze, seed, engine.config().clone());
    let first = engine.build(&snapshot)?;
    let second = engine.build(&snapshot)?;
    ensure!(first.layout == second.layout, "identical snapshots produced different layouts");
    ensure!(
        first.profile.branches_explored == second.profile.branches_explored,
        "branch counts differ: {} vs {}",
        first.profile.branches_explored,
        second.profile.branches_explored
    );
    Ok(IterationSummary::from_report(seed, &first, "layouts identical".to_string()))
}

fn check_reclaim(
    engine: &LayoutEngine<ProceduralGrids>,
    plan: &BuildPlan,
    maze: &BaseMaze,
    seed: u64,
) -> Result<IterationSummary> {
    let refined_config = EngineConfig {
        fidelity: Fidelity::Full,
        ..engine.config().clone()
    };
    let unrefined_config = EngineConfig {
        reclaim_max_passes: 0,
        ..refined_config.clone()
    };
    let threshold = refined_config.reclaim_threshold;
    let refined = engine.build(&plan.snapshot(maze, seed, refined_config))?;
    let unrefined = engine.build(&plan.snapshot(maze, seed, unrefined_config))?;
    let refined_time = refined.layout.time().context("refined layout did not finish")?;
    let unrefined_time = unrefined.layout.time().context("unrefined layout did not finish")?;
    ensure!(
        refined_time >= unrefined_time - threshold,
        "reclaim lost {:.3}s (threshold {threshold})",
        unrefined_time - refined_time
    );
    Ok(IterationSummary::from_report(
        seed,
        &refined,
        format!(
            "{:+.3}s over {} passes, {} reallocations",
            refined_time - unrefined_time,
            refined.profile.reclaim_passes,
            refined.profile.reallocations
        ),
    ))
}

fn check_race(
    engine: &LayoutEngine<ProceduralGrids>,
    plan: &BuildPlan,
    maze: &BaseMaze,
    seed: u64,
) -> Result<IterationSummary> {
    let built = engine.build(&plan.snapshot(maze, seed, engine.config().clone()))?;
    let bare_plan = BuildPlan {
        walls: 0,
        singles: 0,
        hazard: None,
        fidelity: plan.fidelity,
    };
    let bare = engine.build(&bare_plan.snapshot(maze, seed, engine.config().clone()))?;
    let outcome = engine.race(&built.layout, &bare.layout, &maze.neutral_hazards);
    ensure!(
        matches!(outcome.winner, RaceWinner::First | RaceWinner::Tie),
        "bare grid outlasted the built maze: {outcome:?}"
    );
    Ok(IterationSummary::from_report(
        seed,
        &built,
        format!("{:?} by {:.3}s", outcome.winner, outcome.margin().unwrap_or_default()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> BuildPlan {
        BuildPlan {
            walls: 3,
            singles: 2,
            hazard: None,
            fidelity: Fidelity::Greedy,
        }
    }

    #[test]
    fn keys_round_trip() {
        for scenario in Scenario::ALL {
            assert_eq!(Scenario::from_key(scenario.key()), Some(scenario));
        }
        assert_eq!(Scenario::from_key(" RACE "), Some(Scenario::Race));
        assert_eq!(Scenario::from_key("smoke"), None);
    }

    #[test]
    fn greedy_build_scenario_passes() {
        let summary = run_iteration(Scenario::Build, &plan(), 4).unwrap();
        assert_eq!(summary.seed, 4);
        assert!(summary.time.is_some());
        assert_eq!(summary.branches, 1);
    }

    #[test]
    fn determinism_scenario_passes() {
        assert!(run_iteration(Scenario::Determinism, &plan(), 9).is_ok());
    }
}
