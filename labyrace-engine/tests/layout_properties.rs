use anyhow::{Context, Result};
use labyrace_engine::path::analyze_path;
use labyrace_engine::{
    Cell, EngineConfig, Fidelity, Grid, HazardKind, MazeGenConfig, PlacementKind, Pos, RunResult,
    Snapshot, build_layout, generate_base_grid, has_path, simulate,
};

fn procedural_snapshot(seed: u64, walls: u32, singles: u32) -> Result<Snapshot> {
    let maze = generate_base_grid(seed, &MazeGenConfig::default())
        .with_context(|| format!("generating base grid for seed {seed}"))?;
    Ok(Snapshot::new(maze.grid)
        .with_neutral_hazards(maze.neutral_hazards)
        .with_budget(walls, singles)
        .with_hazard(HazardKind::Radius)
        .with_seed(seed))
}

#[test]
fn empty_grid_path_is_twenty_two_long() -> Result<()> {
    let info = analyze_path(&Grid::empty()).context("empty grid must have a path")?;
    assert!((info.total_distance - 22.0).abs() < 1e-9);
    Ok(())
}

#[test]
fn straight_corridor_takes_length_over_speed() -> Result<()> {
    let RunResult::Finished(time) = simulate(&Grid::empty(), None, &[]) else {
        anyhow::bail!("runner never finished the empty grid");
    };
    let expected = 22.0 / 3.0;
    assert!((time - expected).abs() <= 1.0 / 120.0 + 1e-9, "{time} vs {expected}");
    Ok(())
}

#[test]
fn built_layouts_keep_a_path_and_conserve_budget() -> Result<()> {
    for seed in [3_u64, 8, 21] {
        let snapshot = procedural_snapshot(seed, 5, 4)?.with_config(EngineConfig::greedy());
        let report = build_layout(&snapshot).with_context(|| format!("seed {seed}"))?;
        let layout = &report.layout;
        assert!(has_path(&layout.grid), "seed {seed} lost its path");
        assert_eq!(layout.count(PlacementKind::Wall) + layout.budget.walls_left as usize, 5);
        assert_eq!(layout.count(PlacementKind::Single) + layout.budget.singles_left as usize, 4);
        assert!(layout.count(PlacementKind::Hazard) <= 1);
        for entry in &layout.placements {
            match entry.kind {
                PlacementKind::Wall => assert!(layout.grid.has_wall_at(entry.pos)),
                PlacementKind::Single => assert_eq!(layout.grid.get(entry.pos), Some(Cell::Single)),
                PlacementKind::Hazard => assert_eq!(layout.grid.get(entry.pos), Some(Cell::Hazard)),
            }
        }
    }
    Ok(())
}

#[test]
fn identical_snapshots_build_identical_layouts() -> Result<()> {
    let snapshot = procedural_snapshot(42, 4, 3)?;
    let first = build_layout(&snapshot)?;
    let second = build_layout(&snapshot)?;
    assert_eq!(first.layout, second.layout);
    assert_eq!(first.profile.branches_explored, second.profile.branches_explored);
    Ok(())
}

#[test]
fn reclaim_never_costs_more_than_the_threshold() -> Result<()> {
    let base = procedural_snapshot(7, 6, 5)?;
    let full = build_layout(&base.clone().with_config(EngineConfig {
        reclaim_min_placements: 1,
        ..EngineConfig::default()
    }))?;
    let unrefined = build_layout(&base.with_config(EngineConfig {
        reclaim_max_passes: 0,
        ..EngineConfig::default()
    }))?;
    assert_eq!(unrefined.profile.reclaim_passes, 0);
    let refined_time = full.layout.time().context("refined layout finished")?;
    let unrefined_time = unrefined.layout.time().context("unrefined layout finished")?;
    assert!(refined_time >= unrefined_time - EngineConfig::default().reclaim_threshold);
    Ok(())
}

#[test]
fn impact_deltas_match_removal() -> Result<()> {
    let snapshot = Snapshot::new(Grid::empty())
        .with_budget(2, 0)
        .with_config(EngineConfig::greedy());
    let report = build_layout(&snapshot)?;
    let baseline = report.layout.time().context("layout finished")?;
    for entry in &report.layout.placements {
        let mut grid = report.layout.grid.clone();
        assert!(grid.remove(entry.kind, entry.pos));
        let without = simulate(&grid, None, &[]).time().context("finished without it")?;
        assert!((entry.impact_delta - (baseline - without)).abs() < 1e-9);
    }
    Ok(())
}

#[test]
fn snapshots_round_trip_through_json() -> Result<()> {
    let snapshot = procedural_snapshot(5, 2, 2)?;
    let text = serde_json::to_string(&snapshot)?;
    let back: Snapshot = serde_json::from_str(&text)?;
    assert_eq!(back, snapshot);
    let minimal: Snapshot = serde_json::from_str(&format!(
        r#"{{"base_grid": {}}}"#,
        serde_json::to_string(&Grid::empty())?
    ))?;
    assert_eq!(minimal.config.fidelity, Fidelity::Full);
    assert_eq!(minimal.hazard_kind, None);
    Ok(())
}

#[test]
fn pads_stay_spent_until_reset() {
    let mut grid = Grid::empty();
    let pad = Pos::new(10, 12);
    grid.set_cell(pad, Cell::Pad(labyrace_engine::PadKind::Slow));
    let fresh = simulate(&grid, None, &[]);
    assert_eq!(grid.get(pad), Some(Cell::Pad(labyrace_engine::PadKind::Slow)));
    let mut spent = grid.clone();
    spent.set_cell(pad, Cell::SpentPad(labyrace_engine::PadKind::Slow));
    let spent_run = simulate(&spent, None, &[]);
    assert!(fresh.time() > spent_run.time());
    spent.reset_pads();
    assert_eq!(spent, grid);
}
