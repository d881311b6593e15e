//! Labyrace Layout Engine
//!
//! Platform-agnostic maze-layout optimizer for Labyrace matches. Given a base
//! grid, a budget of walls and singles and an optional hazard, the engine
//! places obstacles so a runner that always takes the shortest route needs as
//! long as possible to cross the maze. The fixed-timestep simulator that
//! scores the finished layouts also decides races between two mazes.

pub mod builder;
pub mod candidates;
pub mod config;
pub mod constants;
pub mod eval;
pub mod grid;
pub mod hazard;
pub mod layout;
pub mod maze;
pub mod numbers;
pub mod path;
pub mod planner;
pub mod race;
mod reclaim;
pub mod seed;
pub mod sim;
pub mod weights;
pub mod worker;

// Re-export commonly used types
pub use builder::build_layout;
pub use candidates::{Candidate, HazardCandidate};
pub use config::{ConfigError, EngineConfig, Fidelity, default_config};
pub use eval::{Evaluation, ScoreContext, evaluate, score};
pub use grid::{Cell, Grid, GridError, PadKind, PlacementError, PlacementKind, Pos};
pub use hazard::{Hazard, HazardKind};
pub use layout::{
    BranchPoint, BuildError, BuildProfile, BuildReport, Budget, Layout, PlacementEntry, Snapshot,
};
pub use maze::{BaseMaze, MazeError, MazeGenConfig, PadCounts, generate_base_grid};
pub use path::{PathInfo, analyze_path, compute_path, has_path};
pub use race::{RaceOutcome, RaceWinner, race};
pub use seed::{DeterministicRng, hash_seed};
pub use sim::{RunResult, simulate, simulate_with_cap};
pub use weights::{WeightError, Weights};
pub use worker::{
    BuildRequest, BuildResponse, JobHandle, JobOutcome, JobTracker, run_job, run_job_json,
    spawn_job,
};

/// Trait for abstracting where match base grids come from.
/// Procedural generation and fixed test mazes both provide this.
pub trait GridSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Base grid and neutral hazards for a match seed
    ///
    /// # Errors
    ///
    /// Returns an error if no usable grid exists for `seed`.
    fn base_maze(&self, seed: u64) -> Result<BaseMaze, Self::Error>;
}

/// Procedurally generated base grids.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProceduralGrids {
    pub config: MazeGenConfig,
}

impl GridSource for ProceduralGrids {
    type Error = MazeError;

    fn base_maze(&self, seed: u64) -> Result<BaseMaze, MazeError> {
        generate_base_grid(seed, &self.config)
    }
}

/// Match-level entry point tying grid generation, building and racing together
pub struct LayoutEngine<G>
where
    G: GridSource,
{
    grids: G,
    config: EngineConfig,
}

impl<G> LayoutEngine<G>
where
    G: GridSource,
{
    /// Create an engine over `grids` with the given search settings
    pub const fn new(grids: G, config: EngineConfig) -> Self {
        Self { grids, config }
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Base maze shared by both sides of a match
    ///
    /// # Errors
    ///
    /// Returns the grid source's error.
    pub fn prepare_match(&self, seed: u64) -> Result<BaseMaze, G::Error> {
        self.grids.base_maze(seed)
    }

    /// Snapshot for the computer side of a match on `maze`
    #[must_use]
    pub fn snapshot(&self, maze: &BaseMaze, walls: u32, singles: u32, seed: u64) -> Snapshot {
        Snapshot::new(maze.grid.clone())
            .with_neutral_hazards(maze.neutral_hazards.clone())
            .with_budget(walls, singles)
            .with_seed(seed)
            .with_config(self.config.clone())
    }

    /// Build a layout in-process
    ///
    /// # Errors
    ///
    /// Returns `BuildError` for malformed snapshots.
    pub fn build(&self, snapshot: &Snapshot) -> Result<BuildReport, BuildError> {
        build_layout(snapshot)
    }

    /// Simulate one maze under this engine's time cap
    #[must_use]
    pub fn simulate(&self, grid: &Grid, hazard: Option<&Hazard>, neutral: &[Hazard]) -> RunResult {
        simulate_with_cap(grid, hazard, neutral, self.config.simulation_time_cap)
    }

    /// Race two finished layouts on the same neutral hazards
    #[must_use]
    pub fn race(&self, first: &Layout, second: &Layout, neutral: &[Hazard]) -> RaceOutcome {
        race(first, second, neutral, self.config.simulation_time_cap)
    }
}
