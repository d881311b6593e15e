//! Centralized tuning constants for the Labyrace engine.
//!
//! These values define the deterministic math for the runner simulation and
//! the layout search. Keeping them together ensures that balance changes only
//! happen through reviewed code changes.

// Grid geometry ------------------------------------------------------------
pub const GRID_SIZE: usize = 21;
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;
pub(crate) const GRID_SIZE_I32: i32 = 21;
pub const ENTRANCE_X: i32 = GRID_SIZE_I32 / 2;
/// Largest wall plus single budget a snapshot may ask for: one block per cell.
pub const MAX_BLOCK_BUDGET: u32 = 441;

// Runner simulation --------------------------------------------------------
pub const RUNNER_SPEED: f64 = 3.0;
pub const RUNNER_RADIUS: f64 = 0.35;
pub const FIXED_TIMESTEP: f64 = 1.0 / 120.0;
pub const SIMULATION_TIME_CAP: f64 = 600.0;
pub(crate) const SIMULATION_EXTRA_STEPS: u64 = 100;
pub(crate) const PAD_EFFECT_DURATION: f64 = 5.0;
pub(crate) const PAD_SLOW_MULT: f64 = 0.55;
pub(crate) const PAD_FAST_MULT: f64 = 1.5;
pub(crate) const MEDUSA_SLOW_MULT: f64 = 0.3;
pub(crate) const MEDUSA_RELEASE_DOT: f64 = 0.98;
pub(crate) const STEP_AXIS_THRESHOLD: f64 = 0.1;

// Hazards ------------------------------------------------------------------
pub(crate) const HAZARD_RADIUS: f64 = 4.0;
pub(crate) const HAZARD_LINGER: f64 = 3.0;
pub(crate) const HAZARD_SLOW_MULT: f64 = 0.7;
pub(crate) const FREEZE_BUILDUP: f64 = 10.0;
pub(crate) const FREEZE_MIN_MULT: f64 = 0.3;
pub(crate) const LIGHTNING_STUN: f64 = 1.5;
pub(crate) const LIGHTNING_COOLDOWN: f64 = 3.25;
pub(crate) const LIGHTNING_RADIUS: f64 = 4.0;
pub(crate) const GRAVITY_MIN_MULT: f64 = 0.4;
pub(crate) const GRAVITY_MAX_MULT: f64 = 0.7;
pub(crate) const GRAVITY_VISUAL_PULL: f64 = 0.15;
pub(crate) const BEAM_LINGER_CAP: f64 = 1.5;

// Evaluator ----------------------------------------------------------------
pub(crate) const PAD_SCORE_SPEED: f64 = -3.0;
pub(crate) const PAD_SCORE_SLOW: f64 = 3.0;
pub(crate) const PAD_SCORE_DETOUR: f64 = 4.0;
pub(crate) const PAD_SCORE_STONE: f64 = 3.0;
pub(crate) const PAD_SCORE_REWIND: f64 = 8.0;
pub(crate) const PREDICT_SLOW_SCALE: f64 = 0.82;
pub(crate) const PAD_SLOW_EXTRA_TIME: f64 = PAD_EFFECT_DURATION * (1.0 / PAD_SLOW_MULT - 1.0);
pub(crate) const PAD_SPEED_TIME_DELTA: f64 = PAD_EFFECT_DURATION * (1.0 - 1.0 / PAD_FAST_MULT);
pub(crate) const PAD_STONE_EXTRA_TIME: f64 = 2.0 * (1.0 / MEDUSA_SLOW_MULT - 1.0);
pub(crate) const HAZARD_PAD_SYNERGY_TIME: f64 = PAD_EFFECT_DURATION * (1.0 / PAD_SLOW_MULT - 1.0);
pub(crate) const HAZARD_PAD_SYNERGY_STRONG_TIME: f64 = HAZARD_PAD_SYNERGY_TIME * 1.25;
pub(crate) const HAZARD_NEUTRAL_OVERLAP_TIME: f64 =
    HAZARD_LINGER * (1.0 / HAZARD_SLOW_MULT - 1.0) * 0.75;
pub(crate) const LIGHTNING_PAD_STUN_SHARE: f64 = 0.7;

// Search -------------------------------------------------------------------
pub(crate) const CANDIDATE_RADIUS: i32 = 2;
pub(crate) const RANDOM_WALL_DRAWS: usize = 80;
pub(crate) const FALLBACK_POOL_TRIES: usize = 140;
pub(crate) const FALLBACK_PLACEMENT_TRIES: usize = 200;
pub(crate) const HOTSPOT_RANDOM_DRAWS: usize = 120;
pub(crate) const HAZARD_PATH_GAIN_THRESHOLD: f64 = 10.0;
pub(crate) const SPEED_PAD_DIVERSION_RADIUS: i32 = 3;
pub(crate) const BRANCH_WINDOW: u32 = 3;
pub(crate) const REINVEST_STRICT_EXTRA_ATTEMPTS: u32 = 10;
pub(crate) const REINVEST_LENIENT_EXTRA_ATTEMPTS: u32 = 20;

// Logging targets ----------------------------------------------------------
pub(crate) const LOG_BUILDER: &str = "labyrace::builder";
pub(crate) const LOG_PLANNER: &str = "labyrace::planner";
pub(crate) const LOG_RECLAIM: &str = "labyrace::reclaim";
pub(crate) const LOG_MAZE: &str = "labyrace::maze";
pub(crate) const LOG_WORKER: &str = "labyrace::worker";
