pub mod reports;
pub mod scenarios;
pub mod seeds;
pub mod tester;

pub use scenarios::{BuildPlan, Scenario};
pub use seeds::{SeedInfo, resolve_seed_inputs};
pub use tester::*;
