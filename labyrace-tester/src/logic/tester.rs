use colored::Colorize;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use super::scenarios::{BuildPlan, Scenario, run_iteration};
use super::seeds::SeedInfo;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,
    pub seed: u64,
    pub passed: bool,
    pub iterations_run: usize,
    pub successful_iterations: usize,
    pub failures: Vec<String>,
    /// Mean simulated finish time of the passing iterations, in seconds.
    pub mean_run_time: Option<f64>,
    #[serde(with = "duration_serde")]
    pub average_duration: Duration,
    #[serde(with = "duration_vec_serde")]
    pub performance_data: Vec<Duration>,
}

pub struct LayoutTester {
    plan: BuildPlan,
    verbose: bool,
}

impl LayoutTester {
    pub const fn new(plan: BuildPlan, verbose: bool) -> Self {
        Self { plan, verbose }
    }

    pub fn run_scenario(
        &self,
        scenario: Scenario,
        seeds: &[SeedInfo],
        iterations: usize,
    ) -> Vec<ScenarioResult> {
        seeds
            .iter()
            .map(|seed| {
                if self.verbose {
                    println!(
                        "🧪 Testing scenario: {} (fidelity: {} seed: {})",
                        scenario.key().bright_white(),
                        self.plan.fidelity,
                        seed.display_name()
                    );
                }
                self.run_single_scenario(scenario, seed.seed, iterations)
            })
            .collect()
    }

    fn run_single_scenario(
        &self,
        scenario: Scenario,
        seed: u64,
        iterations: usize,
    ) -> ScenarioResult {
        let mut failures = Vec::new();
        let mut performance_data = Vec::new();
        let mut run_times = Vec::new();

        for i in 0..iterations {
            let started = Instant::now();
            let iteration_seed = seed.wrapping_add(u64::try_from(i).unwrap_or(u64::MAX));
            match run_iteration(scenario, &self.plan, iteration_seed) {
                Ok(summary) => {
                    let duration = started.elapsed();
                    performance_data.push(duration);
                    run_times.extend(summary.time);
                    if self.verbose {
                        println!(
                            "  ✅ Iteration {}/{} passed ({duration:?}) placements:{} branches:{} {}",
                            i + 1,
                            iterations,
                            summary.placements,
                            summary.branches,
                            summary.note
                        );
                    }
                }
                Err(err) => {
                    let message = format!("Iteration {} (seed {iteration_seed}): {err:#}", i + 1);
                    debug!("{} failed: {err:?}", scenario.key());
                    if self.verbose {
                        println!("  ❌ {}", message.clone().red());
                    }
                    failures.push(message);
                }
            }
        }

        let average_duration = if performance_data.is_empty() {
            Duration::ZERO
        } else {
            performance_data.iter().sum::<Duration>()
                / u32::try_from(performance_data.len()).unwrap_or(1)
        };
        let mean_run_time = (!run_times.is_empty()).then(|| {
            #[allow(clippy::cast_precision_loss)]
            let count = run_times.len() as f64;
            run_times.iter().sum::<f64>() / count
        });

        ScenarioResult {
            scenario_name: scenario.key().to_string(),
            seed,
            passed: failures.is_empty(),
            iterations_run: iterations,
            successful_iterations: performance_data.len(),
            failures,
            mean_run_time,
            average_duration,
            performance_data,
        }
    }
}

mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u128::deserialize(deserializer)?;
        Ok(Duration::from_millis(u64::try_from(millis).unwrap_or(0)))
    }
}

mod duration_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(durations: &[Duration], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis: Vec<u128> = durations.iter().map(Duration::as_millis).collect();
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Vec::<u128>::deserialize(deserializer)?;
        Ok(millis
            .into_iter()
            .map(|m| Duration::from_millis(u64::try_from(m).unwrap_or(0)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labyrace_engine::Fidelity;

    #[test]
    fn greedy_build_sweep_passes() {
        let plan = BuildPlan {
            walls: 2,
            singles: 1,
            hazard: None,
            fidelity: Fidelity::Greedy,
        };
        let tester = LayoutTester::new(plan, false);
        let results = tester.run_scenario(Scenario::Build, &[SeedInfo::from_numeric(3)], 2);
        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert!(result.passed, "{:?}", result.failures);
        assert_eq!(result.successful_iterations, 2);
        assert_eq!(result.performance_data.len(), 2);
        assert!(result.mean_run_time.is_some());
        let json = serde_json::to_string(result).unwrap();
        let back: ScenarioResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.scenario_name, "build");
    }
}
