//! Engine tuning: search fidelity, pool sizes, lookahead and reclaim settings.
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::SIMULATION_TIME_CAP;

/// How much search effort a build spends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    /// Lookahead, hazard branching and reclaim.
    #[default]
    Full,
    /// Single greedy pass: no lookahead, no branching, no reclaim.
    Greedy,
}

impl Fidelity {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Greedy => "greedy",
        }
    }
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Fidelity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(Self::Full),
            "greedy" | "fast" => Ok(Self::Greedy),
            other => Err(format!("unknown fidelity '{other}'")),
        }
    }
}

/// Errors raised when an [`EngineConfig`] violates its documented bounds.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be at least {min} (got {value})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be between {min} and {max} (got {value})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
}

/// Search and refinement settings for one build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub fidelity: Fidelity,
    /// Candidates kept per pool (walls, singles, hotspots fed to lookahead).
    #[serde(default = "EngineConfig::default_candidate_pool")]
    pub candidate_pool: usize,
    #[serde(default = "EngineConfig::default_lookahead_depth")]
    pub lookahead_depth: usize,
    /// Relative score gap under which the top two candidates count as tied.
    #[serde(default = "EngineConfig::default_lookahead_tolerance")]
    pub lookahead_tolerance: f64,
    #[serde(default = "EngineConfig::default_hotspot_limit")]
    pub hotspot_limit: usize,
    #[serde(default = "EngineConfig::default_reclaim_threshold")]
    pub reclaim_threshold: f64,
    #[serde(default = "EngineConfig::default_reclaim_max_passes")]
    pub reclaim_max_passes: u32,
    #[serde(default = "EngineConfig::default_reclaim_min_placements")]
    pub reclaim_min_placements: usize,
    #[serde(default = "EngineConfig::default_simulation_time_cap")]
    pub simulation_time_cap: f64,
}

/// Default configuration used when a snapshot carries none.
#[must_use]
pub fn default_config() -> EngineConfig {
    EngineConfig::default()
}

impl EngineConfig {
    const fn default_candidate_pool() -> usize {
        3
    }

    const fn default_lookahead_depth() -> usize {
        2
    }

    const fn default_lookahead_tolerance() -> f64 {
        0.02
    }

    const fn default_hotspot_limit() -> usize {
        5
    }

    const fn default_reclaim_threshold() -> f64 {
        0.4
    }

    const fn default_reclaim_max_passes() -> u32 {
        2
    }

    const fn default_reclaim_min_placements() -> usize {
        8
    }

    const fn default_simulation_time_cap() -> f64 {
        SIMULATION_TIME_CAP
    }

    /// Greedy preset for quick builds.
    #[must_use]
    pub fn greedy() -> Self {
        Self {
            fidelity: Fidelity::Greedy,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn uses_lookahead(&self) -> bool {
        matches!(self.fidelity, Fidelity::Full) && self.lookahead_depth > 0
    }

    #[must_use]
    pub const fn uses_branching(&self) -> bool {
        matches!(self.fidelity, Fidelity::Full)
    }

    #[must_use]
    pub const fn uses_reclaim(&self) -> bool {
        matches!(self.fidelity, Fidelity::Full) && self.reclaim_max_passes > 0
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.candidate_pool == 0 {
            return Err(ConfigError::MinViolation {
                field: "candidate_pool",
                min: 1.0,
                value: 0.0,
            });
        }
        if self.hotspot_limit == 0 {
            return Err(ConfigError::MinViolation {
                field: "hotspot_limit",
                min: 1.0,
                value: 0.0,
            });
        }
        if !(0.0..=1.0).contains(&self.lookahead_tolerance) {
            return Err(ConfigError::RangeViolation {
                field: "lookahead_tolerance",
                min: 0.0,
                max: 1.0,
                value: self.lookahead_tolerance,
            });
        }
        if !self.reclaim_threshold.is_finite() || self.reclaim_threshold < 0.0 {
            return Err(ConfigError::MinViolation {
                field: "reclaim_threshold",
                min: 0.0,
                value: self.reclaim_threshold,
            });
        }
        if !(1.0..=SIMULATION_TIME_CAP * 10.0).contains(&self.simulation_time_cap) {
            return Err(ConfigError::RangeViolation {
                field: "simulation_time_cap",
                min: 1.0,
                max: SIMULATION_TIME_CAP * 10.0,
                value: self.simulation_time_cap,
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fidelity: Fidelity::default(),
            candidate_pool: Self::default_candidate_pool(),
            lookahead_depth: Self::default_lookahead_depth(),
            lookahead_tolerance: Self::default_lookahead_tolerance(),
            hotspot_limit: Self::default_hotspot_limit(),
            reclaim_threshold: Self::default_reclaim_threshold(),
            reclaim_max_passes: Self::default_reclaim_max_passes(),
            reclaim_min_placements: Self::default_reclaim_min_placements(),
            simulation_time_cap: Self::default_simulation_time_cap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(default_config().validate().is_ok());
        assert!(EngineConfig::greedy().validate().is_ok());
        assert!(!EngineConfig::greedy().uses_reclaim());
    }

    #[test]
    fn empty_json_uses_defaults() {
        let cfg: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let cfg = EngineConfig {
            lookahead_tolerance: 1.5,
            ..EngineConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RangeViolation {
                field: "lookahead_tolerance",
                ..
            })
        ));
        let cfg = EngineConfig {
            candidate_pool: 0,
            ..EngineConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn fidelity_parses_cli_names() {
        assert_eq!("GREEDY".parse::<Fidelity>(), Ok(Fidelity::Greedy));
        assert_eq!("full".parse::<Fidelity>(), Ok(Fidelity::Full));
        assert!("max".parse::<Fidelity>().is_err());
    }
}
