//! Evaluator coefficients.
//!
//! Weights are an immutable value threaded through every scoring call. A
//! snapshot may override individual coefficients by name; both `snake_case`
//! and `camelCase` spellings are accepted, along with the legacy names used
//! by older clients (`specialTime`, `neutralSpecialTime`, `lightningPadPenalty`).
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while applying weight overrides.
#[derive(Debug, Error, PartialEq)]
pub enum WeightError {
    #[error("unknown weight '{0}'")]
    Unknown(String),
    #[error("weight '{name}' must be finite (got {value})")]
    NonFinite { name: String, value: f64 },
}

/// Named coefficients of the scoring formula.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weights {
    #[serde(default = "Weights::default_path_distance")]
    pub path_distance: f64,
    #[serde(default = "Weights::unit")]
    pub pad_score: f64,
    #[serde(default = "Weights::default_path_time")]
    pub path_time: f64,
    #[serde(default = "Weights::default_path_turns")]
    pub path_turns: f64,
    #[serde(default = "Weights::default_hazard_time")]
    pub hazard_time: f64,
    #[serde(default = "Weights::unit")]
    pub neutral_hazard_time: f64,
    #[serde(default = "Weights::default_slow_time")]
    pub slow_time: f64,
    #[serde(default = "Weights::unit")]
    pub slow_stack: f64,
    #[serde(default = "Weights::default_slow_interaction")]
    pub slow_interaction: f64,
    #[serde(default = "Weights::default_block_usage")]
    pub block_usage: f64,
    #[serde(default = "Weights::default_lightning_penalty")]
    pub lightning_penalty: f64,
    #[serde(default = "Weights::default_beam_crossings")]
    pub beam_crossings: f64,
}

impl Weights {
    const fn unit() -> f64 {
        1.0
    }

    const fn default_path_distance() -> f64 {
        12.0
    }

    const fn default_path_time() -> f64 {
        2.0
    }

    const fn default_path_turns() -> f64 {
        0.3
    }

    const fn default_hazard_time() -> f64 {
        2.0
    }

    const fn default_slow_time() -> f64 {
        1.75
    }

    const fn default_slow_interaction() -> f64 {
        0.05
    }

    const fn default_block_usage() -> f64 {
        3.0
    }

    const fn default_lightning_penalty() -> f64 {
        1.5
    }

    const fn default_beam_crossings() -> f64 {
        2.5
    }

    fn slot_mut(&mut self, name: &str) -> Option<&mut f64> {
        let slot = match name {
            "path_distance" | "pathDistance" => &mut self.path_distance,
            "pad_score" | "padScore" => &mut self.pad_score,
            "path_time" | "pathTime" => &mut self.path_time,
            "path_turns" | "pathTurns" => &mut self.path_turns,
            "hazard_time" | "hazardTime" | "specialTime" => &mut self.hazard_time,
            "neutral_hazard_time" | "neutralHazardTime" | "neutralSpecialTime" => {
                &mut self.neutral_hazard_time
            }
            "slow_time" | "slowTime" => &mut self.slow_time,
            "slow_stack" | "slowStack" => &mut self.slow_stack,
            "slow_interaction" | "slowInteraction" => &mut self.slow_interaction,
            "block_usage" | "blockUsage" => &mut self.block_usage,
            "lightning_penalty" | "lightningPenalty" | "lightningPadPenalty" => {
                &mut self.lightning_penalty
            }
            "beam_crossings" | "beamCrossings" => &mut self.beam_crossings,
            _ => return None,
        };
        Some(slot)
    }

    /// Copy of these weights with the named overrides applied.
    ///
    /// # Errors
    ///
    /// Returns `WeightError` for an unknown name or a non-finite value; no
    /// override is applied in that case.
    pub fn with_overrides(&self, overrides: &BTreeMap<String, f64>) -> Result<Self, WeightError> {
        let mut weights = *self;
        for (name, value) in overrides {
            if !value.is_finite() {
                return Err(WeightError::NonFinite {
                    name: name.clone(),
                    value: *value,
                });
            }
            let slot = weights
                .slot_mut(name.trim())
                .ok_or_else(|| WeightError::Unknown(name.clone()))?;
            *slot = *value;
        }
        Ok(weights)
    }
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            path_distance: Self::default_path_distance(),
            pad_score: Self::unit(),
            path_time: Self::default_path_time(),
            path_turns: Self::default_path_turns(),
            hazard_time: Self::default_hazard_time(),
            neutral_hazard_time: Self::unit(),
            slow_time: Self::default_slow_time(),
            slow_stack: Self::unit(),
            slow_interaction: Self::default_slow_interaction(),
            block_usage: Self::default_block_usage(),
            lightning_penalty: Self::default_lightning_penalty(),
            beam_crossings: Self::default_beam_crossings(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
        pairs
            .iter()
            .map(|(name, value)| ((*name).to_string(), *value))
            .collect()
    }

    #[test]
    fn defaults_match_documented_values() {
        let weights = Weights::default();
        assert_eq!(weights.path_distance, 12.0);
        assert_eq!(weights.path_turns, 0.3);
        assert_eq!(weights.slow_interaction, 0.05);
        assert_eq!(weights.beam_crossings, 2.5);
    }

    #[test]
    fn overrides_accept_both_spellings() {
        let weights = Weights::default()
            .with_overrides(&overrides(&[
                ("slowTime", 4.0),
                ("block_usage", 0.5),
                ("specialTime", 9.0),
            ]))
            .unwrap();
        assert_eq!(weights.slow_time, 4.0);
        assert_eq!(weights.block_usage, 0.5);
        assert_eq!(weights.hazard_time, 9.0);
    }

    #[test]
    fn unknown_and_non_finite_overrides_are_rejected() {
        assert_eq!(
            Weights::default().with_overrides(&overrides(&[("warp", 1.0)])),
            Err(WeightError::Unknown("warp".to_string()))
        );
        assert!(matches!(
            Weights::default().with_overrides(&overrides(&[("pathTime", f64::NAN)])),
            Err(WeightError::NonFinite { .. })
        ));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let weights: Weights = serde_json::from_str(r#"{"path_time": 3.0}"#).unwrap();
        assert_eq!(weights.path_time, 3.0);
        assert_eq!(weights.hazard_time, 2.0);
    }
}
