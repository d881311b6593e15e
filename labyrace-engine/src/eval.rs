//! Analytic layout scoring.
//!
//! The evaluator walks the current path once per effect source and integrates
//! the known decay curves instead of running the simulator. It is a pruning
//! heuristic: cheap, deterministic, and only roughly proportional to the
//! simulated time.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BEAM_LINGER_CAP, FREEZE_BUILDUP, HAZARD_LINGER, HAZARD_NEUTRAL_OVERLAP_TIME,
    HAZARD_PAD_SYNERGY_STRONG_TIME, HAZARD_PAD_SYNERGY_TIME, HAZARD_RADIUS, HAZARD_SLOW_MULT,
    LIGHTNING_COOLDOWN, LIGHTNING_PAD_STUN_SHARE, LIGHTNING_STUN, PAD_SLOW_EXTRA_TIME,
    PAD_SPEED_TIME_DELTA, PAD_STONE_EXTRA_TIME, PREDICT_SLOW_SCALE, RUNNER_RADIUS, RUNNER_SPEED,
};
use crate::grid::{Cell, Grid, PadKind, Pos};
use crate::hazard::{Hazard, HazardKind};
use crate::numbers::usize_to_f64;
use crate::path::{PathInfo, analyze_path, turn_count};
use crate::sim::effects::{freeze_multiplier, gravity_multiplier};
use crate::weights::Weights;

/// Fixed inputs shared by every scoring call of one build.
#[derive(Debug, Clone, Copy)]
pub struct ScoreContext<'a> {
    pub neutral: &'a [Hazard],
    pub weights: &'a Weights,
    /// Grid before any builder placement, for the block-usage term.
    pub base_grid: Option<&'a Grid>,
}

/// Score of one layout with its sub-scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub score: f64,
    pub distance: f64,
    pub pad_score: f64,
    pub turns: usize,
    pub slow_time: f64,
    pub slow_stack_time: f64,
    pub owned_hazard_time: f64,
    pub neutral_hazard_time: f64,
    pub lightning_penalty: f64,
    pub beam_crossings: usize,
    pub block_usage: f64,
    pub detour_distance: f64,
    pub predicted_time: f64,
}

fn placed(hazard: Option<&Hazard>) -> Option<&Hazard> {
    hazard.filter(|hazard| hazard.is_placed())
}

fn pad_at(grid: &Grid, pos: Pos) -> Option<PadKind> {
    grid.get(pos).and_then(Cell::pad_kind)
}

/// Score `grid`; `None` when it has no path.
#[must_use]
pub fn evaluate(
    grid: &Grid,
    hazard: Option<&Hazard>,
    ctx: &ScoreContext<'_>,
) -> Option<Evaluation> {
    let info = analyze_path(grid)?;
    Some(evaluate_path(grid, &info, hazard, ctx))
}

/// Scalar score, negative infinity for a blocked grid.
#[must_use]
pub fn score(grid: &Grid, hazard: Option<&Hazard>, ctx: &ScoreContext<'_>) -> f64 {
    evaluate(grid, hazard, ctx).map_or(f64::NEG_INFINITY, |evaluation| evaluation.score)
}

/// Score `grid` against an already computed path.
#[must_use]
pub fn evaluate_path(
    grid: &Grid,
    info: &PathInfo,
    hazard: Option<&Hazard>,
    ctx: &ScoreContext<'_>,
) -> Evaluation {
    let weights = ctx.weights;
    let owned = placed(hazard);

    let owned_hazard_time = owned.map_or(0.0, |hazard| {
        estimate_hazard_time(info, hazard)
            + pad_synergy_time(grid, &info.path, hazard)
            + neutral_overlap_time(&info.path, hazard, ctx.neutral)
    });
    let neutral_hazard_time: f64 = ctx
        .neutral
        .iter()
        .filter(|hazard| hazard.is_placed())
        .map(|hazard| estimate_hazard_time(info, hazard))
        .sum();
    let slow_time = (pad_slow_time(grid, info) + owned_hazard_time + neutral_hazard_time).max(0.0);
    let slow_stack_time = slow_stack_time(grid, info, owned, ctx.neutral);
    let lightning_penalty = owned.map_or(0.0, |hazard| lightning_pad_penalty(grid, info, hazard));
    let beam_crossings = owned.map_or(0, |hazard| beam_crossings(&info.path, hazard));
    let block_usage = ctx
        .base_grid
        .map_or(0.0, |base| block_usage(&info.path, base));
    let detour_distance = detour_distance(grid, info);
    let turns = turn_count(&info.path);
    let distance = info.total_distance;

    let score = distance * weights.path_distance
        + info.pad_score * weights.pad_score
        + (distance / RUNNER_SPEED) * weights.path_time
        + usize_to_f64(turns) * weights.path_turns
        + slow_time * weights.slow_time
        + slow_stack_time * weights.slow_stack
        + owned_hazard_time * weights.hazard_time
        + neutral_hazard_time * weights.neutral_hazard_time
        + lightning_penalty * weights.lightning_penalty
        + usize_to_f64(beam_crossings) * weights.beam_crossings
        + block_usage * weights.block_usage
        + detour_distance * weights.slow_interaction;

    let slow_total = slow_time + slow_stack_time + lightning_penalty;
    let predicted_time = distance / RUNNER_SPEED + PREDICT_SLOW_SCALE * slow_total;

    Evaluation {
        score,
        distance,
        pad_score: info.pad_score,
        turns,
        slow_time,
        slow_stack_time,
        owned_hazard_time,
        neutral_hazard_time,
        lightning_penalty,
        beam_crossings,
        block_usage,
        detour_distance,
        predicted_time,
    }
}

/// Estimated extra seconds one placed hazard costs along the path.
#[must_use]
pub fn estimate_hazard_time(info: &PathInfo, hazard: &Hazard) -> f64 {
    let Some(anchor) = hazard.cell else {
        return 0.0;
    };
    match hazard.kind {
        HazardKind::Radius => freeze_time(info, hazard),
        HazardKind::Row | HazardKind::Column => beam_time(info, hazard),
        HazardKind::Gravity => gravity_time(info, anchor),
        HazardKind::Lightning => lightning_time(info, hazard),
    }
}

fn freeze_time(info: &PathInfo, hazard: &Hazard) -> f64 {
    let decay_rate = FREEZE_BUILDUP / HAZARD_LINGER;
    let mut buildup: f64 = 0.0;
    let mut total = 0.0;
    for (cell, base_time, _) in info.segments() {
        if hazard.contains_point(cell.center()) {
            buildup = (buildup + base_time).min(FREEZE_BUILDUP);
        } else if buildup > 0.0 {
            buildup = (buildup - decay_rate * base_time).max(0.0);
        }
        if buildup > 0.0 {
            total += base_time * (1.0 / freeze_multiplier(buildup) - 1.0);
        }
    }
    total
}

fn beam_time(info: &PathInfo, hazard: &Hazard) -> f64 {
    let mut linger: f64 = 0.0;
    let mut total = 0.0;
    for (cell, base_time, _) in info.segments() {
        let inside = hazard.beam_covers(cell);
        if inside {
            linger = BEAM_LINGER_CAP;
        }
        let active = if inside {
            base_time.min(HAZARD_LINGER)
        } else {
            base_time.min(linger)
        };
        if inside || linger > 0.0 {
            total += active * (1.0 / HAZARD_SLOW_MULT - 1.0);
        }
        if !inside && linger > 0.0 {
            linger = (linger - base_time).max(0.0);
        }
    }
    total
}

fn gravity_time(info: &PathInfo, anchor: Pos) -> f64 {
    let center = anchor.center();
    info.segments()
        .filter_map(|(cell, base_time, _)| {
            let distance = center.distance(cell.center());
            (distance <= HAZARD_RADIUS)
                .then(|| base_time * (1.0 / gravity_multiplier(distance) - 1.0))
        })
        .sum()
}

fn lightning_time(info: &PathInfo, hazard: &Hazard) -> f64 {
    let mut cooldown: f64 = 0.0;
    let mut total = 0.0;
    for (cell, base_time, _) in info.segments() {
        if hazard.in_strike_range(cell.center()) && cooldown <= 0.0 {
            total += LIGHTNING_STUN;
            cooldown = LIGHTNING_COOLDOWN;
        }
        cooldown = (cooldown - base_time).max(0.0);
    }
    total
}

/// Cells a detour pad at `current` would push the runner back, given the
/// node it was entered from.
fn detour_forced_distance(grid: &Grid, current: Pos, previous: Option<Pos>) -> usize {
    let Some(previous) = previous else {
        return 0;
    };
    let dx = (previous.x - current.x).signum();
    let dy = (previous.y - current.y).signum();
    if dx == 0 && dy == 0 {
        return 0;
    }
    let mut distance = 0;
    let mut cursor = current;
    while grid.is_walkable(cursor.offset(dx, dy)) {
        cursor = cursor.offset(dx, dy);
        distance += 1;
    }
    distance
}

/// Extra seconds (negative for speed pads) from the pads on the path.
#[must_use]
pub fn pad_slow_time(grid: &Grid, info: &PathInfo) -> f64 {
    let mut total = 0.0;
    let mut seen = HashSet::new();
    let mut distance_so_far = 0.0;
    for (index, cell) in info.path.iter().enumerate() {
        if index > 0 {
            distance_so_far += info.lengths.get(index - 1).copied().unwrap_or(0.0);
        }
        let Some(kind) = pad_at(grid, *cell) else {
            continue;
        };
        if !seen.insert(*cell) {
            continue;
        }
        total += match kind {
            PadKind::Slow => PAD_SLOW_EXTRA_TIME,
            PadKind::Stone => PAD_STONE_EXTRA_TIME,
            PadKind::Detour => {
                let previous = index.checked_sub(1).map(|prev| info.path[prev]);
                usize_to_f64(detour_forced_distance(grid, *cell, previous)) / RUNNER_SPEED
            }
            PadKind::Rewind => distance_so_far / RUNNER_SPEED,
            PadKind::Speed => -PAD_SPEED_TIME_DELTA,
        };
    }
    total
}

/// Total cells detour pads on the path would push the runner back.
#[must_use]
pub fn detour_distance(grid: &Grid, info: &PathInfo) -> f64 {
    let forced: usize = info
        .path
        .iter()
        .enumerate()
        .filter(|(_, cell)| pad_at(grid, **cell) == Some(PadKind::Detour))
        .map(|(index, cell)| {
            let previous = index.checked_sub(1).map(|prev| info.path[prev]);
            detour_forced_distance(grid, *cell, previous)
        })
        .sum();
    usize_to_f64(forced)
}

/// Time spent under two or more simultaneous slowdowns.
#[must_use]
pub fn slow_stack_time(
    grid: &Grid,
    info: &PathInfo,
    hazard: Option<&Hazard>,
    neutral: &[Hazard],
) -> f64 {
    let mut total = 0.0;
    for (cell, base_time, _) in info.segments() {
        if !cell.is_inside() {
            continue;
        }
        let center = cell.center();
        let mut slows = 0usize;
        if matches!(pad_at(grid, cell), Some(PadKind::Slow | PadKind::Stone)) {
            slows += 1;
        }
        if placed(hazard).is_some_and(|hazard| hazard.contains_point(center)) {
            slows += 1;
        }
        slows += neutral
            .iter()
            .filter(|hazard| hazard.is_placed() && hazard.contains_point(center))
            .count();
        if slows >= 2 {
            total += base_time * usize_to_f64(slows - 1);
        }
    }
    total
}

fn pad_synergy_time(grid: &Grid, path: &[Pos], hazard: &Hazard) -> f64 {
    path.iter()
        .filter(|cell| cell.is_inside() && hazard.contains_point(cell.center()))
        .filter_map(|cell| match pad_at(grid, *cell)? {
            PadKind::Slow | PadKind::Stone => Some(HAZARD_PAD_SYNERGY_TIME),
            PadKind::Detour | PadKind::Rewind => Some(HAZARD_PAD_SYNERGY_STRONG_TIME),
            PadKind::Speed => None,
        })
        .sum()
}

fn neutral_overlap_time(path: &[Pos], hazard: &Hazard, neutral: &[Hazard]) -> f64 {
    neutral
        .iter()
        .filter(|other| other.is_placed())
        .map(|other| {
            let overlap = path
                .iter()
                .filter(|cell| {
                    let center = cell.center();
                    hazard.contains_point(center) && other.contains_point(center)
                })
                .count();
            usize_to_f64(overlap) * HAZARD_NEUTRAL_OVERLAP_TIME
        })
        .sum()
}

/// Expected stun time from a lightning tower covering slow pads on the path.
#[must_use]
pub fn lightning_pad_penalty(grid: &Grid, info: &PathInfo, hazard: &Hazard) -> f64 {
    let (HazardKind::Lightning, Some(anchor)) = (hazard.kind, hazard.cell) else {
        return 0.0;
    };
    let reach = HAZARD_RADIUS + RUNNER_RADIUS;
    let zap_window = LIGHTNING_COOLDOWN + LIGHTNING_STUN;
    let center = anchor.center();
    info.segments()
        .filter(|(cell, _, _)| pad_at(grid, *cell) == Some(PadKind::Slow))
        .map(|(cell, base_time, _)| {
            let distance = center.distance(cell.center());
            let overlap = if distance <= reach {
                (reach - distance).max(0.0) / reach
            } else {
                0.0
            };
            let hit_chance = (base_time / zap_window * overlap).min(1.0);
            LIGHTNING_STUN * hit_chance * LIGHTNING_PAD_STUN_SHARE
        })
        .sum()
}

/// Times the path enters a row or column beam.
#[must_use]
pub fn beam_crossings(path: &[Pos], hazard: &Hazard) -> usize {
    if !hazard.kind.is_beam() || !hazard.is_placed() {
        return 0;
    }
    let mut crossings = 0;
    let mut inside = false;
    for cell in path.iter().filter(|cell| cell.is_inside()) {
        let now_inside = hazard.beam_covers(*cell);
        if now_inside && !inside {
            crossings += 1;
        }
        inside = now_inside;
    }
    crossings
}

/// Share of the base grid's static cells that the path runs through.
#[must_use]
pub fn block_usage(path: &[Pos], base_grid: &Grid) -> f64 {
    let total_static = base_grid.count(|cell| cell == Cell::Static);
    if total_static == 0 {
        return 0.0;
    }
    let used = path
        .iter()
        .filter(|cell| cell.is_inside())
        .collect::<HashSet<_>>()
        .into_iter()
        .filter(|cell| base_grid.get(**cell) == Some(Cell::Static))
        .count();
    usize_to_f64(used) / usize_to_f64(total_static.max(1))
}
