use log::trace;

use super::effects::{Effects, GravityPull, Heading, Medusa};
use crate::constants::{
    FREEZE_BUILDUP, GRAVITY_VISUAL_PULL, GRID_SIZE_I32, HAZARD_LINGER, HAZARD_RADIUS,
    LIGHTNING_COOLDOWN, LIGHTNING_STUN, PAD_EFFECT_DURATION, RUNNER_RADIUS, RUNNER_SPEED,
    STEP_AXIS_THRESHOLD,
};
use crate::grid::{Cell, Grid, PadKind, Point, Pos};
use crate::hazard::{Hazard, HazardKind, NeutralHazards};
use crate::numbers::floor_to_i32;
use crate::path::{compute_path, compute_path_from, segment_lengths};

/// One simulated runner. Owns its grid so pads can flip to their spent variant.
#[derive(Debug, Clone)]
pub struct Runner {
    grid: Grid,
    hazard: Option<Hazard>,
    neutrals: NeutralHazards,
    path: Vec<Pos>,
    lengths: Vec<f64>,
    segment_index: usize,
    segment_progress: f64,
    elapsed: f64,
    world_pos: Point,
    effects: Effects,
    finished: bool,
}

fn segment_heading(path: &[Pos], index: usize) -> Option<Heading> {
    let start = path.get(index)?.center();
    let end = path.get(index + 1)?.center();
    let (dx, dy) = (end.x - start.x, end.y - start.y);
    let length = dx.hypot(dy);
    if length == 0.0 {
        return None;
    }
    let direction = Point::new(dx / length, dy / length);
    let snap = |component: f64| {
        if component > STEP_AXIS_THRESHOLD {
            1
        } else if component < -STEP_AXIS_THRESHOLD {
            -1
        } else {
            0
        }
    };
    Some(Heading {
        direction,
        step: (snap(direction.x), snap(direction.y)),
    })
}

impl Runner {
    /// Runner at the virtual entrance of `grid`, with its own hazard copies.
    #[must_use]
    pub fn new(grid: Grid, hazard: Option<Hazard>, neutrals: NeutralHazards) -> Self {
        let path = compute_path(&grid);
        let lengths = segment_lengths(&path);
        let mut runner = Self {
            grid,
            hazard,
            neutrals,
            finished: path.is_empty(),
            path,
            lengths,
            segment_index: 0,
            segment_progress: 0.0,
            elapsed: 0.0,
            world_pos: Point::default(),
            effects: Effects::default(),
        };
        runner.world_pos = runner.world_position();
        runner
    }

    #[must_use]
    pub fn has_path(&self) -> bool {
        !self.path.is_empty()
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Simulated seconds since the start; never reset by re-pathing.
    #[must_use]
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    #[must_use]
    pub const fn position(&self) -> Point {
        self.world_pos
    }

    #[must_use]
    pub const fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn path(&self) -> &[Pos] {
        &self.path
    }

    #[must_use]
    pub const fn effects(&self) -> &Effects {
        &self.effects
    }

    fn hazard_kind(&self) -> Option<HazardKind> {
        self.hazard.as_ref().map(|hazard| hazard.kind)
    }

    /// Advance the simulation by one fixed step.
    pub fn advance(&mut self, delta: f64) {
        if self.finished {
            return;
        }
        if self.path.is_empty() {
            self.finished = true;
            return;
        }
        let kind = self.hazard_kind();
        self.effects.update(delta, kind);
        let speed = RUNNER_SPEED * self.effects.speed_multiplier;
        let mut remaining = speed * delta;
        let mut consumed = 0.0;
        while remaining > 0.0 && self.segment_index < self.lengths.len() {
            if let Some(heading) = segment_heading(&self.path, self.segment_index) {
                self.effects.last_heading = Some(heading);
            }
            let length = self.lengths[self.segment_index];
            if length == 0.0 {
                self.segment_index += 1;
                self.segment_progress = 0.0;
                continue;
            }
            let segment_remaining = length - self.segment_progress;
            if remaining < segment_remaining {
                self.segment_progress += remaining;
                consumed += remaining / speed;
                remaining = 0.0;
            } else {
                remaining -= segment_remaining;
                consumed += segment_remaining / speed;
                self.segment_index += 1;
                self.segment_progress = 0.0;
                self.trigger_pad_on_node();
            }
        }
        self.world_pos = self.world_position();
        self.check_pads_under_runner();
        self.update_hazard(delta);
        self.update_neutral_hazards(delta);
        let finished_now = self.segment_index >= self.lengths.len();
        self.elapsed += if finished_now { consumed.min(delta) } else { delta };
        self.effects.check_medusa_release();
        if finished_now {
            self.finished = true;
        }
    }

    fn world_position(&self) -> Point {
        if self.path.is_empty() {
            return Pos::entrance().center();
        }
        let last = self.path.len() - 1;
        if self.segment_index >= last {
            return self.path[last].center();
        }
        let start = self.path[self.segment_index].center();
        let end = self.path[self.segment_index + 1].center();
        let length = match self.lengths[self.segment_index] {
            length if length > 0.0 => length,
            _ => 1.0,
        };
        let t = (self.segment_progress / length).min(1.0);
        let mut pos = Point::new(
            start.x + (end.x - start.x) * t,
            start.y + (end.y - start.y) * t,
        );
        if let Some(offset) = self.effects.gravity_offset {
            pos.x += offset.x;
            pos.y += offset.y;
        }
        pos
    }

    fn trigger_pad_on_node(&mut self) {
        let Some(node) = self.path.get(self.segment_index).copied() else {
            return;
        };
        if let Some(cell) = self.grid.get(node).filter(|cell| cell.is_active_pad()) {
            self.apply_pad(node, cell);
        }
    }

    fn check_pads_under_runner(&mut self) {
        let pos = self.world_pos;
        let max = GRID_SIZE_I32 - 1;
        let min_x = floor_to_i32(pos.x - RUNNER_RADIUS).max(0);
        let max_x = floor_to_i32(pos.x + RUNNER_RADIUS).min(max);
        let min_y = floor_to_i32(pos.y - RUNNER_RADIUS).max(0);
        let max_y = floor_to_i32(pos.y + RUNNER_RADIUS).min(max);
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let cell_pos = Pos::new(x, y);
                if let Some(cell) = self.grid.get(cell_pos).filter(|cell| cell.is_active_pad()) {
                    self.apply_pad(cell_pos, cell);
                }
            }
        }
    }

    fn apply_pad(&mut self, pos: Pos, cell: Cell) {
        let Some(kind) = cell.pad_kind() else {
            return;
        };
        self.grid.put(pos, cell.spent());
        trace!("pad {kind:?} fired at {pos} t={:.3}", self.elapsed);
        match kind {
            PadKind::Speed => self.effects.fast_timer = PAD_EFFECT_DURATION,
            PadKind::Slow => self.effects.slow_timer = PAD_EFFECT_DURATION,
            PadKind::Detour => self.trigger_detour(pos),
            PadKind::Stone => {
                let locked = self.effects.last_heading.map(|h| h.direction);
                self.effects.medusa = Medusa::Locked(locked);
            }
            PadKind::Rewind => self.trigger_rewind(),
        }
        let kind = self.hazard_kind();
        self.effects.update(0.0, kind);
    }

    fn trigger_detour(&mut self, pad: Pos) {
        let Some(step) = self
            .effects
            .last_heading
            .or_else(|| segment_heading(&self.path, self.segment_index))
            .map(|heading| heading.step)
        else {
            return;
        };
        let (dx, dy) = (-step.0, -step.1);
        if dx == 0 && dy == 0 {
            return;
        }
        let mut forced = vec![pad];
        let mut current = pad;
        loop {
            let next = current.offset(dx, dy);
            if !self.grid.is_walkable(next) {
                break;
            }
            forced.push(next);
            current = next;
        }
        if forced.len() < 2 {
            return;
        }
        let onward = compute_path_from(&self.grid, current);
        if onward.is_empty() {
            return;
        }
        forced.extend(onward.into_iter().skip(1));
        self.apply_path(forced);
    }

    fn trigger_rewind(&mut self) {
        let restart = compute_path(&self.grid);
        if restart.is_empty() {
            return;
        }
        self.apply_path(restart);
        self.effects.clear_for_rewind();
    }

    fn apply_path(&mut self, path: Vec<Pos>) {
        if path.is_empty() {
            return;
        }
        self.lengths = segment_lengths(&path);
        self.path = path;
        self.segment_index = 0;
        self.segment_progress = 0.0;
        self.finished = false;
        self.effects.last_heading = None;
        self.effects.clear_gravity();
        self.effects.neutral_slow_timer = 0.0;
        self.world_pos = self.world_position();
    }

    fn update_hazard(&mut self, delta: f64) {
        let pos = self.world_pos;
        let effects = &mut self.effects;
        let Some(hazard) = self.hazard.as_mut().filter(|hazard| hazard.is_placed()) else {
            effects.area_timer = 0.0;
            effects.clear_gravity();
            return;
        };
        let Some(cell) = hazard.cell else {
            return;
        };
        if hazard.kind == HazardKind::Gravity {
            let center = cell.center();
            let (dx, dy) = (center.x - pos.x, center.y - pos.y);
            let distance = dx.hypot(dy);
            if distance <= HAZARD_RADIUS {
                let norm = if distance == 0.0 { 0.0 } else { 1.0 / distance };
                let direction = Point::new(dx * norm, dy * norm);
                effects.gravity = Some(GravityPull {
                    direction,
                    distance,
                });
                effects.gravity_offset = Some(Point::new(
                    direction.x * GRAVITY_VISUAL_PULL,
                    direction.y * GRAVITY_VISUAL_PULL,
                ));
            } else {
                effects.clear_gravity();
            }
            effects.area_timer = 0.0;
            return;
        }
        effects.clear_gravity();
        match hazard.kind {
            HazardKind::Radius => {
                if hazard.contains_point(pos) {
                    effects.area_timer = (effects.area_timer + delta).min(FREEZE_BUILDUP);
                } else {
                    let decay_rate = FREEZE_BUILDUP / HAZARD_LINGER;
                    effects.area_timer = (effects.area_timer - decay_rate * delta).max(0.0);
                }
            }
            HazardKind::Lightning => {
                hazard.cooldown = (hazard.cooldown - delta).max(0.0);
                if hazard.in_strike_range(pos)
                    && hazard.cooldown <= 0.0
                    && effects.stun_timer <= 0.0
                {
                    effects.stun_timer = LIGHTNING_STUN;
                    hazard.cooldown = LIGHTNING_COOLDOWN;
                }
                effects.area_timer = 0.0;
            }
            HazardKind::Row | HazardKind::Column => {
                if hazard.contains_point(pos) {
                    hazard.effect_timer = HAZARD_LINGER;
                } else if hazard.effect_timer > 0.0 {
                    hazard.effect_timer = (hazard.effect_timer - delta).max(0.0);
                }
                effects.area_timer = hazard.effect_timer;
            }
            HazardKind::Gravity => {}
        }
    }

    fn update_neutral_hazards(&mut self, delta: f64) {
        let pos = self.world_pos;
        for hazard in &mut self.neutrals {
            hazard.cooldown = (hazard.cooldown - delta).max(0.0);
            if hazard.effect_timer > 0.0 {
                hazard.effect_timer = (hazard.effect_timer - delta).max(0.0);
            }
            if !hazard.is_placed() || !hazard.contains_point(pos) {
                continue;
            }
            if hazard.kind == HazardKind::Lightning {
                if hazard.cooldown <= 0.0 && self.effects.stun_timer <= 0.0 {
                    self.effects.stun_timer = LIGHTNING_STUN;
                    hazard.cooldown = LIGHTNING_COOLDOWN;
                }
            } else {
                self.effects.neutral_slow_timer = PAD_EFFECT_DURATION;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::FIXED_TIMESTEP;
    use crate::hazard::Hazard;

    fn run_to_end(runner: &mut Runner) {
        for _ in 0..200_000 {
            if runner.is_finished() {
                break;
            }
            runner.advance(FIXED_TIMESTEP);
        }
    }

    #[test]
    fn speed_pad_fires_once_and_flips() {
        let mut grid = Grid::empty();
        grid.set_cell(Pos::new(10, 15), Cell::Pad(PadKind::Speed));
        let mut runner = Runner::new(grid, None, NeutralHazards::new());
        run_to_end(&mut runner);
        assert_eq!(
            runner.grid().get(Pos::new(10, 15)),
            Some(Cell::SpentPad(PadKind::Speed))
        );
        assert!(runner.elapsed() < 22.0 / RUNNER_SPEED);
    }

    #[test]
    fn stone_pad_locks_until_heading_changes() {
        let mut grid = Grid::empty();
        grid.set_cell(Pos::new(10, 15), Cell::Pad(PadKind::Stone));
        let mut runner = Runner::new(grid, None, NeutralHazards::new());
        let mut locked_seen = false;
        for _ in 0..100_000 {
            if runner.is_finished() {
                break;
            }
            runner.advance(FIXED_TIMESTEP);
            locked_seen |= runner.effects().medusa.is_locked();
        }
        assert!(locked_seen);
        assert!(runner.elapsed() > 22.0 / RUNNER_SPEED + 1.0);
    }

    #[test]
    fn detour_pad_pushes_runner_back() {
        let mut grid = Grid::empty();
        grid.set_cell(Pos::new(10, 10), Cell::Pad(PadKind::Detour));
        let mut runner = Runner::new(grid, None, NeutralHazards::new());
        let mut max_y_after_pad = 0.0_f64;
        let mut fired = false;
        for _ in 0..100_000 {
            if runner.is_finished() {
                break;
            }
            runner.advance(FIXED_TIMESTEP);
            if runner.grid().get(Pos::new(10, 10)) == Some(Cell::SpentPad(PadKind::Detour)) {
                fired = true;
                max_y_after_pad = max_y_after_pad.max(runner.position().y);
            }
        }
        assert!(fired);
        assert!(max_y_after_pad > 15.0);
        assert!(runner.is_finished());
    }

    #[test]
    fn rewind_restarts_without_resetting_the_clock() {
        let mut grid = Grid::empty();
        grid.set_cell(Pos::new(10, 8), Cell::Pad(PadKind::Rewind));
        let mut runner = Runner::new(grid, None, NeutralHazards::new());
        let mut last = 0.0;
        let mut fired = false;
        for _ in 0..100_000 {
            if runner.is_finished() {
                break;
            }
            runner.advance(FIXED_TIMESTEP);
            assert!(runner.elapsed() >= last);
            last = runner.elapsed();
            fired |= runner.grid().get(Pos::new(10, 8)) == Some(Cell::SpentPad(PadKind::Rewind));
        }
        assert!(fired);
        assert!(runner.is_finished());
        assert!(runner.elapsed() > 22.0 / RUNNER_SPEED + 3.0);
    }

    #[test]
    fn lightning_stuns_and_cools_down() {
        let hazard = Hazard::placed_at(HazardKind::Lightning, Pos::new(14, 10));
        let mut runner = Runner::new(Grid::empty(), Some(hazard), NeutralHazards::new());
        let mut stunned = false;
        for _ in 0..100_000 {
            if runner.is_finished() {
                break;
            }
            runner.advance(FIXED_TIMESTEP);
            stunned |= runner.effects().stun_timer > 0.0;
        }
        assert!(stunned);
        assert!(runner.elapsed() >= 22.0 / RUNNER_SPEED + LIGHTNING_STUN - 0.05);
    }

    #[test]
    fn neutral_beam_applies_neutral_slow() {
        let mut neutrals = NeutralHazards::new();
        neutrals.push(Hazard::neutral_at(HazardKind::Row, Pos::new(0, 10)));
        let mut runner = Runner::new(Grid::empty(), None, neutrals);
        run_to_end(&mut runner);
        assert!(runner.elapsed() > 22.0 / RUNNER_SPEED + 0.5);
    }

    #[test]
    fn empty_path_finishes_immediately() {
        let mut grid = Grid::empty();
        for x in 0..21 {
            grid.set_cell(Pos::new(x, 4), Cell::Static);
        }
        let mut runner = Runner::new(grid, None, NeutralHazards::new());
        assert!(!runner.has_path());
        runner.advance(FIXED_TIMESTEP);
        assert!(runner.is_finished());
        assert_eq!(runner.elapsed(), 0.0);
    }
}
