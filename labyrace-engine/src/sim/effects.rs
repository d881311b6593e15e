use crate::constants::{
    FREEZE_BUILDUP, FREEZE_MIN_MULT, GRAVITY_MAX_MULT, GRAVITY_MIN_MULT, HAZARD_RADIUS,
    HAZARD_SLOW_MULT, MEDUSA_RELEASE_DOT, MEDUSA_SLOW_MULT, PAD_FAST_MULT, PAD_SLOW_MULT,
};
use crate::grid::Point;
use crate::hazard::HazardKind;

/// Pull exerted by a gravity well on the runner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GravityPull {
    pub direction: Point,
    pub distance: f64,
}

/// Unit heading with its snapped grid step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Heading {
    pub direction: Point,
    pub step: (i32, i32),
}

/// Stone-pad lock.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Medusa {
    #[default]
    Free,
    /// Holds the heading captured when the pad fired, if the runner had one.
    Locked(Option<Point>),
}

impl Medusa {
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(self, Self::Locked(_))
    }
}

/// Status effects carried by a runner between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct Effects {
    pub slow_timer: f64,
    pub fast_timer: f64,
    pub area_timer: f64,
    pub stun_timer: f64,
    pub neutral_slow_timer: f64,
    pub speed_multiplier: f64,
    pub medusa: Medusa,
    pub last_heading: Option<Heading>,
    pub gravity: Option<GravityPull>,
    pub gravity_offset: Option<Point>,
}

impl Default for Effects {
    fn default() -> Self {
        Self {
            slow_timer: 0.0,
            fast_timer: 0.0,
            area_timer: 0.0,
            stun_timer: 0.0,
            neutral_slow_timer: 0.0,
            speed_multiplier: 1.0,
            medusa: Medusa::Free,
            last_heading: None,
            gravity: None,
            gravity_offset: None,
        }
    }
}

fn decay(timer: &mut f64, delta: f64) {
    if *timer > 0.0 {
        *timer = (*timer - delta).max(0.0);
    }
}

/// Freeze-aura multiplier for an accumulated buildup.
#[must_use]
pub fn freeze_multiplier(buildup: f64) -> f64 {
    let ratio = (buildup / FREEZE_BUILDUP).min(1.0);
    HAZARD_SLOW_MULT - (HAZARD_SLOW_MULT - FREEZE_MIN_MULT) * ratio
}

/// Gravity-well multiplier at `distance` from the well centre.
#[must_use]
pub fn gravity_multiplier(distance: f64) -> f64 {
    let ratio = (distance / HAZARD_RADIUS).clamp(0.0, 1.0);
    GRAVITY_MIN_MULT + (GRAVITY_MAX_MULT - GRAVITY_MIN_MULT) * ratio
}

impl Effects {
    /// Decay timers by `delta` and recompute the speed multiplier.
    ///
    /// A stun freezes the fast and area timers along with the runner.
    pub fn update(&mut self, delta: f64, hazard: Option<HazardKind>) {
        decay(&mut self.slow_timer, delta);
        decay(&mut self.stun_timer, delta);
        decay(&mut self.neutral_slow_timer, delta);
        if self.stun_timer > 0.0 {
            self.speed_multiplier = 0.0;
            return;
        }
        decay(&mut self.fast_timer, delta);
        let freeze = hazard == Some(HazardKind::Radius);
        if !freeze {
            decay(&mut self.area_timer, delta);
        }

        let mut multiplier = 1.0;
        if self.slow_timer > 0.0 {
            multiplier *= PAD_SLOW_MULT;
        }
        if self.area_timer > 0.0 {
            multiplier *= if freeze {
                freeze_multiplier(self.area_timer)
            } else {
                HAZARD_SLOW_MULT
            };
        }
        if let Some(pull) = self.gravity {
            multiplier *= gravity_multiplier(pull.distance);
        }
        if self.neutral_slow_timer > 0.0 {
            multiplier *= HAZARD_SLOW_MULT;
        }
        if self.fast_timer > 0.0 {
            multiplier *= PAD_FAST_MULT;
        }
        if self.medusa.is_locked() {
            multiplier *= MEDUSA_SLOW_MULT;
        }
        self.speed_multiplier = multiplier;
    }

    /// Clear the slowdowns a rewind pad cancels. Hazard cooldowns are untouched.
    pub fn clear_for_rewind(&mut self) {
        self.fast_timer = 0.0;
        self.slow_timer = 0.0;
        self.neutral_slow_timer = 0.0;
        self.area_timer = 0.0;
        self.medusa = Medusa::Free;
    }

    /// Release the stone lock once the heading turns away from the locked one.
    pub fn check_medusa_release(&mut self) {
        let (Medusa::Locked(locked), Some(heading)) = (self.medusa, self.last_heading) else {
            return;
        };
        let dot = locked.map_or(1.0, |dir| {
            dir.x * heading.direction.x + dir.y * heading.direction.y
        });
        if dot < MEDUSA_RELEASE_DOT {
            self.medusa = Medusa::Free;
        }
    }

    pub fn clear_gravity(&mut self) {
        self.gravity = None;
        self.gravity_offset = None;
    }
}
