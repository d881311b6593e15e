//! Hazards ("specials"): area effects anchored on one cell.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

use crate::constants::{HAZARD_RADIUS, LIGHTNING_RADIUS, RUNNER_RADIUS};
use crate::grid::{Point, Pos};
use crate::numbers::i32_to_f64;

/// Hazard behaviour family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardKind {
    /// Freeze aura: slowdown builds up while inside the radius.
    Radius,
    /// Horizontal beam covering one row.
    Row,
    /// Vertical beam covering one column.
    Column,
    /// Gravity well pulling and slowing inside the radius.
    Gravity,
    /// Lightning tower stunning runners in range.
    Lightning,
}

impl HazardKind {
    pub const ALL: [Self; 5] = [
        Self::Radius,
        Self::Row,
        Self::Column,
        Self::Gravity,
        Self::Lightning,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Radius => "radius",
            Self::Row => "row",
            Self::Column => "column",
            Self::Gravity => "gravity",
            Self::Lightning => "lightning",
        }
    }

    #[must_use]
    pub const fn is_beam(self) -> bool {
        matches!(self, Self::Row | Self::Column)
    }
}

impl fmt::Display for HazardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HazardKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown hazard kind '{s}'"))
    }
}

/// Hazard instance with its transient timers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub kind: HazardKind,
    #[serde(default)]
    pub cell: Option<Pos>,
    #[serde(default)]
    pub effect_timer: f64,
    #[serde(default)]
    pub cooldown: f64,
    #[serde(default)]
    pub flash_timer: f64,
    #[serde(default)]
    pub neutral: bool,
}

/// Map-generated hazards shared by both mazes of a match.
pub type NeutralHazards = SmallVec<[Hazard; 4]>;

impl Hazard {
    /// Unplaced hazard of `kind`.
    #[must_use]
    pub const fn new(kind: HazardKind) -> Self {
        Self {
            kind,
            cell: None,
            effect_timer: 0.0,
            cooldown: 0.0,
            flash_timer: 0.0,
            neutral: false,
        }
    }

    #[must_use]
    pub const fn placed_at(kind: HazardKind, cell: Pos) -> Self {
        let mut hazard = Self::new(kind);
        hazard.cell = Some(cell);
        hazard
    }

    #[must_use]
    pub const fn neutral_at(kind: HazardKind, cell: Pos) -> Self {
        let mut hazard = Self::placed_at(kind, cell);
        hazard.neutral = true;
        hazard
    }

    #[must_use]
    pub const fn is_placed(&self) -> bool {
        self.cell.is_some()
    }

    /// Copy for a new run: transient timers cleared, cooldown carried over.
    #[must_use]
    pub fn fresh_copy(&self) -> Self {
        Self {
            kind: self.kind,
            cell: self.cell,
            effect_timer: 0.0,
            cooldown: self.cooldown.max(0.0),
            flash_timer: 0.0,
            neutral: self.neutral,
        }
    }

    /// Whether `point` lies inside the hazard's area of effect.
    #[must_use]
    pub fn contains_point(&self, point: Point) -> bool {
        let Some(cell) = self.cell else {
            return false;
        };
        match self.kind {
            HazardKind::Radius | HazardKind::Gravity | HazardKind::Lightning => {
                cell.center().distance(point) <= HAZARD_RADIUS
            }
            HazardKind::Row => {
                let top = i32_to_f64(cell.y);
                point.y >= top && point.y <= top + 1.0
            }
            HazardKind::Column => {
                let left = i32_to_f64(cell.x);
                point.x >= left && point.x <= left + 1.0
            }
        }
    }

    /// Whether `point` is close enough for a lightning strike.
    #[must_use]
    pub fn in_strike_range(&self, point: Point) -> bool {
        self.cell
            .is_some_and(|cell| cell.center().distance(point) <= LIGHTNING_RADIUS + RUNNER_RADIUS)
    }

    /// Whether a path node at `cell` sits on this beam's row or column.
    #[must_use]
    pub fn beam_covers(&self, cell: Pos) -> bool {
        match (self.kind, self.cell) {
            (HazardKind::Row, Some(anchor)) => cell.y == anchor.y,
            (HazardKind::Column, Some(anchor)) => cell.x == anchor.x,
            _ => false,
        }
    }
}

/// Fresh copies of a neutral hazard list for one run.
#[must_use]
pub fn fresh_neutrals(list: &[Hazard]) -> NeutralHazards {
    list.iter().map(Hazard::fresh_copy).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_parse_from_wire_names() {
        for kind in HazardKind::ALL {
            assert_eq!(kind.as_str().parse::<HazardKind>(), Ok(kind));
        }
        assert!("laser".parse::<HazardKind>().is_err());
        let json = serde_json::to_string(&HazardKind::Radius).unwrap();
        assert_eq!(json, "\"radius\"");
    }

    #[test]
    fn unplaced_hazard_contains_nothing() {
        let hazard = Hazard::new(HazardKind::Radius);
        assert!(!hazard.contains_point(Point::new(10.5, 10.5)));
        assert!(!hazard.in_strike_range(Point::new(10.5, 10.5)));
    }

    #[test]
    fn radius_area_is_a_disc() {
        let hazard = Hazard::placed_at(HazardKind::Gravity, Pos::new(5, 5));
        assert!(hazard.contains_point(Point::new(9.5, 5.5)));
        assert!(!hazard.contains_point(Point::new(9.6, 5.5)));
    }

    #[test]
    fn beams_cover_a_band() {
        let row = Hazard::placed_at(HazardKind::Row, Pos::new(3, 8));
        assert!(row.contains_point(Point::new(17.0, 8.5)));
        assert!(!row.contains_point(Point::new(17.0, 9.5)));
        assert!(row.beam_covers(Pos::new(0, 8)));
        let column = Hazard::placed_at(HazardKind::Column, Pos::new(3, 8));
        assert!(column.contains_point(Point::new(3.2, 0.5)));
        assert!(!column.beam_covers(Pos::new(4, 8)));
    }

    #[test]
    fn fresh_copy_clears_transient_timers() {
        let mut hazard = Hazard::neutral_at(HazardKind::Lightning, Pos::new(1, 1));
        hazard.effect_timer = 2.0;
        hazard.flash_timer = 0.5;
        hazard.cooldown = 1.0;
        let copy = hazard.fresh_copy();
        assert_eq!(copy.effect_timer, 0.0);
        assert_eq!(copy.flash_timer, 0.0);
        assert_eq!(copy.cooldown, 1.0);
        assert!(copy.neutral);
    }
}
