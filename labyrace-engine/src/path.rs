//! Grid pathfinding.
//!
//! 8-directional A* over walkable cells. Diagonal moves may not cut a corner:
//! both orthogonal neighbours of a diagonal step must be walkable. Paths
//! returned by [`compute_path`] are extended with a virtual node below the
//! entrance and one above the exit so runners enter and leave the grid.
//!
//! The open list is a binary heap ordered by `(f, insertion sequence)`, so
//! among equal `f` scores the node pushed first is expanded first.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashSet;

use crate::constants::{
    CELL_COUNT, ENTRANCE_X, GRID_SIZE_I32, PAD_SCORE_DETOUR, PAD_SCORE_REWIND, PAD_SCORE_SLOW,
    PAD_SCORE_SPEED, PAD_SCORE_STONE, RUNNER_SPEED,
};
use crate::grid::{Grid, PadKind, Pos};

struct Move {
    dx: i32,
    dy: i32,
    cost: f64,
    diagonal: bool,
}

impl Move {
    const fn straight(dx: i32, dy: i32) -> Self {
        Self {
            dx,
            dy,
            cost: 1.0,
            diagonal: false,
        }
    }

    const fn diagonal(dx: i32, dy: i32) -> Self {
        Self {
            dx,
            dy,
            cost: std::f64::consts::SQRT_2,
            diagonal: true,
        }
    }
}

/// E, W, S, N, then SE, SW, NE, NW.
const MOVES: [Move; 8] = [
    Move::straight(1, 0),
    Move::straight(-1, 0),
    Move::straight(0, 1),
    Move::straight(0, -1),
    Move::diagonal(1, 1),
    Move::diagonal(-1, 1),
    Move::diagonal(1, -1),
    Move::diagonal(-1, -1),
];

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f64,
    seq: u64,
    g: f64,
    pos: Pos,
}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenNode {}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    // Reversed so the max-heap pops the lowest f, then the oldest entry.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Offsets of the eight neighbours, in search order.
pub(crate) fn neighbor_offsets() -> impl Iterator<Item = (i32, i32)> {
    MOVES.iter().map(|step| (step.dx, step.dy))
}

fn heuristic(from: Pos, goal: Pos) -> f64 {
    f64::from(goal.x - from.x).hypot(f64::from(goal.y - from.y))
}

fn can_pass_diagonal(grid: &Grid, from: Pos, dx: i32, dy: i32) -> bool {
    grid.is_walkable(from.offset(dx, 0)) && grid.is_walkable(from.offset(0, dy))
}

/// Shortest cell path from `start` to `goal`, inclusive; empty when unreachable.
#[must_use]
pub fn find_path(grid: &Grid, start: Pos, goal: Pos) -> Vec<Pos> {
    let Some(start_index) = start.index() else {
        return Vec::new();
    };
    let mut g_score = [f64::INFINITY; CELL_COUNT];
    let mut came_from: [Option<usize>; CELL_COUNT] = [None; CELL_COUNT];
    let mut closed = [false; CELL_COUNT];
    let mut open = BinaryHeap::new();
    let mut seq = 0u64;

    g_score[start_index] = 0.0;
    open.push(OpenNode {
        f: heuristic(start, goal),
        seq,
        g: 0.0,
        pos: start,
    });

    while let Some(current) = open.pop() {
        let Some(current_index) = current.pos.index() else {
            continue;
        };
        if closed[current_index] {
            continue;
        }
        closed[current_index] = true;
        if current.pos == goal {
            return reconstruct(&came_from, current_index);
        }
        for step in &MOVES {
            let next = current.pos.offset(step.dx, step.dy);
            let Some(next_index) = next.index() else {
                continue;
            };
            if !grid.is_walkable(next) {
                continue;
            }
            if step.diagonal && !can_pass_diagonal(grid, current.pos, step.dx, step.dy) {
                continue;
            }
            let tentative = current.g + step.cost;
            if tentative >= g_score[next_index] {
                continue;
            }
            came_from[next_index] = Some(current_index);
            g_score[next_index] = tentative;
            seq += 1;
            open.push(OpenNode {
                f: tentative + heuristic(next, goal),
                seq,
                g: tentative,
                pos: next,
            });
        }
    }
    Vec::new()
}

fn reconstruct(came_from: &[Option<usize>; CELL_COUNT], goal_index: usize) -> Vec<Pos> {
    let mut path = vec![Pos::from_index(goal_index)];
    let mut cursor = goal_index;
    while let Some(previous) = came_from[cursor] {
        path.push(Pos::from_index(previous));
        cursor = previous;
    }
    path.reverse();
    path
}

/// Virtual node one row below the entrance.
#[must_use]
pub const fn virtual_entrance() -> Pos {
    Pos::new(ENTRANCE_X, GRID_SIZE_I32)
}

/// Virtual node one row above the exit.
#[must_use]
pub const fn virtual_exit() -> Pos {
    Pos::new(ENTRANCE_X, -1)
}

/// Entrance-to-exit path extended with both virtual nodes; empty when blocked.
#[must_use]
pub fn compute_path(grid: &Grid) -> Vec<Pos> {
    let raw = find_path(grid, Pos::entrance(), Pos::exit());
    if raw.is_empty() {
        return raw;
    }
    let mut extended = Vec::with_capacity(raw.len() + 2);
    extended.push(virtual_entrance());
    extended.extend(raw);
    extended.push(virtual_exit());
    extended
}

/// Path from an arbitrary cell to the exit, followed by the virtual exit node.
#[must_use]
pub fn compute_path_from(grid: &Grid, start: Pos) -> Vec<Pos> {
    let mut path = find_path(grid, start, Pos::exit());
    if !path.is_empty() {
        path.push(virtual_exit());
    }
    path
}

/// Whether the entrance still reaches the exit.
#[must_use]
pub fn has_path(grid: &Grid) -> bool {
    !find_path(grid, Pos::entrance(), Pos::exit()).is_empty()
}

/// Euclidean lengths between consecutive cell centres.
#[must_use]
pub fn segment_lengths(path: &[Pos]) -> Vec<f64> {
    path.windows(2)
        .map(|pair| pair[0].center().distance(pair[1].center()))
        .collect()
}

/// Number of heading changes along the path.
#[must_use]
pub fn turn_count(path: &[Pos]) -> usize {
    if path.len() < 3 {
        return 0;
    }
    let heading = |from: Pos, to: Pos| ((to.x - from.x).signum(), (to.y - from.y).signum());
    path.windows(2)
        .map(|pair| heading(pair[0], pair[1]))
        .collect::<Vec<_>>()
        .windows(2)
        .filter(|pair| pair[0] != pair[1])
        .count()
}

/// Fixed search score for a pad lying on the path.
#[must_use]
pub const fn pad_score(kind: PadKind) -> f64 {
    match kind {
        PadKind::Speed => PAD_SCORE_SPEED,
        PadKind::Slow => PAD_SCORE_SLOW,
        PadKind::Detour => PAD_SCORE_DETOUR,
        PadKind::Stone => PAD_SCORE_STONE,
        PadKind::Rewind => PAD_SCORE_REWIND,
    }
}

/// Path plus the per-segment measurements the evaluator consumes.
#[derive(Debug, Clone, PartialEq)]
pub struct PathInfo {
    pub path: Vec<Pos>,
    pub lengths: Vec<f64>,
    pub total_distance: f64,
    pub pad_score: f64,
}

impl PathInfo {
    /// Path nodes that lie on the grid, without the virtual boundary nodes.
    pub fn cells(&self) -> impl Iterator<Item = Pos> + '_ {
        self.path.iter().copied().filter(|pos| pos.is_inside())
    }

    /// Walk segments as `(arrival cell, base traversal time, segment index)`.
    pub fn segments(&self) -> impl Iterator<Item = (Pos, f64, usize)> + '_ {
        self.path
            .iter()
            .skip(1)
            .zip(&self.lengths)
            .enumerate()
            .map(|(index, (cell, length))| (*cell, length / RUNNER_SPEED, index + 1))
    }
}

/// Compute the path and its measurements; `None` when the maze is blocked.
#[must_use]
pub fn analyze_path(grid: &Grid) -> Option<PathInfo> {
    let path = compute_path(grid);
    if path.is_empty() {
        return None;
    }
    let lengths = segment_lengths(&path);
    let total_distance = lengths.iter().sum();
    let mut seen = HashSet::new();
    let pad_score = path
        .iter()
        .filter(|pos| seen.insert(**pos))
        .filter_map(|pos| grid.get(*pos).and_then(|cell| cell.pad_kind()))
        .map(pad_score)
        .sum();
    Some(PathInfo {
        path,
        lengths,
        total_distance,
        pad_score,
    })
}
