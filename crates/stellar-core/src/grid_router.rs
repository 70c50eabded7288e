//! Risk-weighted A* over a rasterized bounding box.
//!
//! The box is sampled as an N x N lattice: rows follow latitude from
//! `min_lat`, columns follow longitude from `min_lon`. Each cell carries the
//! normalized grid risk at its anchor point. Moving into a cell costs
//! `1 + risk_weight * risk * 10`, so `risk_weight` trades hops against exposure.

use crate::models::{BoundingBox, GeoPoint};
use crate::risk::grid_risk_score;
use crate::scenario::Scenario;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Risk weight for the fastest route.
pub const FASTEST_RISK_WEIGHT: f64 = 0.1;
/// Risk weight for the risk-averse route.
pub const RISK_AVERSE_RISK_WEIGHT: f64 = 1.0;

pub const DEFAULT_GRID_SIZE: usize = 30;
pub const MIN_GRID_SIZE: usize = 2;
pub const MAX_GRID_SIZE: usize = 100;

const RISK_COST_SCALE: f64 = 10.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathfinderConfig {
    /// Cells per side; clamped to `MIN_GRID_SIZE..=MAX_GRID_SIZE`.
    pub grid_size: usize,
    /// Cells with normalized risk above this are never entered.
    pub impassable_risk: Option<f64>,
    /// Padding added around the start/end pair, in degrees.
    pub padding_deg: f64,
    /// Minimum extent of each bbox axis, in degrees.
    pub min_span_deg: f64,
}

impl Default for PathfinderConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            impassable_risk: None,
            padding_deg: 0.01,
            min_span_deg: 0.01,
        }
    }
}

impl PathfinderConfig {
    pub fn effective_grid_size(&self) -> usize {
        self.grid_size.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE)
    }

    /// Search area for a route between `start` and `end`.
    pub fn bbox_for(&self, start: GeoPoint, end: GeoPoint) -> BoundingBox {
        BoundingBox::around(start, end, self.padding_deg, self.min_span_deg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub row: usize,
    pub col: usize,
}

impl GridCell {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    fn manhattan(&self, other: &GridCell) -> usize {
        self.row.abs_diff(other.row) + self.col.abs_diff(other.col)
    }
}

/// Normalized risk lattice over a bounding box. Built per request.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskGrid {
    bbox: BoundingBox,
    size: usize,
    risks: Vec<f64>,
}

impl RiskGrid {
    /// Sample `grid_risk_score / 100` at every cell anchor.
    pub fn build(bbox: BoundingBox, kp: f64, scenario: Scenario, size: usize) -> Self {
        let size = size.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
        let mut grid = Self {
            bbox,
            size,
            risks: Vec::with_capacity(size * size),
        };
        for row in 0..size {
            for col in 0..size {
                let anchor = grid.point_for(GridCell { row, col });
                grid.risks
                    .push(grid_risk_score(kp, anchor.lat, anchor.lon, scenario) / 100.0);
            }
        }
        grid
    }

    /// Grid from explicit row-major risks. Returns `None` unless `risks` is a
    /// non-empty square of side >= 2; values are clamped to [0, 1].
    pub fn from_risks(bbox: BoundingBox, risks: Vec<Vec<f64>>) -> Option<Self> {
        let size = risks.len();
        if size < MIN_GRID_SIZE || risks.iter().any(|row| row.len() != size) {
            return None;
        }
        let risks = risks
            .into_iter()
            .flatten()
            .map(|r| if r.is_finite() { r.clamp(0.0, 1.0) } else { 1.0 })
            .collect();
        Some(Self { bbox, size, risks })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    pub fn contains(&self, cell: GridCell) -> bool {
        cell.row < self.size && cell.col < self.size
    }

    pub fn risk(&self, cell: GridCell) -> Option<f64> {
        if self.contains(cell) {
            Some(self.risks[cell.row * self.size + cell.col])
        } else {
            None
        }
    }

    fn lat_step(&self) -> f64 {
        self.bbox.lat_span() / (self.size - 1) as f64
    }

    fn lon_step(&self) -> f64 {
        self.bbox.lon_span() / (self.size - 1) as f64
    }

    /// Nearest cell to `point`, clamped onto the grid.
    pub fn cell_for(&self, point: GeoPoint) -> GridCell {
        GridCell {
            row: self.axis_index(point.lat - self.bbox.min_lat, self.lat_step()),
            col: self.axis_index(point.lon - self.bbox.min_lon, self.lon_step()),
        }
    }

    fn axis_index(&self, offset: f64, step: f64) -> usize {
        if step <= 0.0 || !offset.is_finite() {
            return 0;
        }
        let index = (offset / step).round();
        if index <= 0.0 {
            0
        } else {
            (index as usize).min(self.size - 1)
        }
    }

    /// Geographic anchor of `cell`.
    pub fn point_for(&self, cell: GridCell) -> GeoPoint {
        GeoPoint {
            lat: self.bbox.min_lat + cell.row as f64 * self.lat_step(),
            lon: self.bbox.min_lon + cell.col as f64 * self.lon_step(),
        }
    }

    fn neighbors(&self, cell: GridCell) -> impl Iterator<Item = GridCell> + '_ {
        let GridCell { row, col } = cell;
        [
            row.checked_sub(1).map(|r| GridCell::new(r, col)),
            Some(GridCell::new(row + 1, col)),
            col.checked_sub(1).map(|c| GridCell::new(row, c)),
            Some(GridCell::new(row, col + 1)),
        ]
        .into_iter()
        .flatten()
        .filter(|next| self.contains(*next))
    }
}

#[derive(Debug, Clone, Copy)]
struct FloatOrd(f64);

impl PartialEq for FloatOrd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for FloatOrd {}

impl PartialOrd for FloatOrd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatOrd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenNode {
    f_score: FloatOrd,
    seq: u64,
    cell: GridCell,
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Equal f-scores pop in insertion order.
        self.f_score
            .cmp(&other.f_score)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Result of a successful search.
#[derive(Debug, Clone, PartialEq)]
pub struct GridSearch {
    pub cells: Vec<GridCell>,
    pub cost: f64,
    pub nodes_visited: usize,
}

/// A* from `start` to `goal`.
///
/// Returns `None` when either endpoint lies outside the grid or the goal
/// cannot be reached. Cells whose risk exceeds `impassable_risk` are never
/// entered; the start cell is exempt since the search begins there.
pub fn search(
    start: GridCell,
    goal: GridCell,
    grid: &RiskGrid,
    risk_weight: f64,
    impassable_risk: Option<f64>,
) -> Option<GridSearch> {
    if !grid.contains(start) || !grid.contains(goal) {
        return None;
    }
    if start == goal {
        return Some(GridSearch {
            cells: vec![start],
            cost: 0.0,
            nodes_visited: 1,
        });
    }

    let risk_weight = if risk_weight.is_finite() {
        risk_weight.max(0.0)
    } else {
        0.0
    };
    let passable = |cell: GridCell| match (impassable_risk, grid.risk(cell)) {
        (Some(limit), Some(risk)) => risk <= limit,
        (None, Some(_)) => true,
        (_, None) => false,
    };

    let mut seq = 0u64;
    let mut open_set: BinaryHeap<Reverse<OpenNode>> = BinaryHeap::new();
    open_set.push(Reverse(OpenNode {
        f_score: FloatOrd(start.manhattan(&goal) as f64),
        seq,
        cell: start,
    }));
    let mut closed_set: HashSet<GridCell> = HashSet::new();
    let mut g_score: HashMap<GridCell, f64> = HashMap::new();
    let mut came_from: HashMap<GridCell, GridCell> = HashMap::new();
    g_score.insert(start, 0.0);

    let mut nodes_visited = 0usize;

    while let Some(Reverse(current)) = open_set.pop() {
        if !closed_set.insert(current.cell) {
            continue;
        }
        nodes_visited += 1;

        let current_g = g_score.get(&current.cell).copied().unwrap_or(f64::INFINITY);
        if current.cell == goal {
            let mut cells = vec![goal];
            let mut cursor = goal;
            while let Some(prev) = came_from.get(&cursor) {
                cells.push(*prev);
                cursor = *prev;
            }
            cells.reverse();
            return Some(GridSearch {
                cells,
                cost: current_g,
                nodes_visited,
            });
        }

        for next in grid.neighbors(current.cell) {
            if closed_set.contains(&next) || !passable(next) {
                continue;
            }
            let risk = grid.risk(next).unwrap_or(1.0);
            let tentative_g = current_g + 1.0 + risk_weight * risk * RISK_COST_SCALE;
            if tentative_g < g_score.get(&next).copied().unwrap_or(f64::INFINITY) {
                came_from.insert(next, current.cell);
                g_score.insert(next, tentative_g);
                seq += 1;
                open_set.push(Reverse(OpenNode {
                    f_score: FloatOrd(tentative_g + next.manhattan(&goal) as f64),
                    seq,
                    cell: next,
                }));
            }
        }
    }

    None
}

/// Cell sequence from `start` to `goal`, or `None` if unreachable.
pub fn find_path(
    start: GridCell,
    goal: GridCell,
    grid: &RiskGrid,
    risk_weight: f64,
) -> Option<Vec<GridCell>> {
    search(start, goal, grid, risk_weight, None).map(|found| found.cells)
}

/// A grid route expressed in coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRoute {
    pub path: Vec<GeoPoint>,
    pub cells: Vec<GridCell>,
    /// True when the search failed and `path` is the straight start-end line.
    pub fallback: bool,
    pub nodes_visited: usize,
}

/// Route between two coordinates over `grid`.
///
/// The first and last vertices are the exact endpoints rather than cell
/// anchors. An unreachable goal yields the two-point straight line.
pub fn route_on_grid(
    grid: &RiskGrid,
    start: GeoPoint,
    end: GeoPoint,
    risk_weight: f64,
    impassable_risk: Option<f64>,
) -> GridRoute {
    let start_cell = grid.cell_for(start);
    let goal_cell = grid.cell_for(end);

    match search(start_cell, goal_cell, grid, risk_weight, impassable_risk) {
        Some(found) => {
            let mut path: Vec<GeoPoint> = found.cells.iter().map(|c| grid.point_for(*c)).collect();
            if path.len() < 2 {
                path = vec![start, end];
            } else {
                let last = path.len() - 1;
                path[0] = start;
                path[last] = end;
            }
            GridRoute {
                path,
                cells: found.cells,
                fallback: false,
                nodes_visited: found.nodes_visited,
            }
        }
        None => GridRoute {
            path: vec![start, end],
            cells: Vec::new(),
            fallback: true,
            nodes_visited: 0,
        },
    }
}
