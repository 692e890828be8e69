//! # Cost grid
//!
//! A read-only view over the local obstacle cost grid. Each cell holds a raw
//! cost in [0, 255] which all queries normalise into [0, 1]. The grid is
//! owned by the caller and handed to the controller by reference every cycle,
//! as its contents may have changed between cycles.
//!
//! Point queries clamp out-of-bounds world coordinates to the nearest valid
//! cell; "is this point on the known grid at all" is a separate question
//! answered by [`CostGrid::contains`], which the obstacle scan uses to tell
//! "ran off the map" apart from "high cost".
//!
//! Line queries rasterise the world-space segment into grid cells with an
//! integer line traversal (inclusive of both endpoints) and reduce the
//! per-cell cost by mean or max. A degenerate zero-length segment covers
//! exactly one cell, so the mean is always well defined.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// The raw cell cost that normalises to a cost of 1.0.
pub const MAX_RAW_COST: u8 = u8::MAX;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The local cost grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CostGrid {
    /// Raw cell costs, indexed `[x, y]`.
    cells: Array2<u8>,

    /// Side length of a (square) cell.
    cell_size_m: f64,

    /// World position of the lower-left corner of cell (0, 0).
    origin_m: Vector2<f64>,
}

/// Integer line traversal between two cells, inclusive of both endpoints.
///
/// Standard Bresenham walk, yielding every cell the segment passes through
/// on its way from start to end.
pub struct LineIter {
    x: isize,
    y: isize,
    end: (isize, isize),
    dx: isize,
    dy: isize,
    sx: isize,
    sy: isize,
    err: isize,
    done: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CostGrid {
    /// Create a new zero-cost grid of the given dimensions.
    pub fn new(
        num_cells_x: usize,
        num_cells_y: usize,
        cell_size_m: f64,
        origin_m: Vector2<f64>,
    ) -> Self {
        Self {
            cells: Array2::zeros((num_cells_x, num_cells_y)),
            cell_size_m,
            origin_m,
        }
    }

    /// Create a grid from an existing cell array.
    pub fn from_cells(cells: Array2<u8>, cell_size_m: f64, origin_m: Vector2<f64>) -> Self {
        Self {
            cells,
            cell_size_m,
            origin_m,
        }
    }

    /// Number of cells in (x, y).
    pub fn num_cells(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size_m
    }

    /// Set the raw cost of a single cell.
    pub fn set_cell(&mut self, cell_x: usize, cell_y: usize, raw_cost: u8) {
        self.cells[[cell_x, cell_y]] = raw_cost;
    }

    /// Set the raw cost of every cell whose centre lies within the given
    /// world-space rectangle.
    pub fn set_world_rect(&mut self, min_m: Vector2<f64>, max_m: Vector2<f64>, raw_cost: u8) {
        let (num_x, num_y) = self.cells.dim();

        for ix in 0..num_x {
            for iy in 0..num_y {
                let centre = self.origin_m
                    + Vector2::new(
                        (ix as f64 + 0.5) * self.cell_size_m,
                        (iy as f64 + 0.5) * self.cell_size_m,
                    );
                if centre[0] >= min_m[0]
                    && centre[0] <= max_m[0]
                    && centre[1] >= min_m[1]
                    && centre[1] <= max_m[1]
                {
                    self.cells[[ix, iy]] = raw_cost;
                }
            }
        }
    }

    /// True if the world point lies on the known grid.
    pub fn contains(&self, point_m: Vector2<f64>) -> bool {
        self.world_to_grid(point_m).is_some()
    }

    /// The normalised cost at a world point, clamped onto the grid.
    pub fn cost_at(&self, point_m: Vector2<f64>) -> f64 {
        let (ix, iy) = self.world_to_grid_clamped(point_m);
        self.cells[[ix, iy]] as f64 / MAX_RAW_COST as f64
    }

    /// The mean normalised cost of the cells along the world-space segment
    /// between the two points.
    ///
    /// Both endpoints are clamped onto the grid. A zero-length segment
    /// reduces to the cost of the single cell containing it.
    pub fn avg_line_cost(&self, point_0_m: Vector2<f64>, point_1_m: Vector2<f64>) -> f64 {
        let mut sum = 0f64;
        let mut count = 0usize;

        for (ix, iy) in self.line_cells(point_0_m, point_1_m) {
            sum += self.cells[[ix, iy]] as f64 / MAX_RAW_COST as f64;
            count += 1;
        }

        // The traversal is inclusive of both endpoints so always yields at
        // least one cell
        sum / count as f64
    }

    /// The maximum normalised cost of the cells along the world-space segment
    /// between the two points.
    pub fn max_line_cost(&self, point_0_m: Vector2<f64>, point_1_m: Vector2<f64>) -> f64 {
        let mut max_raw = 0u8;

        for (ix, iy) in self.line_cells(point_0_m, point_1_m) {
            max_raw = max_raw.max(self.cells[[ix, iy]]);
        }

        max_raw as f64 / MAX_RAW_COST as f64
    }

    /// Iterate the cells under the segment between two world points, both
    /// clamped onto the grid.
    fn line_cells(&self, point_0_m: Vector2<f64>, point_1_m: Vector2<f64>) -> LineIter {
        let start = self.world_to_grid_clamped(point_0_m);
        let end = self.world_to_grid_clamped(point_1_m);
        LineIter::new(start, end)
    }

    /// Convert a world point to grid indices, or `None` if off the grid.
    fn world_to_grid(&self, point_m: Vector2<f64>) -> Option<(usize, usize)> {
        let (num_x, num_y) = self.cells.dim();

        let gx = ((point_m[0] - self.origin_m[0]) / self.cell_size_m).floor();
        let gy = ((point_m[1] - self.origin_m[1]) / self.cell_size_m).floor();

        if gx < 0.0 || gy < 0.0 || gx >= num_x as f64 || gy >= num_y as f64 {
            None
        } else {
            Some((gx as usize, gy as usize))
        }
    }

    /// Convert a world point to grid indices, clamping out-of-bounds points
    /// to the nearest valid cell.
    fn world_to_grid_clamped(&self, point_m: Vector2<f64>) -> (usize, usize) {
        let (num_x, num_y) = self.cells.dim();

        let gx = ((point_m[0] - self.origin_m[0]) / self.cell_size_m).floor();
        let gy = ((point_m[1] - self.origin_m[1]) / self.cell_size_m).floor();

        let ix = (gx.max(0.0) as usize).min(num_x - 1);
        let iy = (gy.max(0.0) as usize).min(num_y - 1);

        (ix, iy)
    }
}

impl LineIter {
    pub fn new(start: (usize, usize), end: (usize, usize)) -> Self {
        let (x0, y0) = (start.0 as isize, start.1 as isize);
        let (x1, y1) = (end.0 as isize, end.1 as isize);

        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();

        Self {
            x: x0,
            y: y0,
            end: (x1, y1),
            dx,
            dy,
            sx: if x0 < x1 { 1 } else { -1 },
            sy: if y0 < y1 { 1 } else { -1 },
            err: dx + dy,
            done: false,
        }
    }
}

impl Iterator for LineIter {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let out = (self.x as usize, self.y as usize);

        if (self.x, self.y) == self.end {
            self.done = true;
        } else {
            let e2 = 2 * self.err;
            if e2 >= self.dy {
                self.err += self.dy;
                self.x += self.sx;
            }
            if e2 <= self.dx {
                self.err += self.dx;
                self.y += self.sy;
            }
        }

        Some(out)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// 10x10 grid of 0.1 m cells with the origin at (0, 0).
    fn empty_grid() -> CostGrid {
        CostGrid::new(10, 10, 0.1, Vector2::new(0.0, 0.0))
    }

    #[test]
    fn test_line_iter_inclusive() {
        let cells: Vec<_> = LineIter::new((0, 0), (3, 0)).collect();
        assert_eq!(cells, vec![(0, 0), (1, 0), (2, 0), (3, 0)]);

        // Degenerate line yields exactly the single cell
        let cells: Vec<_> = LineIter::new((4, 7), (4, 7)).collect();
        assert_eq!(cells, vec![(4, 7)]);

        // Diagonals visit both endpoints
        let cells: Vec<_> = LineIter::new((0, 0), (2, 2)).collect();
        assert_eq!(cells.first(), Some(&(0, 0)));
        assert_eq!(cells.last(), Some(&(2, 2)));
    }

    #[test]
    fn test_contains() {
        let grid = empty_grid();

        assert!(grid.contains(Vector2::new(0.05, 0.05)));
        assert!(grid.contains(Vector2::new(0.95, 0.95)));
        assert!(!grid.contains(Vector2::new(-0.05, 0.5)));
        assert!(!grid.contains(Vector2::new(1.05, 0.5)));
    }

    #[test]
    fn test_point_queries_clamp() {
        let mut grid = empty_grid();
        grid.set_cell(0, 5, 255);

        // A point off the left edge clamps to the first column
        assert_eq!(grid.cost_at(Vector2::new(-3.0, 0.55)), 1.0);
    }

    #[test]
    fn test_avg_cost_degenerate_segment() {
        let mut grid = empty_grid();
        grid.set_cell(5, 5, 255);

        let p = Vector2::new(0.55, 0.55);

        // Zero-length segment is defined as the single cell cost, no NaN
        let cost = grid.avg_line_cost(p, p);
        assert_eq!(cost, 1.0);
    }

    #[test]
    fn test_line_costs() {
        let mut grid = empty_grid();

        // Half the row at y-cell 5 is at raw cost 100
        for ix in 0..5 {
            grid.set_cell(ix, 5, 100);
        }

        let p0 = Vector2::new(0.05, 0.55);
        let p1 = Vector2::new(0.95, 0.55);

        let max = grid.max_line_cost(p0, p1);
        assert!((max - 100.0 / 255.0).abs() < 1e-9);

        // 5 of the 10 cells covered carry cost
        let avg = grid.avg_line_cost(p0, p1);
        assert!((avg - 0.5 * 100.0 / 255.0).abs() < 1e-9);
    }
}
