//! # Obstacle scanning
//!
//! Line-march along the projected trajectory looking for the first cell at
//! or above the obstacle cost threshold. Starting at the predicted pose the
//! march steps a fixed small distance along the current heading, curving with
//! the measured yaw rate while the base is actually translating. Each step
//! checks the maximum cost of the segment covered since the previous step.
//!
//! The march ends on the first of: the cost threshold being met (an obstacle
//! was found), the point leaving the known grid (treated the same as finding
//! no obstacle in range), or the scan range being exhausted.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// Internal
use crate::cost_map::CostGrid;
use crate::ctrl::Params;
use crate::loc::Pose;
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Result of a forward obstacle scan.
#[derive(Debug, Clone, Default)]
pub struct ObstacleScan {
    /// True if the scan terminated on a cell at or above the cost threshold
    pub has_obstacle: bool,

    /// Distance marched before termination, minus the configured stopping
    /// margin. May be negative when an obstacle is inside the margin.
    pub obstacle_dist_m: f64,

    /// Highest cost seen anywhere along the march
    pub peak_cost: f64,

    /// Every pose visited by the march, for trajectory diagnostics only
    pub trajectory: Vec<Pose>,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// March forward from `start`, curving with `start_yawrate_rads` while
/// `start_vel_x_ms` is above the stopped threshold, and report the first
/// obstacle found.
pub fn scan(
    grid: &CostGrid,
    start: &Pose,
    start_vel_x_ms: f64,
    start_yawrate_rads: f64,
    params: &Params,
) -> ObstacleScan {
    // Time taken to cover one step at the current speed, used to curve the
    // march with the measured yaw rate. A stopped base projects straight.
    let step_time_s = if start_vel_x_ms > params.trans_stopped_vel_ms {
        params.scan_step_m / start_vel_x_ms
    } else {
        0.0
    };

    let mut pose = *start;
    let mut last_pose = pose;

    let mut has_obstacle = false;
    let mut obstacle_dist_m = 0.0;
    let mut peak_cost = 0f64;
    let mut trajectory = Vec::new();

    while obstacle_dist_m < params.max_scan_dist_m {
        let cost = grid.max_line_cost(last_pose.position_m, pose.position_m);
        let is_contained = grid.contains(pose.position_m);

        has_obstacle = cost >= params.max_cost;
        peak_cost = peak_cost.max(cost);

        trajectory.push(pose);

        if !is_contained || has_obstacle {
            break;
        }

        last_pose = pose;
        pose = Pose {
            position_m: pose.body_to_world(Vector2::new(params.scan_step_m, 0.0)),
            yaw_rad: wrap_pi(pose.yaw_rad + start_yawrate_rads * step_time_s),
        };

        obstacle_dist_m += params.scan_step_m;
    }

    ObstacleScan {
        has_obstacle,
        obstacle_dist_m: obstacle_dist_m - params.min_stop_dist_m,
        peak_cost,
        trajectory,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// 40 m x 4 m grid of 0.05 m cells with the origin at (-2, -2).
    fn long_grid() -> CostGrid {
        CostGrid::new(800, 80, 0.05, Vector2::new(-2.0, -2.0))
    }

    #[test]
    fn test_clear_grid_runs_off_the_map() {
        let grid = CostGrid::new(80, 80, 0.05, Vector2::new(-2.0, -2.0));
        let pose = Pose::new(0.0, 0.0, 0.0);
        let params = Params::default();

        let scan = scan(&grid, &pose, 0.3, 0.0, &params);

        // Leaving the grid ends the scan without flagging an obstacle
        assert!(!scan.has_obstacle);
        assert_eq!(scan.peak_cost, 0.0);
        // Roughly 2 m of marching before the edge, minus the stop margin
        assert!(scan.obstacle_dist_m > 1.9 - params.min_stop_dist_m);
        assert!(scan.obstacle_dist_m < 2.1 - params.min_stop_dist_m);
        assert!(!scan.trajectory.is_empty());
    }

    #[test]
    fn test_scan_range_limit() {
        let grid = long_grid();
        let pose = Pose::new(-1.5, 0.0, 0.0);
        let params = Params::default();

        let scan = scan(&grid, &pose, 0.3, 0.0, &params);

        assert!(!scan.has_obstacle);
        assert!((scan.obstacle_dist_m - (params.max_scan_dist_m - params.min_stop_dist_m)).abs()
            < 2.0 * params.scan_step_m);
    }

    #[test]
    fn test_wall_ahead_found() {
        let mut grid = long_grid();
        grid.set_world_rect(Vector2::new(1.0, -2.0), Vector2::new(1.5, 2.0), 255);

        let pose = Pose::new(0.0, 0.0, 0.0);
        let params = Params::default();

        let scan = scan(&grid, &pose, 0.3, 0.0, &params);

        assert!(scan.has_obstacle);
        assert_eq!(scan.peak_cost, 1.0);
        // Obstacle at ~1 m, so distance after margin is ~1 - min_stop_dist
        assert!((scan.obstacle_dist_m - (1.0 - params.min_stop_dist_m)).abs() < 0.1);
    }

    #[test]
    fn test_obstacle_inside_margin_is_negative() {
        let mut grid = long_grid();
        grid.set_world_rect(Vector2::new(0.2, -2.0), Vector2::new(0.5, 2.0), 255);

        let pose = Pose::new(0.0, 0.0, 0.0);
        let params = Params::default();

        let scan = scan(&grid, &pose, 0.3, 0.0, &params);

        assert!(scan.has_obstacle);
        assert!(scan.obstacle_dist_m < 0.0);
    }

    #[test]
    fn test_march_curves_with_yawrate() {
        let grid = long_grid();
        let pose = Pose::new(0.0, 0.0, 0.0);
        let params = Params::default();

        // Translating at 0.5 m/s while yawing: the marched trajectory bends
        let curved = scan(&grid, &pose, 0.5, 0.5, &params);
        let last = curved.trajectory.last().unwrap();
        assert!(last.position_m[1].abs() > 0.1);

        // Below the stopped threshold the projection is straight
        let straight = scan(&grid, &pose, 0.0, 0.5, &params);
        for p in &straight.trajectory {
            assert_eq!(p.position_m[1], 0.0);
        }
    }
}
