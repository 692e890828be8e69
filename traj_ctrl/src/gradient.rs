//! # Cost gradient estimation
//!
//! Central-difference estimates of how the grid cost changes with small
//! motions of the predicted pose. These feed the steering-bias terms of the
//! control law: they are a repulsive-force surrogate, not a true potential
//! field, and the fixed perturbation offsets are tuned against the gain and
//! acceleration constants elsewhere. Keep them literal central differences.
//!
//! The x and y axes sample the *average line cost* between the predicted
//! position and the perturbed point rather than a point cost, which smooths
//! out grid discretisation noise. The yaw axis samples a short segment
//! straddling the perturbed heading on both sides, so it measures
//! rotation-induced cost change rather than translation.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Rotation2, Vector2};
use serde::Serialize;

// Internal
use crate::cost_map::CostGrid;
use crate::ctrl::Params;
use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Cost and cost gradients around a predicted pose.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct CostGradient {
    /// Normalised cost at the predicted position itself
    pub center: f64,

    /// Cost change per metre of forward motion
    pub x: f64,

    /// Cost change per metre of lateral motion
    pub y: f64,

    /// Cost change per radian of rotation
    pub yaw: f64,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Estimate the cost gradients around `pose`.
///
/// `cost_y_lookahead_m` shifts the lateral sampling forward of the pose, so
/// that at speed the lateral gradient is evaluated where the base is about to
/// be rather than where it is.
pub fn estimate(
    grid: &CostGrid,
    pose: &Pose,
    cost_y_lookahead_m: f64,
    params: &Params,
) -> CostGradient {
    let pos = pose.position_m;

    let center = grid.cost_at(pos);

    let x = (grid.avg_line_cost(pos, pose.body_to_world(Vector2::new(params.delta_x_m, 0.0)))
        - grid.avg_line_cost(pos, pose.body_to_world(Vector2::new(-params.delta_x_m, 0.0))))
        / params.delta_x_m;

    let y = (grid.avg_line_cost(
        pos,
        pose.body_to_world(Vector2::new(cost_y_lookahead_m, params.delta_y_m)),
    ) - grid.avg_line_cost(
        pos,
        pose.body_to_world(Vector2::new(cost_y_lookahead_m, -params.delta_y_m)),
    )) / params.delta_y_m;

    let yaw = (straddle_cost(grid, pose, params.delta_yaw_rad, params.delta_x_m)
        - straddle_cost(grid, pose, -params.delta_yaw_rad, params.delta_x_m))
        / (2.0 * params.delta_yaw_rad);

    CostGradient { center, x, y, yaw }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Average cost of the segment through the pose rotated by `delta_yaw_rad`,
/// spanning `semi_length_m` both ahead of and behind the position.
fn straddle_cost(grid: &CostGrid, pose: &Pose, delta_yaw_rad: f64, semi_length_m: f64) -> f64 {
    let rot = Rotation2::new(delta_yaw_rad);

    grid.avg_line_cost(
        pose.body_to_world(rot * Vector2::new(semi_length_m, 0.0)),
        pose.body_to_world(rot * Vector2::new(-semi_length_m, 0.0)),
    )
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// 4 m x 4 m grid of 0.05 m cells centred on the origin, with all cells
    /// at x > 1 m set to full cost.
    fn wall_grid() -> CostGrid {
        let mut grid = CostGrid::new(80, 80, 0.05, Vector2::new(-2.0, -2.0));
        grid.set_world_rect(Vector2::new(1.0, -2.0), Vector2::new(2.0, 2.0), 255);
        grid
    }

    #[test]
    fn test_flat_grid_has_zero_gradient() {
        let grid = CostGrid::new(80, 80, 0.05, Vector2::new(-2.0, -2.0));
        let pose = Pose::new(0.0, 0.0, 0.0);

        let grad = estimate(&grid, &pose, 0.0, &Params::default());
        assert_eq!(grad.center, 0.0);
        assert_eq!(grad.x, 0.0);
        assert_eq!(grad.y, 0.0);
        assert_eq!(grad.yaw, 0.0);
    }

    #[test]
    fn test_cost_rises_ahead() {
        let grid = wall_grid();

        // Facing the wall from just outside it: forward samples reach into
        // the wall, backward samples don't
        let pose = Pose::new(0.85, 0.0, 0.0);

        let grad = estimate(&grid, &pose, 0.0, &Params::default());
        assert!(grad.x > 0.0);
        assert!(grad.y.abs() < 1e-9);
    }

    #[test]
    fn test_cost_rises_to_the_left() {
        let mut grid = CostGrid::new(80, 80, 0.05, Vector2::new(-2.0, -2.0));
        grid.set_world_rect(Vector2::new(-2.0, 0.1), Vector2::new(2.0, 2.0), 255);

        let pose = Pose::new(0.0, 0.0, 0.0);

        let grad = estimate(&grid, &pose, 0.0, &Params::default());
        assert!(grad.y > 0.0);
    }

    #[test]
    fn test_yaw_gradient_sign() {
        // Obstacle quadrant to the front-left while heading along +X: yawing
        // positive (left) swings the forward half of the straddled segment
        // into the obstacle, yawing negative swings it clear
        let mut grid = CostGrid::new(80, 80, 0.05, Vector2::new(-2.0, -2.0));
        grid.set_world_rect(Vector2::new(0.0, 0.0), Vector2::new(2.0, 2.0), 255);

        let pose = Pose::new(-0.01, -0.01, 0.0);

        let grad = estimate(&grid, &pose, 0.0, &Params::default());
        assert!(grad.yaw > 0.0);
    }
}
