//! # Target selection
//!
//! Picks the point on the (already transformed) path the control law should
//! steer towards, and decides between the two tracking regimes:
//!
//! - **Goal approach**: the remaining path fits within `max_goal_dist_m`, so
//!   the path's final pose becomes the target and its own orientation the
//!   target heading.
//! - **Path tracking**: the target is the path point nearest the predicted
//!   position, and the target heading is the bearing from there to a
//!   look-ahead point further along the path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;

// Internal
use crate::path::Path;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose the control law steers towards this cycle.
#[derive(Debug, Copy, Clone)]
pub struct Target {
    pub position_m: Vector2<f64>,
    pub yaw_rad: f64,

    /// True when the path's final pose is the target (goal-approach mode)
    pub is_goal: bool,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Select the target on `local_path` for a robot whose predicted position
/// is `predicted_pos_m`.
///
/// `lookahead_dist_m` is the (velocity-scaled) distance to the look-ahead
/// point used for the tracking-mode heading. Returns `None` on an empty path.
pub fn select(
    local_path: &Path,
    predicted_pos_m: Vector2<f64>,
    lookahead_dist_m: f64,
    max_goal_dist_m: f64,
) -> Option<Target> {
    let nearest = local_path.nearest_index(predicted_pos_m)?;

    // If marching the remaining goal distance lands on the final point the
    // goal itself is within reach
    let goal_march = local_path.march(nearest, max_goal_dist_m);
    if goal_march + 1 >= local_path.len() {
        let goal = local_path.poses[goal_march];
        return Some(Target {
            position_m: goal.position_m,
            yaw_rad: goal.yaw_rad,
            is_goal: true,
        });
    }

    // Otherwise track the nearest point, heading for the look-ahead point
    let target = local_path.poses[nearest];
    let lookahead = local_path.poses[local_path.march(nearest, lookahead_dist_m)];
    let diff = lookahead.position_m - target.position_m;

    Some(Target {
        position_m: target.position_m,
        yaw_rad: diff[1].atan2(diff[0]),
        is_goal: false,
    })
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
