//! # Velocity law
//!
//! The state machine that turns the cycle's tracking errors, cost gradients
//! and obstacle distance into raw (unsmoothed) control terms. The whole law
//! is a pure function from (previous state, inputs) to (raw control, next
//! state): the controller threads the persistent [`CtrlState`] through it,
//! which keeps the state machine testable on its own.
//!
//! The forward command is built in two regimes. Approaching the goal it is a
//! braking spring on the body-frame x error. Tracking the path it starts at
//! the situational speed limit and is then cut down by a cascade of caps:
//! wait-to-align, curvature, goal stopping distance, obstacle stopping
//! distance (which can also raise the emergency brake), a hard zero inside
//! the obstacle margin, and finally a forward-only clamp.
//!
//! The yaw command depends on the drive type. A differential base corrects
//! lateral error through the yaw rate (lane keeping) while translating, and
//! otherwise turns in place; a holonomic base commands lateral velocity
//! directly and only ever heading-holds or continues a turn.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector2;
use serde::Serialize;

// Internal
use super::{DriveType, Params};
use crate::gradient::CostGradient;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The persistent control state. Exactly one value survives between cycles
/// and it is only ever changed by the velocity law.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum CtrlState {
    Idle,
    Translating,
    Rotating,
    Adjusting,
    Turning,
    Stuck,
}

impl Default for CtrlState {
    fn default() -> Self {
        CtrlState::Idle
    }
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Everything the velocity law needs for one cycle.
#[derive(Debug, Clone)]
pub struct LawInput {
    /// State carried over from the previous cycle
    pub state: CtrlState,

    /// True when the path's final pose is the target
    pub is_goal_target: bool,

    /// Distance from the predicted position to the path's final pose
    pub goal_dist_m: f64,

    /// Target position error in the predicted pose's body frame
    pub pos_error_m: Vector2<f64>,

    /// Shortest angular distance from the predicted to the target heading
    pub yaw_error_rad: f64,

    /// Cost gradients around the predicted pose
    pub gradient: CostGradient,

    pub has_obstacle: bool,
    pub obstacle_dist_m: f64,

    /// Measured forward speed and yaw rate
    pub start_vel_x_ms: f64,
    pub start_yawrate_rads: f64,

    /// Situational speed limits, already de-rated by the centre cost
    pub max_trans_vel_ms: f64,
    pub max_rot_vel_rads: f64,

    /// Velocity-scaled lookahead distance used by the curvature cap
    pub lookahead_dist_m: f64,
}

/// Raw control terms before smoothing and limiting.
#[derive(Debug, Copy, Clone, Default, Serialize)]
pub struct RawControl {
    pub vel_x_ms: f64,
    pub vel_y_ms: f64,
    pub yawrate_rads: f64,
}

/// Result of one velocity-law evaluation.
#[derive(Debug, Copy, Clone)]
pub struct LawOutput {
    pub control: RawControl,

    /// State to carry into the next cycle
    pub state: CtrlState,

    /// The obstacle stopping cap undercut half the measured speed: the
    /// shaper should use the emergency deceleration limit
    pub emergency_brake: bool,

    /// Forward progress is blocked; the cycle must emit an immediate zero
    /// command, bypassing the shaper
    pub stuck: bool,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Evaluate the velocity law for one cycle.
pub fn compute(input: &LawInput, params: &Params) -> LawOutput {
    let mut state = input.state;
    let mut emergency_brake = false;

    let mut vel_x_ms;
    let mut vel_y_ms = 0.0;
    let mut yawrate_rads;

    // ---- FORWARD COMMAND ----

    if input.is_goal_target {
        // Braking spring towards the final stopping position
        vel_x_ms = input.pos_error_m[0] * params.pos_x_gain;
    } else {
        vel_x_ms = input.max_trans_vel_ms;

        // Wait to align before starting to move
        if state != CtrlState::Translating
            && input.yaw_error_rad.abs() > params.start_yaw_error_rad
        {
            vel_x_ms = 0.0;
        }

        // Limit curve velocity, sharper required turns cap speed harder
        {
            let max_vel_x_ms =
                params.max_curve_vel_ms * (input.lookahead_dist_m / input.yaw_error_rad.abs());
            vel_x_ms = vel_x_ms.min(max_vel_x_ms);
        }

        // Limit velocity when approaching the goal position
        if input.start_vel_x_ms > 0.0 {
            let stop_accel = params.goal_stop_accel_frac * params.acc_lim_x_mss;
            let stop_time_s = (2.0 * input.goal_dist_m.max(0.0) / stop_accel).sqrt();
            let max_vel_x_ms = (stop_accel * stop_time_s).max(params.min_vel_trans_ms);

            vel_x_ms = vel_x_ms.min(max_vel_x_ms);
        }

        // Limit velocity when approaching an obstacle
        if input.has_obstacle && input.start_vel_x_ms > 0.0 {
            let stop_accel = params.obstacle_stop_accel_frac * params.acc_lim_x_mss;
            let stop_time_s = (2.0 * input.obstacle_dist_m.max(0.0) / stop_accel).sqrt();
            let max_vel_x_ms = stop_accel * stop_time_s;

            // Check if it's much lower than the current velocity
            if max_vel_x_ms < params.emergency_vel_frac * input.start_vel_x_ms {
                emergency_brake = true;
            }

            vel_x_ms = vel_x_ms.min(max_vel_x_ms);
        }

        // Stop before hitting the obstacle
        if input.has_obstacle && input.obstacle_dist_m <= 0.0 {
            vel_x_ms = 0.0;
        }

        // Only forward velocity in this branch
        vel_x_ms = vel_x_ms.max(0.0);
    }

    // ---- BACKING-UP GUARD ----

    // Refusing to reverse further than the configured maximum while
    // approaching the goal; once turning, any required reversing at all
    // keeps us turning
    if input.is_goal_target
        && params.max_backup_dist_m > 0.0
        && input.pos_error_m[0]
            < if state == CtrlState::Turning {
                0.0
            } else {
                -params.max_backup_dist_m
            }
    {
        vel_x_ms = 0.0;
        state = CtrlState::Turning;
    } else if state == CtrlState::Turning {
        state = CtrlState::Idle;
    }

    // ---- LATERAL / YAW COMMAND ----

    match params.drive_type {
        DriveType::Differential => {
            let translating_threshold_ms = if state == CtrlState::Translating {
                params.trans_stopped_vel_ms
            } else {
                params.not_translating_vel_mult * params.trans_stopped_vel_ms
            };

            if input.start_vel_x_ms.abs() > translating_threshold_ms {
                // We are translating, use the lane keeping term
                yawrate_rads =
                    input.pos_error_m[1] / input.start_vel_x_ms * params.pos_y_yaw_gain;

                if !input.is_goal_target {
                    // Additional heading term plus the cost bias terms
                    yawrate_rads += input.yaw_error_rad * params.yaw_gain;
                    yawrate_rads -=
                        input.gradient.y / input.start_vel_x_ms * params.cost_y_yaw_gain;
                    yawrate_rads -= input.gradient.yaw * params.cost_yaw_gain;
                }

                state = CtrlState::Translating;
            } else if state == CtrlState::Turning {
                // Continue on the current sense of rotation
                yawrate_rads = if input.start_yawrate_rads > 0.0 {
                    input.max_rot_vel_rads
                } else {
                    -input.max_rot_vel_rads
                };
            } else if input.is_goal_target
                && (state == CtrlState::Adjusting
                    || input.yaw_error_rad.abs() < params.large_yaw_error_rad)
                && input.pos_error_m[1].abs()
                    > if state == CtrlState::Adjusting {
                        params.adjusting_y_tolerance_frac * params.xy_goal_tolerance_m
                    } else {
                        params.start_adjust_y_tolerance_frac * params.xy_goal_tolerance_m
                    }
            {
                // Not translating, but too much lateral error to settle:
                // rotate in place towards correcting it. Once adjusting the
                // tolerance tightens (hysteresis).
                yawrate_rads = if input.pos_error_m[1] > 0.0 {
                    input.max_rot_vel_rads
                } else {
                    -input.max_rot_vel_rads
                };

                state = CtrlState::Adjusting;
            } else {
                // Hold the static target orientation
                yawrate_rads = input.yaw_error_rad * params.static_yaw_gain;

                state = CtrlState::Rotating;
            }
        }
        DriveType::Omnidirectional => {
            // Correct y directly with the holonomic drive
            vel_y_ms = input.pos_error_m[1] * params.pos_y_gain;

            if state == CtrlState::Turning {
                // Continue on the current sense of rotation
                yawrate_rads = if input.start_yawrate_rads > 0.0 {
                    input.max_rot_vel_rads
                } else {
                    -input.max_rot_vel_rads
                };
            } else {
                // Hold the static target orientation
                yawrate_rads = input.yaw_error_rad * params.static_yaw_gain;

                state = if input.start_vel_x_ms.abs() > params.trans_stopped_vel_ms {
                    CtrlState::Translating
                } else {
                    CtrlState::Rotating
                };
            }

            let rotating_large_error = state == CtrlState::Rotating
                && input.yaw_error_rad.abs() > params.large_yaw_error_rad;

            // The x cost term only applies while rotating with a large
            // heading error
            if rotating_large_error {
                vel_x_ms -= input.gradient.x * params.cost_x_gain;
            }

            // The y cost term applies when not approaching the goal, or in
            // the same rotating case
            if !input.is_goal_target || rotating_large_error {
                vel_y_ms -= input.gradient.y * params.cost_y_gain;
            }

            // The yaw cost term applies when not approaching the goal
            if !input.is_goal_target {
                yawrate_rads -= input.gradient.yaw * params.cost_yaw_gain;
            }
        }
    }

    // ---- STUCK DETECTION ----

    // An obstacle inside the stopping margin, cost rising ahead, already
    // aligned and only able to rotate: forward progress is blocked
    if input.has_obstacle
        && input.obstacle_dist_m <= 0.0
        && input.gradient.x > 0.0
        && state == CtrlState::Rotating
        && input.yaw_error_rad.abs() < params.large_yaw_error_rad
    {
        return LawOutput {
            control: RawControl::default(),
            state: CtrlState::Stuck,
            emergency_brake: false,
            stuck: true,
        };
    }

    // The emergency brake only makes sense while still demanding forward
    // motion
    emergency_brake = emergency_brake && vel_x_ms >= 0.0;

    LawOutput {
        control: RawControl {
            vel_x_ms,
            vel_y_ms,
            yawrate_rads,
        },
        state,
        emergency_brake,
        stuck: false,
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    /// A benign tracking-mode input: on the path, aligned, far from the goal
    /// and from any obstacle, moving at 0.3 m/s.
    fn tracking_input() -> LawInput {
        LawInput {
            state: CtrlState::Translating,
            is_goal_target: false,
            goal_dist_m: 5.0,
            pos_error_m: Vector2::new(0.5, 0.0),
            yaw_error_rad: 0.0,
            gradient: CostGradient::default(),
            has_obstacle: false,
            obstacle_dist_m: 9.5,
            start_vel_x_ms: 0.3,
            start_yawrate_rads: 0.0,
            max_trans_vel_ms: 0.5,
            max_rot_vel_rads: 0.5,
            lookahead_dist_m: 0.65,
        }
    }

    #[test]
    fn test_tracking_runs_at_situational_max() {
        let params = Params::default();
        let out = compute(&tracking_input(), &params);

        assert_eq!(out.state, CtrlState::Translating);
        assert!(!out.emergency_brake);
        assert!(!out.stuck);
        assert_eq!(out.control.vel_x_ms, 0.5);
        assert_eq!(out.control.yawrate_rads, 0.0);
    }

    #[test]
    fn test_wait_to_align_zeroes_forward() {
        let params = Params::default();

        // Scenario: large heading error while not yet translating
        let mut input = tracking_input();
        input.state = CtrlState::Idle;
        input.start_vel_x_ms = 0.0;
        input.yaw_error_rad = 0.5;

        let out = compute(&input, &params);
        assert_eq!(out.control.vel_x_ms, 0.0);
        // Heading-hold proportional term takes over
        assert_eq!(out.state, CtrlState::Rotating);
        assert!((out.control.yawrate_rads - 0.5 * params.static_yaw_gain).abs() < 1e-9);

        // Already translating: the start threshold no longer applies, the
        // curvature cap does
        let mut input = tracking_input();
        input.yaw_error_rad = 0.5;
        let out = compute(&input, &params);
        assert!(out.control.vel_x_ms > 0.0);
        assert!(
            out.control.vel_x_ms
                <= params.max_curve_vel_ms * input.lookahead_dist_m / input.yaw_error_rad
                    + 1e-9
        );
    }

    #[test]
    fn test_goal_approach_braking_spring() {
        let params = Params::default();

        let mut input = tracking_input();
        input.is_goal_target = true;
        input.pos_error_m = Vector2::new(0.3, 0.0);
        input.goal_dist_m = 0.3;

        let out = compute(&input, &params);
        assert!((out.control.vel_x_ms - 0.3 * params.pos_x_gain).abs() < 1e-9);

        // The spring decays towards zero with the remaining distance
        input.pos_error_m = Vector2::new(0.01, 0.0);
        let out = compute(&input, &params);
        assert!((out.control.vel_x_ms - 0.01 * params.pos_x_gain).abs() < 1e-9);
    }

    #[test]
    fn test_goal_stopping_distance_cap() {
        let params = Params::default();

        let mut input = tracking_input();
        input.goal_dist_m = 0.1;

        let out = compute(&input, &params);
        let stop_accel = params.goal_stop_accel_frac * params.acc_lim_x_mss;
        let cap = (stop_accel * (2.0 * 0.1f64 / stop_accel).sqrt()).max(params.min_vel_trans_ms);
        assert!(out.control.vel_x_ms <= cap + 1e-9);
    }

    #[test]
    fn test_obstacle_cap_and_emergency_brake() {
        let params = Params::default();

        // Obstacle just outside the margin while moving quickly
        let mut input = tracking_input();
        input.has_obstacle = true;
        input.obstacle_dist_m = 0.02;
        input.start_vel_x_ms = 0.5;

        let out = compute(&input, &params);
        let stop_accel = params.obstacle_stop_accel_frac * params.acc_lim_x_mss;
        let cap = stop_accel * (2.0 * 0.02f64 / stop_accel).sqrt();
        assert!(out.control.vel_x_ms <= cap + 1e-9);
        // Cap far below half the measured speed: emergency brake
        assert!(out.emergency_brake);

        // Obstacle inside the margin: hard zero
        input.obstacle_dist_m = -0.1;
        let out = compute(&input, &params);
        assert_eq!(out.control.vel_x_ms, 0.0);
    }

    #[test]
    fn test_backup_guard_forces_turning() {
        let params = Params::default();

        // Goal behind the base, further than the backup allowance
        let mut input = tracking_input();
        input.is_goal_target = true;
        input.pos_error_m = Vector2::new(-0.6, 0.0);
        input.start_vel_x_ms = 0.0;

        let out = compute(&input, &params);
        assert_eq!(out.control.vel_x_ms, 0.0);
        // Turning continues on the last measured sense of rotation
        assert_eq!(out.state, CtrlState::Turning);

        // Once turning, even a small required reverse keeps us turning
        input.state = CtrlState::Turning;
        input.pos_error_m = Vector2::new(-0.1, 0.0);
        input.start_yawrate_rads = 0.2;
        let out = compute(&input, &params);
        assert_eq!(out.state, CtrlState::Turning);
        assert_eq!(out.control.yawrate_rads, input.max_rot_vel_rads);

        // And reverts to idle-derived states once the condition clears
        input.pos_error_m = Vector2::new(0.05, 0.0);
        let out = compute(&input, &params);
        assert_ne!(out.state, CtrlState::Turning);
    }

    #[test]
    fn test_adjusting_hysteresis() {
        let params = Params::default();

        // Goal target, aligned, stopped, but half a tolerance off laterally
        let mut input = tracking_input();
        input.is_goal_target = true;
        input.state = CtrlState::Idle;
        input.start_vel_x_ms = 0.0;
        input.pos_error_m = Vector2::new(0.0, 0.06);
        input.yaw_error_rad = 0.0;

        let out = compute(&input, &params);
        assert_eq!(out.state, CtrlState::Adjusting);
        assert_eq!(out.control.yawrate_rads, input.max_rot_vel_rads);

        // 0.06 m is under the 0.5x entry tolerance once back out of
        // adjusting, but over the 0.25x exit tolerance while adjusting
        input.pos_error_m = Vector2::new(0.0, 0.04);
        input.state = CtrlState::Idle;
        let out = compute(&input, &params);
        assert_eq!(out.state, CtrlState::Rotating);

        input.pos_error_m = Vector2::new(0.0, 0.04);
        input.state = CtrlState::Adjusting;
        let out = compute(&input, &params);
        assert_eq!(out.state, CtrlState::Adjusting);
    }

    #[test]
    fn test_stuck_detection() {
        let params = Params::default();

        let mut input = tracking_input();
        input.state = CtrlState::Rotating;
        input.start_vel_x_ms = 0.0;
        input.has_obstacle = true;
        input.obstacle_dist_m = -0.2;
        input.yaw_error_rad = 0.1;
        input.gradient.x = 0.5;

        let out = compute(&input, &params);
        assert!(out.stuck);
        assert_eq!(out.state, CtrlState::Stuck);
        assert_eq!(out.control.vel_x_ms, 0.0);
        assert_eq!(out.control.yawrate_rads, 0.0);

        // Stuck re-derives from scratch each cycle: with the same blocking
        // conditions the next cycle is stuck again
        input.state = out.state;
        let out = compute(&input, &params);
        assert!(out.stuck);

        // Clearing the obstacle releases it
        input.has_obstacle = false;
        input.obstacle_dist_m = 9.5;
        let out = compute(&input, &params);
        assert!(!out.stuck);
    }

    #[test]
    fn test_omni_lateral_term() {
        let mut params = Params::default();
        params.drive_type = DriveType::Omnidirectional;

        let mut input = tracking_input();
        input.pos_error_m = Vector2::new(0.5, 0.2);

        let out = compute(&input, &params);
        assert!((out.control.vel_y_ms - 0.2 * params.pos_y_gain).abs() < 1e-9);
        assert_eq!(out.state, CtrlState::Translating);
    }

    #[test]
    fn test_omni_cost_terms_gated_by_mode() {
        let mut params = Params::default();
        params.drive_type = DriveType::Omnidirectional;

        // Goal approach while already aligned: no cost bias terms at all
        let mut input = tracking_input();
        input.is_goal_target = true;
        input.start_vel_x_ms = 0.0;
        input.pos_error_m = Vector2::new(0.2, 0.0);
        input.yaw_error_rad = 0.0;
        input.gradient.x = 1.0;
        input.gradient.y = 1.0;
        input.gradient.yaw = 1.0;

        let out = compute(&input, &params);
        assert!((out.control.vel_x_ms - 0.2 * params.pos_x_gain).abs() < 1e-9);
        assert_eq!(out.control.vel_y_ms, 0.0);
        assert_eq!(out.control.yawrate_rads, 0.0);

        // Rotating with a large heading error brings the x and y bias in
        input.yaw_error_rad = 1.0;
        let out = compute(&input, &params);
        assert!(out.control.vel_x_ms < 0.2 * params.pos_x_gain);
        assert!(out.control.vel_y_ms < 0.0);
    }
}
