//! # Goal checking
//!
//! The instantaneous "is the goal reached" decision is delegated to an
//! external policy through the [`GoalChecker`] trait. The controller wraps
//! that policy in a [`GoalTracker`] debouncer: the goal only counts as
//! reached once the predicate has held continuously for the configured tune
//! time, and the tracker re-arms whenever the predicate drops back to false.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Standard
use std::time::Instant;

// Internal
use crate::ctrl::Params;
use crate::loc::{Pose, Twist};
use util::maths::shortest_ang_dist;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// External policy deciding whether the goal is instantaneously reached.
pub trait GoalChecker {
    /// `goal` and `pose` are both in the local frame.
    fn is_goal_reached(&self, goal: &Pose, pose: &Pose, twist: &Twist) -> bool;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Tolerance-based goal checker: position, heading and residual speed must
/// all be within bounds.
#[derive(Debug, Clone)]
pub struct SimpleGoalChecker {
    pub xy_goal_tolerance_m: f64,
    pub yaw_goal_tolerance_rad: f64,
    pub trans_stopped_vel_ms: f64,
    pub rot_stopped_vel_rads: f64,
}

/// Debouncer over the instantaneous goal predicate.
///
/// Remembers the time of the rising edge and only reports reached once the
/// predicate has held for the tune time.
#[derive(Debug, Clone, Default)]
pub struct GoalTracker {
    first_reached_time: Option<Instant>,
    is_reached: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimpleGoalChecker {
    pub fn from_params(params: &Params) -> Self {
        Self {
            xy_goal_tolerance_m: params.xy_goal_tolerance_m,
            yaw_goal_tolerance_rad: params.yaw_goal_tolerance_rad,
            trans_stopped_vel_ms: params.trans_stopped_vel_ms,
            rot_stopped_vel_rads: params.rot_stopped_vel_rads,
        }
    }
}

impl GoalChecker for SimpleGoalChecker {
    fn is_goal_reached(&self, goal: &Pose, pose: &Pose, twist: &Twist) -> bool {
        let xy_error_m = (pose.position_m - goal.position_m).norm();
        let yaw_error_rad = shortest_ang_dist(pose.yaw_rad, goal.yaw_rad).abs();

        xy_error_m <= self.xy_goal_tolerance_m
            && yaw_error_rad <= self.yaw_goal_tolerance_rad
            && twist.lin_ms.norm() <= self.trans_stopped_vel_ms
            && twist.ang_rads.abs() <= self.rot_stopped_vel_rads
    }
}

impl GoalTracker {
    /// Feed the instantaneous predicate value and get the debounced one.
    pub fn update(&mut self, instant_reached: bool, now: Instant, tune_time_s: f64) -> bool {
        // While not yet reached keep moving the rising-edge timestamp
        // forward, so it ends up marking the tick the predicate turned true
        if !self.is_reached {
            self.first_reached_time = Some(now);
        }

        self.is_reached = instant_reached;

        instant_reached
            && match self.first_reached_time {
                Some(t0) => (now - t0).as_secs_f64() >= tune_time_s,
                None => false,
            }
    }

    /// The undebounced value from the last update, used to latch the
    /// final-approach command constraint.
    pub fn is_reached(&self) -> bool {
        self.is_reached
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
