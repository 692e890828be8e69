//! Trajectory controller state and cycle processing.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Standard
use std::sync::{Arc, Mutex};
use std::time::Instant;

// External
use log::{debug, warn};
use nalgebra::{Isometry2, Vector2};
use serde::Serialize;
use thiserror::Error;

// Internal
use super::law::{self, CtrlState, LawInput, RawControl};
use super::shaper::CommandShaper;
use super::Params;
use crate::cost_map::CostGrid;
use crate::goal::{GoalChecker, GoalTracker};
use crate::gradient::{self, CostGradient};
use crate::loc::{Odometry, Pose};
use crate::obstacle;
use crate::path::Path;
use crate::predict;
use crate::target;
use util::maths::shortest_ang_dist;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Cycle diagnostics are logged every this many completed cycles.
const STATUS_LOG_PERIOD: u64 = 20;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Consumer of the per-cycle projected trajectory, for visualisation or
/// telemetry. The controller itself never reads it back.
pub trait TrajectorySink {
    fn accept_trajectory(&mut self, trajectory: &[Pose]);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The trajectory controller.
///
/// Owns everything that persists between cycles: the reference path, the
/// control state, the command shaper history and the goal debouncer. Each
/// call to [`TrajCtrl::proc`] runs one complete control cycle against the
/// newest odometry measurement in the shared slot.
pub struct TrajCtrl {
    params: Params,

    /// Control state carried between cycles
    state: CtrlState,

    /// Command smoother, holds the previous command
    shaper: CommandShaper,

    /// Reference path in the global frame
    global_path: Path,

    /// Goal debouncer
    goal_tracker: GoalTracker,

    /// Newest odometry measurement, written by the measurement source and
    /// locked by the controller for the whole of each cycle
    odometry: Arc<Mutex<Option<Odometry>>>,

    /// Last good global to local transform
    last_tf: Option<Isometry2<f64>>,

    /// Time of the last completed cycle
    last_time: Option<Instant>,

    /// Optional consumer of the projected trajectory
    sink: Option<Box<dyn TrajectorySink + Send>>,

    /// Completed cycle count
    update_counter: u64,
}

/// Velocity command for the base, stamped with the cycle time it was
/// produced at and the frame its velocities are expressed in.
#[derive(Debug, Clone, Serialize)]
pub struct VelCmd {
    /// Cycle time the command was produced at
    #[serde(skip)]
    pub time: Instant,

    /// Frame the velocities are expressed in
    pub frame_id: String,

    pub lin_x_ms: f64,
    pub lin_y_ms: f64,
    pub ang_rads: f64,
}

/// The status report containing monitoring quantities for the cycle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusReport {
    /// Control state at the end of the cycle
    pub state: CtrlState,

    /// True when the path's final pose was the target this cycle
    pub target_is_goal: bool,

    /// Distance from the predicted position to the path's final pose
    pub goal_dist_m: f64,

    /// Target position error in the predicted pose's body frame
    pub pos_error_m: Vector2<f64>,

    /// Heading error to the target
    pub yaw_error_rad: f64,

    /// Cost gradients around the predicted pose
    pub gradient: CostGradient,

    pub has_obstacle: bool,
    pub obstacle_dist_m: f64,
    pub peak_cost: f64,

    /// The obstacle stopping cap demanded an emergency deceleration
    pub emergency_brake: bool,

    /// Forward progress is blocked, the command this cycle is zero
    pub stuck: bool,

    /// No fresh transform was given, the last good one was reused
    pub used_stale_transform: bool,

    /// Raw control terms before smoothing and limiting
    pub raw: RawControl,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that could occur during initialisation of the controller.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to load the controller parameters: {0}")]
    ParamLoadError(#[from] util::params::LoadError),
}

/// Potential errors that can occur during a control cycle.
#[derive(Debug, Error)]
pub enum ProcError {
    /// No measurement has ever been written into the odometry slot.
    #[error("No odometry measurement is available")]
    NoOdometry,

    /// A measurement source panicked while holding the odometry slot.
    #[error("The odometry slot mutex is poisoned")]
    OdometrySlotPoisoned,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VelCmd {
    /// An all-stop command stamped at `time`.
    pub fn stop(time: Instant, frame_id: &str) -> Self {
        Self {
            time,
            frame_id: frame_id.to_owned(),
            lin_x_ms: 0.0,
            lin_y_ms: 0.0,
            ang_rads: 0.0,
        }
    }
}

impl TrajCtrl {
    pub fn new(params: Params) -> Self {
        Self {
            params,
            state: CtrlState::Idle,
            shaper: CommandShaper::new(),
            global_path: Path::new_empty(),
            goal_tracker: GoalTracker::default(),
            odometry: Arc::new(Mutex::new(None)),
            last_tf: None,
            last_time: None,
            sink: None,
            update_counter: 0,
        }
    }

    /// Initialise the controller from a parameter file.
    pub fn from_file<P: AsRef<std::path::Path>>(param_file_path: P) -> Result<Self, InitError> {
        Ok(Self::new(Params::load(param_file_path)?))
    }

    /// Handle for the measurement source to write odometry into.
    pub fn odometry_slot(&self) -> Arc<Mutex<Option<Odometry>>> {
        self.odometry.clone()
    }

    pub fn set_trajectory_sink(&mut self, sink: Box<dyn TrajectorySink + Send>) {
        self.sink = Some(sink);
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn state(&self) -> CtrlState {
        self.state
    }

    /// Load a new reference path, in the global frame.
    ///
    /// Re-arms the goal debouncer and drops back to the idle state. The
    /// command history is kept so a path handed over mid-motion does not
    /// cause a jerk.
    pub fn set_plan(&mut self, path: Path) {
        self.global_path = path;
        self.goal_tracker = GoalTracker::default();
        self.state = CtrlState::Idle;
    }

    /// Stop tracking: clear the path and the command history.
    pub fn reset(&mut self) {
        self.global_path = Path::new_empty();
        self.goal_tracker = GoalTracker::default();
        self.shaper.reset();
        self.state = CtrlState::Idle;
    }

    /// Run one control cycle.
    ///
    /// `local_tf` transforms the global frame into the frame of `cost_grid`
    /// and the odometry. `None` reuses the last good transform.
    pub fn proc(
        &mut self,
        now: Instant,
        local_tf: Option<&Isometry2<f64>>,
        cost_grid: &CostGrid,
    ) -> Result<(VelCmd, StatusReport), ProcError> {
        // Lock the odometry slot for the whole cycle so the measurement
        // cannot change under us. The handle is cloned so the guard doesn't
        // pin `self` for the rest of the cycle.
        let odometry = self.odometry.clone();
        let slot = odometry
            .lock()
            .map_err(|_| ProcError::OdometrySlotPoisoned)?;
        let odo = match *slot {
            Some(odo) => odo,
            None => return Err(ProcError::NoOdometry),
        };

        // ---- TRANSFORM RESOLUTION ----

        let mut used_stale_transform = false;
        let tf = match local_tf {
            Some(tf) => {
                self.last_tf = Some(*tf);
                *tf
            }
            None => match self.last_tf {
                Some(tf) => {
                    used_stale_transform = true;
                    tf
                }
                None => {
                    warn!("No global to local transform has ever been provided, stopping");
                    self.shaper.reset();
                    self.state = CtrlState::Idle;
                    return Ok((
                        VelCmd::stop(now, &self.params.base_frame_id),
                        StatusReport::default(),
                    ));
                }
            },
        };

        // ---- CYCLE TIME ----

        // The first cycle, and any cycle after a stall, runs with the
        // maximum permitted cycle time
        let dt_s = match self.last_time {
            Some(t) => now
                .saturating_duration_since(t)
                .as_secs_f64()
                .min(self.params.max_dt_s),
            None => self.params.max_dt_s,
        };

        // ---- PREDICTION ----

        let local_path = self.global_path.transformed(&tf);

        let start_vel_x_ms = odo.twist.lin_ms[0];
        let start_yawrate_rads = odo.twist.ang_rads;

        let predicted = predict::predict_pose(&odo.pose, &odo.twist, self.params.lookahead_time_s);

        // ---- TARGET SELECTION ----

        // Velocity-scaled lookahead distance
        let lookahead_dist_m =
            self.params.lookahead_dist_m + start_vel_x_ms.max(0.0) * self.params.lookahead_time_s;

        let target = match target::select(
            &local_path,
            predicted.position_m,
            lookahead_dist_m,
            self.params.max_goal_dist_m,
        ) {
            Some(t) => t,
            None => {
                // An empty path is a stop request
                self.shaper.reset();
                self.state = CtrlState::Idle;
                return Ok((
                    VelCmd::stop(now, &self.params.base_frame_id),
                    StatusReport::default(),
                ));
            }
        };

        // ---- COST SAMPLING ----

        let cost_y_lookahead_m = self.params.cost_y_lookahead_dist_m
            + start_vel_x_ms.max(0.0) * self.params.cost_y_lookahead_time_s;
        let gradient = gradient::estimate(cost_grid, &predicted, cost_y_lookahead_m, &self.params);

        let scan = obstacle::scan(
            cost_grid,
            &predicted,
            start_vel_x_ms,
            start_yawrate_rads,
            &self.params,
        );
        if let Some(sink) = self.sink.as_mut() {
            sink.accept_trajectory(&scan.trajectory);
        }

        // ---- TRACKING ERRORS ----

        let pos_error_m = predicted.world_to_body(target.position_m);
        let yaw_error_rad = shortest_ang_dist(predicted.yaw_rad, target.yaw_rad);

        // Safe to index since target selection needs a non-empty path
        let goal_pose = local_path.poses[local_path.len() - 1];
        let goal_dist_m = (goal_pose.position_m - predicted.position_m).norm();

        // De-rate the speed limits by the cost at the predicted position
        let cost_margin = (self.params.max_cost - gradient.center) / self.params.max_cost;
        let max_trans_vel_ms =
            (self.params.max_vel_trans_ms * cost_margin).max(self.params.min_vel_trans_ms);
        let max_rot_vel_rads =
            (self.params.max_vel_theta_rads * cost_margin).max(self.params.min_vel_theta_rads);

        // ---- VELOCITY LAW ----

        let law_out = law::compute(
            &LawInput {
                state: self.state,
                is_goal_target: target.is_goal,
                goal_dist_m,
                pos_error_m,
                yaw_error_rad,
                gradient,
                has_obstacle: scan.has_obstacle,
                obstacle_dist_m: scan.obstacle_dist_m,
                start_vel_x_ms,
                start_yawrate_rads,
                max_trans_vel_ms,
                max_rot_vel_rads,
                lookahead_dist_m,
            },
            &self.params,
        );

        let report = StatusReport {
            state: law_out.state,
            target_is_goal: target.is_goal,
            goal_dist_m,
            pos_error_m,
            yaw_error_rad,
            gradient,
            has_obstacle: scan.has_obstacle,
            obstacle_dist_m: scan.obstacle_dist_m,
            peak_cost: scan.peak_cost,
            emergency_brake: law_out.emergency_brake,
            stuck: law_out.stuck,
            used_stale_transform,
            raw: law_out.control,
        };

        // A stuck cycle emits an immediate zero command and leaves the
        // command history and cycle time untouched, so recovery behaviour
        // upstream sees a clean stop
        if law_out.stuck {
            warn!(
                "Robot is stuck, obstacle_dist_m = {:.3}, cost gradient x = {:.3}",
                scan.obstacle_dist_m, gradient.x
            );
            self.state = CtrlState::Stuck;
            return Ok((VelCmd::stop(now, &self.params.base_frame_id), report));
        }

        // ---- COMMAND SHAPING ----

        // The final-approach constraint engages once the goal predicate has
        // been seen true, not merely once the goal is the target
        let final_approach = self.goal_tracker.is_reached();

        let cmd = self.shaper.shape(
            &law_out.control,
            dt_s,
            law_out.emergency_brake,
            final_approach,
            &self.params,
        );

        self.state = law_out.state;
        self.last_time = Some(now);
        self.update_counter += 1;

        if self.update_counter % STATUS_LOG_PERIOD == 0 {
            debug!(
                "Cycle {}: state = {:?}, cmd = ({:.3}, {:.3}, {:.3}), goal_dist_m = {:.3}",
                self.update_counter,
                self.state,
                cmd.vel_x_ms,
                cmd.vel_y_ms,
                cmd.yawrate_rads,
                goal_dist_m
            );
        }

        Ok((
            VelCmd {
                time: now,
                frame_id: self.params.base_frame_id.clone(),
                lin_x_ms: cmd.vel_x_ms,
                lin_y_ms: cmd.vel_y_ms,
                ang_rads: cmd.yawrate_rads,
            },
            report,
        ))
    }

    /// Debounced goal check against the current path and odometry.
    ///
    /// The instantaneous decision is delegated to `checker` with the goal
    /// and pose both in the local frame. The result only turns true once
    /// the checker has agreed for the configured tune time.
    pub fn is_goal_reached(
        &mut self,
        checker: &dyn GoalChecker,
        now: Instant,
    ) -> Result<bool, ProcError> {
        let odometry = self.odometry.clone();
        let slot = odometry
            .lock()
            .map_err(|_| ProcError::OdometrySlotPoisoned)?;
        let odo = match *slot {
            Some(odo) => odo,
            None => return Err(ProcError::NoOdometry),
        };

        // Nothing to track counts as already there
        if self.global_path.is_empty() {
            return Ok(true);
        }

        let goal = match (self.global_path.last(), self.last_tf) {
            (Some(goal), Some(tf)) => goal.transformed(&tf),
            _ => return Ok(false),
        };

        let instant_reached = checker.is_goal_reached(&goal, &odo.pose, &odo.twist);

        Ok(self
            .goal_tracker
            .update(instant_reached, now, self.params.goal_tune_time_s))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
