//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};

// Internal
use util::params::LoadError;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The drive configuration of the base.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveType {
    /// Non-holonomic base, lateral error corrected through the yaw rate.
    Differential,

    /// Holonomic base, lateral error corrected directly.
    Omnidirectional,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control.
///
/// Every tunable has a default, so a sparse or missing parameter file is
/// never fatal. All parameters are fixed for the duration of a session and
/// read-only during control cycles.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Params {
    // ---- Limits ----
    /// Forward acceleration limit
    pub acc_lim_x_mss: f64,

    /// Lateral acceleration limit
    pub acc_lim_y_mss: f64,

    /// Rotational acceleration limit
    pub acc_lim_theta_radss: f64,

    /// Forward deceleration limit applied during an emergency brake
    pub emergency_acc_lim_x_mss: f64,

    pub min_vel_x_ms: f64,
    pub max_vel_x_ms: f64,
    pub min_vel_y_ms: f64,
    pub max_vel_y_ms: f64,
    pub min_vel_theta_rads: f64,
    pub max_vel_theta_rads: f64,

    /// Minimum translational speed floor for the situational speed limit
    pub min_vel_trans_ms: f64,

    /// Maximum translational speed. Overridden to `max_vel_x_ms` by
    /// [`Params::normalise`].
    pub max_vel_trans_ms: f64,

    /// Speed below which the base counts as not translating. Overridden to
    /// half of `min_vel_trans_ms` by [`Params::normalise`].
    pub trans_stopped_vel_ms: f64,

    /// Yaw rate below which the base counts as not rotating
    pub rot_stopped_vel_rads: f64,

    // ---- Goal tolerances ----
    pub xy_goal_tolerance_m: f64,
    pub yaw_goal_tolerance_rad: f64,

    /// Time the goal predicate must hold continuously before the goal is
    /// reported reached
    pub goal_tune_time_s: f64,

    // ---- Lookahead ----
    /// Pose prediction and decision lookahead time
    pub lookahead_time_s: f64,

    /// Base lookahead distance for the path target, extended by the current
    /// forward speed times `lookahead_time_s`
    pub lookahead_dist_m: f64,

    /// Base forward offset for the lateral cost gradient, extended by the
    /// current forward speed times `cost_y_lookahead_time_s`
    pub cost_y_lookahead_dist_m: f64,
    pub cost_y_lookahead_time_s: f64,

    // ---- Gains ----
    /// Goal-approach braking spring gain on the body-frame x error
    pub pos_x_gain: f64,

    /// Holonomic lateral correction gain
    pub pos_y_gain: f64,

    /// Differential lane-keeping gain (lateral error over forward speed)
    pub pos_y_yaw_gain: f64,

    /// Heading error gain while translating
    pub yaw_gain: f64,

    /// Heading-hold gain while not translating
    pub static_yaw_gain: f64,

    /// Cost gradient bias gains
    pub cost_x_gain: f64,
    pub cost_y_gain: f64,
    pub cost_y_yaw_gain: f64,
    pub cost_yaw_gain: f64,

    // ---- Control law thresholds ----
    /// Heading error above which the base waits to align before starting to
    /// translate
    pub start_yaw_error_rad: f64,

    /// Heading error band treated as "large" by the adjusting and stuck
    /// branches
    pub large_yaw_error_rad: f64,

    /// Curvature speed cap factor (sharper required turns cap speed)
    pub max_curve_vel_ms: f64,

    /// Remaining path length under which the goal itself becomes the target
    pub max_goal_dist_m: f64,

    /// Maximum backward travel allowed while approaching the goal; zero or
    /// negative disables the guard
    pub max_backup_dist_m: f64,

    /// Fraction of `acc_lim_x_mss` assumed available for stopping before the
    /// goal
    pub goal_stop_accel_frac: f64,

    /// Fraction of `acc_lim_x_mss` assumed available for stopping before an
    /// obstacle
    pub obstacle_stop_accel_frac: f64,

    /// An obstacle speed cap below this fraction of the measured speed
    /// triggers the emergency brake
    pub emergency_vel_frac: f64,

    /// Multiple of `trans_stopped_vel_ms` the measured speed must exceed to
    /// enter the translating state from a non-translating one
    pub not_translating_vel_mult: f64,

    /// Lateral goal tolerance fraction that starts an adjusting turn
    pub start_adjust_y_tolerance_frac: f64,

    /// Tighter lateral tolerance fraction that ends an adjusting turn
    pub adjusting_y_tolerance_frac: f64,

    // ---- Cost sampling ----
    /// Normalised cost at or above which a cell counts as an obstacle
    pub max_cost: f64,

    /// Gradient estimation offsets
    pub delta_x_m: f64,
    pub delta_y_m: f64,
    pub delta_yaw_rad: f64,

    /// Obstacle scan step length
    pub scan_step_m: f64,

    /// Obstacle scan range
    pub max_scan_dist_m: f64,

    /// Safety margin subtracted from the scanned obstacle distance
    pub min_stop_dist_m: f64,

    // ---- Command shaping ----
    /// Exponential low-pass filter gain (1.0 disables filtering)
    pub low_pass_gain: f64,

    /// Constrain the command to the previous command's direction on the
    /// final goal approach
    pub constrain_final: bool,

    /// Upper clamp on the time step between cycles
    pub max_dt_s: f64,

    // ---- Drive ----
    pub drive_type: DriveType,

    /// Frame id stamped onto emitted velocity commands
    pub base_frame_id: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            acc_lim_x_mss: 0.5,
            acc_lim_y_mss: 0.5,
            acc_lim_theta_radss: 0.5,
            emergency_acc_lim_x_mss: 0.5,
            min_vel_x_ms: -0.1,
            max_vel_x_ms: 0.5,
            min_vel_y_ms: -0.5,
            max_vel_y_ms: 0.5,
            min_vel_theta_rads: 0.1,
            max_vel_theta_rads: 0.5,
            min_vel_trans_ms: 0.1,
            max_vel_trans_ms: 0.5,
            trans_stopped_vel_ms: 0.05,
            rot_stopped_vel_rads: 0.05,
            xy_goal_tolerance_m: 0.1,
            yaw_goal_tolerance_rad: 0.02,
            goal_tune_time_s: 0.5,
            lookahead_time_s: 0.5,
            lookahead_dist_m: 0.5,
            cost_y_lookahead_dist_m: 0.0,
            cost_y_lookahead_time_s: 1.0,
            pos_x_gain: 1.0,
            pos_y_gain: 1.0,
            pos_y_yaw_gain: 1.0,
            yaw_gain: 1.0,
            static_yaw_gain: 3.0,
            cost_x_gain: 0.1,
            cost_y_gain: 0.1,
            cost_y_yaw_gain: 0.1,
            cost_yaw_gain: 1.0,
            start_yaw_error_rad: 0.2,
            large_yaw_error_rad: std::f64::consts::FRAC_PI_6,
            max_curve_vel_ms: 0.2,
            max_goal_dist_m: 0.5,
            max_backup_dist_m: 0.5,
            goal_stop_accel_frac: 0.8,
            obstacle_stop_accel_frac: 0.9,
            emergency_vel_frac: 0.5,
            not_translating_vel_mult: 2.0,
            start_adjust_y_tolerance_frac: 0.5,
            adjusting_y_tolerance_frac: 0.25,
            max_cost: 0.9,
            delta_x_m: 0.3,
            delta_y_m: 0.2,
            delta_yaw_rad: 0.1,
            scan_step_m: 0.05,
            max_scan_dist_m: 10.0,
            min_stop_dist_m: 0.5,
            low_pass_gain: 0.5,
            constrain_final: false,
            max_dt_s: 0.1,
            drive_type: DriveType::Differential,
            base_frame_id: String::from("base_link"),
        }
    }
}

impl Params {
    /// Load parameters from a toml file, applying [`Params::normalise`].
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self, LoadError> {
        let mut params: Self = util::params::load(path)?;
        params.normalise();
        Ok(params)
    }

    /// Enforce the derived-parameter overrides.
    ///
    /// The translational limits are slaved to the forward-axis limits, and
    /// the stopped-speed threshold to the minimum translational speed.
    pub fn normalise(&mut self) {
        self.max_vel_trans_ms = self.max_vel_x_ms;
        self.trans_stopped_vel_ms = 0.5 * self.min_vel_trans_ms;
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_defaults_are_normalised() {
        let mut params = Params::default();
        let before = format!("{:?}", params);
        params.normalise();
        assert_eq!(before, format!("{:?}", params));
    }

    #[test]
    fn test_sparse_file_takes_defaults() {
        let params: Params =
            util::params::from_str("max_vel_x_ms = 1.0\ndrive_type = \"omnidirectional\"")
                .unwrap();

        assert_eq!(params.max_vel_x_ms, 1.0);
        assert_eq!(params.drive_type, DriveType::Omnidirectional);
        // Untouched keys take their defaults
        assert_eq!(params.acc_lim_x_mss, 0.5);
        assert_eq!(params.low_pass_gain, 0.5);
    }
}
