//! # Command shaper
//!
//! Turns the velocity law's raw control terms into a command the base can
//! actually follow. Four stages run in order: a first order low pass filter
//! against the previous cycle's filtered terms, a slew limit against the
//! previously emitted command over the measured cycle time, an absolute
//! clamp to the velocity limits, and (optionally) a projection onto the
//! previous filtered direction during the final goal approach so the base
//! settles along a fixed line without hunting.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::Vector3;

// Internal
use super::law::RawControl;
use super::Params;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Smooths and limits raw control terms cycle over cycle.
///
/// Keeps two pieces of state: the filtered control terms, which carry the
/// low pass history and may exceed the velocity limits while the demand
/// does, and the previously emitted command, which the slew limit works
/// from. Slewing from the emitted command keeps the output anchored to what
/// the base was actually told, so a saturated demand cannot wind the
/// history up past the clamp.
#[derive(Debug, Clone, Default)]
pub struct CommandShaper {
    filtered: RawControl,
    last: RawControl,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CommandShaper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape a raw control into the next command.
    ///
    /// `dt_s` is the elapsed time since the previous command, already
    /// clamped by the caller. When `emergency_brake` is set the forward
    /// deceleration uses the emergency limit instead of the nominal one.
    /// When `final_approach` is set and final constraint is enabled the
    /// command is projected onto the direction of the previous filtered
    /// terms, so only its magnitude can still change.
    pub fn shape(
        &mut self,
        raw: &RawControl,
        dt_s: f64,
        emergency_brake: bool,
        final_approach: bool,
        params: &Params,
    ) -> RawControl {
        let prev = self.filtered;

        // Low pass filter against the previous filtered terms
        let gain = params.low_pass_gain;
        let filtered = RawControl {
            vel_x_ms: lerp(self.filtered.vel_x_ms, raw.vel_x_ms, gain),
            vel_y_ms: lerp(self.filtered.vel_y_ms, raw.vel_y_ms, gain),
            yawrate_rads: lerp(self.filtered.yawrate_rads, raw.yawrate_rads, gain),
        };
        self.filtered = filtered;

        // Slew limit against the previously emitted command. An emergency
        // brake on a still-forward command may decelerate at the emergency
        // limit.
        let acc_x = if emergency_brake
            && raw.vel_x_ms >= 0.0
            && filtered.vel_x_ms < self.last.vel_x_ms
        {
            params.emergency_acc_lim_x_mss
        } else {
            params.acc_lim_x_mss
        };
        let mut cmd = RawControl {
            vel_x_ms: slew(self.last.vel_x_ms, filtered.vel_x_ms, acc_x * dt_s),
            vel_y_ms: slew(
                self.last.vel_y_ms,
                filtered.vel_y_ms,
                params.acc_lim_y_mss * dt_s,
            ),
            yawrate_rads: slew(
                self.last.yawrate_rads,
                filtered.yawrate_rads,
                params.acc_lim_theta_radss * dt_s,
            ),
        };

        // Absolute clamp to the velocity limits
        cmd.vel_x_ms = cmd.vel_x_ms.max(params.min_vel_x_ms).min(params.max_vel_x_ms);
        cmd.vel_y_ms = cmd.vel_y_ms.max(params.min_vel_y_ms).min(params.max_vel_y_ms);
        cmd.yawrate_rads = cmd
            .yawrate_rads
            .max(-params.max_vel_theta_rads)
            .min(params.max_vel_theta_rads);

        // Settle onto the goal during the final approach by projecting the
        // command onto the previous filtered direction. An all-zero history
        // leaves nothing to project onto and passes through untouched.
        if params.constrain_final && final_approach {
            let prev_vec = Vector3::new(prev.vel_x_ms, prev.vel_y_ms, prev.yawrate_rads);
            if prev_vec.norm() > 1e-9 {
                let dir = prev_vec.normalize();
                let proj =
                    dir * Vector3::new(cmd.vel_x_ms, cmd.vel_y_ms, cmd.yawrate_rads).dot(&dir);
                cmd.vel_x_ms = proj[0];
                cmd.vel_y_ms = proj[1];
                cmd.yawrate_rads = proj[2];
            }
        }

        // The emitted command is the next cycle's slew reference
        self.last = cmd;

        cmd
    }

    /// Drop the command history, so the next command slews up from zero.
    pub fn reset(&mut self) {
        self.filtered = RawControl::default();
        self.last = RawControl::default();
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn lerp(from: f64, to: f64, gain: f64) -> f64 {
    from + gain * (to - from)
}

/// Limit `to` so it differs from `from` by at most `max_step`.
fn slew(from: f64, to: f64, max_step: f64) -> f64 {
    to.max(from - max_step).min(from + max_step)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
