//! # Localisation types
//!
//! Planar pose and twist value types used throughout the controller, plus the
//! [`Odometry`] snapshot which pairs them. Poses are produced fresh each
//! cycle, either from the live estimate or by transforming the path, and are
//! never mutated afterwards.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry2, Point2, Rotation2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use util::maths::wrap_pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A planar pose: position and heading in some reference frame.
///
/// The heading is the angle to the positive X axis of the frame, wrapped into
/// (-pi, pi].
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize)]
pub struct Pose {
    /// The position in the reference frame
    pub position_m: Vector2<f64>,

    /// The heading in the reference frame
    pub yaw_rad: f64,
}

/// A planar velocity in the robot's body frame.
///
/// Used both for the measured velocity (input) and the commanded velocity
/// (output).
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize)]
pub struct Twist {
    /// Linear velocity (x forward, y left)
    pub lin_ms: Vector2<f64>,

    /// Angular velocity about the vertical axis
    pub ang_rads: f64,
}

/// A single measurement snapshot: the latest pose and twist of the robot in
/// the local frame.
#[derive(Debug, Copy, Clone, Default)]
pub struct Odometry {
    pub pose: Pose,
    pub twist: Twist,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, wrapping the heading into (-pi, pi].
    pub fn new(x_m: f64, y_m: f64, yaw_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            yaw_rad: wrap_pi(yaw_rad),
        }
    }

    /// Map a body-frame offset into the pose's reference frame.
    pub fn body_to_world(&self, offset_m: Vector2<f64>) -> Vector2<f64> {
        self.position_m + Rotation2::new(self.yaw_rad) * offset_m
    }

    /// Map a point in the pose's reference frame into the body frame.
    pub fn world_to_body(&self, point_m: Vector2<f64>) -> Vector2<f64> {
        Rotation2::new(-self.yaw_rad) * (point_m - self.position_m)
    }

    /// Apply a frame transform to this pose.
    pub fn transformed(&self, tf: &Isometry2<f64>) -> Self {
        let position = tf * Point2::from(self.position_m);

        Self {
            position_m: position.coords,
            yaw_rad: wrap_pi(self.yaw_rad + tf.rotation.angle()),
        }
    }
}

impl Twist {
    pub fn new(vel_x_ms: f64, vel_y_ms: f64, yawrate_rads: f64) -> Self {
        Self {
            lin_ms: Vector2::new(vel_x_ms, vel_y_ms),
            ang_rads: yawrate_rads,
        }
    }

    /// The all-stop twist.
    pub fn zero() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
