//! # Trajectory control library
//!
//! Closed loop trajectory tracking for a wheeled base. Given a reference
//! path, odometry measurements and a local cost grid, each control cycle
//! produces one velocity command that pulls the base onto the path, steers
//! it around nearby cost and brings it to a settled stop on the goal pose.
//!
//! The [`ctrl::TrajCtrl`] struct is the entry point. A cycle runs:
//!
//! - Transform the reference path into the local frame
//! - Predict the pose a lookahead time ahead of the measurement
//! - Select the target point on the path from the predicted position
//! - Sample cost gradients and scan the projected trajectory for
//!   obstacles, both from the predicted pose
//! - Evaluate the velocity law state machine
//! - Smooth and limit the raw control into the final command
//!
//! The supporting modules are usable on their own, for instance
//! [`cost_map::CostGrid`] for cost sampling or [`path::Path`] for path
//! geometry.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Cost grid - sampling of normalised traversal cost over a local area
pub mod cost_map;

/// Controller - parameters, velocity law, command shaping and cycle state
pub mod ctrl;

/// Goal checking - instantaneous goal predicates and the reached debouncer
pub mod goal;

/// Gradient estimation - finite difference cost gradients around a pose
pub mod gradient;

/// Localisation primitives - poses, twists and odometry measurements
pub mod loc;

/// Obstacle scanning - forward march along the projected trajectory
pub mod obstacle;

/// Path geometry - pose sequences and index based traversal
pub mod path;

/// Pose prediction - second order extrapolation of a measurement
pub mod predict;

/// Target selection - choosing the pose the control law steers towards
pub mod target;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use ctrl::{Params, StatusReport, TrajCtrl, VelCmd};
pub use loc::{Odometry, Pose, Twist};
pub use path::Path;
