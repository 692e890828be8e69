//! # Path
//!
//! This module defines the reference path tracked by the controller. A path
//! is an ordered sequence of poses in the planner's (global) frame, replaced
//! wholesale whenever a new plan is set and read-only during a control cycle.
//!
//! Traversal is strictly index based: the nearest-point search and the
//! arc-length march both operate on indices into the pose sequence, and a
//! march that would run past the final point clamps to the final point rather
//! than failing.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Isometry2, Vector2};
use serde::{Deserialize, Serialize};

// Internal
use crate::loc::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A path defining the desired trajectory of the robot.
#[derive(Clone, Serialize, Deserialize, Debug, Default)]
pub struct Path {
    pub poses: Vec<Pose>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Path {
    /// Create a new empty path
    pub fn new_empty() -> Self {
        Self { poses: Vec::new() }
    }

    pub fn from_poses(poses: Vec<Pose>) -> Self {
        Self { poses }
    }

    /// Produces a direct path between the two position vectors, with each
    /// point in the path having at most the given separation. Each pose takes
    /// the bearing of the line as its heading.
    pub fn direct(from: Vector2<f64>, to: Vector2<f64>, point_sep_m: f64) -> Self {
        let diff_vec = to - from;
        let dist = diff_vec.norm();
        let yaw_rad = diff_vec[1].atan2(diff_vec[0]);

        // If the points are closer than the separation just produce a new
        // path with the from and to being the only points.
        if dist <= point_sep_m {
            return Self {
                poses: vec![
                    Pose { position_m: from, yaw_rad },
                    Pose { position_m: to, yaw_rad },
                ],
            };
        }

        // Get the number of points needed to get regular spacing of the given
        // separation, noting that we should ceil this so the final point,
        // placed exactly on the target, is never more than the separation
        // from the one before it.
        let num_points = (dist / point_sep_m).ceil() as usize;

        // Get the delta vector that we can add to the previous point at each
        // step, i.e. the difference vector but of length point_sep_m.
        let delta = point_sep_m / dist * diff_vec;

        let mut poses = vec![Pose { position_m: from, yaw_rad }];

        for i in 1..num_points {
            poses.push(Pose {
                position_m: poses[i - 1].position_m + delta,
                yaw_rad,
            });
        }

        // Always end exactly on the target
        poses.push(Pose { position_m: to, yaw_rad });

        Self { poses }
    }

    pub fn len(&self) -> usize {
        self.poses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.poses.is_empty()
    }

    /// The final pose of the path, if there is one.
    pub fn last(&self) -> Option<&Pose> {
        self.poses.last()
    }

    /// Apply a frame transform to every pose of the path.
    pub fn transformed(&self, tf: &Isometry2<f64>) -> Self {
        Self {
            poses: self.poses.iter().map(|p| p.transformed(tf)).collect(),
        }
    }

    /// Find the index of the path point closest (euclidean) to the given
    /// position.
    ///
    /// Ties are broken by path order, the first occurrence winning. Returns
    /// `None` on an empty path.
    pub fn nearest_index(&self, position_m: Vector2<f64>) -> Option<usize> {
        let mut index_short: Option<usize> = None;
        let mut dist_short = f64::INFINITY;

        for (i, pose) in self.poses.iter().enumerate() {
            let dist = (pose.position_m - position_m).norm();
            if dist < dist_short {
                dist_short = dist;
                index_short = Some(i);
            }
        }

        index_short
    }

    /// March forward along the path from `start` by the given arc-length.
    ///
    /// Returns the index of the first point at which the cumulative segment
    /// length from `start` meets the requested distance. If the end of the
    /// path is reached first the final point's index is returned.
    ///
    /// # Panics
    ///
    /// Panics if the path is empty or `start` is out of bounds.
    pub fn march(&self, start: usize, dist_m: f64) -> usize {
        let mut prev = start;
        let mut dist_left = dist_m;

        for i in start..self.poses.len() {
            dist_left -= (self.poses[i].position_m - self.poses[prev].position_m).norm();
            if dist_left <= 0.0 {
                return i;
            }
            prev = i;
        }

        self.poses.len() - 1
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn straight_path() -> Path {
        // 11 points from (0, 0) to (1, 0), 0.1 m apart
        Path::from_poses(
            (0..11)
                .map(|i| Pose::new(i as f64 * 0.1, 0.0, 0.0))
                .collect(),
        )
    }

    #[test]
    fn test_nearest_index() {
        let path = straight_path();

        assert_eq!(path.nearest_index(Vector2::new(0.0, 0.0)), Some(0));
        assert_eq!(path.nearest_index(Vector2::new(0.52, 0.3)), Some(5));
        assert_eq!(path.nearest_index(Vector2::new(10.0, 0.0)), Some(10));
        assert_eq!(Path::new_empty().nearest_index(Vector2::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_march_covers_distance() {
        let path = straight_path();

        // 0.25 m from the start lands on the third point (0.3 m cumulative)
        assert_eq!(path.march(0, 0.25), 3);

        // Zero distance stays put
        assert_eq!(path.march(4, 0.0), 4);
    }

    #[test]
    fn test_march_clamps_to_final_point() {
        let path = straight_path();

        // A march longer than the path always resolves to the final point
        assert_eq!(path.march(0, 100.0), 10);
        assert_eq!(path.march(9, 100.0), 10);
        assert_eq!(path.march(10, 100.0), 10);
    }

    #[test]
    fn test_direct_spacing() {
        let path = Path::direct(Vector2::new(0.0, 0.0), Vector2::new(1.0, 0.0), 0.05);

        assert!(path.len() >= 2);
        assert!((path.last().unwrap().position_m - Vector2::new(1.0, 0.0)).norm() < 1e-9);
        for pair in path.poses.windows(2) {
            assert!((pair[1].position_m - pair[0].position_m).norm() <= 0.05 + 1e-9);
        }
    }
}
