//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()`, violating the mathematical definition, if
/// `self` is much smaller than `rhs.abs()` in magnitude and `self < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float + std::ops::Mul + std::ops::Add + std::ops::Sub + std::ops::Rem
{
    let r = lhs % rhs;
    if r < T::from(0.0).unwrap() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range (-pi, pi].
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float + std::ops::Mul + std::ops::Add + std::ops::Sub + std::ops::Rem
{
    let pi_t: T = T::from(std::f64::consts::PI).unwrap();
    let tau_t: T = T::from(std::f64::consts::TAU).unwrap();

    let wrapped = rem_euclid(angle, tau_t);

    if wrapped > pi_t {
        wrapped - tau_t
    }
    else {
        wrapped
    }
}

/// Get the shortest signed angular distance from `a` to `b`.
///
/// The result is in the range (-pi, pi], with positive values indicating that
/// `b` is anticlockwise of `a`.
pub fn shortest_ang_dist<T>(a: T, b: T) -> T
where
    T: Float + std::ops::Mul + std::ops::Add + std::ops::Sub + std::ops::Rem
{
    wrap_pi(b - a)
}

#[cfg(test)]
mod test {
    use super::*;

    const PI: f64 = std::f64::consts::PI;
    const TAU: f64 = std::f64::consts::TAU;

    #[test]
    fn test_wrap_pi() {
        assert_eq!(wrap_pi(0f64), 0f64);
        assert_eq!(wrap_pi(PI), PI);
        assert_eq!(wrap_pi(-PI), PI);
        assert_eq!(wrap_pi(TAU), 0f64);
        assert_eq!(wrap_pi(TAU + 1f64), 1f64);
        assert_eq!(wrap_pi(-0.5f64), -0.5f64);
    }

    #[test]
    fn test_shortest_ang_dist() {
        assert_eq!(shortest_ang_dist(1f64, 2f64), 1f64);
        assert_eq!(shortest_ang_dist(2f64, 1f64), -1f64);
        assert_eq!(shortest_ang_dist(0f64, TAU), 0f64);
        // crossing the wrap point takes the short way round
        assert!((shortest_ang_dist(PI - 0.1, -PI + 0.1) - 0.2).abs() < 1e-9);
        assert!((shortest_ang_dist(-PI + 0.1, PI - 0.1) + 0.2).abs() < 1e-9);
    }
}
