// ==============================================================================
// suspension.rs — SPRING/DAMPER ALONG THE WHEEL RAY
// ------------------------------------------------------------------------------
// Ray runs from the wheel mount along chassis -up, bounded by RAY_LENGTH_FACTOR
// x rest_length. Offset is measured against the rest length, so a hit further
// away than rest_length extends the spring (negative offset).
//
//   F = offset * k - v_up * c        (N, along chassis up)
//
// The spring only pushes. A rebounding wheel never pulls the chassis down.
// ==============================================================================

use rapier3d::prelude::*;

pub const RAY_LENGTH_FACTOR: Real = 2.0;

/// Spring/damper magnitude along chassis up: `offset * k - v_up * c`, clamped at zero.
///
/// On fast rebound the unclamped value goes negative. That pull is dropped, so a
/// wheel leaving the ground never drags the chassis down with it.
#[inline]
pub fn spring_damper(rest_length: Real, hit_distance: Real, vertical_velocity: Real, stiffness: Real, damping: Real) -> Real {
    let offset = rest_length - hit_distance;
    (offset * stiffness - vertical_velocity * damping).max(0.0)
}

/// Stiffness and damping from a target static sag:
/// k = m g / sag, c = 2 zeta sqrt(k m), per wheel.
pub fn from_sag(vehicle_mass: Real, wheels: usize, sag_m: Real, zeta: Real) -> (Real, Real) {
    let m = vehicle_mass / wheels.max(1) as Real;
    let k = m * 9.81 / sag_m.max(1e-3);
    let c = 2.0 * zeta * (k * m).sqrt();
    (k, c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn compressed_spring_pushes() {
        // 0.1 m compression, no motion
        assert_relative_eq!(spring_damper(0.5, 0.4, 0.0, 20_000.0, 1_000.0), 2_000.0, epsilon = 1e-2);
    }

    #[test]
    fn closing_velocity_adds_damping() {
        let f = spring_damper(0.5, 0.4, -1.0, 20_000.0, 1_000.0);
        assert_relative_eq!(f, 3_000.0, epsilon = 1e-2);
    }

    #[test]
    fn extended_spring_never_pulls() {
        assert_eq!(spring_damper(0.5, 0.9, 0.0, 20_000.0, 1_000.0), 0.0);
        // unclamped: 0.05 * 20000 - 5 * 1000 = -4000
        assert_eq!(spring_damper(0.5, 0.45, 5.0, 20_000.0, 1_000.0), 0.0);
        assert_eq!(spring_damper(0.5, 0.45, 1.0, 20_000.0, 1_000.0), 0.0);
        assert_relative_eq!(spring_damper(0.5, 0.45, 0.5, 20_000.0, 1_000.0), 500.0, epsilon = 1e-2);
    }

    #[test]
    fn sag_derivation_supports_static_load() {
        let (k, c) = from_sag(1200.0, 4, 0.1, 0.8);
        assert_relative_eq!(k * 0.1, 300.0 * 9.81, epsilon = 1e-1);
        assert!(c > 0.0);
    }
}
