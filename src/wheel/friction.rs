// ==============================================================================
// friction.rs — LATERAL GRIP + LONGITUDINAL DRIVE/BRAKE AT ONE WHEEL
// ------------------------------------------------------------------------------
// Lateral: kill the sideways velocity of the contact in one tick, scaled by
// the traction curve (slip% -> grip) and a per-wheel friction multiplier.
//
//   slip% = clamp01(|v_lat| / max_slip_speed)
//   F_lat = (-v_lat / dt) * right * traction(slip%) * friction_multiplier
//
// Longitudinal: motor pushes along the wheel forward axis scaled by the torque
// curve (speed% -> multiplier). Brake opposes the forward contact velocity and
// never removes more than this wheel's share of momentum in a tick.
// ==============================================================================

use rapier3d::prelude::*;

/// Forward speeds below this are treated as stopped for braking.
pub const BRAKE_STOP_SPEED: Real = 1e-3;

/// Normalized lateral slip. A non-positive `max_slip_speed` reports no slip.
#[inline]
pub fn slip_percent(v_lat: Real, max_slip_speed: Real) -> Real {
    if max_slip_speed <= 0.0 || !v_lat.is_finite() {
        return 0.0;
    }
    (v_lat.abs() / max_slip_speed).clamp(0.0, 1.0)
}

/// Corrective lateral force. Zero when `dt` is not positive.
#[inline]
pub fn lateral_force(v_lat: Real, right: &Vector<Real>, dt: Real, grip: Real, friction_multiplier: Real) -> Vector<Real> {
    if dt <= 0.0 {
        return Vector::zeros();
    }
    right * ((-v_lat / dt) * grip * friction_multiplier)
}

#[inline]
pub fn motor_force(forward: &Vector<Real>, motor: Real, torque_multiplier: Real) -> Vector<Real> {
    forward * (motor * torque_multiplier)
}

/// Brake force along `-sign(v_long) * forward`, limited to what stops
/// `mass_share` kg moving at `v_long` within `dt`.
pub fn brake_force(forward: &Vector<Real>, v_long: Real, brake: Real, mass_share: Real, dt: Real) -> Vector<Real> {
    if brake <= 0.0 || dt <= 0.0 || v_long.abs() < BRAKE_STOP_SPEED {
        return Vector::zeros();
    }
    let stopping = v_long.abs() * mass_share / dt;
    forward * (-v_long.signum() * brake.min(stopping))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn slip_saturates_at_max_slip_speed() {
        assert_relative_eq!(slip_percent(5.0, 1.0), 1.0);
        assert_relative_eq!(slip_percent(-0.5, 1.0), 0.5);
        assert_eq!(slip_percent(3.0, 0.0), 0.0);
    }

    #[test]
    fn lateral_force_opposes_sideways_motion() {
        let right = vector![-1.0, 0.0, 0.0];
        let f = lateral_force(2.0, &right, 0.5, 1.0, 10.0);
        // v_lat along +right, force along -right
        assert_relative_eq!(f, vector![40.0, 0.0, 0.0], epsilon = 1e-4);
    }

    #[test]
    fn zero_dt_applies_no_correction() {
        let f = lateral_force(2.0, &vector![1.0, 0.0, 0.0], 0.0, 1.0, 10.0);
        assert_eq!(f, Vector::zeros());
    }

    #[test]
    fn brake_never_reverses_motion() {
        let fwd = vector![0.0, 0.0, 1.0];
        // 300 kg share at 0.1 m/s over 1/60 s needs 1800 N to stop
        let f = brake_force(&fwd, 0.1, 10_000.0, 300.0, 1.0 / 60.0);
        assert_relative_eq!(f.z, -1_800.0, epsilon = 1e-1);
        let f = brake_force(&fwd, -20.0, 5_000.0, 300.0, 1.0 / 60.0);
        assert_relative_eq!(f.z, 5_000.0, epsilon = 1e-3);
        assert_eq!(brake_force(&fwd, 0.0, 5_000.0, 300.0, 1.0 / 60.0), Vector::zeros());
    }

    proptest! {
        #[test]
        fn prop_slip_is_normalized(v_lat in -100.0f32..100.0, max_slip in 0.01f32..50.0) {
            let s = slip_percent(v_lat, max_slip);
            prop_assert!((0.0..=1.0).contains(&s));
        }
    }
}
