// src/vehicle/steering.rs
//
// Speed-sensitive steering lock and the motor/brake choice of `drive`.

use rapier3d::prelude::Real;

/// |throttle| at or below this counts as released.
pub const THROTTLE_DEADZONE: Real = 0.05;

/// Clamps a steer/throttle axis to [-1, 1]. Non-finite input reads as released.
#[inline]
pub fn clamp_axis(value: Real) -> Real {
    if value.is_finite() { value.clamp(-1.0, 1.0) } else { 0.0 }
}

/// Steering lock in degrees: max at standstill, easing toward `min` as speed
/// approaches top speed. Constant when no min is configured.
pub fn effective_steer_deg(max_deg: Real, min_deg: Option<Real>, speed_kph: Real, top_speed_kph: Real) -> Real {
    match min_deg {
        Some(min) if top_speed_kph > 0.0 => {
            let t = (speed_kph / top_speed_kph).clamp(0.0, 1.0);
            max_deg + (min - max_deg) * t
        }
        _ => max_deg,
    }
}

/// What the driven wheels receive this tick. Exactly one of the two.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveForce {
    Motor(Real),
    Brake(Real),
}

pub fn drive_force(throttle: Real, speed_kph: Real, top_speed_kph: Real, motor_force: Real, brake_force: Real) -> DriveForce {
    let throttle = clamp_axis(throttle);
    let accelerating = throttle.abs() > THROTTLE_DEADZONE;
    if accelerating && speed_kph < top_speed_kph {
        DriveForce::Motor(throttle * motor_force)
    } else {
        DriveForce::Brake(brake_force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn steer_lock_narrows_with_speed() {
        assert_relative_eq!(effective_steer_deg(25.0, Some(5.0), 0.0, 100.0), 25.0);
        assert_relative_eq!(effective_steer_deg(25.0, Some(5.0), 50.0, 100.0), 15.0);
        assert_relative_eq!(effective_steer_deg(25.0, Some(5.0), 250.0, 100.0), 5.0);
        assert_relative_eq!(effective_steer_deg(25.0, None, 90.0, 100.0), 25.0);
    }

    #[test]
    fn throttle_above_deadzone_drives() {
        assert_eq!(drive_force(0.5, 10.0, 100.0, 1_500.0, 3_000.0), DriveForce::Motor(750.0));
        assert_eq!(drive_force(-1.0, 10.0, 100.0, 1_500.0, 3_000.0), DriveForce::Motor(-1_500.0));
    }

    #[test]
    fn non_finite_axis_reads_as_released() {
        assert_eq!(clamp_axis(f32::NAN), 0.0);
        assert_eq!(clamp_axis(f32::INFINITY), 0.0);
        assert_eq!(clamp_axis(-3.0), -1.0);
        assert_eq!(drive_force(f32::NAN, 10.0, 100.0, 1_500.0, 3_000.0), DriveForce::Brake(3_000.0));
    }

    #[test]
    fn top_speed_brakes_even_with_throttle() {
        assert_eq!(drive_force(1.0, 100.0, 100.0, 1_500.0, 3_000.0), DriveForce::Brake(3_000.0));
    }

    proptest! {
        #[test]
        fn prop_released_throttle_never_drives(
            throttle in -THROTTLE_DEADZONE..=THROTTLE_DEADZONE,
            speed in 0.0f32..200.0,
        ) {
            let f = drive_force(throttle, speed, 100.0, 1_500.0, 3_000.0);
            prop_assert_eq!(f, DriveForce::Brake(3_000.0));
        }
    }
}
