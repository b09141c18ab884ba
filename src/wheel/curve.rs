// ==============================================================================
// curve.rs — KEYFRAMED RESPONSE CURVES (TRACTION + TORQUE)
// ------------------------------------------------------------------------------
// A ResponseCurve maps a normalized input (slip%, speed%) to a multiplier.
// - keys are (x, y) pairs with strictly increasing x
// - input is clamped to the first/last key
// - `smooth` uses a zero-tangent hermite (smoothstep) between keys, otherwise
//   segments are linear
// - output is clamped to [0, MAX_MULTIPLIER] so friction never goes negative
// ==============================================================================

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Upper bound for any curve output.
pub const MAX_MULTIPLIER: f32 = 4.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCurve {
    pub keys: Vec<[f32; 2]>,
    #[serde(default)]
    pub smooth: bool,
}

impl ResponseCurve {
    pub fn constant(value: f32) -> Self {
        Self { keys: vec![[0.0, value], [1.0, value]], smooth: false }
    }

    pub fn linear(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { keys: vec![[x0, y0], [x1, y1]], smooth: false }
    }

    pub fn ease_in_out(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { keys: vec![[x0, y0], [x1, y1]], smooth: true }
    }

    /// Full grip at low slip, falling to `drift_grip` once the wheel slides.
    pub fn drift_grip(knee: f32, drift_grip: f32) -> Self {
        Self { keys: vec![[0.0, 1.0], [knee, 1.0], [1.0, drift_grip]], smooth: true }
    }

    pub fn validate(&self, name: &'static str) -> Result<(), ConfigError> {
        if self.keys.is_empty() {
            return Err(ConfigError::Curve { name, reason: "no keys".into() });
        }
        for [x, y] in &self.keys {
            if !x.is_finite() || !y.is_finite() {
                return Err(ConfigError::Curve { name, reason: "non-finite key".into() });
            }
        }
        if self.keys.windows(2).any(|w| w[1][0] <= w[0][0]) {
            return Err(ConfigError::Curve {
                name,
                reason: "key x values must be strictly increasing".into(),
            });
        }
        Ok(())
    }

    pub fn evaluate(&self, x: f32) -> f32 {
        let raw = match self.keys.as_slice() {
            [] => 0.0,
            [only] => only[1],
            keys => {
                let first = keys[0];
                let last = keys[keys.len() - 1];
                if !x.is_finite() || x <= first[0] {
                    first[1]
                } else if x >= last[0] {
                    last[1]
                } else {
                    // x is strictly inside [first, last] so a segment exists
                    let i = keys.partition_point(|k| k[0] <= x).max(1);
                    let [x0, y0] = keys[i - 1];
                    let [x1, y1] = keys[i];
                    let mut t = (x - x0) / (x1 - x0);
                    if self.smooth {
                        t = t * t * (3.0 - 2.0 * t);
                    }
                    y0 + (y1 - y0) * t
                }
            }
        };
        raw.clamp(0.0, MAX_MULTIPLIER)
    }
}

impl Default for ResponseCurve {
    fn default() -> Self {
        Self::constant(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn linear_interpolates_and_clamps_input() {
        let c = ResponseCurve::linear(0.0, 1.0, 1.0, 0.5);
        assert_relative_eq!(c.evaluate(0.5), 0.75);
        assert_relative_eq!(c.evaluate(-3.0), 1.0);
        assert_relative_eq!(c.evaluate(7.0), 0.5);
    }

    #[test]
    fn smooth_curve_hits_keys_and_midpoint() {
        let c = ResponseCurve::ease_in_out(0.0, 0.0, 1.0, 1.0);
        assert_relative_eq!(c.evaluate(0.0), 0.0);
        assert_relative_eq!(c.evaluate(0.5), 0.5);
        assert_relative_eq!(c.evaluate(1.0), 1.0);
        assert!(c.evaluate(0.25) < 0.25);
    }

    #[test]
    fn negative_keys_never_produce_negative_grip() {
        let c = ResponseCurve::linear(0.0, 1.0, 1.0, -2.0);
        assert_eq!(c.evaluate(1.0), 0.0);
    }

    #[test]
    fn validate_rejects_unsorted_and_empty() {
        let unsorted = ResponseCurve { keys: vec![[0.5, 1.0], [0.2, 1.0]], smooth: false };
        assert!(unsorted.validate("traction").is_err());
        let empty = ResponseCurve { keys: vec![], smooth: false };
        assert!(empty.validate("traction").is_err());
        assert!(ResponseCurve::drift_grip(0.3, 0.4).validate("traction").is_ok());
    }

    proptest! {
        #[test]
        fn prop_traction_output_in_sane_range(
            slip in 0.0f32..=1.0f32,
            knee in 0.05f32..0.95f32,
            tail in -1.0f32..3.0f32,
        ) {
            let c = ResponseCurve::drift_grip(knee, tail);
            let g = c.evaluate(slip);
            prop_assert!(g >= 0.0 && g <= MAX_MULTIPLIER);
        }
    }
}
