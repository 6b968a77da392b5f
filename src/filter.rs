// Smoothing primitives: One-Euro adaptive low-pass, time-constant low-pass, critically damped approach.
// Rule: a stable, slightly-late cursor feels better than a jittery "correct" one.

use std::f64::consts::PI;

use crate::types::{NormalizedCoord, Vec2};

const MIN_DT: f64 = 1e-4;
const MIN_CUTOFF_HZ: f64 = 1e-4;

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Exponential smoothing factor for a cutoff frequency (Hz) at step `dt`.
/// `alpha = 1 / (1 + tau/dt)` with `tau = 1 / (2π·cutoff)`.
pub fn smoothing_alpha(cutoff: f64, dt: f64) -> f64 {
    let tau = 1.0 / (2.0 * PI * cutoff.max(MIN_CUTOFF_HZ));
    1.0 / (1.0 + tau / dt.max(MIN_DT))
}

/// Smoothing factor for a first-order low-pass with time constant `tau` seconds.
/// A zero time constant follows the input immediately.
pub fn time_constant_alpha(tau: f64, dt: f64) -> f64 {
    if tau <= 0.0 {
        1.0
    } else {
        1.0 - (-dt.max(0.0) / tau).exp()
    }
}

/// One-Euro filter over a 2D normalized position.
///
/// The velocity estimate is itself low-passed at `d_cutoff`; its magnitude raises the
/// position cutoff so fast motion lags less and slow motion jitters less.
#[derive(Debug, Clone)]
pub struct OneEuroFilter2D {
    min_cutoff: f64,
    beta: f64,
    d_cutoff: f64,
    value: Option<NormalizedCoord>,
    velocity: Vec2,
}

impl OneEuroFilter2D {
    pub fn new(min_cutoff: f64, beta: f64, d_cutoff: f64) -> Self {
        OneEuroFilter2D {
            min_cutoff,
            beta,
            d_cutoff,
            value: None,
            velocity: Vec2::ZERO,
        }
    }

    /// Jump straight to `position` and forget the velocity.
    pub fn seed(&mut self, position: NormalizedCoord) {
        self.value = Some(position);
        self.velocity = Vec2::ZERO;
    }

    pub fn reset(&mut self) {
        self.value = None;
        self.velocity = Vec2::ZERO;
    }

    pub fn is_seeded(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<NormalizedCoord> {
        self.value
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    /// Feed one raw sample. The first sample seeds the filter.
    pub fn filter(&mut self, raw: NormalizedCoord, dt: f64) -> NormalizedCoord {
        let dt = dt.max(MIN_DT);
        let Some(prev) = self.value else {
            self.seed(raw);
            return raw;
        };

        let raw_velocity = prev.delta_to(&raw).scale(1.0 / dt);
        let a_d = smoothing_alpha(self.d_cutoff, dt);
        self.velocity = Vec2::new(
            lerp(self.velocity.x, raw_velocity.x, a_d),
            lerp(self.velocity.y, raw_velocity.y, a_d),
        );

        let cutoff = self.min_cutoff.max(self.min_cutoff + self.beta * self.velocity.length());
        let a = smoothing_alpha(cutoff, dt);
        let next = NormalizedCoord::new(lerp(prev.x, raw.x, a), lerp(prev.y, raw.y, a));
        self.value = Some(next);
        next
    }

    /// Keep the position, let the velocity estimate settle toward zero.
    pub fn hold(&mut self, dt: f64) {
        let a_d = smoothing_alpha(self.d_cutoff, dt);
        self.velocity = self.velocity.scale(1.0 - a_d);
    }

    pub fn stop(&mut self) {
        self.velocity = Vec2::ZERO;
    }
}

/// Critically damped approach toward a target (game-engine style smooth damp).
#[derive(Debug, Clone, Copy, Default)]
pub struct SmoothDamp {
    pub value: f64,
    velocity: f64,
}

impl SmoothDamp {
    pub fn new(value: f64) -> Self {
        SmoothDamp {
            value,
            velocity: 0.0,
        }
    }

    /// Advance one step toward `target`, taking roughly `smooth_time` seconds to arrive.
    pub fn step(&mut self, target: f64, smooth_time: f64, dt: f64) -> f64 {
        let dt = dt.max(MIN_DT);
        let smooth_time = smooth_time.max(MIN_DT);
        let omega = 2.0 / smooth_time;
        let x = omega * dt;
        let decay = 1.0 / (1.0 + x + 0.48 * x * x + 0.235 * x * x * x);

        let change = self.value - target;
        let temp = (self.velocity + omega * change) * dt;
        self.velocity = (self.velocity - omega * temp) * decay;
        let mut output = target + (change + temp) * decay;

        // Never overshoot the target.
        if (target - self.value > 0.0) == (output > target) {
            output = target;
            self.velocity = 0.0;
        }
        self.value = output;
        output
    }

    pub fn set_immediate(&mut self, value: f64) {
        self.value = value;
        self.velocity = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_bounds() {
        let a = smoothing_alpha(7.0, 1.0 / 60.0);
        assert!(a > 0.0 && a < 1.0);
        // Higher cutoff follows the input more closely.
        assert!(smoothing_alpha(30.0, 1.0 / 60.0) > a);
        assert_eq!(time_constant_alpha(0.0, 0.016), 1.0);
        assert!(time_constant_alpha(0.06, 0.016) < 1.0);
    }

    #[test]
    fn first_sample_seeds() {
        let mut f = OneEuroFilter2D::new(7.0, 0.55, 1.5);
        let p = NormalizedCoord::new(0.3, 0.6);
        assert_eq!(f.filter(p, 0.016), p);
        assert_eq!(f.velocity(), Vec2::ZERO);
    }

    #[test]
    fn converges_on_constant_input() {
        let mut f = OneEuroFilter2D::new(7.0, 0.55, 1.5);
        f.seed(NormalizedCoord::new(0.2, 0.2));
        let target = NormalizedCoord::new(0.8, 0.4);
        let mut out = NormalizedCoord::center();
        for _ in 0..240 {
            out = f.filter(target, 1.0 / 60.0);
        }
        assert!(out.distance(&target) < 1e-3);
    }

    #[test]
    fn fast_motion_lags_less_than_slow() {
        // Same raw step; the filter that is already moving opens its cutoff wider.
        let dt = 1.0 / 60.0;
        let mut slow = OneEuroFilter2D::new(1.0, 2.0, 1.5);
        slow.seed(NormalizedCoord::new(0.5, 0.5));
        let mut fast = slow.clone();
        fast.velocity = Vec2::new(2.0, 0.0);
        let step_slow = slow.filter(NormalizedCoord::new(0.6, 0.5), dt).x - 0.5;
        let step_fast = fast.filter(NormalizedCoord::new(0.6, 0.5), dt).x - 0.5;
        assert!(step_fast > step_slow);
    }

    #[test]
    fn hold_decays_velocity() {
        let mut f = OneEuroFilter2D::new(7.0, 0.55, 1.5);
        f.seed(NormalizedCoord::new(0.5, 0.5));
        f.filter(NormalizedCoord::new(0.7, 0.5), 0.016);
        let before = f.velocity().length();
        assert!(before > 0.0);
        for _ in 0..60 {
            f.hold(0.016);
        }
        assert!(f.velocity().length() < before * 0.5);
    }

    #[test]
    fn smooth_damp_reaches_target_without_overshoot() {
        let mut s = SmoothDamp::new(0.0);
        let mut max_seen: f64 = 0.0;
        for _ in 0..120 {
            max_seen = max_seen.max(s.step(1.0, 0.06, 1.0 / 60.0));
        }
        assert!(max_seen <= 1.0);
        assert!((s.value - 1.0).abs() < 1e-3);
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Filter output never leaves the unit square, whatever the input stream.
            #[test]
            fn filter_output_stays_normalized(
                points in proptest::collection::vec((0.0f64..=1.0, 0.0f64..=1.0), 1..80),
                dt in 0.001f64..0.2,
                beta in 0.0f64..2.0,
            ) {
                let mut f = OneEuroFilter2D::new(6.5, beta, 1.5);
                for (x, y) in points {
                    let out = f.filter(NormalizedCoord::new(x, y), dt);
                    prop_assert!((0.0..=1.0).contains(&out.x));
                    prop_assert!((0.0..=1.0).contains(&out.y));
                }
            }

            /// Smooth damp stays between its start value and the target.
            #[test]
            fn smooth_damp_is_bounded(
                start in 0.0f64..=1.0,
                target in 0.0f64..=1.0,
                smooth in 0.01f64..0.5,
                dt in 0.001f64..0.1,
            ) {
                let mut s = SmoothDamp::new(start);
                let (lo, hi) = if start <= target { (start, target) } else { (target, start) };
                for _ in 0..50 {
                    let v = s.step(target, smooth, dt);
                    prop_assert!(v >= lo - 1e-9 && v <= hi + 1e-9);
                }
            }
        }
    }
}
