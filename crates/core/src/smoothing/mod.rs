use serde::{Deserialize, Serialize};

use crate::SmoothingConfig;

/// Direction of a smoothed value relative to its target at the start of a
/// tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Escalating,
    DeEscalating,
}

/// Bounded `(target, actual)` pair moved by exponential smoothing.
///
/// Targets are clamped into `[min, max]` before assignment. Every step is a
/// convex combination of `actual` and `target`, so `actual` stays in bounds
/// and never overshoots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Smoothed {
    target: f32,
    actual: f32,
    min: f32,
    max: f32,
}

impl Smoothed {
    pub fn new(initial: f32, min: f32, max: f32) -> Self {
        let initial = initial.clamp(min, max);
        Self {
            target: initial,
            actual: initial,
            min,
            max,
        }
    }

    /// Smoothed value constrained to the unit interval.
    pub fn unit(initial: f32) -> Self {
        Self::new(initial, 0.0, 1.0)
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn actual(&self) -> f32 {
        self.actual
    }

    pub fn set_target(&mut self, value: f32) {
        if value.is_finite() {
            self.target = value.clamp(self.min, self.max);
        }
    }

    pub fn direction(&self) -> Direction {
        if self.target > self.actual {
            Direction::Escalating
        } else {
            Direction::DeEscalating
        }
    }

    /// One smoothing step: `actual += (target - actual) * rate`.
    pub fn step(&mut self, rate: f32) -> f32 {
        let rate = rate.clamp(0.0, 1.0);
        self.actual += (self.target - self.actual) * rate;
        self.actual
    }

    /// Steps with the rate picked by `policy` for the current direction.
    pub fn step_with(&mut self, policy: &RatePolicy) -> f32 {
        let rate = policy.rate(self.direction());
        self.step(rate)
    }

    /// Adds an instantaneous bump to `actual`. Later steps decay it back.
    pub fn bump(&mut self, magnitude: f32) {
        if magnitude.is_finite() {
            self.actual = (self.actual + magnitude).clamp(self.min, self.max);
        }
    }

    /// Distance left to cover.
    pub fn gap(&self) -> f32 {
        (self.target - self.actual).abs()
    }
}

/// Asymmetric rate selection: slow when waking up, faster when settling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatePolicy {
    pub escalate: f32,
    pub deescalate: f32,
}

impl RatePolicy {
    pub const fn new(escalate: f32, deescalate: f32) -> Self {
        Self {
            escalate,
            deescalate,
        }
    }

    /// The same rate in both directions.
    pub const fn symmetric(rate: f32) -> Self {
        Self::new(rate, rate)
    }

    pub fn activity(config: &SmoothingConfig) -> Self {
        Self::new(config.escalate_rate, config.deescalate_rate)
    }

    pub fn error(config: &SmoothingConfig) -> Self {
        Self::symmetric(config.error_rate)
    }

    pub fn color(config: &SmoothingConfig) -> Self {
        Self::symmetric(config.color_rate)
    }

    pub fn rate(&self, direction: Direction) -> f32 {
        match direction {
            Direction::Escalating => self.escalate,
            Direction::DeEscalating => self.deescalate,
        }
    }
}

/// Ticks needed for a gap of 1 to shrink below `epsilon` at a fixed `rate`.
pub fn ticks_to_converge(rate: f32, epsilon: f32) -> u32 {
    let ticks = (f64::from(epsilon).ln() / (1.0 - f64::from(rate)).ln()).ceil();
    ticks.max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn clamps_targets() {
        let mut value = Smoothed::unit(0.0);
        value.set_target(3.0);
        assert_eq!(value.target(), 1.0);
        value.set_target(-1.0);
        assert_eq!(value.target(), 0.0);
        value.set_target(f32::NAN);
        assert_eq!(value.target(), 0.0);
    }

    #[test]
    fn picks_rate_by_direction() {
        let policy = RatePolicy::new(0.01, 0.1);
        let mut value = Smoothed::unit(0.0);
        value.set_target(1.0);
        assert_eq!(value.direction(), Direction::Escalating);
        value.step_with(&policy);
        assert!((value.actual() - 0.01).abs() < 1e-6);

        value.set_target(0.0);
        assert_eq!(value.direction(), Direction::DeEscalating);
        value.step_with(&policy);
        assert!((value.actual() - 0.009).abs() < 1e-6);
    }

    #[test]
    fn bump_stays_in_bounds() {
        let mut value = Smoothed::unit(0.8);
        value.bump(0.5);
        assert_eq!(value.actual(), 1.0);
        assert_eq!(value.target(), 0.8);
    }

    #[test]
    fn converges_within_predicted_ticks() {
        let rate = 0.05;
        let epsilon = 1e-3;
        let mut value = Smoothed::unit(0.0);
        value.set_target(1.0);
        for _ in 0..ticks_to_converge(rate, epsilon) {
            value.step(rate);
        }
        assert!(value.gap() <= epsilon + 1e-6);
    }

    proptest! {
        #[test]
        fn gap_never_increases(
            start in 0.0f32..=1.0,
            target in 0.0f32..=1.0,
            rate in 0.001f32..0.999,
        ) {
            let mut value = Smoothed::unit(start);
            value.set_target(target);
            let mut previous = value.gap();
            for _ in 0..200 {
                value.step(rate);
                let gap = value.gap();
                prop_assert!(gap <= previous);
                prop_assert!((0.0..=1.0).contains(&value.actual()));
                previous = gap;
            }
        }
    }
}
