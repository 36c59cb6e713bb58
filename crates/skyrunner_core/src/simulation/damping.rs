//! Exponential smoothing
//!
//! `damp(old, new, λ, dt) = old * e^(-λ dt) + new * (1 - e^(-λ dt))`

use std::ops::{Add, Mul};

/// Critically damped low-pass step from `old` towards `new`
pub fn damp<T>(old: T, new: T, lambda: f32, dt: f32) -> T
where
    T: Mul<f32, Output = T> + Add<Output = T>,
{
    let keep = (-lambda * dt).exp();
    old * keep + new * (1.0 - keep)
}

/// A smoothed quantity that remembers its previous output
///
/// The first update has no history and passes the target through unchanged.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Damped<T> {
    previous: Option<T>,
    lambda: f32,
}

impl<T> Damped<T>
where
    T: Copy + Mul<f32, Output = T> + Add<Output = T>,
{
    /// A fresh filter with damping constant `lambda`
    pub fn new(lambda: f32) -> Self {
        Self { previous: None, lambda }
    }

    /// A filter whose history starts at `value`
    pub fn starting_at(value: T, lambda: f32) -> Self {
        Self { previous: Some(value), lambda }
    }

    /// Move towards `target` by one step of `dt` seconds and return the new value
    pub fn update(&mut self, target: T, dt: f32) -> T {
        let value = match self.previous {
            Some(old) => damp(old, target, self.lambda, dt),
            None => target,
        };
        self.previous = Some(value);
        value
    }

    /// Last value produced, if any
    pub fn value(&self) -> Option<T> {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec3;
    use approx::assert_relative_eq;

    #[test]
    fn test_zero_dt_returns_old_value() {
        assert_relative_eq!(damp(3.0_f32, 10.0, 8.0, 0.0), 3.0);

        let old = Vec3::new(1.0, 2.0, 3.0);
        assert_relative_eq!(damp(old, Vec3::zeros(), 2.0, 0.0), old);
    }

    #[test]
    fn test_constant_target_converges_monotonically() {
        let mut filter = Damped::starting_at(0.0_f32, 2.0);
        let mut last = 0.0;

        for _ in 0..600 {
            let value = filter.update(5.0, 1.0 / 60.0);
            assert!(value >= last - 1e-6);
            assert!(value <= 5.0 + 1e-6);
            last = value;
        }

        assert_relative_eq!(last, 5.0, epsilon = 1e-3);
    }

    #[test]
    fn test_convergence_from_above() {
        let mut filter = Damped::starting_at(100.0_f32.to_radians(), 2.0);
        let target = 45.0_f32.to_radians();
        let mut last = filter.value().unwrap();

        for _ in 0..1200 {
            let value = filter.update(target, 1.0 / 60.0);
            assert!(value <= last + 1e-6);
            last = value;
        }

        assert_relative_eq!(last, target, epsilon = 1e-4);
    }

    #[test]
    fn test_first_update_passes_target_through() {
        let mut filter = Damped::new(8.0);
        let target = Vec3::new(0.0, 0.26, 2.2);

        assert_eq!(filter.update(target, 0.5), target);
        assert_eq!(filter.value(), Some(target));
    }

    #[test]
    fn test_single_step_weight() {
        let value = damp(0.0_f32, 1.0, 2.0, 0.5);
        assert_relative_eq!(value, 1.0 - (-1.0_f32).exp());
    }
}
