//! Slew-rate limiting for scalar commands.
//!
//! Bounds how fast a command may change between successive calls so motors
//! are not asked for step changes that would slip wheels or brown out the
//! supply.

use serde::{Deserialize, Serialize};

/// Move from `previous` toward `desired` by at most `rate * elapsed`.
///
/// Returns `previous` unchanged when `elapsed` is not positive, when `rate`
/// is not positive, or when either input is not finite.
///
/// ```rust
/// use sprocket_control::slew::limit;
///
/// assert_eq!(limit(100.0, 0.0, 4.0, 1.0), 4.0);
/// assert_eq!(limit(100.0, 0.0, 4.0, 0.0), 0.0);
/// ```
pub fn limit(desired: f64, previous: f64, rate: f64, elapsed: f64) -> f64 {
    if desired == previous {
        return desired;
    }
    if !(elapsed.is_finite() && elapsed > 0.0 && rate.is_finite() && rate > 0.0) {
        return previous;
    }
    if !desired.is_finite() {
        return previous;
    }
    let max_step = rate * elapsed;
    previous + (desired - previous).clamp(-max_step, max_step)
}

/// Stateful slew limiter.
///
/// `rate` bounds changes that move the output away from zero; `decel_rate`
/// bounds changes toward zero (and through it). Both are in units per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SlewLimiter {
    rate: f64,
    decel_rate: f64,
    previous: f64,
}

impl SlewLimiter {
    /// Symmetric limiter starting at zero.
    pub fn new(rate: f64) -> Self {
        Self::asymmetric(rate, rate)
    }

    pub fn asymmetric(accel_rate: f64, decel_rate: f64) -> Self {
        Self {
            rate: accel_rate,
            decel_rate,
            previous: 0.0,
        }
    }

    /// Limit `desired` given `elapsed` seconds since the last step, and
    /// remember the result.
    pub fn step(&mut self, desired: f64, elapsed: f64) -> f64 {
        let slowing = desired.abs() < self.previous.abs() || desired * self.previous < 0.0;
        let rate = if slowing { self.decel_rate } else { self.rate };
        self.previous = limit(desired, self.previous, rate, elapsed);
        self.previous
    }

    /// Forget history and continue from `value`.
    pub fn reset(&mut self, value: f64) {
        self.previous = value;
    }

    /// Last output.
    pub fn value(&self) -> f64 {
        self.previous
    }
}
