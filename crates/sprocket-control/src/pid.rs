//! Error-feedback PID (Proportional–Integral–Derivative) controller.
//!
//! The controller is hardware-agnostic: the caller computes the error
//! (set-point minus measurement) and receives the corrective output, which it
//! can apply to any actuator.
//!
//! Two update forms are provided:
//!
//! - [`Pid::update`] – untimed. The integral is the plain sum of errors and the
//!   derivative is the difference between consecutive errors, so the caller
//!   must call it at a steady cadence.
//! - [`Pid::update_timed`] – scales the integral by `dt` and divides the
//!   derivative by `dt`.
//!
//! Integral wind-up is handled by an [`AntiWindup`] policy whose three rules
//! compose freely.
//!
//! # Example
//!
//! ```rust
//! use sprocket_control::pid::{AntiWindup, Pid};
//!
//! let mut pid = Pid::new(0.5, 0.01, 0.1)
//!     .with_anti_windup(AntiWindup::default().reset_on_sign_change())
//!     .with_output_limits(-12.0, 12.0);
//!
//! let output = pid.update(24.0); // 24 units short of the target
//! assert!(output > 0.0);
//! ```

use serde::{Deserialize, Serialize};

/// Proportional, integral and derivative gains.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
}

impl Gains {
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self { kp, ki, kd }
    }
}

/// Integral anti-windup policy.
///
/// Rules are applied each tick in this order:
///
/// 1. **Zero-crossing reset** – when the error changes sign the integral is
///    zeroed before the new error is added. Zero counts as a sign of its
///    own, so an error that lands exactly on zero also clears it.
/// 2. **Conditional integration** – accumulate only while
///    `|error| < windup_range`.
/// 3. **Integral clamp** – accumulate only while `|integral| < integral_cap`.
///
/// The default policy disables all three.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AntiWindup {
    pub windup_range: Option<f64>,
    pub integral_cap: Option<f64>,
    pub reset_on_sign_change: bool,
}

impl AntiWindup {
    /// Only integrate while the error magnitude is below `range`.
    pub fn windup_range(mut self, range: f64) -> Self {
        self.windup_range = Some(range);
        self
    }

    /// Stop integrating once the integral magnitude reaches `cap`.
    pub fn integral_cap(mut self, cap: f64) -> Self {
        self.integral_cap = Some(cap);
        self
    }

    /// Zero the integral whenever the error changes sign.
    pub fn reset_on_sign_change(mut self) -> Self {
        self.reset_on_sign_change = true;
        self
    }

    fn allows_accumulation(&self, error: f64, integral: f64) -> bool {
        let in_range = self.windup_range.is_none_or(|range| error.abs() < range);
        let under_cap = self.integral_cap.is_none_or(|cap| integral.abs() < cap);
        in_range && under_cap
    }
}

/// A tunable PID controller.
///
/// Owns its integral accumulator and previous error exclusively. They change
/// only through [`update`](Self::update), [`update_timed`](Self::update_timed)
/// and [`reset`](Self::reset). Call `reset` between independent movements,
/// otherwise the previous movement's accumulation leaks into the next one.
#[derive(Debug, Clone)]
pub struct Pid {
    gains: Gains,
    anti_windup: AntiWindup,
    integral: f64,
    previous_error: f64,
    output_min: f64,
    output_max: f64,
}

impl Pid {
    /// Create a new controller with the given gains.
    ///
    /// Anti-windup is disabled and output is unclamped by default.
    pub fn new(kp: f64, ki: f64, kd: f64) -> Self {
        Self::from_gains(Gains::new(kp, ki, kd))
    }

    pub fn from_gains(gains: Gains) -> Self {
        Self {
            gains,
            anti_windup: AntiWindup::default(),
            integral: 0.0,
            previous_error: 0.0,
            output_min: f64::NEG_INFINITY,
            output_max: f64::INFINITY,
        }
    }

    pub fn with_anti_windup(mut self, anti_windup: AntiWindup) -> Self {
        self.anti_windup = anti_windup;
        self
    }

    /// Clamp the output to `[min, max]`. The bounds are swapped if given in
    /// the wrong order.
    pub fn with_output_limits(mut self, min: f64, max: f64) -> Self {
        self.set_output_limits(min, max);
        self
    }

    pub fn set_gains(&mut self, kp: f64, ki: f64, kd: f64) {
        self.gains = Gains::new(kp, ki, kd);
    }

    pub fn set_anti_windup(&mut self, anti_windup: AntiWindup) {
        self.anti_windup = anti_windup;
    }

    /// NaN bounds are ignored.
    pub fn set_output_limits(&mut self, min: f64, max: f64) {
        if min.is_nan() || max.is_nan() {
            return;
        }
        self.output_min = min.min(max);
        self.output_max = min.max(max);
    }

    pub fn gains(&self) -> Gains {
        self.gains
    }

    /// Current integral accumulator.
    pub fn integral(&self) -> f64 {
        self.integral
    }

    /// Compute the next output from `error` (untimed form).
    ///
    /// Returns `NaN` without touching internal state when `error` is not
    /// finite.
    pub fn update(&mut self, error: f64) -> f64 {
        if !error.is_finite() {
            return f64::NAN;
        }
        self.accumulate(error, error);
        let derivative = error - self.previous_error;
        self.finish(error, derivative)
    }

    /// Compute the next output from `error`, scaling by the elapsed `dt`
    /// (seconds).
    ///
    /// Returns `0.0` without updating internal state if `dt` is not positive
    /// and finite, and `NaN` without updating state if `error` is not finite.
    pub fn update_timed(&mut self, error: f64, dt: f64) -> f64 {
        if !(dt.is_finite() && dt > 0.0) {
            return 0.0;
        }
        if !error.is_finite() {
            return f64::NAN;
        }
        self.accumulate(error, error * dt);
        let derivative = (error - self.previous_error) / dt;
        self.finish(error, derivative)
    }

    /// Zero the integral accumulator and the previous error.
    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.previous_error = 0.0;
    }

    fn accumulate(&mut self, error: f64, increment: f64) {
        if self.anti_windup.reset_on_sign_change && sign(error) != sign(self.previous_error) {
            self.integral = 0.0;
        }
        if self.anti_windup.allows_accumulation(error, self.integral) {
            self.integral += increment;
        }
    }

    fn finish(&mut self, error: f64, derivative: f64) -> f64 {
        self.previous_error = error;
        let Gains { kp, ki, kd } = self.gains;
        (kp * error + ki * self.integral + kd * derivative).clamp(self.output_min, self.output_max)
    }
}

/// `-1`, `0` or `1`; unlike `f64::signum`, zero maps to zero.
fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}
