//! Settle predicate shared by every closed-loop movement.
//!
//! A movement is settled once both its linear and angular errors have stayed
//! inside their deadbands for `settle_ticks` consecutive control ticks.

use sprocket_types::MotionState;

/// Evaluates the settle predicate once per tick.
///
/// ```rust
/// use sprocket_control::settle::SettleTracker;
/// use sprocket_types::MotionState;
///
/// let mut settle = SettleTracker::new(0.5, 0.05).with_settle_ticks(2);
/// assert_eq!(settle.observe(0.1, 0.0), MotionState::Running);
/// assert_eq!(settle.observe(0.1, 0.0), MotionState::Settled);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SettleTracker {
    linear_deadband: f64,
    angular_deadband: f64,
    settle_ticks: u32,
    in_band: u32,
}

impl SettleTracker {
    /// Settle on the first tick inside both deadbands.
    pub fn new(linear_deadband: f64, angular_deadband: f64) -> Self {
        Self {
            linear_deadband: linear_deadband.abs(),
            angular_deadband: angular_deadband.abs(),
            settle_ticks: 1,
            in_band: 0,
        }
    }

    /// Require `ticks` consecutive in-band ticks (minimum 1).
    pub fn with_settle_ticks(mut self, ticks: u32) -> Self {
        self.settle_ticks = ticks.max(1);
        self
    }

    /// `true` when both errors are within their deadbands.
    pub fn in_band(&self, linear_error: f64, angular_error: f64) -> bool {
        linear_error.abs() <= self.linear_deadband && angular_error.abs() <= self.angular_deadband
    }

    /// Record one tick and report whether the movement has settled.
    ///
    /// A NaN error counts as out of band.
    pub fn observe(&mut self, linear_error: f64, angular_error: f64) -> MotionState {
        if self.in_band(linear_error, angular_error) {
            self.in_band = self.in_band.saturating_add(1);
        } else {
            self.in_band = 0;
        }
        if self.in_band >= self.settle_ticks {
            MotionState::Settled
        } else {
            MotionState::Running
        }
    }

    pub fn reset(&mut self) {
        self.in_band = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settles_immediately_with_single_tick() {
        let mut s = SettleTracker::new(1.0, 0.1);
        assert_eq!(s.observe(0.0, 0.0), MotionState::Settled);
    }

    #[test]
    fn both_errors_must_be_in_band() {
        let mut s = SettleTracker::new(1.0, 0.1);
        assert_eq!(s.observe(0.5, 0.2), MotionState::Running);
        assert_eq!(s.observe(2.0, 0.0), MotionState::Running);
        assert_eq!(s.observe(-0.5, -0.05), MotionState::Settled);
    }

    #[test]
    fn leaving_the_band_restarts_the_count() {
        let mut s = SettleTracker::new(1.0, 0.1).with_settle_ticks(3);
        s.observe(0.0, 0.0);
        s.observe(0.0, 0.0);
        assert_eq!(s.observe(5.0, 0.0), MotionState::Running);
        s.observe(0.0, 0.0);
        s.observe(0.0, 0.0);
        assert_eq!(s.observe(0.0, 0.0), MotionState::Settled);
    }

    #[test]
    fn nan_is_out_of_band() {
        let mut s = SettleTracker::new(1.0, 0.1);
        assert_eq!(s.observe(f64::NAN, 0.0), MotionState::Running);
    }

    #[test]
    fn reset_clears_progress() {
        let mut s = SettleTracker::new(1.0, 0.1).with_settle_ticks(2);
        s.observe(0.0, 0.0);
        s.reset();
        assert_eq!(s.observe(0.0, 0.0), MotionState::Running);
    }
}
