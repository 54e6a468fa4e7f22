//! [`StallGuard`] – detects a drivetrain that is commanded but not moving.
//!
//! A wheel against a wall, a robot high-centred on a field element, or a
//! disconnected motor all look the same to a closed loop: the error never
//! shrinks, so the loop never settles. The guard watches the pose instead of
//! the error.
//!
//! # Algorithm
//!
//! The guard keeps a rolling window of the last *N* poses recorded while a
//! non-zero command was applied. Once the window is full and every pose in it
//! lies within `epsilon` of the oldest one (in position and in heading), the
//! robot is stalled. Recording a tick without a motion command clears the
//! window.
//!
//! # Example
//!
//! ```rust
//! use sprocket_runtime::stall_guard::StallGuard;
//! use sprocket_types::Pose;
//!
//! let mut guard = StallGuard::new(3, 0.01);
//!
//! assert!(!guard.record(Pose::origin(), true));
//! assert!(!guard.record(Pose::origin(), true));
//! assert!(guard.record(Pose::origin(), true)); // third motionless tick
//!
//! guard.reset();
//! assert!(!guard.record(Pose::origin(), true));
//! ```

use std::collections::VecDeque;

use sprocket_types::{Pose, wrap_angle};

// ─────────────────────────────────────────────────────────────────────────────
// StallGuard
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StallGuard {
    /// Consecutive motionless ticks that count as a stall.
    threshold: usize,
    /// Largest displacement (inches, and radians of heading) still counted
    /// as "not moving".
    epsilon: f64,
    history: VecDeque<Pose>,
}

impl StallGuard {
    /// A `threshold` of 0 disables the guard.
    pub fn new(threshold: usize, epsilon: f64) -> Self {
        Self {
            threshold,
            epsilon: epsilon.abs(),
            history: VecDeque::with_capacity(threshold),
        }
    }

    /// Record the pose observed on this tick, and whether the loop was
    /// commanding motion. Returns `true` once the robot counts as stalled.
    pub fn record(&mut self, pose: Pose, commanding: bool) -> bool {
        if !commanding {
            self.history.clear();
            return false;
        }
        self.history.push_back(pose);
        while self.history.len() > self.threshold {
            self.history.pop_front();
        }
        self.is_stalled()
    }

    pub fn is_stalled(&self) -> bool {
        if self.threshold == 0 || self.history.len() < self.threshold {
            return false;
        }
        let first = self.history[0];
        self.history.iter().all(|p| {
            p.distance_to(&first) <= self.epsilon
                && wrap_angle(p.heading - first.heading).abs() <= self.epsilon
        })
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moving_robot_is_not_stalled() {
        let mut guard = StallGuard::new(3, 0.01);
        for i in 0..10 {
            assert!(!guard.record(Pose::new(i as f64, 0.0, 0.0), true));
        }
    }

    #[test]
    fn turning_in_place_is_not_stalled() {
        let mut guard = StallGuard::new(3, 0.01);
        for i in 0..10 {
            assert!(!guard.record(Pose::new(0.0, 0.0, 0.1 * i as f64), true));
        }
    }

    #[test]
    fn does_not_trigger_below_threshold() {
        let mut guard = StallGuard::new(4, 0.01);
        assert!(!guard.record(Pose::origin(), true));
        assert!(!guard.record(Pose::origin(), true));
        assert!(!guard.record(Pose::origin(), true));
    }

    #[test]
    fn jitter_inside_epsilon_still_stalls() {
        let mut guard = StallGuard::new(3, 0.01);
        guard.record(Pose::new(0.0, 0.0, 0.0), true);
        guard.record(Pose::new(0.004, 0.0, 0.002), true);
        assert!(guard.record(Pose::new(-0.003, 0.002, -0.001), true));
    }

    #[test]
    fn idle_tick_breaks_the_streak() {
        let mut guard = StallGuard::new(3, 0.01);
        guard.record(Pose::origin(), true);
        guard.record(Pose::origin(), true);
        assert!(!guard.record(Pose::origin(), false));
        assert!(!guard.record(Pose::origin(), true));
    }

    #[test]
    fn window_slides_past_earlier_motion() {
        let mut guard = StallGuard::new(3, 0.01);
        guard.record(Pose::new(0.0, 0.0, 0.0), true);
        guard.record(Pose::new(1.0, 0.0, 0.0), true);
        guard.record(Pose::new(2.0, 0.0, 0.0), true);
        assert!(!guard.is_stalled());
        guard.record(Pose::new(2.0, 0.0, 0.0), true);
        assert!(guard.record(Pose::new(2.0, 0.0, 0.0), true));
    }

    #[test]
    fn zero_threshold_disables_the_guard() {
        let mut guard = StallGuard::new(0, 0.01);
        for _ in 0..5 {
            assert!(!guard.record(Pose::origin(), true));
        }
    }
}
