//! Trapezoidal motion profile for a 1-D move.
//!
//! A profile accelerates at a constant rate to a peak velocity, cruises, then
//! decelerates symmetrically to rest exactly at the requested distance. When
//! the distance is too short to reach the requested maximum velocity, the
//! cruise phase disappears and the peak velocity is lowered so the ramps meet
//! in the middle (a triangular profile).
//!
//! # Example
//!
//! ```rust
//! use sprocket_control::profile::MotionProfile;
//!
//! let profile = MotionProfile::plan(48.0, 40.0, 80.0);
//! assert_eq!(profile.velocity_at(0.0), 0.0);
//! assert!((profile.velocity_at(profile.accel_time) - 40.0).abs() < 1e-9);
//! assert_eq!(profile.velocity_at(profile.total_time()), 0.0);
//! ```

use serde::{Deserialize, Serialize};

/// The phases of a planned trapezoidal move.
///
/// All fields are non-negative. Distances sum to the planned total distance.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionProfile {
    pub accel_time: f64,
    pub accel_distance: f64,
    pub cruise_time: f64,
    pub cruise_distance: f64,
    pub decel_time: f64,
    pub decel_distance: f64,
    pub peak_velocity: f64,
}

impl MotionProfile {
    /// Plan a profile covering `total_distance` without exceeding
    /// `max_velocity` or `max_acceleration`.
    ///
    /// Any non-positive or non-finite argument yields the empty profile,
    /// which reports zero velocity at every instant.
    pub fn plan(total_distance: f64, max_velocity: f64, max_acceleration: f64) -> Self {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !(valid(total_distance) && valid(max_velocity) && valid(max_acceleration)) {
            return Self::default();
        }

        let mut accel_time = max_velocity / max_acceleration;
        let mut accel_distance = 0.5 * max_acceleration * accel_time * accel_time;
        let mut peak_velocity = max_velocity;

        if accel_distance > total_distance / 2.0 {
            accel_time = ((total_distance / 2.0) / (max_acceleration / 2.0)).sqrt();
            accel_distance = total_distance / 2.0;
            peak_velocity = max_acceleration * accel_time;
        }

        let cruise_distance = (total_distance - 2.0 * accel_distance).max(0.0);
        let cruise_time = cruise_distance / peak_velocity;

        Self {
            accel_time,
            accel_distance,
            cruise_time,
            cruise_distance,
            decel_time: accel_time,
            decel_distance: accel_distance,
            peak_velocity,
        }
    }

    pub fn total_time(&self) -> f64 {
        self.accel_time + self.cruise_time + self.decel_time
    }

    pub fn total_distance(&self) -> f64 {
        self.accel_distance + self.cruise_distance + self.decel_distance
    }

    /// `true` once `elapsed` has reached the end of the profile.
    pub fn is_finished(&self, elapsed: f64) -> bool {
        elapsed >= self.total_time()
    }

    /// Commanded velocity `elapsed` seconds into the move.
    ///
    /// Zero before the move starts and after it ends.
    pub fn velocity_at(&self, elapsed: f64) -> f64 {
        if !(elapsed >= 0.0) || elapsed >= self.total_time() {
            return 0.0;
        }
        let decel_start = self.accel_time + self.cruise_time;
        if elapsed < self.accel_time {
            self.peak_velocity * elapsed / self.accel_time
        } else if elapsed < decel_start {
            self.peak_velocity
        } else {
            let into_decel = elapsed - decel_start;
            self.peak_velocity * (1.0 - into_decel / self.decel_time)
        }
    }

    /// Distance covered `elapsed` seconds into the move, clamped to
    /// `[0, total_distance]`.
    pub fn position_at(&self, elapsed: f64) -> f64 {
        if !(elapsed > 0.0) {
            return 0.0;
        }
        if elapsed >= self.total_time() {
            return self.total_distance();
        }
        let decel_start = self.accel_time + self.cruise_time;
        if elapsed < self.accel_time {
            0.5 * self.peak_velocity / self.accel_time * elapsed * elapsed
        } else if elapsed < decel_start {
            self.accel_distance + self.peak_velocity * (elapsed - self.accel_time)
        } else {
            let t = elapsed - decel_start;
            let decel = self.peak_velocity / self.decel_time;
            self.accel_distance + self.cruise_distance + self.peak_velocity * t - 0.5 * decel * t * t
        }
    }
}

/// Free-function form of [`MotionProfile::velocity_at`].
pub fn velocity_at(profile: &MotionProfile, elapsed: f64) -> f64 {
    profile.velocity_at(elapsed)
}
