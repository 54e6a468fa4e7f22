//! Dead-reckoning pose estimator.
//!
//! Each update converts the cumulative wheel positions of an
//! [`EncoderSample`] into a forward distance, differences it against the
//! previous tick and projects that delta along the current heading:
//!
//! ```text
//! forward = (left_in + right_in) / 2
//! Δ       = forward − previous_forward
//! x      += Δ · cos(heading)
//! y      += Δ · sin(heading)
//! ```
//!
//! The first sample after construction or [`reset`][OdometryEstimator::reset]
//! only establishes the baseline; it never moves the pose.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use sprocket_types::{EncoderSample, MotionError, Pose};
use tracing::trace;

use crate::heading::{HeadingConvention, HeadingSource, blend_heading};

/// Linear distance covered by a wheel that has turned `degrees`.
pub fn encoder_to_distance(degrees: f64, circumference: f64, gear_ratio: f64) -> f64 {
    degrees / 360.0 * circumference * gear_ratio
}

/// Drivetrain geometry and heading policy. Lengths in inches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdometryConfig {
    pub wheel_circumference: f64,
    /// Wheel revolutions per encoder revolution.
    pub gear_ratio: f64,
    /// Distance between the left and right wheel contact patches.
    pub track_width: f64,
    pub heading_source: HeadingSource,
    pub heading_convention: HeadingConvention,
}

impl Default for OdometryConfig {
    fn default() -> Self {
        Self {
            wheel_circumference: 3.25 * std::f64::consts::PI,
            gear_ratio: 1.0,
            track_width: 12.0,
            heading_source: HeadingSource::Gyro,
            heading_convention: HeadingConvention::identity(),
        }
    }
}

impl OdometryConfig {
    /// # Errors
    ///
    /// Returns [`MotionError::InvalidConfig`] when the wheel geometry is not
    /// positive and finite, or when a wheel-based heading source is paired
    /// with a non-finite track width.
    pub fn validate(&self) -> Result<(), MotionError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !positive(self.wheel_circumference) {
            return Err(MotionError::InvalidConfig(format!(
                "wheel_circumference must be positive, got {}",
                self.wheel_circumference
            )));
        }
        if !positive(self.gear_ratio) {
            return Err(MotionError::InvalidConfig(format!(
                "gear_ratio must be positive, got {}",
                self.gear_ratio
            )));
        }
        if !self.track_width.is_finite() {
            return Err(MotionError::InvalidConfig(format!(
                "track_width must be finite, got {}",
                self.track_width
            )));
        }
        if let HeadingSource::Blended { alpha } = self.heading_source {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(MotionError::InvalidConfig(format!(
                    "blend alpha must lie in [0, 1], got {alpha}"
                )));
            }
        }
        if !self.heading_convention.offset_deg.is_finite() {
            return Err(MotionError::InvalidConfig("heading offset must be finite".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Baseline {
    /// Forward distance at the previous tick.
    forward: f64,
    /// `right − left` wheel distance at the previous tick.
    wheel_diff: f64,
}

/// Owns the robot pose and advances it from encoder samples.
///
/// ```rust
/// use sprocket_odometry::estimator::{OdometryConfig, OdometryEstimator};
/// use sprocket_types::EncoderSample;
///
/// let config = OdometryConfig { wheel_circumference: 10.0, ..OdometryConfig::default() };
/// let mut odom = OdometryEstimator::new(config);
///
/// odom.update(EncoderSample::new(0.0, 0.0, Some(0.0))).unwrap();
/// let pose = odom.update(EncoderSample::new(360.0, 360.0, Some(0.0))).unwrap();
/// assert!((pose.x - 10.0).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct OdometryEstimator {
    config: OdometryConfig,
    pose: Pose,
    baseline: Option<Baseline>,
}

impl OdometryEstimator {
    /// Start at the origin facing +X.
    pub fn new(config: OdometryConfig) -> Self {
        Self::from_pose(config, Pose::origin())
    }

    pub fn from_pose(config: OdometryConfig, pose: Pose) -> Self {
        Self {
            config,
            pose,
            baseline: None,
        }
    }

    pub fn config(&self) -> &OdometryConfig {
        &self.config
    }

    /// Latest pose estimate.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Re-anchor at `pose`. The next sample becomes the new baseline.
    ///
    /// With [`HeadingSource::Gyro`] the heading follows the sensor again from
    /// the next tick; align the sensor through the
    /// [`HeadingConvention`] offset rather than here.
    pub fn reset(&mut self, pose: Pose) {
        self.pose = pose;
        self.baseline = None;
    }

    /// Fold one encoder sample into the pose and return the new estimate.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::InvalidSample`] for a sample containing a
    /// non-finite value. The estimator state is left untouched.
    pub fn update(&mut self, sample: EncoderSample) -> Result<Pose, MotionError> {
        if !sample.is_finite() {
            return Err(MotionError::InvalidSample(format!("{sample:?}")));
        }

        let left = self.distance(sample.left_deg);
        let right = self.distance(sample.right_deg);
        let forward = (left + right) / 2.0;
        let wheel_diff = right - left;

        let Some(mut baseline) = self.baseline else {
            self.baseline = Some(Baseline { forward, wheel_diff });
            return Ok(self.pose);
        };

        let delta = forward - baseline.forward;
        let turned = wheel_diff - baseline.wheel_diff;
        baseline.forward = forward;
        baseline.wheel_diff = wheel_diff;
        self.baseline = Some(baseline);

        let heading = self.heading(&sample, turned);
        self.pose = Pose::new(
            self.pose.x + delta * heading.cos(),
            self.pose.y + delta * heading.sin(),
            heading,
        );
        trace!(delta, x = self.pose.x, y = self.pose.y, heading, "odometry tick");
        Ok(self.pose)
    }

    fn distance(&self, degrees: f64) -> f64 {
        encoder_to_distance(degrees, self.config.wheel_circumference, self.config.gear_ratio)
    }

    /// Heading implied by the change in `right − left` since the last tick.
    fn wheel_heading(&self, turned: f64) -> Option<f64> {
        (self.config.track_width > 0.0).then(|| self.pose.heading + turned / self.config.track_width)
    }

    fn heading(&self, sample: &EncoderSample, turned: f64) -> f64 {
        let gyro = sample
            .heading_deg
            .map(|raw| self.config.heading_convention.to_ccw_radians(raw));
        let wheels = self.wheel_heading(turned);
        let previous = self.pose.heading;

        let heading = match self.config.heading_source {
            HeadingSource::Gyro => gyro.or(wheels).unwrap_or(previous),
            HeadingSource::Wheels => wheels.unwrap_or(previous),
            HeadingSource::Blended { alpha } => match (wheels, gyro) {
                (Some(w), Some(g)) => blend_heading(w, g, alpha),
                (Some(w), None) => w,
                (None, Some(g)) => g,
                (None, None) => previous,
            },
        };
        // Every source reports in [0, 2π).
        let heading = heading.rem_euclid(TAU);
        if heading >= TAU { 0.0 } else { heading }
    }
}
