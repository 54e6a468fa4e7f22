//! Heading conventions and heading sources.
//!
//! Heading sensors disagree on which way is positive and where zero points.
//! [`HeadingConvention`] maps a sensor-native reading in degrees onto the
//! estimator's frame: counter-clockwise from +X.

use std::f64::consts::TAU;

use serde::{Deserialize, Serialize};
use sprocket_types::wrap_angle;

/// Direction in which a sensor's reading increases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadingDirection {
    Clockwise,
    CounterClockwise,
}

/// Mapping from a raw sensor heading to counter-clockwise degrees.
///
/// ```rust
/// use sprocket_odometry::heading::HeadingConvention;
///
/// // A clockwise gyro that reads 0 while the robot faces +Y.
/// let gyro = HeadingConvention::clockwise_sensor(90.0);
/// assert_eq!(gyro.to_ccw_degrees(0.0), 90.0);
/// assert_eq!(gyro.to_ccw_degrees(90.0), 0.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingConvention {
    pub direction: HeadingDirection,
    /// Added after the direction flip, in degrees.
    pub offset_deg: f64,
}

impl Default for HeadingConvention {
    fn default() -> Self {
        Self::identity()
    }
}

impl HeadingConvention {
    /// Readings already counter-clockwise from +X.
    pub fn identity() -> Self {
        Self {
            direction: HeadingDirection::CounterClockwise,
            offset_deg: 0.0,
        }
    }

    /// A clockwise-positive sensor, rotated by `offset_deg`.
    pub fn clockwise_sensor(offset_deg: f64) -> Self {
        Self {
            direction: HeadingDirection::Clockwise,
            offset_deg,
        }
    }

    /// Convert `raw` to counter-clockwise degrees in `[0, 360)`.
    pub fn to_ccw_degrees(&self, raw: f64) -> f64 {
        let ccw = match self.direction {
            HeadingDirection::Clockwise => 360.0 - raw,
            HeadingDirection::CounterClockwise => raw,
        };
        let wrapped = (ccw + self.offset_deg).rem_euclid(360.0);
        // rem_euclid can round up to exactly 360 for tiny negatives.
        if wrapped >= 360.0 { 0.0 } else { wrapped }
    }

    /// Convert `raw` to counter-clockwise radians in `[0, 2π)`.
    pub fn to_ccw_radians(&self, raw: f64) -> f64 {
        let rad = self.to_ccw_degrees(raw).to_radians();
        if rad >= TAU { 0.0 } else { rad }
    }
}

/// Where the estimator takes its heading from.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum HeadingSource {
    /// The sample's heading sensor reading, mapped through the convention.
    #[default]
    Gyro,
    /// Integrated wheel difference over the track width.
    Wheels,
    /// Complementary blend pulling the wheel heading toward the gyro by
    /// `alpha` each tick.
    Blended { alpha: f64 },
}

/// `wheel + alpha · wrap(gyro − wheel)`, with `alpha` clamped to `[0, 1]`.
pub fn blend_heading(wheel: f64, gyro: f64, alpha: f64) -> f64 {
    let alpha = if alpha.is_nan() { 0.0 } else { alpha.clamp(0.0, 1.0) };
    wheel + alpha * wrap_angle(gyro - wheel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn identity_only_wraps() {
        let c = HeadingConvention::identity();
        assert_eq!(c.to_ccw_degrees(45.0), 45.0);
        assert_eq!(c.to_ccw_degrees(370.0), 10.0);
        assert_eq!(c.to_ccw_degrees(-90.0), 270.0);
    }

    #[test]
    fn clockwise_sensor_flips_and_offsets() {
        let c = HeadingConvention::clockwise_sensor(90.0);
        assert_eq!(c.to_ccw_degrees(0.0), 90.0);
        assert_eq!(c.to_ccw_degrees(90.0), 0.0);
        assert_eq!(c.to_ccw_degrees(180.0), 270.0);
        assert_eq!(c.to_ccw_degrees(270.0), 180.0);
        assert!((c.to_ccw_radians(0.0) - FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn output_stays_in_range() {
        let c = HeadingConvention::clockwise_sensor(0.0);
        for raw in [-720.0, -1e-15, 0.0, 1e-15, 359.999, 360.0, 1080.5] {
            let deg = c.to_ccw_degrees(raw);
            assert!((0.0..360.0).contains(&deg), "{raw} -> {deg}");
        }
    }

    #[test]
    fn heading_source_serde_uses_mode_tag() {
        let src: HeadingSource = serde_json::from_str(r#"{"mode":"blended","alpha":0.5}"#).unwrap();
        assert_eq!(src, HeadingSource::Blended { alpha: 0.5 });
        let wheels: HeadingSource = serde_json::from_str(r#"{"mode":"wheels"}"#).unwrap();
        assert_eq!(wheels, HeadingSource::Wheels);
    }

    #[test]
    fn blend_takes_the_short_way_round() {
        // wheel just below +π, gyro just above −π: 0.2 rad apart, not 2π − 0.2.
        let wheel = std::f64::consts::PI - 0.1;
        let gyro = -std::f64::consts::PI + 0.1;
        let blended = blend_heading(wheel, gyro, 0.5);
        assert!((blended - std::f64::consts::PI).abs() < 1e-9);
        assert_eq!(blend_heading(1.0, 2.0, 0.0), 1.0);
        assert!((blend_heading(1.0, 2.0, 5.0) - 2.0).abs() < 1e-12);
    }
}
