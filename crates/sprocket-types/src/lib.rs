use std::f64::consts::{PI, TAU};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Wrap an angle in radians into `(-π, π]`.
///
/// Non-finite input is returned unchanged so callers can detect it.
pub fn wrap_angle(angle: f64) -> f64 {
    if !angle.is_finite() {
        return angle;
    }
    let wrapped = (angle + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// A point on the field plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance_to(self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Direction from `self` to `other`, counter-clockwise from +X (radians).
    pub fn bearing_to(self, other: Point) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }
}

/// Robot pose: position plus heading.
///
/// Heading is in radians, counter-clockwise from +X. Producers do not wrap
/// it; use [`wrap_angle`] when a normalised value is needed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// The origin facing +X.
    pub fn origin() -> Self {
        Self::default()
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn distance_to(&self, other: &Pose) -> f64 {
        self.position().distance_to(other.position())
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.heading.is_finite()
    }
}

/// Per-side drivetrain command.
///
/// Units are whatever the receiving drive sink interprets them as (wheel
/// velocity for the simulator, volts for a motor group).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveCommand {
    pub left: f64,
    pub right: f64,
}

impl DriveCommand {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Mix a forward power and a turn power into left/right commands.
    ///
    /// `turn` is clockwise-positive: `left = linear + turn`,
    /// `right = linear - turn`.
    pub fn arcade(linear: f64, turn: f64) -> Self {
        Self {
            left: linear + turn,
            right: linear - turn,
        }
    }

    /// Forward component of the command (mean of both sides).
    pub fn linear(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn is_zero(&self) -> bool {
        self.left == 0.0 && self.right == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.left.is_finite() && self.right.is_finite()
    }
}

/// One odometry sample read from the drivetrain sensors.
///
/// Encoder positions are cumulative, in degrees. `heading_deg` is the
/// heading sensor's raw reading in its own convention, if one is fitted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EncoderSample {
    pub left_deg: f64,
    pub right_deg: f64,
    pub heading_deg: Option<f64>,
}

impl EncoderSample {
    pub fn new(left_deg: f64, right_deg: f64, heading_deg: Option<f64>) -> Self {
        Self {
            left_deg,
            right_deg,
            heading_deg,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.left_deg.is_finite()
            && self.right_deg.is_finite()
            && self.heading_deg.is_none_or(f64::is_finite)
    }
}

/// Why a movement ended without settling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CancelReason {
    /// The owner asked the movement to stop.
    Requested,
    /// The movement exceeded its tick budget.
    TickLimit,
    /// The robot stopped moving while motion was still being commanded.
    Stalled,
    /// The pose stopped updating.
    PoseStale,
}

/// Lifecycle of a single movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionState {
    Running,
    Settled,
    Cancelled(CancelReason),
}

impl MotionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MotionState::Running)
    }
}

/// Event published by a motion session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionEvent {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// e.g. `"sprocket-runtime::session"`
    pub source: String,
    pub payload: MotionPayload,
}

impl MotionEvent {
    pub fn new(source: impl Into<String>, payload: MotionPayload) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source: source.into(),
            payload,
        }
    }
}

/// Variants of data carried by a [`MotionEvent`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MotionPayload {
    /// A movement began from `start` toward `goal`.
    Started { kind: String, start: Pose, goal: Point },
    /// One control tick.
    Tick {
        tick: u64,
        pose: Pose,
        carrot: Option<Point>,
        command: DriveCommand,
        linear_error: f64,
        angular_error: f64,
    },
    /// The movement reached a terminal state.
    Finished {
        state: MotionState,
        ticks: u64,
        pose: Pose,
    },
}

/// Error type shared by every Sprocket crate.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MotionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid sensor sample: {0}")]
    InvalidSample(String),

    #[error("Sensor fault on {source_id}: {details}")]
    Sensor { source_id: String, details: String },

    #[error("Actuator fault on {sink_id}: {details}")]
    Actuator { sink_id: String, details: String },

    #[error("Task stopped: {0}")]
    TaskStopped(String),
}
