//! In-process drivetrain simulation for tests and demos without hardware.
//!
//! [`SimDrivetrain`] is a kinematic differential base. Its clones share one
//! state, so one clone can be handed to the odometry task as an
//! [`EncoderSource`] while another is handed to the control loop as a
//! [`DriveSink`]. Every [`sample`][EncoderSource::sample] advances the
//! simulation by one fixed step using the most recently applied command.
//!
//! # Example
//!
//! ```rust
//! use sprocket_hal::sim::{SimConfig, SimDrivetrain};
//! use sprocket_hal::{DriveSink, EncoderSource};
//! use sprocket_types::DriveCommand;
//!
//! let mut sink = SimDrivetrain::new(SimConfig::default());
//! let mut encoders = sink.clone();
//!
//! sink.apply(DriveCommand::new(6.0, 6.0)).expect("sim drive must succeed");
//! let sample = encoders.sample().expect("sim encoders must succeed");
//! assert!(sample.left_deg > 0.0);
//! assert!(sink.true_pose().x > 0.0);
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use sprocket_types::{DriveCommand, EncoderSample, MotionError, Pose, wrap_angle};
use tracing::{debug, warn};

use crate::drive::DriveSink;
use crate::encoder::EncoderSource;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// How the simulated heading sensor reports its reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimGyro {
    /// No heading sensor fitted; samples carry `heading_deg: None`.
    Off,
    /// Degrees counter-clockwise from +X, wrapped to `[0, 360)`.
    CounterClockwise,
    /// Degrees clockwise, reading `offset_deg` when facing +X.
    Clockwise { offset_deg: f64 },
}

/// Physical parameters of the simulated base. Lengths in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimConfig {
    pub wheel_circumference: f64,
    pub gear_ratio: f64,
    pub track_width: f64,
    /// Command magnitude that maps to `top_speed`.
    pub max_command: f64,
    /// Wheel surface speed at `max_command`, inches per second.
    pub top_speed: f64,
    /// Simulated seconds advanced per sample.
    pub step: f64,
    pub gyro: SimGyro,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            wheel_circumference: 3.25 * std::f64::consts::PI,
            gear_ratio: 1.0,
            track_width: 12.0,
            max_command: 12.0,
            top_speed: 60.0,
            step: 0.01,
            gyro: SimGyro::CounterClockwise,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// SimDrivetrain
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimState {
    pose: Pose,
    left_travel: f64,
    right_travel: f64,
    command: DriveCommand,
    applied: u64,
    pending_faults: u32,
}

/// A shared, kinematic differential drivetrain.
#[derive(Debug, Clone)]
pub struct SimDrivetrain {
    id: String,
    config: SimConfig,
    state: Arc<Mutex<SimState>>,
}

impl SimDrivetrain {
    /// A drivetrain at the origin facing +X.
    pub fn new(config: SimConfig) -> Self {
        Self::at(config, Pose::origin())
    }

    /// A drivetrain starting at `pose`.
    pub fn at(config: SimConfig, pose: Pose) -> Self {
        Self {
            id: "sim_drivetrain".to_string(),
            config,
            state: Arc::new(Mutex::new(SimState {
                pose,
                ..SimState::default()
            })),
        }
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Ground-truth pose of the simulated base.
    pub fn true_pose(&self) -> Pose {
        self.lock().pose
    }

    /// Most recently applied command.
    pub fn command(&self) -> DriveCommand {
        self.lock().command
    }

    /// Number of commands applied so far.
    pub fn commands_applied(&self) -> u64 {
        self.lock().applied
    }

    /// Make the next `count` samples fail with a sensor fault.
    pub fn inject_sensor_faults(&self, count: u32) {
        debug!(count, "injecting simulated sensor faults");
        self.lock().pending_faults = count;
    }

    fn lock(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wheel_speed(&self, command: f64) -> f64 {
        let max = self.config.max_command.abs();
        if max == 0.0 || !max.is_finite() {
            return 0.0;
        }
        command.clamp(-max, max) / max * self.config.top_speed
    }

    fn encoder_degrees(&self, travel: f64) -> f64 {
        let per_rev = self.config.wheel_circumference * self.config.gear_ratio;
        if per_rev == 0.0 {
            return 0.0;
        }
        travel / per_rev * 360.0
    }

    fn gyro_reading(&self, heading: f64) -> Option<f64> {
        let ccw = wrap_angle(heading).to_degrees().rem_euclid(360.0);
        match self.config.gyro {
            SimGyro::Off => None,
            SimGyro::CounterClockwise => Some(ccw),
            SimGyro::Clockwise { offset_deg } => Some((offset_deg - ccw).rem_euclid(360.0)),
        }
    }
}

impl EncoderSource for SimDrivetrain {
    fn id(&self) -> &str {
        &self.id
    }

    fn sample(&mut self) -> Result<EncoderSample, MotionError> {
        let step = self.config.step.max(0.0);
        let mut state = self.lock();

        let left = self.wheel_speed(state.command.left) * step;
        let right = self.wheel_speed(state.command.right) * step;
        let forward = (left + right) / 2.0;
        let turn = if self.config.track_width > 0.0 {
            (right - left) / self.config.track_width
        } else {
            0.0
        };
        let mid_heading = state.pose.heading + turn / 2.0;
        state.pose = Pose::new(
            state.pose.x + forward * mid_heading.cos(),
            state.pose.y + forward * mid_heading.sin(),
            wrap_angle(state.pose.heading + turn),
        );
        state.left_travel += left;
        state.right_travel += right;

        if state.pending_faults > 0 {
            state.pending_faults -= 1;
            return Err(MotionError::Sensor {
                source_id: self.id.clone(),
                details: "simulated encoder fault".to_string(),
            });
        }

        Ok(EncoderSample::new(
            self.encoder_degrees(state.left_travel),
            self.encoder_degrees(state.right_travel),
            self.gyro_reading(state.pose.heading),
        ))
    }
}

impl DriveSink for SimDrivetrain {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, command: DriveCommand) -> Result<(), MotionError> {
        if !command.is_finite() {
            warn!(?command, "rejecting non-finite drive command");
            return Err(MotionError::Actuator {
                sink_id: self.id.clone(),
                details: format!("non-finite command {command:?}"),
            });
        }
        let mut state = self.lock();
        state.command = command;
        state.applied += 1;
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// RecordingSink
// ────────────────────────────────────────────────────────────────────────────

/// A sink that records every command it is given. Clones share the record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    commands: Arc<Mutex<Vec<DriveCommand>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command applied so far, oldest first.
    pub fn commands(&self) -> Vec<DriveCommand> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn last(&self) -> Option<DriveCommand> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner).last().copied()
    }
}

impl DriveSink for RecordingSink {
    fn id(&self) -> &str {
        "recording_sink"
    }

    fn apply(&mut self, command: DriveCommand) -> Result<(), MotionError> {
        self.commands
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(command);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
