//! Tuning file – reads/writes `sprocket.toml`.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration for the simulated drivetrain.
//!
//! ```toml
//! [drivetrain]
//! wheel_circumference = 10.21
//! track_width = 12.0
//! heading_source = { mode = "blended", alpha = 0.2 }
//! heading_convention = { direction = "clockwise", offset_deg = 90.0 }
//!
//! [linear_pid]
//! kp = 1.0
//! windup_range = 6.0
//!
//! [session]
//! period_ms = 10
//! slew_rate = 120.0
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sprocket_control::pid::{AntiWindup, Pid};
use sprocket_control::pursuit::BoomerangSettings;
use sprocket_odometry::OdometryConfig;
use sprocket_types::MotionError;

use crate::session::SessionSettings;

/// File looked for in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "sprocket.toml";

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Gains and anti-windup policy for one PID loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    pub windup_range: Option<f64>,
    pub integral_cap: Option<f64>,
    pub reset_on_sign_change: bool,
    /// Symmetric output clamp.
    pub output_limit: Option<f64>,
}

impl Default for PidConfig {
    fn default() -> Self {
        Self::proportional(1.0)
    }
}

impl PidConfig {
    pub fn proportional(kp: f64) -> Self {
        Self {
            kp,
            ki: 0.0,
            kd: 0.0,
            windup_range: None,
            integral_cap: None,
            reset_on_sign_change: false,
            output_limit: None,
        }
    }

    pub fn build(&self) -> Pid {
        let anti_windup = AntiWindup {
            windup_range: self.windup_range,
            integral_cap: self.integral_cap,
            reset_on_sign_change: self.reset_on_sign_change,
        };
        let pid = Pid::new(self.kp, self.ki, self.kd).with_anti_windup(anti_windup);
        match self.output_limit {
            Some(limit) => pid.with_output_limits(-limit.abs(), limit.abs()),
            None => pid,
        }
    }

    fn validate(&self, section: &str) -> Result<(), MotionError> {
        let gains_finite = [self.kp, self.ki, self.kd].iter().all(|g| g.is_finite());
        let optional_finite = [self.windup_range, self.integral_cap, self.output_limit]
            .iter()
            .flatten()
            .all(|v| v.is_finite());
        if gains_finite && optional_finite {
            Ok(())
        } else {
            Err(MotionError::InvalidConfig(format!("[{section}] values must be finite")))
        }
    }
}

/// Limits for profiled straight-line drives.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Inches per second.
    pub max_velocity: f64,
    /// Inches per second squared.
    pub max_acceleration: f64,
    /// Feed-forward: drive command per inch-per-second of planned velocity.
    pub kv: f64,
    /// Position error (inches) accepted once the profile has ended.
    pub tolerance: f64,
    /// Heading error (radians) accepted once the profile has ended.
    pub heading_tolerance: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            max_velocity: 40.0,
            max_acceleration: 80.0,
            kv: 0.2,
            tolerance: 0.5,
            heading_tolerance: 3f64.to_radians(),
        }
    }
}

/// Control-loop cadence and liveness limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub period_ms: u64,
    pub max_ticks: u64,
    /// Largest change in either side's command per second.
    pub slew_rate: f64,
    /// Motionless ticks (while commanding) before a move is abandoned;
    /// `0` disables stall detection.
    pub stall_ticks: usize,
    pub stall_epsilon: f64,
    /// Oldest pose the loop will act on.
    pub max_pose_age_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            period_ms: 10,
            max_ticks: 1500,
            slew_rate: 120.0,
            stall_ticks: 50,
            stall_epsilon: 0.01,
            max_pose_age_ms: 100,
        }
    }
}

impl SessionConfig {
    pub fn settings(&self) -> SessionSettings {
        SessionSettings {
            period: Duration::from_millis(self.period_ms),
            max_ticks: self.max_ticks,
            slew_rate: self.slew_rate,
            stall_ticks: self.stall_ticks,
            stall_epsilon: self.stall_epsilon,
            max_pose_age: Duration::from_millis(self.max_pose_age_ms),
        }
    }
}

/// Parameters of the simulated drivetrain used by the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Wheel speed (inches per second) reached at `max_command`.
    pub top_speed: f64,
    pub max_command: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            top_speed: 60.0,
            max_command: 12.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SprocketConfig
// ─────────────────────────────────────────────────────────────────────────────

/// Complete contents of `sprocket.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprocketConfig {
    pub drivetrain: OdometryConfig,
    pub linear_pid: PidConfig,
    pub angular_pid: PidConfig,
    pub boomerang: BoomerangSettings,
    pub profile: ProfileConfig,
    pub session: SessionConfig,
    pub simulation: SimulationConfig,
}

impl Default for SprocketConfig {
    fn default() -> Self {
        Self {
            drivetrain: OdometryConfig::default(),
            linear_pid: PidConfig::proportional(1.0),
            angular_pid: PidConfig::proportional(10.0),
            boomerang: BoomerangSettings::default(),
            profile: ProfileConfig::default(),
            session: SessionConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl SprocketConfig {
    /// Check every section for values the control loops cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::InvalidConfig`] naming the first offending
    /// field.
    pub fn validate(&self) -> Result<(), MotionError> {
        self.drivetrain.validate()?;
        self.linear_pid.validate("linear_pid")?;
        self.angular_pid.validate("angular_pid")?;

        let b = &self.boomerang;
        if !(0.0..=1.0).contains(&b.lead) {
            return invalid(format!("boomerang.lead must lie in [0, 1], got {}", b.lead));
        }
        let non_negative = |v: f64| v.is_finite() && v >= 0.0;
        for (name, value) in [
            ("boomerang.close_radius", b.close_radius),
            ("boomerang.linear_deadband", b.linear_deadband),
            ("boomerang.angular_deadband", b.angular_deadband),
            ("profile.kv", self.profile.kv),
            ("profile.tolerance", self.profile.tolerance),
            ("profile.heading_tolerance", self.profile.heading_tolerance),
            ("session.stall_epsilon", self.session.stall_epsilon),
        ] {
            if !non_negative(value) {
                return invalid(format!("{name} must be finite and non-negative, got {value}"));
            }
        }

        let positive = |v: f64| v.is_finite() && v > 0.0;
        for (name, value) in [
            ("boomerang.max_linear", b.max_linear),
            ("boomerang.max_turn", b.max_turn),
            ("profile.max_velocity", self.profile.max_velocity),
            ("profile.max_acceleration", self.profile.max_acceleration),
            ("session.slew_rate", self.session.slew_rate),
            ("simulation.top_speed", self.simulation.top_speed),
            ("simulation.max_command", self.simulation.max_command),
        ] {
            if !positive(value) {
                return invalid(format!("{name} must be positive, got {value}"));
            }
        }

        if self.session.period_ms == 0 {
            return invalid("session.period_ms must be at least 1".to_string());
        }
        if self.session.max_ticks == 0 {
            return invalid("session.max_ticks must be at least 1".to_string());
        }
        if self.session.max_pose_age_ms < self.session.period_ms {
            return invalid(format!(
                "session.max_pose_age_ms ({}) must not be shorter than session.period_ms ({})",
                self.session.max_pose_age_ms, self.session.period_ms
            ));
        }
        Ok(())
    }

    /// Render as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::InvalidConfig`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, MotionError> {
        toml::to_string_pretty(self)
            .map_err(|e| MotionError::InvalidConfig(format!("Failed to serialize config: {e}")))
    }
}

fn invalid(message: String) -> Result<(), MotionError> {
    Err(MotionError::InvalidConfig(message))
}

// ─────────────────────────────────────────────────────────────────────────────
// Loading and saving
// ─────────────────────────────────────────────────────────────────────────────

/// Load the config from `path`. Returns `None` if the file does not exist.
///
/// Environment overrides are applied; validation is left to the caller.
///
/// # Errors
///
/// Returns [`MotionError::InvalidConfig`] when the file cannot be read or
/// parsed.
pub fn load_from(path: &Path) -> Result<Option<SprocketConfig>, MotionError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        MotionError::InvalidConfig(format!("Failed to read config at {}: {e}", path.display()))
    })?;
    let mut cfg: SprocketConfig = toml::from_str(&raw)
        .map_err(|e| MotionError::InvalidConfig(format!("Failed to parse config: {e}")))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Load `path` (or [`DEFAULT_CONFIG_FILE`]), fall back to defaults when the
/// file is absent, apply environment overrides, and validate.
///
/// # Errors
///
/// Returns [`MotionError::InvalidConfig`] for unreadable, unparsable, or
/// invalid configuration.
pub fn load_or_default(path: Option<&Path>) -> Result<SprocketConfig, MotionError> {
    let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);
    let cfg = match load_from(&path)? {
        Some(cfg) => cfg,
        None => {
            let mut cfg = SprocketConfig::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Apply `SPROCKET_*` environment variable overrides to `cfg`.
///
/// Unparsable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `SPROCKET_PERIOD_MS` | `session.period_ms` |
/// | `SPROCKET_MAX_TICKS` | `session.max_ticks` |
/// | `SPROCKET_SLEW_RATE` | `session.slew_rate` |
/// | `SPROCKET_TRACK_WIDTH` | `drivetrain.track_width` |
/// | `SPROCKET_LEAD` | `boomerang.lead` |
pub fn apply_env_overrides(cfg: &mut SprocketConfig) {
    if let Ok(v) = std::env::var("SPROCKET_PERIOD_MS")
        && let Ok(ms) = v.parse::<u64>() {
            cfg.session.period_ms = ms;
        }
    if let Ok(v) = std::env::var("SPROCKET_MAX_TICKS")
        && let Ok(ticks) = v.parse::<u64>() {
            cfg.session.max_ticks = ticks;
        }
    if let Ok(v) = std::env::var("SPROCKET_SLEW_RATE")
        && let Ok(rate) = v.parse::<f64>() {
            cfg.session.slew_rate = rate;
        }
    if let Ok(v) = std::env::var("SPROCKET_TRACK_WIDTH")
        && let Ok(width) = v.parse::<f64>() {
            cfg.drivetrain.track_width = width;
        }
    if let Ok(v) = std::env::var("SPROCKET_LEAD")
        && let Ok(lead) = v.parse::<f64>() {
            cfg.boomerang.lead = lead;
        }
}

/// Save the config to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`MotionError::InvalidConfig`] if the file cannot be written.
pub fn save_to(cfg: &SprocketConfig, path: &Path) -> Result<(), MotionError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                MotionError::InvalidConfig(format!("Failed to create config directory: {e}"))
            })?;
        }
    let raw = cfg.to_toml()?;
    fs::write(path, raw).map_err(|e| {
        MotionError::InvalidConfig(format!("Failed to write config at {}: {e}", path.display()))
    })
}
