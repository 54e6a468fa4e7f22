//! Boomerang pursuit controller.
//!
//! Drives a differential robot to a target *pose* (position and heading)
//! along a curved approach. Every tick a **carrot point** is placed behind
//! the target along the target heading, at a fraction (`lead`) of the
//! current distance to the target:
//!
//! ```text
//! d      = |target − current|
//! carrot = target − d · lead · (cos θ_target, sin θ_target)
//! ```
//!
//! Because `d` shrinks as the robot closes in, the carrot slides toward the
//! target, so the robot approaches along the target heading. A linear PID
//! drives the distance down; an angular PID steers toward the carrot and,
//! inside `close_radius`, toward the final heading.

use serde::{Deserialize, Serialize};
use sprocket_types::{CancelReason, DriveCommand, MotionState, Point, Pose, wrap_angle};
use tracing::{debug, warn};

use crate::pid::Pid;
use crate::settle::SettleTracker;

// ────────────────────────────────────────────────────────────────────────────
// Target
// ────────────────────────────────────────────────────────────────────────────

/// A pursuit goal. A target without a heading is approached as a point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub x: f64,
    pub y: f64,
    pub heading: Option<f64>,
}

impl Target {
    /// A target arriving at `heading`. A non-finite heading leaves the final
    /// heading unspecified.
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            heading: heading.is_finite().then_some(heading),
        }
    }

    /// A target whose final heading does not matter.
    pub fn point(x: f64, y: f64) -> Self {
        Self { x, y, heading: None }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

impl From<Pose> for Target {
    fn from(pose: Pose) -> Self {
        Self::new(pose.x, pose.y, pose.heading)
    }
}

/// Carrot point for `current` chasing `target` with lead fraction `lead`.
///
/// `lead` is clamped to `[0, 1]`; larger values give more curved approaches.
/// A target without heading yields the target itself.
pub fn compute_carrot(current: &Pose, target: &Target, lead: f64) -> Point {
    let Some(heading) = target.heading else {
        return target.position();
    };
    let lead = if lead.is_nan() { 0.0 } else { lead.clamp(0.0, 1.0) };
    let d = current.position().distance_to(target.position());
    Point::new(
        target.x - d * heading.cos() * lead,
        target.y - d * heading.sin() * lead,
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Settings
// ────────────────────────────────────────────────────────────────────────────

/// Tuning for [`BoomerangController`]. Angles are in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoomerangSettings {
    /// Carrot lead fraction in `[0, 1]`.
    pub lead: f64,
    /// Inside this distance the controller steers to the final heading
    /// instead of the carrot.
    pub close_radius: f64,
    pub linear_deadband: f64,
    pub angular_deadband: f64,
    /// Consecutive in-band ticks required to settle.
    pub settle_ticks: u32,
    /// Magnitude cap on the forward command.
    pub max_linear: f64,
    /// Magnitude cap on the turn command.
    pub max_turn: f64,
}

impl Default for BoomerangSettings {
    fn default() -> Self {
        Self {
            lead: 0.6,
            close_radius: 6.0,
            linear_deadband: 1.0,
            angular_deadband: 3f64.to_radians(),
            settle_ticks: 1,
            max_linear: 12.0,
            max_turn: 12.0,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Controller
// ────────────────────────────────────────────────────────────────────────────

/// Output of one [`BoomerangController::step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PursuitStep {
    pub command: DriveCommand,
    pub state: MotionState,
    pub carrot: Point,
    /// Straight-line distance to the target.
    pub distance: f64,
    /// Error fed to the linear PID.
    pub linear_error: f64,
    /// Error fed to the angular PID (counter-clockwise positive).
    pub angular_error: f64,
}

/// Boomerang controller owning one linear and one angular PID.
///
/// ```rust
/// use sprocket_control::pid::Pid;
/// use sprocket_control::pursuit::{BoomerangController, BoomerangSettings, Target};
/// use sprocket_types::{MotionState, Pose};
///
/// let mut boomerang = BoomerangController::new(
///     Pid::new(0.8, 0.0, 2.0),
///     Pid::new(10.0, 0.0, 20.0),
///     BoomerangSettings::default(),
///     Target::new(24.0, 24.0, std::f64::consts::FRAC_PI_2),
/// );
///
/// let step = boomerang.step(Pose::origin());
/// assert_eq!(step.state, MotionState::Running);
/// assert!(step.command.right > step.command.left); // curving left
/// ```
#[derive(Debug, Clone)]
pub struct BoomerangController {
    linear: Pid,
    angular: Pid,
    settings: BoomerangSettings,
    settle: SettleTracker,
    target: Target,
    state: MotionState,
}

impl BoomerangController {
    pub fn new(linear: Pid, angular: Pid, settings: BoomerangSettings, target: Target) -> Self {
        let settle = SettleTracker::new(settings.linear_deadband, settings.angular_deadband)
            .with_settle_ticks(settings.settle_ticks);
        Self {
            linear,
            angular,
            settings,
            settle,
            target,
            state: MotionState::Running,
        }
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn settings(&self) -> &BoomerangSettings {
        &self.settings
    }

    /// Start a new movement toward `target`, clearing all accumulated state.
    pub fn retarget(&mut self, target: Target) {
        self.target = target;
        self.reset_loops();
        self.state = MotionState::Running;
    }

    /// Abort the movement. Subsequent steps command zero.
    pub fn cancel(&mut self) {
        self.end(MotionState::Cancelled(CancelReason::Requested));
    }

    /// Advance one control tick from the latest pose.
    pub fn step(&mut self, current: Pose) -> PursuitStep {
        let carrot = compute_carrot(&current, &self.target, self.settings.lead);
        let distance = current.position().distance_to(self.target.position());

        if self.state.is_terminal() {
            return self.idle(carrot, distance);
        }
        if !current.is_finite() {
            warn!(?current, "non-finite pose; holding drivetrain");
            return self.idle(carrot, distance);
        }

        let final_heading_error = self
            .target
            .heading
            .map_or(0.0, |h| wrap_angle(h - current.heading));

        if self.settle.observe(distance, final_heading_error) == MotionState::Settled {
            debug!(distance, final_heading_error, "boomerang settled");
            self.end(MotionState::Settled);
            return self.idle(carrot, distance);
        }

        let position = current.position();
        let (linear_error, angular_error) = if distance > self.settings.close_radius {
            let steer = wrap_angle(position.bearing_to(carrot) - current.heading);
            (distance * steer.cos(), steer)
        } else {
            let to_target = wrap_angle(position.bearing_to(self.target.position()) - current.heading);
            let steer = match self.target.heading {
                Some(_) => final_heading_error,
                None if distance > self.settings.linear_deadband => to_target,
                None => 0.0,
            };
            (distance * to_target.cos(), steer)
        };

        let max_linear = magnitude_cap(self.settings.max_linear);
        let max_turn = magnitude_cap(self.settings.max_turn);
        let linear = self.linear.update(linear_error).clamp(-max_linear, max_linear);
        // The angular loop works counter-clockwise positive; the drive mix
        // takes a clockwise-positive turn.
        let turn = (-self.angular.update(angular_error)).clamp(-max_turn, max_turn);

        let command = DriveCommand::arcade(linear, turn);
        if !command.is_finite() {
            warn!(?command, linear_error, angular_error, "non-finite drive command; holding drivetrain");
            return self.idle(carrot, distance);
        }

        PursuitStep {
            command,
            state: self.state,
            carrot,
            distance,
            linear_error,
            angular_error,
        }
    }

    fn end(&mut self, state: MotionState) {
        self.state = state;
        self.reset_loops();
    }

    fn reset_loops(&mut self) {
        self.linear.reset();
        self.angular.reset();
        self.settle.reset();
    }

    fn idle(&self, carrot: Point, distance: f64) -> PursuitStep {
        PursuitStep {
            command: DriveCommand::zero(),
            state: self.state,
            carrot,
            distance,
            linear_error: 0.0,
            angular_error: 0.0,
        }
    }
}

fn magnitude_cap(value: f64) -> f64 {
    if value.is_nan() { f64::INFINITY } else { value.abs() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn controller(target: Target) -> BoomerangController {
        BoomerangController::new(
            Pid::new(1.0, 0.0, 0.0),
            Pid::new(10.0, 0.0, 0.0),
            BoomerangSettings {
                close_radius: 2.0,
                ..BoomerangSettings::default()
            },
            target,
        )
    }

    #[test]
    fn carrot_equals_target_when_already_there() {
        let pose = Pose::new(5.0, -3.0, 1.2);
        let target = Target::from(pose);
        for lead in [0.0, 0.3, 0.6, 1.0] {
            let carrot = compute_carrot(&pose, &target, lead);
            assert!((carrot.x - 5.0).abs() < 1e-12);
            assert!((carrot.y + 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn carrot_sits_behind_target_along_its_heading() {
        let carrot = compute_carrot(&Pose::origin(), &Target::new(0.0, 24.0, FRAC_PI_2), 0.5);
        assert!(carrot.x.abs() < 1e-9);
        assert!((carrot.y - 12.0).abs() < 1e-9);
    }

    #[test]
    fn lead_is_clamped_to_unit_interval() {
        let target = Target::new(10.0, 0.0, 0.0);
        let over = compute_carrot(&Pose::origin(), &target, 3.0);
        let one = compute_carrot(&Pose::origin(), &target, 1.0);
        assert_eq!(over, one);
        let under = compute_carrot(&Pose::origin(), &target, -1.0);
        assert_eq!(under, target.position());
    }

    #[test]
    fn headingless_target_is_its_own_carrot() {
        let target = Target::point(7.0, 8.0);
        assert_eq!(compute_carrot(&Pose::origin(), &target, 0.9), Point::new(7.0, 8.0));
    }

    #[test]
    fn carrot_converges_on_target_during_approach() {
        let target = Target::new(24.0, 24.0, FRAC_PI_2);
        let far = compute_carrot(&Pose::origin(), &target, 0.6);
        let near = compute_carrot(&Pose::new(20.0, 18.0, 1.0), &target, 0.6);
        assert!(near.distance_to(target.position()) < far.distance_to(target.position()));
    }

    #[test]
    fn at_target_settles_immediately() {
        let pose = Pose::new(12.0, 6.0, 0.4);
        let mut boomerang = controller(Target::from(pose));
        let step = boomerang.step(pose);
        assert_eq!(step.state, MotionState::Settled);
        assert!(step.command.is_zero());
        assert_eq!(step.linear_error, 0.0);
        assert_eq!(step.angular_error, 0.0);
        assert_eq!(step.carrot, pose.position());
    }

    #[test]
    fn first_step_curves_toward_carrot() {
        let mut boomerang = controller(Target::new(24.0, 24.0, FRAC_PI_2));
        let step = boomerang.step(Pose::origin());
        assert_eq!(step.state, MotionState::Running);
        assert!(step.angular_error > 0.0);
        assert!(step.command.linear() > 0.0);
        assert!(step.command.right > step.command.left);
    }

    #[test]
    fn straight_approach_has_no_turn() {
        let mut boomerang = controller(Target::new(24.0, 0.0, 0.0));
        let step = boomerang.step(Pose::origin());
        assert!(step.angular_error.abs() < 1e-12);
        assert!((step.command.left - step.command.right).abs() < 1e-12);
        assert!((step.linear_error - 24.0).abs() < 1e-12);
    }

    #[test]
    fn overshoot_backs_up() {
        let mut boomerang = controller(Target::new(24.0, 0.0, 0.0));
        let step = boomerang.step(Pose::new(25.5, 0.0, 0.0));
        // Inside the close radius: hold heading, reverse onto the target.
        assert!(step.linear_error < 0.0);
        assert!(step.command.linear() < 0.0);
        assert!(step.angular_error.abs() < 1e-12);
    }

    #[test]
    fn close_range_turns_to_final_heading() {
        let mut boomerang = controller(Target::new(0.0, 0.0, FRAC_PI_2));
        let step = boomerang.step(Pose::origin());
        assert!((step.angular_error - FRAC_PI_2).abs() < 1e-12);
        assert!(step.command.right > step.command.left);
    }

    #[test]
    fn heading_error_wraps_the_short_way() {
        let mut boomerang = controller(Target::new(0.0, 0.0, PI - 0.1));
        let step = boomerang.step(Pose::new(0.0, 0.0, -PI + 0.1));
        assert!((step.angular_error - (-0.2)).abs() < 1e-9);
    }

    #[test]
    fn commands_respect_caps() {
        let mut boomerang = BoomerangController::new(
            Pid::new(100.0, 0.0, 0.0),
            Pid::new(100.0, 0.0, 0.0),
            BoomerangSettings {
                max_linear: 5.0,
                max_turn: 2.0,
                ..BoomerangSettings::default()
            },
            Target::new(100.0, 100.0, 0.0),
        );
        let step = boomerang.step(Pose::origin());
        assert!(step.command.left.abs() <= 7.0 + 1e-12);
        assert!(step.command.right.abs() <= 7.0 + 1e-12);
    }

    #[test]
    fn cancel_is_terminal() {
        let mut boomerang = controller(Target::new(24.0, 0.0, 0.0));
        boomerang.step(Pose::origin());
        boomerang.cancel();
        let step = boomerang.step(Pose::origin());
        assert_eq!(step.state, MotionState::Cancelled(CancelReason::Requested));
        assert!(step.command.is_zero());
    }

    #[test]
    fn settled_controller_stays_settled_until_retargeted() {
        let mut boomerang = controller(Target::new(0.0, 0.0, 0.0));
        assert_eq!(boomerang.step(Pose::origin()).state, MotionState::Settled);
        assert_eq!(boomerang.step(Pose::new(50.0, 0.0, 0.0)).state, MotionState::Settled);

        boomerang.retarget(Target::new(50.0, 0.0, 0.0));
        let step = boomerang.step(Pose::origin());
        assert_eq!(step.state, MotionState::Running);
        assert!(step.command.linear() > 0.0);
    }

    #[test]
    fn nan_heading_means_unspecified() {
        assert_eq!(Target::new(24.0, 0.0, f64::NAN).heading, None);
        assert_eq!(Target::from(Pose::new(24.0, 0.0, f64::INFINITY)).heading, None);

        let mut boomerang = controller(Target::from(Pose::new(24.0, 0.0, f64::NAN)));
        let step = boomerang.step(Pose::origin());
        assert_eq!(step.carrot, Point::new(24.0, 0.0));
        assert!(step.command.is_finite());
        assert!(step.command.linear() > 0.0);
        assert_eq!(step.command, controller(Target::point(24.0, 0.0)).step(Pose::origin()).command);
    }

    #[test]
    fn non_finite_command_is_never_issued() {
        // A finite pose far enough out overflows the distance to infinity.
        let mut boomerang = controller(Target::point(f64::MAX, 0.0));
        let step = boomerang.step(Pose::new(-f64::MAX, 0.0, 0.0));
        assert_eq!(step.state, MotionState::Running);
        assert!(step.command.is_zero());
    }

    #[test]
    fn non_finite_pose_commands_zero() {
        let mut boomerang = controller(Target::new(24.0, 0.0, 0.0));
        let step = boomerang.step(Pose::new(f64::NAN, 0.0, 0.0));
        assert_eq!(step.state, MotionState::Running);
        assert!(step.command.is_zero());
    }
}
