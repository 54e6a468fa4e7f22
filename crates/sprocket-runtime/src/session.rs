//! [`MotionSession`] – the control task.
//!
//! A session owns the drive sink and a [`PoseReader`] onto the odometry task.
//! Each movement runs a fixed-period loop:
//!
//! 1. **Guard** – stop on cancellation, tick limit, or a stale pose.
//! 2. **Decide** – hand the latest pose to the movement's controller.
//! 3. **Shape** – pass each side's command through a [`SlewLimiter`].
//! 4. **Act** – apply the command to the [`DriveSink`].
//! 5. **Report** – publish a `Tick` event and feed the [`StallGuard`].
//!
//! Every way out of the loop, including errors, commands a zero drive.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sprocket_control::pid::Pid;
use sprocket_control::profile::MotionProfile;
use sprocket_control::pursuit::BoomerangController;
use sprocket_control::settle::SettleTracker;
use sprocket_control::slew::SlewLimiter;
use sprocket_hal::DriveSink;
use sprocket_odometry::PoseReader;
use sprocket_types::{
    CancelReason, DriveCommand, MotionError, MotionEvent, MotionPayload, MotionState, Point, Pose,
    wrap_angle,
};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ProfileConfig;
use crate::events::EventStream;
use crate::stall_guard::StallGuard;

const EVENT_SOURCE: &str = "sprocket-runtime::session";

// ─────────────────────────────────────────────────────────────────────────────
// Settings, cancellation, outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Loop cadence and liveness limits for a [`MotionSession`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub period: Duration,
    /// Ticks after which a movement is abandoned.
    pub max_ticks: u64,
    /// Largest change per second in either side's command.
    pub slew_rate: f64,
    /// Motionless commanded ticks that count as a stall; `0` disables.
    pub stall_ticks: usize,
    pub stall_epsilon: f64,
    pub max_pose_age: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(10),
            max_ticks: 1500,
            slew_rate: 120.0,
            stall_ticks: 50,
            stall_epsilon: 0.01,
            max_pose_age: Duration::from_millis(100),
        }
    }
}

/// Shared flag that aborts the running movement.
///
/// Cancellation is sticky: once set, every movement started on the session
/// ends immediately until [`reset`][CancelHandle::reset] is called.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<AtomicBool>);

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// How a movement ended.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionOutcome {
    pub state: MotionState,
    pub ticks: u64,
    /// Latest pose when the loop exited.
    pub pose: Pose,
    pub elapsed: Duration,
}

impl MotionOutcome {
    pub fn settled(&self) -> bool {
        self.state == MotionState::Settled
    }
}

/// What a movement wants on one tick.
#[derive(Debug, Clone, Copy)]
struct Decision {
    command: DriveCommand,
    state: MotionState,
    carrot: Option<Point>,
    linear_error: f64,
    angular_error: f64,
}

// ─────────────────────────────────────────────────────────────────────────────
// Profiled straight drive
// ─────────────────────────────────────────────────────────────────────────────

/// A straight-line move that follows a trapezoidal profile.
///
/// The planned velocity is fed forward through `kv`; a linear PID corrects
/// the gap between planned and measured travel, and a heading PID holds the
/// starting heading. Once the profile has run out, the drive settles through
/// a [`SettleTracker`] on both the position and heading error.
#[derive(Debug, Clone)]
pub struct ProfiledDrive {
    profile: MotionProfile,
    direction: f64,
    kv: f64,
    settle: SettleTracker,
    linear: Pid,
    heading: Pid,
}

impl ProfiledDrive {
    /// Plan a drive of `distance` inches (negative drives backwards).
    pub fn new(distance: f64, limits: &ProfileConfig, linear: Pid, heading: Pid) -> Self {
        Self {
            profile: MotionProfile::plan(distance.abs(), limits.max_velocity, limits.max_acceleration),
            direction: if distance < 0.0 { -1.0 } else { 1.0 },
            kv: limits.kv,
            settle: SettleTracker::new(limits.tolerance, limits.heading_tolerance),
            linear,
            heading,
        }
    }

    pub fn profile(&self) -> &MotionProfile {
        &self.profile
    }

    fn decide(&mut self, origin: Pose, pose: Pose, elapsed: f64) -> Decision {
        let travelled = (pose.x - origin.x) * origin.heading.cos() + (pose.y - origin.y) * origin.heading.sin();
        let planned = self.direction * self.profile.position_at(elapsed);
        let linear_error = planned - travelled;
        let angular_error = wrap_angle(origin.heading - pose.heading);

        let state = if self.profile.is_finished(elapsed) {
            self.settle.observe(linear_error, angular_error)
        } else {
            self.settle.reset();
            MotionState::Running
        };
        if state == MotionState::Settled {
            self.linear.reset();
            self.heading.reset();
            return Decision {
                command: DriveCommand::zero(),
                state: MotionState::Settled,
                carrot: None,
                linear_error,
                angular_error,
            };
        }

        let feedforward = self.direction * self.kv * self.profile.velocity_at(elapsed);
        let linear = feedforward + self.linear.update(linear_error);
        let turn = -self.heading.update(angular_error);
        Decision {
            command: DriveCommand::arcade(linear, turn),
            state: MotionState::Running,
            carrot: None,
            linear_error,
            angular_error,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MotionSession
// ─────────────────────────────────────────────────────────────────────────────

/// Runs movements against a drive sink using poses from the odometry task.
pub struct MotionSession<D> {
    sink: D,
    pose: PoseReader,
    settings: SessionSettings,
    events: EventStream,
    cancel: CancelHandle,
}

impl<D: DriveSink> MotionSession<D> {
    pub fn new(sink: D, pose: PoseReader, settings: SessionSettings) -> Self {
        Self {
            sink,
            pose,
            settings,
            events: EventStream::default(),
            cancel: CancelHandle::new(),
        }
    }

    /// Publish events on an existing stream instead of a private one.
    pub fn with_events(mut self, events: EventStream) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &EventStream {
        &self.events
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn sink(&self) -> &D {
        &self.sink
    }

    pub fn into_sink(self) -> D {
        self.sink
    }

    /// Drive to the controller's target with boomerang pursuit.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`MotionError::Actuator`] if a command (or the
    /// final stop) cannot be applied.
    pub async fn move_to(&mut self, controller: &mut BoomerangController) -> Result<MotionOutcome, MotionError> {
        let goal = controller.target().position();
        self.run("boomerang", goal, |pose, _| {
            let step = controller.step(pose);
            Decision {
                command: step.command,
                state: step.state,
                carrot: Some(step.carrot),
                linear_error: step.linear_error,
                angular_error: step.angular_error,
            }
        })
        .await
    }

    /// Drive straight along the current heading following `drive`'s profile.
    ///
    /// # Errors
    ///
    /// Returns the sink's [`MotionError::Actuator`] if a command (or the
    /// final stop) cannot be applied.
    pub async fn drive_profiled(&mut self, mut drive: ProfiledDrive) -> Result<MotionOutcome, MotionError> {
        let start = self.pose.pose();
        let distance = drive.direction * drive.profile.total_distance();
        let goal = Point::new(
            start.x + distance * start.heading.cos(),
            start.y + distance * start.heading.sin(),
        );
        self.run("profiled", goal, |pose, elapsed| {
            drive.decide(start, pose, elapsed.as_secs_f64())
        })
        .await
    }

    async fn run<F>(&mut self, kind: &str, goal: Point, mut decide: F) -> Result<MotionOutcome, MotionError>
    where
        F: FnMut(Pose, Duration) -> Decision,
    {
        let settings = self.settings;
        let period = settings.period.max(Duration::from_millis(1));
        let dt = period.as_secs_f64();
        let mut left = SlewLimiter::new(settings.slew_rate);
        let mut right = SlewLimiter::new(settings.slew_rate);
        let mut stall = StallGuard::new(settings.stall_ticks, settings.stall_epsilon);

        let start = self.pose.pose();
        info!(kind, start = ?start, goal_x = goal.x, goal_y = goal.y, "motion started");
        self.publish(MotionPayload::Started {
            kind: kind.to_string(),
            start,
            goal,
        });

        let started = Instant::now();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks = 0u64;

        let state = loop {
            ticker.tick().await;

            if self.cancel.is_cancelled() {
                break MotionState::Cancelled(CancelReason::Requested);
            }
            if ticks >= settings.max_ticks {
                break MotionState::Cancelled(CancelReason::TickLimit);
            }
            if self.pose.is_stale(settings.max_pose_age) {
                warn!(age_ms = self.pose.age().as_millis() as u64, "pose is stale");
                break MotionState::Cancelled(CancelReason::PoseStale);
            }

            let pose = self.pose.pose();
            let decision = decide(pose, started.elapsed());
            ticks += 1;
            if decision.state.is_terminal() {
                break decision.state;
            }

            let command = DriveCommand::new(
                left.step(decision.command.left, dt),
                right.step(decision.command.right, dt),
            );
            if let Err(e) = self.sink.apply(command) {
                warn!(sink = self.sink.id(), error = %e, "drive command rejected; stopping");
                if let Err(stop_err) = self.sink.stop() {
                    warn!(sink = self.sink.id(), error = %stop_err, "stop after rejected command failed");
                }
                return Err(e);
            }

            debug!(
                tick = ticks,
                x = pose.x,
                y = pose.y,
                heading = pose.heading,
                left = command.left,
                right = command.right,
                linear_error = decision.linear_error,
                angular_error = decision.angular_error,
                "control tick"
            );
            self.publish(MotionPayload::Tick {
                tick: ticks,
                pose,
                carrot: decision.carrot,
                command,
                linear_error: decision.linear_error,
                angular_error: decision.angular_error,
            });

            if stall.record(pose, !command.is_zero()) {
                warn!(tick = ticks, "drivetrain stalled");
                break MotionState::Cancelled(CancelReason::Stalled);
            }
        };

        self.sink.stop()?;

        let outcome = MotionOutcome {
            state,
            ticks,
            pose: self.pose.pose(),
            elapsed: started.elapsed(),
        };
        info!(
            kind,
            state = ?outcome.state,
            ticks,
            x = outcome.pose.x,
            y = outcome.pose.y,
            heading = outcome.pose.heading,
            "motion finished"
        );
        self.publish(MotionPayload::Finished {
            state,
            ticks,
            pose: outcome.pose,
        });
        Ok(outcome)
    }

    fn publish(&self, payload: MotionPayload) {
        self.events.publish(MotionEvent::new(EVENT_SOURCE, payload));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sprocket_control::pursuit::{BoomerangSettings, Target};
    use sprocket_hal::sim::RecordingSink;
    use sprocket_odometry::{OdometryConfig, OdometryEstimator, OdometryTask};

    struct FailingSink;

    impl DriveSink for FailingSink {
        fn id(&self) -> &str {
            "failing"
        }

        fn apply(&mut self, command: DriveCommand) -> Result<(), MotionError> {
            if command.is_zero() {
                return Ok(());
            }
            Err(MotionError::Actuator {
                sink_id: "failing".to_string(),
                details: "motor unplugged".to_string(),
            })
        }
    }

    fn controller(target: Target) -> BoomerangController {
        BoomerangController::new(
            Pid::new(1.0, 0.0, 0.0),
            Pid::new(10.0, 0.0, 0.0),
            BoomerangSettings::default(),
            target,
        )
    }

    #[test]
    fn cancel_handle_is_shared_and_sticky() {
        let handle = CancelHandle::new();
        let clone = handle.clone();
        assert!(!handle.is_cancelled());
        clone.cancel();
        assert!(handle.is_cancelled());
        handle.reset();
        assert!(!clone.is_cancelled());
    }

    #[test]
    fn empty_profile_settles_immediately() {
        let mut drive = ProfiledDrive::new(0.0, &ProfileConfig::default(), Pid::new(1.0, 0.0, 0.0), Pid::new(1.0, 0.0, 0.0));
        let decision = drive.decide(Pose::origin(), Pose::origin(), 0.0);
        assert_eq!(decision.state, MotionState::Settled);
        assert!(decision.command.is_zero());
    }

    #[test]
    fn profiled_drive_feeds_forward_planned_velocity() {
        let limits = ProfileConfig::default();
        let mut drive = ProfiledDrive::new(-48.0, &limits, Pid::new(0.0, 0.0, 0.0), Pid::new(0.0, 0.0, 0.0));
        let elapsed = drive.profile().accel_time;
        let decision = drive.decide(Pose::origin(), Pose::origin(), elapsed);
        assert_eq!(decision.state, MotionState::Running);
        assert!((decision.command.linear() + limits.kv * limits.max_velocity).abs() < 1e-9);
    }

    #[test]
    fn finished_profile_waits_for_heading() {
        let limits = ProfileConfig::default();
        let mut drive = ProfiledDrive::new(24.0, &limits, Pid::new(1.0, 0.0, 0.0), Pid::new(10.0, 0.0, 0.0));
        let done = drive.profile().total_time() + 0.1;

        // On the spot but 10° off the starting heading.
        let skewed = Pose::new(24.0, 0.0, 10f64.to_radians());
        let decision = drive.decide(Pose::origin(), skewed, done);
        assert_eq!(decision.state, MotionState::Running);
        assert!(decision.angular_error.abs() > limits.heading_tolerance);
        // Turning back clockwise.
        assert!(decision.command.left > decision.command.right);

        let decision = drive.decide(Pose::origin(), Pose::new(24.0, 0.0, 0.0), done);
        assert_eq!(decision.state, MotionState::Settled);
        assert!(decision.command.is_zero());
    }

    #[test]
    fn unfinished_profile_never_settles() {
        let mut drive = ProfiledDrive::new(24.0, &ProfileConfig::default(), Pid::new(1.0, 0.0, 0.0), Pid::new(1.0, 0.0, 0.0));
        // Exactly on the plan mid-way, but the plan has not run out.
        let elapsed = drive.profile().total_time() / 2.0;
        let on_plan = Pose::new(drive.profile().position_at(elapsed), 0.0, 0.0);
        let decision = drive.decide(Pose::origin(), on_plan, elapsed);
        assert_eq!(decision.state, MotionState::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn pre_cancelled_session_stops_without_moving() {
        let sink = RecordingSink::new();
        let odom = OdometryTask::spawn(
            OdometryEstimator::new(OdometryConfig::default()),
            sprocket_hal::sim::SimDrivetrain::new(Default::default()),
            Duration::from_millis(10),
        );
        let mut session = MotionSession::new(sink.clone(), odom.reader(), SessionSettings::default());
        session.cancel_handle().cancel();

        let outcome = session.move_to(&mut controller(Target::new(24.0, 0.0, 0.0))).await.unwrap();
        assert_eq!(outcome.state, MotionState::Cancelled(CancelReason::Requested));
        assert_eq!(outcome.ticks, 0);
        assert_eq!(sink.commands(), vec![DriveCommand::zero()]);
        odom.stop().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn actuator_failure_surfaces_after_stop() {
        let odom = OdometryTask::spawn(
            OdometryEstimator::new(OdometryConfig::default()),
            sprocket_hal::sim::SimDrivetrain::new(Default::default()),
            Duration::from_millis(10),
        );
        let mut session = MotionSession::new(FailingSink, odom.reader(), SessionSettings::default());
        let err = session
            .move_to(&mut controller(Target::new(24.0, 0.0, 0.0)))
            .await
            .unwrap_err();
        assert!(matches!(err, MotionError::Actuator { .. }));
        odom.stop().await.unwrap();
    }
}
