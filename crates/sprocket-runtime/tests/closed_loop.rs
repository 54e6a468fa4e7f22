//! End-to-end movements on the simulated drivetrain.
//!
//! Every test runs on tokio's paused clock, so the odometry task and the
//! control loop advance in lock-step simulated time.

use std::f64::consts::FRAC_PI_2;
use std::time::Duration;

use sprocket_control::pursuit::{BoomerangController, Target};
use sprocket_hal::sim::{RecordingSink, SimConfig, SimDrivetrain};
use sprocket_odometry::{OdometryConfig, OdometryEstimator, OdometryHandle, OdometryTask};
use sprocket_runtime::{EventStream, MotionSession, ProfiledDrive, SessionSettings, SprocketConfig};
use sprocket_types::{CancelReason, MotionPayload, MotionState};

const PERIOD: Duration = Duration::from_millis(10);

struct Rig {
    sim: SimDrivetrain,
    odom: OdometryHandle,
    session: MotionSession<SimDrivetrain>,
}

fn rig(settings: SessionSettings) -> Rig {
    let sim = SimDrivetrain::new(SimConfig::default());
    let odom = OdometryTask::spawn(
        OdometryEstimator::new(OdometryConfig::default()),
        sim.clone(),
        PERIOD,
    );
    let session = MotionSession::new(sim.clone(), odom.reader(), settings);
    Rig { sim, odom, session }
}

fn boomerang(target: Target) -> BoomerangController {
    let cfg = SprocketConfig::default();
    BoomerangController::new(cfg.linear_pid.build(), cfg.angular_pid.build(), cfg.boomerang, target)
}

#[tokio::test(start_paused = true)]
async fn straight_move_settles_on_target() {
    let mut rig = rig(SessionSettings::default());

    let outcome = rig
        .session
        .move_to(&mut boomerang(Target::new(24.0, 0.0, 0.0)))
        .await
        .expect("move must not fail");

    assert_eq!(outcome.state, MotionState::Settled);
    assert!((outcome.pose.x - 24.0).abs() <= 1.0, "x = {}", outcome.pose.x);
    assert!(outcome.pose.y.abs() < 1e-6);
    assert!(rig.sim.command().is_zero());
    assert!((rig.sim.true_pose().x - 24.0).abs() <= 1.5);

    rig.odom.stop().await.expect("odometry must stop");
}

#[tokio::test(start_paused = true)]
async fn turn_in_place_settles_on_heading() {
    let mut rig = rig(SessionSettings::default());

    let outcome = rig
        .session
        .move_to(&mut boomerang(Target::new(0.0, 0.0, FRAC_PI_2)))
        .await
        .expect("turn must not fail");

    assert_eq!(outcome.state, MotionState::Settled);
    assert!((outcome.pose.heading - FRAC_PI_2).abs() <= 3f64.to_radians() + 1e-9);
    assert!(outcome.pose.x.abs() < 1e-6 && outcome.pose.y.abs() < 1e-6);
    assert!(rig.sim.command().is_zero());

    rig.odom.stop().await.expect("odometry must stop");
}

#[tokio::test(start_paused = true)]
async fn curved_move_closes_in_and_stops() {
    let mut rig = rig(SessionSettings::default());
    let target = Target::new(24.0, 24.0, FRAC_PI_2);

    let outcome = rig
        .session
        .move_to(&mut boomerang(target))
        .await
        .expect("move must not fail");

    assert!(outcome.state.is_terminal());
    assert!(outcome.pose.position().distance_to(target.position()) < 8.0);
    assert!(rig.sim.command().is_zero());

    rig.odom.stop().await.expect("odometry must stop");
}

#[tokio::test(start_paused = true)]
async fn profiled_drive_ends_at_planned_distance() {
    let mut rig = rig(SessionSettings::default());
    let cfg = SprocketConfig::default();
    let drive = ProfiledDrive::new(24.0, &cfg.profile, cfg.linear_pid.build(), cfg.angular_pid.build());
    let planned_time = drive.profile().total_time();

    let outcome = rig.session.drive_profiled(drive).await.expect("drive must not fail");

    assert_eq!(outcome.state, MotionState::Settled);
    assert!((outcome.pose.x - 24.0).abs() <= 1.0, "x = {}", outcome.pose.x);
    assert!(outcome.elapsed.as_secs_f64() >= planned_time);
    assert!(rig.sim.command().is_zero());

    rig.odom.stop().await.expect("odometry must stop");
}

#[tokio::test(start_paused = true)]
async fn tick_limit_cancels_and_stops() {
    let mut rig = rig(SessionSettings {
        max_ticks: 5,
        ..SessionSettings::default()
    });

    let outcome = rig
        .session
        .move_to(&mut boomerang(Target::new(100.0, 0.0, 0.0)))
        .await
        .expect("move must not fail");

    assert_eq!(outcome.state, MotionState::Cancelled(CancelReason::TickLimit));
    assert_eq!(outcome.ticks, 5);
    assert!(rig.sim.command().is_zero());

    rig.odom.stop().await.expect("odometry must stop");
}

#[tokio::test(start_paused = true)]
async fn stalled_drivetrain_is_abandoned() {
    // Commands go to a recorder; the odometry watches a base nobody drives.
    let sink = RecordingSink::new();
    let idle = SimDrivetrain::new(SimConfig::default());
    let odom = OdometryTask::spawn(OdometryEstimator::new(OdometryConfig::default()), idle, PERIOD);
    let mut session = MotionSession::new(
        sink.clone(),
        odom.reader(),
        SessionSettings {
            stall_ticks: 10,
            ..SessionSettings::default()
        },
    );

    let outcome = session
        .move_to(&mut boomerang(Target::new(24.0, 0.0, 0.0)))
        .await
        .expect("move must not fail");

    assert_eq!(outcome.state, MotionState::Cancelled(CancelReason::Stalled));
    assert_eq!(outcome.ticks, 10);
    let commands = sink.commands();
    assert_eq!(commands.len(), 11);
    assert!(commands[..10].iter().all(|c| c.linear() > 0.0));
    assert!(commands[10].is_zero());

    odom.stop().await.expect("odometry must stop");
}

#[tokio::test(start_paused = true)]
async fn stale_pose_cancels_the_move() {
    let mut rig = rig(SessionSettings {
        max_pose_age: Duration::from_millis(50),
        ..SessionSettings::default()
    });
    rig.sim.inject_sensor_faults(u32::MAX);

    let outcome = rig
        .session
        .move_to(&mut boomerang(Target::new(24.0, 0.0, 0.0)))
        .await
        .expect("move must not fail");

    assert_eq!(outcome.state, MotionState::Cancelled(CancelReason::PoseStale));
    assert!(rig.sim.command().is_zero());

    rig.odom.stop().await.expect("odometry must stop");
}

#[tokio::test(start_paused = true)]
async fn external_cancel_stops_mid_move() {
    let mut rig = rig(SessionSettings::default());
    let cancel = rig.session.cancel_handle();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(105)).await;
        cancel.cancel();
    });

    let outcome = rig
        .session
        .move_to(&mut boomerang(Target::new(200.0, 0.0, 0.0)))
        .await
        .expect("move must not fail");

    assert_eq!(outcome.state, MotionState::Cancelled(CancelReason::Requested));
    assert!(outcome.ticks >= 5);
    assert!(outcome.pose.x > 0.0);
    assert!(rig.sim.command().is_zero());

    rig.odom.stop().await.expect("odometry must stop");
}

#[tokio::test(start_paused = true)]
async fn events_bracket_the_movement() {
    let events = EventStream::new(4096);
    let mut subscriber = events.subscribe();
    let Rig { sim: _sim, odom, session } = rig(SessionSettings::default());
    let mut session = session.with_events(events);

    let outcome = session
        .move_to(&mut boomerang(Target::new(24.0, 0.0, 0.0)))
        .await
        .expect("move must not fail");

    let received = subscriber.drain();
    assert!(matches!(
        received.first().map(|e| &e.payload),
        Some(MotionPayload::Started { .. })
    ));
    match received.last().map(|e| &e.payload) {
        Some(MotionPayload::Finished { state, ticks, .. }) => {
            assert_eq!(*state, outcome.state);
            assert_eq!(*ticks, outcome.ticks);
        }
        other => panic!("expected Finished, got {other:?}"),
    }
    let tick_events = received
        .iter()
        .filter(|e| matches!(e.payload, MotionPayload::Tick { carrot: Some(_), .. }))
        .count();
    // The settling tick commands nothing and publishes no Tick.
    assert_eq!(tick_events as u64, outcome.ticks - 1);

    odom.stop().await.expect("odometry must stop");
}
