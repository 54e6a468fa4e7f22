//! `sprocket` – motion-control command line.
//!
//! Runs movements against the simulated drivetrain using the tuning in
//! `sprocket.toml` (or the file given with `--config`):
//!
//! 1. Installs tracing (`RUST_LOG`, `SPROCKET_LOG_FORMAT`, optional OTLP).
//! 2. Loads and validates the configuration.
//! 3. Dispatches `move`, `profile`, or `config`.
//!
//! During a `move`, **Ctrl-C** cancels the movement; the drive is zeroed and
//! the outcome is still printed.

mod args;

use clap::Parser;
use colored::Colorize;
use tracing::{info, warn};

use sprocket_control::pursuit::{BoomerangController, Target};
use sprocket_control::profile::MotionProfile;
use sprocket_hal::sim::{SimConfig, SimDrivetrain, SimGyro};
use sprocket_odometry::{HeadingDirection, HeadingSource, OdometryEstimator, OdometryTask};
use sprocket_runtime::config::load_or_default;
use sprocket_runtime::{MotionOutcome, MotionSession, SprocketConfig, init_tracing};
use sprocket_types::{MotionError, MotionState, Pose};

use crate::args::{Cli, Command};

fn main() {
    let _telemetry = init_tracing("sprocket");

    let cli = Cli::parse();

    let cfg = match load_or_default(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("{}: {e}", "Config error".red().bold());
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Command::Config => print_config(&cfg),
        Command::Profile { distance } => {
            print_profile(&cfg, distance);
            Ok(())
        }
        Command::Move { x, y, heading_deg } => {
            let target = match heading_deg {
                Some(deg) => Target::new(x, y, deg.to_radians()),
                None => Target::point(x, y),
            };
            run_move(&cfg, target)
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {e}", "error".red().bold());
        std::process::exit(1);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// move
// ─────────────────────────────────────────────────────────────────────────────

fn run_move(cfg: &SprocketConfig, target: Target) -> Result<(), MotionError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| MotionError::TaskStopped(format!("failed to start tokio runtime: {e}")))?;
    runtime.block_on(drive_to(cfg, target))
}

async fn drive_to(cfg: &SprocketConfig, target: Target) -> Result<(), MotionError> {
    let settings = cfg.session.settings();
    let sim = SimDrivetrain::new(sim_config(cfg));
    let odom = OdometryTask::spawn(OdometryEstimator::new(cfg.drivetrain), sim.clone(), settings.period);
    let mut session = MotionSession::new(sim.clone(), odom.reader(), settings);

    let cancel = session.cancel_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!("{}", "⚠  Ctrl-C received – cancelling movement …".yellow().bold());
        cancel.cancel();
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; movements cannot be interrupted");
    }

    let mut controller = BoomerangController::new(
        cfg.linear_pid.build(),
        cfg.angular_pid.build(),
        cfg.boomerang,
        target,
    );

    println!(
        "  Driving to ({:.2}, {:.2}){} …",
        target.x,
        target.y,
        target
            .heading
            .map(|h| format!(" facing {:.1}°", h.to_degrees()))
            .unwrap_or_default()
    );
    let outcome = session.move_to(&mut controller).await;
    let estimated = odom.stop().await?;
    let outcome = outcome?;
    info!(commands = sim.commands_applied(), "simulation finished");

    print_outcome(&outcome, estimated, sim.true_pose());
    Ok(())
}

/// The simulated base that matches the configured drivetrain.
fn sim_config(cfg: &SprocketConfig) -> SimConfig {
    let drivetrain = &cfg.drivetrain;
    let convention = drivetrain.heading_convention;
    let gyro = match (drivetrain.heading_source, convention.direction) {
        (HeadingSource::Wheels, _) => SimGyro::Off,
        (_, HeadingDirection::Clockwise) => SimGyro::Clockwise {
            offset_deg: convention.offset_deg,
        },
        (_, HeadingDirection::CounterClockwise) => {
            if convention.offset_deg != 0.0 {
                warn!(
                    offset_deg = convention.offset_deg,
                    "simulated gyro reads counter-clockwise from +X; the configured offset shifts the estimate"
                );
            }
            SimGyro::CounterClockwise
        }
    };

    SimConfig {
        wheel_circumference: drivetrain.wheel_circumference,
        gear_ratio: drivetrain.gear_ratio,
        track_width: drivetrain.track_width,
        max_command: cfg.simulation.max_command,
        top_speed: cfg.simulation.top_speed,
        step: cfg.session.settings().period.as_secs_f64(),
        gyro,
    }
}

fn print_outcome(outcome: &MotionOutcome, estimated: Pose, truth: Pose) {
    let state = match outcome.state {
        MotionState::Settled => "settled".green().bold(),
        MotionState::Running => "running".yellow().bold(),
        MotionState::Cancelled(reason) => format!("cancelled ({reason:?})").yellow().bold(),
    };
    println!();
    println!("  Outcome    {state}");
    println!(
        "  Ticks      {} {}",
        outcome.ticks,
        format!("({:.2} s)", outcome.elapsed.as_secs_f64()).dimmed()
    );
    println!("  Estimated  {}", format_pose(estimated));
    println!("  Actual     {}", format_pose(truth).dimmed());
    println!();
}

fn format_pose(pose: Pose) -> String {
    format!(
        "x = {:>8.3}  y = {:>8.3}  heading = {:>7.2}°",
        pose.x,
        pose.y,
        pose.heading.to_degrees()
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// profile
// ─────────────────────────────────────────────────────────────────────────────

const PROFILE_SAMPLES: usize = 10;

fn print_profile(cfg: &SprocketConfig, distance: f64) {
    let limits = &cfg.profile;
    let profile = MotionProfile::plan(distance.abs(), limits.max_velocity, limits.max_acceleration);
    let sign = if distance < 0.0 { -1.0 } else { 1.0 };

    println!();
    println!(
        "  {} {:.2} in  {}",
        "Profile".bold().cyan(),
        distance,
        format!(
            "(v ≤ {:.1} in/s, a ≤ {:.1} in/s²)",
            limits.max_velocity, limits.max_acceleration
        )
        .dimmed()
    );
    println!("  Peak velocity  {:.2} in/s", sign * profile.peak_velocity);
    println!("  Accelerate     {:.3} s  {:.2} in", profile.accel_time, profile.accel_distance);
    println!("  Cruise         {:.3} s  {:.2} in", profile.cruise_time, profile.cruise_distance);
    println!("  Decelerate     {:.3} s  {:.2} in", profile.decel_time, profile.decel_distance);
    println!("  Total          {:.3} s", profile.total_time());
    println!();

    println!("  {:>8}  {:>10}  {:>10}", "t (s)".bold(), "v (in/s)".bold(), "x (in)".bold());
    let total = profile.total_time();
    for i in 0..=PROFILE_SAMPLES {
        let t = total * i as f64 / PROFILE_SAMPLES as f64;
        println!(
            "  {:>8.3}  {:>10.2}  {:>10.2}",
            t,
            sign * profile.velocity_at(t),
            sign * profile.position_at(t)
        );
    }
    println!();
}

// ─────────────────────────────────────────────────────────────────────────────
// config
// ─────────────────────────────────────────────────────────────────────────────

fn print_config(cfg: &SprocketConfig) -> Result<(), MotionError> {
    print!("{}", cfg.to_toml()?);
    Ok(())
}
