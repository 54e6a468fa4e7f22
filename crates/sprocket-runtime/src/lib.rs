//! `sprocket-runtime` – runs the control primitives against real time.
//!
//! # Modules
//!
//! - [`session`] – [`MotionSession`][session::MotionSession]: fixed-period
//!   control task that turns poses into slew-limited drive commands, with
//!   tick-limit, stall, stale-pose and external cancellation escapes.
//! - [`stall_guard`] – [`StallGuard`][stall_guard::StallGuard]: notices a
//!   drivetrain that is being commanded but is not moving.
//! - [`events`] – [`EventStream`][events::EventStream]: broadcast stream of
//!   motion start/tick/finish events.
//! - [`config`] – [`SprocketConfig`][config::SprocketConfig]: the
//!   `sprocket.toml` tuning file with `SPROCKET_*` environment overrides.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber, optionally exporting spans over OTLP when
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` is set.

pub mod config;
pub mod events;
pub mod session;
pub mod stall_guard;
pub mod telemetry;

pub use config::{PidConfig, ProfileConfig, SessionConfig, SimulationConfig, SprocketConfig};
pub use events::{EventStream, EventSubscriber};
pub use session::{CancelHandle, MotionOutcome, MotionSession, ProfiledDrive, SessionSettings};
pub use stall_guard::StallGuard;
pub use telemetry::{TelemetryGuard, init_tracing};

/// Held by unit tests that read or write process environment variables, so
/// the parallel test runner never touches the environment concurrently.
#[cfg(test)]
pub(crate) fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static ENV: std::sync::Mutex<()> = std::sync::Mutex::new(());
    ENV.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
