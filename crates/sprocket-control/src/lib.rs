//! `sprocket-control` – closed-loop building blocks.
//!
//! Pure, synchronous controllers. Nothing in this crate performs I/O or
//! spawns tasks; callers feed errors and poses in and take commands out.
//!
//! # Modules
//!
//! - [`pid`] – [`Pid`][pid::Pid]: PID regulator with composable
//!   [`AntiWindup`][pid::AntiWindup] strategies.
//! - [`profile`] – [`MotionProfile`][profile::MotionProfile]: trapezoidal
//!   (or triangular) velocity profile for a 1-D move.
//! - [`slew`] – [`limit`][slew::limit] and [`SlewLimiter`][slew::SlewLimiter]
//!   bound how fast a command may change.
//! - [`settle`] – [`SettleTracker`][settle::SettleTracker]: deadband and
//!   dwell-time predicate deciding when a movement is done.
//! - [`pursuit`] – [`BoomerangController`][pursuit::BoomerangController]:
//!   drives to a pose along a curved approach via a moving carrot point.

pub mod pid;
pub mod profile;
pub mod pursuit;
pub mod settle;
pub mod slew;

pub use pid::{AntiWindup, Gains, Pid};
pub use profile::MotionProfile;
pub use pursuit::{BoomerangController, BoomerangSettings, PursuitStep, Target, compute_carrot};
pub use settle::SettleTracker;
pub use slew::SlewLimiter;
