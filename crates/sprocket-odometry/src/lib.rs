//! `sprocket-odometry` – where the robot thinks it is.
//!
//! # Modules
//!
//! - [`heading`] – [`HeadingConvention`][heading::HeadingConvention] maps
//!   sensor-native headings onto counter-clockwise-from-+X, and
//!   [`HeadingSource`][heading::HeadingSource] picks gyro, wheels, or a
//!   complementary blend of both.
//! - [`estimator`] – [`OdometryEstimator`][estimator::OdometryEstimator]:
//!   single-owner dead-reckoning pose estimate fed by encoder samples.
//! - [`task`] – [`OdometryTask`][task::OdometryTask]: runs an estimator on a
//!   tokio task and publishes [`PoseSnapshot`][task::PoseSnapshot]s to any
//!   number of [`PoseReader`][task::PoseReader]s.

pub mod estimator;
pub mod heading;
pub mod task;

pub use estimator::{OdometryConfig, OdometryEstimator, encoder_to_distance};
pub use heading::{HeadingConvention, HeadingDirection, HeadingSource};
pub use task::{OdometryHandle, OdometryTask, PoseReader, PoseSnapshot};
