//! `sprocket-hal` – the hardware seam.
//!
//! # Modules
//!
//! - [`drive`] – [`DriveSink`]: accepts per-side [`DriveCommand`]s.
//! - [`encoder`] – [`EncoderSource`]: yields cumulative wheel positions and
//!   an optional heading reading.
//! - [`sim`] – [`SimDrivetrain`][sim::SimDrivetrain]: a kinematic
//!   differential base implementing both traits, plus a
//!   [`RecordingSink`][sim::RecordingSink] for assertions.
//!
//! [`DriveCommand`]: sprocket_types::DriveCommand

pub mod drive;
pub mod encoder;
pub mod sim;

pub use drive::DriveSink;
pub use encoder::EncoderSource;
