//! `DriveSink` trait for the two sides of a differential drivetrain.
//!
//! Motor drivers implement this trait. Control code only ever talks to the
//! trait, so a simulated base and a real one are interchangeable.

use sprocket_types::{DriveCommand, MotionError};

/// Anything that can accept per-side drive commands.
///
/// Whether the values are velocities or voltages is up to the implementor;
/// the controllers only assume "larger means faster forward".
pub trait DriveSink: Send {
    /// Stable identifier, e.g. `"chassis"`.
    fn id(&self) -> &str;

    /// Apply `command` to both sides.
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::Actuator`] if the command cannot be applied
    /// (driver fault, non-finite value, disconnected hardware).
    fn apply(&mut self, command: DriveCommand) -> Result<(), MotionError>;

    /// Bring both sides to rest.
    fn stop(&mut self) -> Result<(), MotionError> {
        self.apply(DriveCommand::zero())
    }
}

impl<T: DriveSink + ?Sized> DriveSink for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn apply(&mut self, command: DriveCommand) -> Result<(), MotionError> {
        (**self).apply(command)
    }

    fn stop(&mut self) -> Result<(), MotionError> {
        (**self).stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockSink {
        id: String,
        last: Option<DriveCommand>,
    }

    impl DriveSink for MockSink {
        fn id(&self) -> &str {
            &self.id
        }

        fn apply(&mut self, command: DriveCommand) -> Result<(), MotionError> {
            self.last = Some(command);
            Ok(())
        }
    }

    #[test]
    fn default_stop_applies_zero() {
        let mut sink = MockSink {
            id: "mock".to_string(),
            last: None,
        };
        sink.apply(DriveCommand::new(3.0, 4.0)).unwrap();
        sink.stop().unwrap();
        assert_eq!(sink.last, Some(DriveCommand::zero()));
    }

    #[test]
    fn boxed_sink_delegates() {
        let mut sink: Box<dyn DriveSink> = Box::new(MockSink {
            id: "boxed".to_string(),
            last: None,
        });
        assert_eq!(sink.id(), "boxed");
        sink.apply(DriveCommand::new(1.0, -1.0)).unwrap();
        sink.stop().unwrap();
    }
}
