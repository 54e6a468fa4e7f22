//! `EncoderSource` trait for wheel encoders and an optional heading sensor.

use sprocket_types::{EncoderSample, MotionError};

/// A source of cumulative wheel positions.
///
/// Each call returns the *current* cumulative reading; the odometry layer
/// differences successive samples itself.
pub trait EncoderSource: Send {
    /// Stable identifier, e.g. `"drive_encoders"`.
    fn id(&self) -> &str;

    /// Read both encoders (and the heading sensor, if fitted).
    ///
    /// # Errors
    ///
    /// Returns [`MotionError::Sensor`] if the hardware cannot be read.
    fn sample(&mut self) -> Result<EncoderSample, MotionError>;
}

impl<T: EncoderSource + ?Sized> EncoderSource for Box<T> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn sample(&mut self) -> Result<EncoderSample, MotionError> {
        (**self).sample()
    }
}
