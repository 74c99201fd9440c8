//! Crate error type

use thiserror::Error;

/// An error that can occur while running the clock calibration protocol
///
/// `E` is the error type of the radio transport.
#[derive(Debug, Error)]
pub enum Error<E> {
    /// Error occured while talking to the radio
    #[error("radio transport error: {0:?}")]
    Radio(E),

    /// An error occured while serializing or deserializing a frame
    #[error("frame encoding error: {0:?}")]
    Ssmarshal(ssmarshal::Error),

    /// The requested number of frame slots is not supported
    #[error("invalid frame count {requested}, supported range is 2..={max}")]
    InvalidFrameCount {
        /// Requested number of slots
        requested: usize,
        /// Largest supported number of slots
        max: usize,
    },

    /// The instance was already initialized with a different frame count
    #[error("frame count mismatch: initialized with {configured}, requested {requested}")]
    FrameCountMismatch {
        /// Frame count of the existing instance
        configured: usize,
        /// Frame count of the rejected re-initialization
        requested: usize,
    },

    /// The configuration was not valid
    #[error("invalid configuration")]
    InvalidConfiguration,

    /// The clock calibration instance has not been initialized
    #[error("clock calibration not initialized")]
    NotInitialized,
}

impl<E> From<ssmarshal::Error> for Error<E> {
    fn from(error: ssmarshal::Error) -> Self {
        Error::Ssmarshal(error)
    }
}
