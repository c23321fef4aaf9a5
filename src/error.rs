use std::collections::TryReserveError;
use std::fmt;
pub use Error::*;

/// Error codes
///
/// An image with more colors than allowed is not an error. See [`Attributes::exact_palette_limited`][crate::Attributes::exact_palette_limited].
#[non_exhaustive]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Error {
    /// Function called with invalid arguments, e.g. channel precision outside 1-8 bits
    ValueOutOfRange = 100,
    /// The frequency table or palette lookup table could not be allocated
    OutOfMemory,
    /// Slice needs to be bigger, or width/height needs to be smaller
    BufferTooSmall,
}

impl std::error::Error for Error {}

impl fmt::Display for Error {
    #[cold]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            Self::ValueOutOfRange => "VALUE_OUT_OF_RANGE",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::BufferTooSmall => "BUFFER_TOO_SMALL",
        })
    }
}

impl From<TryReserveError> for Error {
    #[cold]
    fn from(_: TryReserveError) -> Self {
        Self::OutOfMemory
    }
}

#[test]
fn codes() {
    assert_eq!("VALUE_OUT_OF_RANGE", ValueOutOfRange.to_string());
    assert_eq!(101, OutOfMemory as i32);
    let err = Vec::<u64>::new().try_reserve_exact(usize::MAX).unwrap_err();
    assert_eq!(OutOfMemory, Error::from(err));
}
