use embedded_hal::digital::{self, ErrorKind};

use crate::LengthMismatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverError {
    /// A data block does not have its configured length. Nothing was sent.
    InvalidLength(LengthMismatch),
    /// The accelerator did not report done within the poll budget.
    Timeout { polls: u32 },
    /// The results were read but differ from the reference.
    Verification { mismatches: usize },
    /// A bus line could not be driven or sampled.
    Pin(ErrorKind),
}

impl DriverError {
    pub(crate) fn pin<E: digital::Error>(error: E) -> Self {
        DriverError::Pin(error.kind())
    }
}

impl From<LengthMismatch> for DriverError {
    fn from(value: LengthMismatch) -> Self {
        DriverError::InvalidLength(value)
    }
}
