// Licensed under the Apache-2.0 license

//! Error classification for the OpenCores I2C driver.

use core::fmt;
use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

/// Failure of a bring-up step or of a submitted transaction.
///
/// Every transaction failure is reported after STOP has been issued, so the
/// bus is idle again when the caller sees the error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// The requested bus clock cannot be derived from the IP clock within
    /// 10%, or the configuration itself is unusable.
    Configuration,
    /// The message list was rejected before anything was put on the bus.
    Parameter,
    /// An address or data byte was not acknowledged.
    Nack,
    /// Another master won arbitration while this transfer was running.
    ArbitrationLost,
    /// Another transaction is armed on the bus or has not been collected yet.
    Busy,
    /// A scheduling deadline elapsed before the transfer finished.
    Timeout,
    /// A length-prefixed read announced a length outside `1..=32`.
    BlockLength(u8),
    /// The register transport reported a failure.
    Transport,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Configuration => write!(f, "unsupported controller configuration"),
            Error::Parameter => write!(f, "malformed message list"),
            Error::Nack => write!(f, "byte not acknowledged"),
            Error::ArbitrationLost => write!(f, "arbitration lost"),
            Error::Busy => write!(f, "bus owned by another transaction"),
            Error::Timeout => write!(f, "transfer timed out"),
            Error::BlockLength(len) => write!(f, "invalid block read length {len}"),
            Error::Transport => write!(f, "register transport failure"),
        }
    }
}

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> ErrorKind {
        match self {
            Error::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            Error::ArbitrationLost => ErrorKind::ArbitrationLoss,
            Error::Transport => ErrorKind::Bus,
            _ => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error as _;

    #[test]
    fn test_embedded_hal_kinds() {
        assert_eq!(
            Error::Nack.kind(),
            ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
        );
        assert_eq!(Error::ArbitrationLost.kind(), ErrorKind::ArbitrationLoss);
        assert_eq!(Error::Transport.kind(), ErrorKind::Bus);
        assert_eq!(Error::Timeout.kind(), ErrorKind::Other);
        assert_eq!(Error::Busy.kind(), ErrorKind::Other);
        assert_eq!(Error::BlockLength(0).kind(), ErrorKind::Other);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            std::format!("{}", Error::BlockLength(200)),
            "invalid block read length 200"
        );
        assert_eq!(std::format!("{}", Error::Timeout), "transfer timed out");
    }
}
