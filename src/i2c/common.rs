// Licensed under the Apache-2.0 license

//! Common types and constants for the OpenCores I2C driver modules.
//!
//! This module provides the controller configuration, its builder, and the
//! reference deadlines used by the scheduling adapters.

use crate::common::Duration;
use crate::i2c::error::Error;

/// Deadline for a whole interrupt-driven transaction.
pub const IRQ_TIMEOUT: Duration = Duration::millis(1000);
/// Deadline for each individual wait of the polling adapter.
pub const POLL_TIMEOUT: Duration = Duration::millis(100);
/// Deadline for the READ+STOP clock train issued by bus recovery.
pub const RECOVERY_TIMEOUT: Duration = Duration::millis(1);
/// First sleep between two status checks; doubled up to eight times this.
pub const POLL_INTERVAL: Duration = Duration::micros(40);
/// Settling time after a forced STOP.
pub const ABORT_SETTLE: Duration = Duration::millis(1);

/// Width of one controller register on the register transport.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum RegWidth {
    Byte = 1,
    Half = 2,
    Word = 4,
}

impl RegWidth {
    #[must_use]
    pub const fn bytes(self) -> usize {
        self as usize
    }
}

impl TryFrom<u32> for RegWidth {
    type Error = Error;

    /// A width of zero selects the byte default, as platform data commonly
    /// leaves the field unset.
    fn try_from(width: u32) -> Result<Self, Self::Error> {
        match width {
            0 | 1 => Ok(Self::Byte),
            2 => Ok(Self::Half),
            4 => Ok(Self::Word),
            _ => Err(Error::Configuration),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

/// How transaction steps are scheduled.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum I2cXferMode {
    /// The host calls [`OcoresBus::handle_interrupt`](crate::i2c::OcoresBus::handle_interrupt)
    /// on every completion interrupt; the submitter only waits.
    Interrupt,
    /// The submitter watches the status register and steps the transfer itself.
    Polling,
}

/// Deadlines used by the scheduling adapters and bus recovery.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimeoutConfig {
    pub irq: Duration,
    pub poll: Duration,
    pub recovery: Duration,
    pub poll_interval: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            irq: IRQ_TIMEOUT,
            poll: POLL_TIMEOUT,
            recovery: RECOVERY_TIMEOUT,
            poll_interval: POLL_INTERVAL,
        }
    }
}

/// Controller configuration, fixed at bring-up.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct OcoresConfig {
    /// Clock feeding the controller core, in kHz.
    pub ip_clock_khz: u32,
    /// Requested SCL frequency, in kHz.
    pub bus_clock_khz: u32,
    pub reg_width: RegWidth,
    pub endianness: Endianness,
    /// Offset of the register block on the transport.
    pub base_offset: u32,
    /// Register stride as a power of two.
    pub reg_shift: u32,
    pub xfer_mode: I2cXferMode,
    pub timeouts: TimeoutConfig,
}

impl OcoresConfig {
    /// Duration of one byte on the wire, used before polling for TIP.
    #[must_use]
    pub fn byte_time(&self) -> Duration {
        let khz = u64::from(self.bus_clock_khz.max(1));
        Duration::micros((8 * 1000 / khz).max(1))
    }
}

impl Default for OcoresConfig {
    fn default() -> Self {
        OcoresConfigBuilder::new().build()
    }
}

pub struct OcoresConfigBuilder {
    ip_clock_khz: u32,
    bus_clock_khz: u32,
    reg_width: RegWidth,
    endianness: Endianness,
    base_offset: u32,
    reg_shift: u32,
    xfer_mode: I2cXferMode,
    timeouts: Option<TimeoutConfig>,
}

impl Default for OcoresConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OcoresConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            ip_clock_khz: 100_000,
            bus_clock_khz: 100,
            reg_width: RegWidth::Byte,
            endianness: Endianness::Little,
            base_offset: 0,
            reg_shift: 0,
            xfer_mode: I2cXferMode::Polling,
            timeouts: None,
        }
    }
    #[must_use]
    pub fn ip_clock_khz(mut self, khz: u32) -> Self {
        self.ip_clock_khz = khz;
        self
    }
    #[must_use]
    pub fn bus_clock_khz(mut self, khz: u32) -> Self {
        self.bus_clock_khz = khz;
        self
    }
    #[must_use]
    pub fn reg_width(mut self, width: RegWidth) -> Self {
        self.reg_width = width;
        self
    }
    #[must_use]
    pub fn endianness(mut self, endianness: Endianness) -> Self {
        self.endianness = endianness;
        self
    }
    #[must_use]
    pub fn base_offset(mut self, offset: u32) -> Self {
        self.base_offset = offset;
        self
    }
    #[must_use]
    pub fn reg_shift(mut self, shift: u32) -> Self {
        self.reg_shift = shift;
        self
    }
    #[must_use]
    pub fn xfer_mode(mut self, mode: I2cXferMode) -> Self {
        self.xfer_mode = mode;
        self
    }
    #[must_use]
    pub fn timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Some(timeouts);
        self
    }
    #[must_use]
    pub fn build(self) -> OcoresConfig {
        OcoresConfig {
            ip_clock_khz: self.ip_clock_khz,
            bus_clock_khz: self.bus_clock_khz,
            reg_width: self.reg_width,
            endianness: self.endianness,
            base_offset: self.base_offset,
            reg_shift: self.reg_shift,
            xfer_mode: self.xfer_mode,
            timeouts: self.timeouts.unwrap_or_default(),
        }
    }
}

/// Bus capabilities reported to the layer above the driver.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Functionality(u32);

impl Functionality {
    /// Plain I2C messages.
    pub const I2C: Self = Self(0x0000_0001);
    /// SMBus transfers emulated on top of I2C messages.
    pub const SMBUS_EMUL: Self = Self(0x0eff_0008);
    /// SMBus block read with the length as the first byte.
    pub const SMBUS_BLOCK_DATA: Self = Self(0x0300_0000);

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}
