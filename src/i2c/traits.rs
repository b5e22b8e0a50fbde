// Licensed under the Apache-2.0 license

//! # I2C hardware abstraction traits
//!
//! Two small traits split controller management from master transfers:
//!
//! ```text
//! I2cHardwareCore (bring-up, interrupt entry, recovery)
//!     └── I2cMaster (master operations)
//! ```
//!
//! [`I2cController`](crate::i2c::i2c_controller::I2cController) turns any
//! [`I2cMaster`] into an `embedded_hal::i2c::I2c` implementation.

use crate::i2c::clock::ClockSetup;
use crate::i2c::common::Functionality;
use crate::i2c::ocores_i2c::IrqReturn;
use embedded_hal::i2c::{AddressMode, Operation, SevenBitAddress};

/// Core I2C hardware interface.
///
/// # Examples
///
/// ```rust,ignore
/// use ocores_i2c::i2c::I2cHardwareCore;
///
/// fn bring_up<T: I2cHardwareCore>(controller: &mut T) -> Result<u32, T::Error> {
///     let setup = controller.init()?;
///     controller.recover_bus()?;
///     Ok(setup.achieved_khz)
/// }
/// ```
pub trait I2cHardwareCore {
    /// Hardware-specific error type that implements embedded-hal error traits
    type Error: embedded_hal::i2c::Error + core::fmt::Debug;

    /// Programs the bus clock and enables the controller.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested bus clock cannot be produced or the
    /// registers cannot be accessed.
    fn init(&mut self) -> Result<ClockSetup, Self::Error>;

    /// Disables the controller.
    ///
    /// # Errors
    ///
    /// Returns an error if the registers cannot be accessed.
    fn shutdown(&mut self) -> Result<(), Self::Error>;

    /// Handle hardware interrupt events (called from ISR)
    ///
    /// Must be fast and non-blocking.
    fn handle_interrupt(&mut self) -> IrqReturn;

    /// Attempt to recover the I2C bus from stuck conditions
    ///
    /// # Errors
    ///
    /// Returns an error if bus recovery fails or is not supported by the hardware.
    fn recover_bus(&mut self) -> Result<(), Self::Error>;

    /// Transfer kinds the controller supports.
    fn functionality(&self) -> Functionality;
}

/// I2C Master mode operations
///
/// The address type `A` must implement `AddressMode` to ensure compatibility
/// with embedded-hal.
pub trait I2cMaster<A: AddressMode = SevenBitAddress>: I2cHardwareCore {
    /// Write data to a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge, bus arbitration
    /// is lost, or other I2C protocol errors occur.
    fn write(&mut self, addr: A, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Read data from a slave device at the given address
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge, bus arbitration
    /// is lost, or other I2C protocol errors occur.
    fn read(&mut self, addr: A, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Combined write-then-read operation with a repeated START between them.
    ///
    /// # Errors
    ///
    /// Returns an error if the slave does not acknowledge during either
    /// phase or bus arbitration is lost.
    fn write_read(&mut self, addr: A, bytes: &[u8], buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Execute a sequence of I2C operations as a single transaction
    ///
    /// # Errors
    ///
    /// Returns an error if any operation in the sequence fails. STOP has been
    /// issued by the time the error is returned.
    fn transaction_slice(
        &mut self,
        addr: A,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Self::Error>;
}
