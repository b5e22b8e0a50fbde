// Licensed under the Apache-2.0 license

//! embedded-hal front end for any [`I2cMaster`].
//!
//! Drivers written against `embedded_hal::i2c::I2c` can use an OpenCores bus
//! through [`I2cController`] without knowing about messages or flags.

use crate::i2c::traits::I2cMaster;
use embedded_hal::i2c::{Operation, SevenBitAddress};

pub struct I2cController<H: I2cMaster> {
    pub hardware: H,
}

impl<H: I2cMaster> I2cController<H> {
    pub fn new(hardware: H) -> Self {
        Self { hardware }
    }

    pub fn into_inner(self) -> H {
        self.hardware
    }
}

impl<H: I2cMaster> embedded_hal::i2c::ErrorType for I2cController<H> {
    type Error = H::Error;
}

impl<H: I2cMaster> embedded_hal::i2c::I2c for I2cController<H> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        self.hardware.read(addr, buffer)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        self.hardware.write(addr, bytes)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.hardware.write_read(addr, bytes, buffer)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        self.hardware.transaction_slice(addr, operations)
    }
}
