// Licensed under the Apache-2.0 license

//! Memory-mapped register transport.

use core::fmt;

use crate::i2c::registers::RegisterIo;

/// The transport was asked for an access size other than 1, 2 or 4 bytes.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct UnsupportedWidth(pub usize);

impl fmt::Display for UnsupportedWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unsupported {}-byte register access", self.0)
    }
}

/// Volatile accesses relative to a mapped register window.
///
/// Bytes are moved in memory order; [`Registers`](crate::i2c::registers::Registers)
/// has already laid them out for the controller's endianness.
pub struct Mmio {
    base: *mut u8,
}

// SAFETY: the window is device memory, reachable from any context.
unsafe impl Send for Mmio {}

impl Mmio {
    /// # Safety
    ///
    /// `base` must point to the controller's register window, mapped for the
    /// lifetime of the returned value, with every offset the driver computes
    /// from its configuration inside the window and suitably aligned for the
    /// configured register width.
    #[must_use]
    pub const unsafe fn new(base: *mut u8) -> Self {
        Self { base }
    }

    fn addr(&self, offset: u32) -> *mut u8 {
        self.base.wrapping_add(offset as usize)
    }
}

impl RegisterIo for Mmio {
    type Error = UnsupportedWidth;

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), UnsupportedWidth> {
        let addr = self.addr(offset);
        match buf.len() {
            1 => {
                let value = unsafe { addr.read_volatile() };
                buf.copy_from_slice(&[value]);
            }
            2 => {
                let value = unsafe { addr.cast::<u16>().read_volatile() };
                buf.copy_from_slice(&value.to_ne_bytes());
            }
            4 => {
                let value = unsafe { addr.cast::<u32>().read_volatile() };
                buf.copy_from_slice(&value.to_ne_bytes());
            }
            len => return Err(UnsupportedWidth(len)),
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), UnsupportedWidth> {
        let addr = self.addr(offset);
        match *data {
            [byte] => unsafe { addr.write_volatile(byte) },
            [b0, b1] => unsafe { addr.cast::<u16>().write_volatile(u16::from_ne_bytes([b0, b1])) },
            [b0, b1, b2, b3] => unsafe {
                addr.cast::<u32>()
                    .write_volatile(u32::from_ne_bytes([b0, b1, b2, b3]));
            },
            _ => return Err(UnsupportedWidth(data.len())),
        }
        Ok(())
    }
}
