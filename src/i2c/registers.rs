// Licensed under the Apache-2.0 license

//! Register map and width-aware register access.
//!
//! The controller exposes five byte-wide registers. Depending on how the IP
//! is integrated they sit on a 1, 2 or 4 byte wide transport, possibly big
//! endian, spaced `1 << reg_shift` bytes apart from `base_offset`.
//! [`Registers`] hides all of that behind `get`/`set` and performs exactly
//! one transport access per call.

use crate::i2c::common::{Endianness, OcoresConfig, RegWidth};
use crate::i2c::error::Error;
use zerocopy::byteorder::{BigEndian, LittleEndian, U16, U32};

/// Control register bits.
pub mod ctrl {
    /// Interrupt enable.
    pub const IEN: u8 = 0x40;
    /// Core enable.
    pub const EN: u8 = 0x80;
}

/// Command register values. Each one also acknowledges a pending interrupt.
pub mod cmd {
    pub const START: u8 = 0x91;
    pub const STOP: u8 = 0x41;
    pub const WRITE: u8 = 0x11;
    pub const READ_ACK: u8 = 0x21;
    pub const READ_NACK: u8 = 0x29;
    pub const IACK: u8 = 0x01;
    /// Read followed by STOP: nine SCL pulses, releases a slave stuck on SDA.
    pub const READ_STOP: u8 = 0x61;
}

/// Status register bits.
pub mod status {
    /// Interrupt flag.
    pub const IF: u8 = 0x01;
    /// Transfer in progress.
    pub const TIP: u8 = 0x02;
    pub const ARBLOST: u8 = 0x20;
    pub const BUSY: u8 = 0x40;
    /// Last byte was not acknowledged.
    pub const NACK: u8 = 0x80;
}

/// Controller register identifiers.
///
/// `Command` and `Status` share one address; the direction of the access
/// selects which of the two is meant.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Reg {
    PreLow,
    PreHigh,
    Control,
    Data,
    Command,
    Status,
}

impl Reg {
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Reg::PreLow => 0,
            Reg::PreHigh => 1,
            Reg::Control => 2,
            Reg::Data => 3,
            Reg::Command | Reg::Status => 4,
        }
    }
}

/// Injected register transport.
///
/// Implementations move `buf.len()` bytes (1, 2 or 4) to or from `offset`.
/// Memory-mapped I/O, PCIe BARs and bridge chips on another bus all fit
/// behind this trait.
pub trait RegisterIo {
    type Error: core::fmt::Debug;

    /// # Errors
    ///
    /// Returns the transport's error if the access could not be performed.
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// # Errors
    ///
    /// Returns the transport's error if the access could not be performed.
    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error>;
}

impl<T: RegisterIo + ?Sized> RegisterIo for &mut T {
    type Error = T::Error;

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        (**self).read(offset, buf)
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), Self::Error> {
        (**self).write(offset, data)
    }
}

/// Width- and endianness-aware view of the controller registers.
pub struct Registers<IO> {
    io: IO,
    base_offset: u32,
    reg_shift: u32,
    width: RegWidth,
    endianness: Endianness,
}

impl<IO: RegisterIo> Registers<IO> {
    pub fn new(io: IO, config: &OcoresConfig) -> Self {
        Self {
            io,
            base_offset: config.base_offset,
            reg_shift: config.reg_shift,
            width: config.reg_width,
            endianness: config.endianness,
        }
    }

    /// Transport offset of `reg`.
    #[must_use]
    pub fn offset(&self, reg: Reg) -> u32 {
        self.base_offset
            .wrapping_add(reg.index().wrapping_shl(self.reg_shift))
    }

    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the register write fails.
    pub fn set(&mut self, reg: Reg, value: u32) -> Result<(), Error> {
        let offset = self.offset(reg);
        let result = match (self.width, self.endianness) {
            (RegWidth::Byte, _) => self.io.write(offset, &[value.to_le_bytes()[0]]),
            (RegWidth::Half, Endianness::Little) => {
                self.io.write(offset, &U16::<LittleEndian>::new(value as u16).to_bytes())
            }
            (RegWidth::Half, Endianness::Big) => {
                self.io.write(offset, &U16::<BigEndian>::new(value as u16).to_bytes())
            }
            (RegWidth::Word, Endianness::Little) => {
                self.io.write(offset, &U32::<LittleEndian>::new(value).to_bytes())
            }
            (RegWidth::Word, Endianness::Big) => {
                self.io.write(offset, &U32::<BigEndian>::new(value).to_bytes())
            }
        };
        result.map_err(|_| Error::Transport)
    }

    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the register read fails.
    pub fn get(&mut self, reg: Reg) -> Result<u32, Error> {
        let offset = self.offset(reg);
        match (self.width, self.endianness) {
            (RegWidth::Byte, _) => {
                let mut buf = [0u8; 1];
                self.io.read(offset, &mut buf).map_err(|_| Error::Transport)?;
                Ok(u32::from(buf[0]))
            }
            (RegWidth::Half, endianness) => {
                let mut buf = [0u8; 2];
                self.io.read(offset, &mut buf).map_err(|_| Error::Transport)?;
                Ok(match endianness {
                    Endianness::Little => u32::from(U16::<LittleEndian>::from_bytes(buf).get()),
                    Endianness::Big => u32::from(U16::<BigEndian>::from_bytes(buf).get()),
                })
            }
            (RegWidth::Word, endianness) => {
                let mut buf = [0u8; 4];
                self.io.read(offset, &mut buf).map_err(|_| Error::Transport)?;
                Ok(match endianness {
                    Endianness::Little => U32::<LittleEndian>::from_bytes(buf).get(),
                    Endianness::Big => U32::<BigEndian>::from_bytes(buf).get(),
                })
            }
        }
    }

    /// Reads the low byte of `reg`; every controller register is 8 bits wide.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the register read fails.
    pub fn get8(&mut self, reg: Reg) -> Result<u8, Error> {
        Ok(self.get(reg)?.to_le_bytes()[0])
    }

    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the register write fails.
    pub fn command(&mut self, command: u8) -> Result<(), Error> {
        self.set(Reg::Command, u32::from(command))
    }

    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the register read fails.
    pub fn status(&mut self) -> Result<u8, Error> {
        self.get8(Reg::Status)
    }

    pub fn io_mut(&mut self) -> &mut IO {
        &mut self.io
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i2c::common::OcoresConfigBuilder;
    use hex_literal::hex;
    use std::vec::Vec;

    #[derive(Default)]
    struct RecordingIo {
        writes: Vec<(u32, Vec<u8>)>,
        reads: Vec<(u32, usize)>,
        read_value: Vec<u8>,
        fail: bool,
    }

    impl RegisterIo for RecordingIo {
        type Error = ();

        fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.reads.push((offset, buf.len()));
            buf.copy_from_slice(&self.read_value[..buf.len()]);
            Ok(())
        }

        fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), ()> {
            if self.fail {
                return Err(());
            }
            self.writes.push((offset, data.to_vec()));
            Ok(())
        }
    }

    fn registers(width: RegWidth, endianness: Endianness, shift: u32) -> Registers<RecordingIo> {
        let config = OcoresConfigBuilder::new()
            .reg_width(width)
            .endianness(endianness)
            .reg_shift(shift)
            .base_offset(0x100)
            .build();
        Registers::new(RecordingIo::default(), &config)
    }

    #[test]
    fn test_offsets_follow_base_and_shift() {
        let regs = registers(RegWidth::Word, Endianness::Little, 2);

        assert_eq!(regs.offset(Reg::PreLow), 0x100);
        assert_eq!(regs.offset(Reg::PreHigh), 0x104);
        assert_eq!(regs.offset(Reg::Control), 0x108);
        assert_eq!(regs.offset(Reg::Data), 0x10c);
        assert_eq!(regs.offset(Reg::Command), 0x110);
        assert_eq!(regs.offset(Reg::Status), 0x110);
    }

    #[test]
    fn test_byte_width_write() {
        let mut regs = registers(RegWidth::Byte, Endianness::Little, 0);
        regs.set(Reg::Data, 0xa5).unwrap();

        assert_eq!(regs.io.writes, [(0x103, hex!("a5").to_vec())]);
    }

    #[test]
    fn test_half_width_endianness() {
        let mut le = registers(RegWidth::Half, Endianness::Little, 1);
        le.set(Reg::Control, 0x1280).unwrap();
        assert_eq!(le.io.writes, [(0x104, hex!("8012").to_vec())]);

        let mut be = registers(RegWidth::Half, Endianness::Big, 1);
        be.set(Reg::Control, 0x1280).unwrap();
        assert_eq!(be.io.writes, [(0x104, hex!("1280").to_vec())]);
    }

    #[test]
    fn test_word_width_endianness() {
        let mut le = registers(RegWidth::Word, Endianness::Little, 2);
        le.command(cmd::START).unwrap();
        assert_eq!(le.io.writes, [(0x110, hex!("91000000").to_vec())]);

        let mut be = registers(RegWidth::Word, Endianness::Big, 2);
        be.command(cmd::START).unwrap();
        assert_eq!(be.io.writes, [(0x110, hex!("00000091").to_vec())]);
    }

    #[test]
    fn test_reads_unmarshal_per_width() {
        let mut le = registers(RegWidth::Word, Endianness::Little, 2);
        le.io.read_value = hex!("41000000").to_vec();
        assert_eq!(le.status().unwrap(), status::BUSY | status::IF);
        assert_eq!(le.io.reads, [(0x110, 4)]);

        let mut be = registers(RegWidth::Word, Endianness::Big, 2);
        be.io.read_value = hex!("00000041").to_vec();
        assert_eq!(be.status().unwrap(), 0x41);

        let mut half = registers(RegWidth::Half, Endianness::Big, 0);
        half.io.read_value = hex!("00c0").to_vec();
        assert_eq!(half.get(Reg::Control).unwrap(), 0xc0);
        assert_eq!(half.io.reads, [(0x102, 2)]);
    }

    #[test]
    fn test_one_access_per_call() {
        let mut regs = registers(RegWidth::Half, Endianness::Little, 0);
        regs.io.read_value = hex!("0000").to_vec();

        regs.set(Reg::PreLow, 0x31).unwrap();
        regs.get(Reg::Data).unwrap();

        assert_eq!(regs.io.writes.len(), 1);
        assert_eq!(regs.io.reads.len(), 1);
    }

    #[test]
    fn test_transport_failure_propagates() {
        let mut regs = registers(RegWidth::Byte, Endianness::Little, 0);
        regs.io.fail = true;

        assert_eq!(regs.set(Reg::Data, 1), Err(Error::Transport));
        assert_eq!(regs.status(), Err(Error::Transport));
    }
}
