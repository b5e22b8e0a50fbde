// Licensed under the Apache-2.0 license

//! Simulated controller and virtual timer shared by the driver tests.

use std::collections::VecDeque;
use std::string::String;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::vec::Vec;

use core::fmt;

use crate::common::{Clock, Duration, Instant, Logger};
use crate::i2c::common::{Endianness, OcoresConfig, RegWidth};
use crate::i2c::registers::{status, RegisterIo};

/// Register write as seen by the simulated controller.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegWrite {
    PreLow(u8),
    PreHigh(u8),
    Control(u8),
    Data(u8),
    Command(u8),
}

// Command register bit fields.
const STA: u8 = 0x80;
const STO: u8 = 0x40;
const RD: u8 = 0x20;
const WR: u8 = 0x10;
const IACK: u8 = 0x01;

#[derive(Default)]
struct SimState {
    base_offset: u32,
    reg_shift: u32,
    width: usize,
    big_endian: bool,

    prelow: u8,
    prehigh: u8,
    control: u8,
    txr: u8,
    rxr: u8,
    status: u8,
    /// Status bits reported on top of `status` regardless of commands.
    held: u8,

    slave_address: u8,
    addressed: bool,
    read_data: VecDeque<u8>,
    received: Vec<u8>,
    bytes_read: usize,
    nack_data_at: Option<usize>,
    lose_arbitration: bool,
    stuck: bool,
    fail_transport: bool,

    writes: Vec<RegWrite>,
    commands: Vec<u8>,
    status_reads: usize,
}

impl SimState {
    fn index(&self, offset: u32) -> u32 {
        offset.wrapping_sub(self.base_offset) >> self.reg_shift
    }

    fn decode(&self, data: &[u8]) -> u8 {
        assert_eq!(data.len(), self.width, "access width mismatch");
        if self.big_endian {
            data[data.len() - 1]
        } else {
            data[0]
        }
    }

    fn encode(&self, value: u8, buf: &mut [u8]) {
        assert_eq!(buf.len(), self.width, "access width mismatch");
        buf.fill(0);
        let last = buf.len() - 1;
        if self.big_endian {
            buf[last] = value;
        } else {
            buf[0] = value;
        }
    }

    fn execute(&mut self, command: u8) {
        self.commands.push(command);
        if command & IACK != 0 {
            self.status &= !status::IF;
        }
        if command & (STA | STO | RD | WR) == 0 {
            return;
        }
        if self.stuck {
            self.status |= status::TIP | status::BUSY;
            return;
        }

        if command & STA != 0 {
            if self.lose_arbitration {
                self.lose_arbitration = false;
                self.status |= status::ARBLOST | status::IF;
                self.status &= !status::BUSY;
                return;
            }
            self.status |= status::BUSY;
            self.addressed = self.txr >> 1 == self.slave_address;
            self.set_nack(!self.addressed);
        } else if command & WR != 0 {
            let index = self.received.len();
            if self.addressed {
                self.received.push(self.txr);
            }
            self.set_nack(!self.addressed || self.nack_data_at == Some(index));
        }

        if command & RD != 0 {
            self.rxr = self.read_data.pop_front().unwrap_or(0xff);
            self.bytes_read += 1;
            self.set_nack(false);
        }

        if command & STO != 0 {
            if command & RD != 0 {
                self.status &= !status::ARBLOST;
            }
            self.status &= !status::BUSY;
            self.addressed = false;
        }
        self.status |= status::IF;
    }

    fn set_nack(&mut self, nack: bool) {
        if nack {
            self.status |= status::NACK;
        } else {
            self.status &= !status::NACK;
        }
    }
}

/// Register-level model of the controller with one slave attached.
///
/// Every command completes instantly: IF is set as soon as the command is
/// written and TIP is never observed, unless the device is made stuck.
#[derive(Clone)]
pub struct SimDevice(Arc<Mutex<SimState>>);

impl SimDevice {
    pub fn new(config: &OcoresConfig, slave_address: u8) -> Self {
        let state = SimState {
            base_offset: config.base_offset,
            reg_shift: config.reg_shift,
            width: match config.reg_width {
                RegWidth::Byte => 1,
                RegWidth::Half => 2,
                RegWidth::Word => 4,
            },
            big_endian: config.endianness == Endianness::Big,
            slave_address,
            ..SimState::default()
        };
        Self(Arc::new(Mutex::new(state)))
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.0.lock().unwrap()
    }

    pub fn set_control(&self, value: u8) {
        self.state().control = value;
    }

    pub fn control(&self) -> u8 {
        self.state().control
    }

    /// Overwrites the live status bits.
    pub fn set_status(&self, value: u8) {
        self.state().status = value;
    }

    /// Reports `bits` in every status read until cleared with zero.
    pub fn hold_status(&self, bits: u8) {
        self.state().held = bits;
    }

    pub fn prescale(&self) -> u16 {
        let state = self.state();
        u16::from_le_bytes([state.prelow, state.prehigh])
    }

    pub fn load_read_data(&self, data: &[u8]) {
        self.state().read_data.extend(data.iter().copied());
    }

    /// NACKs the data byte at `index`, counting from the first data byte of
    /// the current address phase onwards.
    pub fn nack_data_byte(&self, index: usize) {
        self.state().nack_data_at = Some(index);
    }

    /// Makes the next START lose arbitration.
    pub fn lose_arbitration_on_start(&self) {
        self.state().lose_arbitration = true;
    }

    /// From now on every bus command hangs with TIP and BUSY set.
    pub fn stick(&self) {
        self.state().stuck = true;
    }

    pub fn fail_transport(&self, fail: bool) {
        self.state().fail_transport = fail;
    }

    pub fn writes(&self) -> Vec<RegWrite> {
        self.state().writes.clone()
    }

    pub fn clear_writes(&self) {
        let mut state = self.state();
        state.writes.clear();
        state.commands.clear();
    }

    pub fn command_count(&self, command: u8) -> usize {
        self.state()
            .commands
            .iter()
            .filter(|&&c| c == command)
            .count()
    }

    pub fn received(&self) -> Vec<u8> {
        self.state().received.clone()
    }

    pub fn bytes_read(&self) -> usize {
        self.state().bytes_read
    }

    pub fn status_reads(&self) -> usize {
        self.state().status_reads
    }
}

impl RegisterIo for SimDevice {
    type Error = ();

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), ()> {
        let mut state = self.state();
        if state.fail_transport {
            return Err(());
        }
        let value = match state.index(offset) {
            0 => state.prelow,
            1 => state.prehigh,
            2 => state.control,
            3 => state.rxr,
            4 => {
                state.status_reads += 1;
                state.status | state.held
            }
            _ => return Err(()),
        };
        state.encode(value, buf);
        Ok(())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> Result<(), ()> {
        let mut state = self.state();
        if state.fail_transport {
            return Err(());
        }
        let value = state.decode(data);
        let write = match state.index(offset) {
            0 => {
                state.prelow = value;
                RegWrite::PreLow(value)
            }
            1 => {
                state.prehigh = value;
                RegWrite::PreHigh(value)
            }
            2 => {
                state.control = value;
                RegWrite::Control(value)
            }
            3 => {
                state.txr = value;
                RegWrite::Data(value)
            }
            4 => {
                state.execute(value);
                RegWrite::Command(value)
            }
            _ => return Err(()),
        };
        state.writes.push(write);
        Ok(())
    }
}

/// Virtual time source: delays advance the clock instantly.
#[derive(Clone, Default)]
pub struct SimTimer(Arc<AtomicU64>);

impl SimTimer {
    pub fn elapsed(&self) -> Duration {
        Duration::micros(self.0.load(Ordering::SeqCst))
    }
}

impl Clock for SimTimer {
    fn now(&mut self) -> Instant {
        Instant::from_ticks(self.0.load(Ordering::SeqCst))
    }
}

impl embedded_hal::delay::DelayNs for SimTimer {
    fn delay_ns(&mut self, ns: u32) {
        let micros = u64::from(ns).div_ceil(1000);
        self.0.fetch_add(micros, Ordering::SeqCst);
    }
}

/// Logger keeping every line, prefixed with its level.
#[derive(Clone, Default)]
pub struct RecordingLogger(Arc<Mutex<Vec<String>>>);

impl RecordingLogger {
    pub fn lines(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    fn push(&self, level: &str, args: fmt::Arguments<'_>) {
        self.0.lock().unwrap().push(std::format!("{level} {args}"));
    }
}

impl Logger for RecordingLogger {
    fn debug(&mut self, args: fmt::Arguments<'_>) {
        self.push("DEBUG", args);
    }

    fn warn(&mut self, args: fmt::Arguments<'_>) {
        self.push("WARN", args);
    }

    fn error(&mut self, args: fmt::Arguments<'_>) {
        self.push("ERROR", args);
    }
}
