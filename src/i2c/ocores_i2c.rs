// Licensed under the Apache-2.0 license

//! OpenCores I2C bus master.
//!
//! [`OcoresBus`] owns the register block and the transfer context behind a
//! single critical-section lock. It is meant to live in a `static` (or any
//! place both the submitting code and the interrupt handler can reach) and is
//! only ever used through `&self`.
//!
//! [`OcoresI2c`] is the submitting side: it validates a transaction, waits for
//! the bus, runs recovery, arms the controller and then either waits for the
//! interrupt handler to finish the job or steps the transfer itself by
//! watching the status register. Both paths go through the same
//! [`Transfer::step`].
//!
//! The lock is held for one step at a time and never across a wait.
//!
//! Any number of [`OcoresI2c`] handles may share one bus, but only one
//! transaction runs at a time: a submission claims the bus before touching it
//! and the claim is only dropped once the result has been collected. A second
//! submitter gets [`Error::Busy`].

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{Operation, SevenBitAddress};

use crate::common::{Clock, Duration, Logger, NoOpLogger};
use crate::i2c::clock::{self, ClockSetup};
use crate::i2c::common::{Functionality, I2cXferMode, OcoresConfig, ABORT_SETTLE};
use crate::i2c::error::Error;
use crate::i2c::message::{self, Message, Transaction};
use crate::i2c::registers::{cmd, ctrl, status, Reg, RegisterIo, Registers};
use crate::i2c::traits::{I2cHardwareCore, I2cMaster};
use crate::i2c::transfer::{State, Transfer};

/// Outcome of an interrupt dispatched to a bus.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IrqReturn {
    /// The controller had its interrupt flag set and one step was run.
    Handled,
    /// The controller did not raise the interrupt.
    NotMine,
}

/// Progress reported by [`OcoresI2c::poll`].
#[derive(Debug)]
pub enum Progress {
    /// One step of the transaction ran.
    Stepped,
    /// The transaction finished and the bus is idle.
    Complete(Transaction),
}

struct Core<IO, L> {
    regs: Registers<IO>,
    transfer: Transfer,
    /// Set from the start of a submission until its result is collected.
    claimed: bool,
    logger: L,
}

impl<IO: RegisterIo, L: Logger> Core<IO, L> {
    fn service(&mut self) -> IrqReturn {
        let stat = match self.regs.status() {
            Ok(stat) => stat,
            Err(err) => {
                if self.transfer.state().is_terminal() {
                    return IrqReturn::NotMine;
                }
                self.logger
                    .error(format_args!("status read failed during transfer"));
                self.abort(err);
                return IrqReturn::Handled;
            }
        };

        if stat & status::IF == 0 {
            self.logger
                .debug(format_args!("status {:#04x}, interrupt flag not set", stat));
            return IrqReturn::NotMine;
        }

        if let Err(err) = self.transfer.step(&mut self.regs, &mut self.logger, stat) {
            self.logger
                .error(format_args!("step failed in {}: {}", self.transfer.state(), err));
            self.abort(err);
        }
        IrqReturn::Handled
    }

    fn abort(&mut self, error: Error) {
        if let Err(err) = self.transfer.fail(&mut self.regs, &mut self.logger, error) {
            self.logger.error(format_args!("STOP not issued: {}", err));
        }
    }
}

/// Shared state of one controller instance.
pub struct OcoresBus<IO, L = NoOpLogger> {
    core: Mutex<RefCell<Core<IO, L>>>,
    config: OcoresConfig,
}

impl<IO: RegisterIo, L: Logger> OcoresBus<IO, L> {
    /// Wraps a register transport. Nothing is written until [`Self::init`].
    pub fn new(io: IO, config: OcoresConfig, logger: L) -> Self {
        Self {
            core: Mutex::new(RefCell::new(Core {
                regs: Registers::new(io, &config),
                transfer: Transfer::idle(),
                claimed: false,
                logger,
            })),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &OcoresConfig {
        &self.config
    }

    fn with_core<R>(&self, f: impl FnOnce(&mut Core<IO, L>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.core.borrow_ref_mut(cs)))
    }

    /// Programs the prescaler and enables the controller.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the bus clock cannot be derived
    /// from the IP clock, or [`Error::Transport`] on a register failure.
    pub fn init(&self) -> Result<ClockSetup, Error> {
        self.with_core(|core| match clock::configure(&mut core.regs, &self.config) {
            Ok(setup) => {
                core.logger.debug(format_args!(
                    "prescale {}, bus clock {} kHz (requested {} kHz)",
                    setup.prescale, setup.achieved_khz, self.config.bus_clock_khz
                ));
                Ok(setup)
            }
            Err(err) => {
                core.logger.error(format_args!(
                    "unsupported clock settings: core {} kHz, bus {} kHz",
                    self.config.ip_clock_khz, self.config.bus_clock_khz
                ));
                Err(err)
            }
        })
    }

    /// Disables the controller and its interrupt.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on a register failure.
    pub fn shutdown(&self) -> Result<(), Error> {
        self.with_core(|core| {
            core.logger.debug(format_args!("disabling controller"));
            clock::shutdown(&mut core.regs)
        })
    }

    /// Interrupt entry point.
    ///
    /// Runs one step of the current transfer if the controller has its
    /// interrupt flag set. Safe to call on a shared interrupt line.
    pub fn handle_interrupt(&self) -> IrqReturn {
        self.with_core(Core::service)
    }

    /// State of the transfer context.
    pub fn state(&self) -> State {
        self.with_core(|core| core.transfer.state())
    }

    pub(crate) fn status(&self) -> Result<u8, Error> {
        self.with_core(|core| core.regs.status())
    }

    pub(crate) fn log(&self, f: impl FnOnce(&mut L)) {
        self.with_core(|core| f(&mut core.logger));
    }

    /// First half of bus recovery: if arbitration was lost, clocks the bus
    /// free with READ+STOP. Returns whether anything was issued.
    fn begin_recovery(&self) -> Result<bool, Error> {
        self.with_core(|core| {
            let stat = core.regs.status()?;
            if stat & status::ARBLOST == 0 {
                core.logger
                    .debug(format_args!("status {:#04x}, arbitration not lost", stat));
                return Ok(false);
            }

            core.logger.warn(format_args!(
                "status {:#04x}, arbitration lost, sending nine clocks",
                stat
            ));
            if self.config.xfer_mode == I2cXferMode::Interrupt {
                let control = core.regs.get8(Reg::Control)?;
                core.regs.set(Reg::Control, u32::from(control & !ctrl::IEN))?;
            }
            core.regs.command(cmd::READ_STOP)?;
            Ok(true)
        })
    }

    /// Reserves the bus for one transaction.
    fn claim(&self) -> Result<(), Error> {
        self.with_core(|core| {
            if core.claimed {
                core.logger.warn(format_args!(
                    "bus claimed, transfer in {}",
                    core.transfer.state()
                ));
                return Err(Error::Busy);
            }
            core.claimed = true;
            Ok(())
        })
    }

    fn acknowledge(&self) -> Result<(), Error> {
        self.with_core(|core| core.regs.command(cmd::IACK))
    }

    /// Sets up the transfer context and puts START with the first address
    /// byte on the bus.
    fn arm(&self, msgs: Transaction) -> Result<(), Error> {
        let address = msgs
            .first()
            .map(Message::address_byte)
            .ok_or(Error::Parameter)?;
        self.with_core(|core| {
            let control = core.regs.get8(Reg::Control)?;
            let control = match self.config.xfer_mode {
                I2cXferMode::Polling => control & !ctrl::IEN,
                I2cXferMode::Interrupt => control | ctrl::IEN,
            };
            core.regs.set(Reg::Control, u32::from(control))?;

            core.transfer = Transfer::armed(msgs);
            core.logger.debug(format_args!(
                "set state to {}, address byte {:#04x}, issue START",
                core.transfer.state(),
                address
            ));
            core.regs.set(Reg::Data, u32::from(address))?;
            core.regs.command(cmd::START)
        })
    }

    /// Forces the transfer into ERROR with a STOP on the bus. Unless `force`
    /// is set, a transfer that already reached DONE or ERROR is left alone.
    /// Returns whether the abort was issued.
    fn expire(&self, force: bool) -> bool {
        self.with_core(|core| {
            let state = core.transfer.state();
            if !force && state.is_terminal() {
                core.logger
                    .debug(format_args!("deadline reached in {}, transfer finished", state));
                return false;
            }
            core.logger.warn(format_args!("transfer timed out in {}", state));
            core.abort(Error::Timeout);
            true
        })
    }

    /// Aborts whatever is still running, drops the transfer context and
    /// releases the bus.
    fn discard(&self, error: Error) {
        self.with_core(|core| {
            if !core.transfer.state().is_terminal() {
                core.abort(error);
            }
            core.transfer = Transfer::idle();
            core.claimed = false;
        });
    }

    /// Takes the result out of the transfer context and releases the bus.
    fn finish(&self) -> Result<Transaction, Error> {
        self.with_core(|core| {
            core.claimed = false;
            core.transfer.finish()
        })
    }
}

/// Submitting side of a bus: owns the time source used for every wait.
pub struct OcoresI2c<'a, IO, T, L = NoOpLogger> {
    bus: &'a OcoresBus<IO, L>,
    timer: T,
    /// This handle holds the bus claim.
    active: bool,
}

impl<'a, IO, T, L> OcoresI2c<'a, IO, T, L>
where
    IO: RegisterIo,
    T: Clock + DelayNs,
    L: Logger,
{
    pub fn new(bus: &'a OcoresBus<IO, L>, timer: T) -> Self {
        Self {
            bus,
            timer,
            active: false,
        }
    }

    #[must_use]
    pub fn bus(&self) -> &'a OcoresBus<IO, L> {
        self.bus
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    #[must_use]
    pub fn functionality(&self) -> Functionality {
        Functionality::I2C
            .union(Functionality::SMBUS_EMUL)
            .union(Functionality::SMBUS_BLOCK_DATA)
    }

    /// Runs `msgs` as one transaction and hands them back with read buffers
    /// filled.
    ///
    /// # Errors
    ///
    /// - [`Error::Parameter`] if the message list is rejected
    /// - [`Error::Busy`] if another handle's transaction holds the bus
    /// - [`Error::Timeout`] if the bus stays busy before arming or a deadline
    ///   elapses while the transfer runs
    /// - [`Error::Nack`], [`Error::ArbitrationLost`] or [`Error::BlockLength`]
    ///   for protocol failures
    /// - [`Error::Transport`] on a register failure
    pub fn submit(&mut self, msgs: Transaction) -> Result<Transaction, Error> {
        self.start(msgs)?;
        match self.bus.config.xfer_mode {
            I2cXferMode::Polling => self.run_polled(),
            I2cXferMode::Interrupt => self.wait_interrupt(),
        }
    }

    /// Validates `msgs`, claims the bus, waits for it to go idle, recovers it
    /// if needed and arms the controller. Progress is then made by
    /// [`Self::poll`] or by the interrupt handler.
    ///
    /// The bus stays claimed until this handle has collected the result.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parameter`] for a rejected message list,
    /// [`Error::Busy`] if another transaction holds the bus,
    /// [`Error::Timeout`] if the bus stays busy, or [`Error::Transport`].
    pub fn start(&mut self, msgs: Transaction) -> Result<(), Error> {
        if let Err(err) = message::validate(&msgs) {
            self.bus
                .log(|l| l.error(format_args!("rejected {} message(s): {}", msgs.len(), err)));
            return Err(err);
        }
        if self.active {
            return Err(Error::Busy);
        }
        self.bus.claim()?;
        self.active = true;

        let poll_timeout = self.bus.config.timeouts.poll;
        if let Err(err) = self.wait_clear(status::BUSY, poll_timeout) {
            self.bus
                .log(|l| l.warn(format_args!("bus busy before transfer: {}", err)));
            return Err(self.release(err));
        }

        if let Err(err) = self.recover() {
            return Err(self.release(err));
        }

        if let Err(err) = self.bus.arm(msgs) {
            return Err(self.release(err));
        }
        Ok(())
    }

    /// Checks the controller once and runs a step if it is ready.
    ///
    /// A transfer waits for TIP to clear between steps and for BUSY to clear
    /// once it reached DONE or ERROR.
    ///
    /// A handle that has nothing armed completes at once with no messages.
    ///
    /// # Errors
    ///
    /// `nb::Error::WouldBlock` while the controller is still working, or the
    /// transaction's failure once it has finished.
    pub fn poll(&mut self) -> nb::Result<Progress, Error> {
        if !self.active {
            return Ok(Progress::Complete(Transaction::new()));
        }
        let terminal = self.bus.state().is_terminal();
        let mask = if terminal { status::BUSY } else { status::TIP };

        let stat = match self.bus.status() {
            Ok(stat) => stat,
            Err(err) => return Err(nb::Error::Other(self.release(err))),
        };
        if stat & mask != 0 {
            return Err(nb::Error::WouldBlock);
        }

        match self.bus.handle_interrupt() {
            IrqReturn::Handled => Ok(Progress::Stepped),
            IrqReturn::NotMine if !terminal => Err(nb::Error::WouldBlock),
            IrqReturn::NotMine => self
                .finish()
                .map(Progress::Complete)
                .map_err(nb::Error::Other),
        }
    }

    /// Clears a lost arbitration: nine clocks with READ+STOP, a bounded wait
    /// for the bus to go idle and an interrupt acknowledge. Does nothing if
    /// arbitration was not lost.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] on a register failure. A bus that stays
    /// busy is only logged.
    pub fn recover(&mut self) -> Result<(), Error> {
        if !self.bus.begin_recovery()? {
            return Ok(());
        }

        let timeout = self.bus.config.timeouts.recovery;
        match self.wait_clear(status::BUSY, timeout) {
            Ok(()) => {}
            Err(Error::Timeout) => self.bus.log(|l| {
                l.warn(format_args!(
                    "bus still busy {} us after recovery clocks",
                    timeout.to_micros()
                ));
            }),
            Err(err) => return Err(err),
        }
        self.bus.acknowledge()
    }

    fn run_polled(&mut self) -> Result<Transaction, Error> {
        let timeouts = self.bus.config.timeouts;
        let byte_time = self.bus.config.byte_time();
        let max_interval = timeouts.poll_interval * 8;

        loop {
            if !self.bus.state().is_terminal() {
                self.sleep(byte_time);
            }

            let deadline = self.timer.now() + timeouts.poll;
            let mut interval = timeouts.poll_interval;
            loop {
                match self.poll() {
                    Ok(Progress::Stepped) => break,
                    Ok(Progress::Complete(msgs)) => return Ok(msgs),
                    Err(nb::Error::Other(err)) => return Err(err),
                    Err(nb::Error::WouldBlock) => {}
                }

                let now = self.timer.now();
                if now >= deadline {
                    return self.expire(true);
                }
                self.sleep(interval.min(deadline - now));
                interval = (interval * 2).min(max_interval);
            }
        }
    }

    fn wait_interrupt(&mut self) -> Result<Transaction, Error> {
        let timeouts = self.bus.config.timeouts;
        let deadline = self.timer.now() + timeouts.irq;

        loop {
            if self.bus.state().is_terminal() {
                return self.finish();
            }
            let now = self.timer.now();
            if now >= deadline {
                // the handler may have finished the transfer since the check
                return self.expire(false);
            }
            self.sleep(timeouts.poll_interval.min(deadline - now));
        }
    }

    /// Waits until all bits of `mask` read back clear.
    fn wait_clear(&mut self, mask: u8, timeout: Duration) -> Result<(), Error> {
        let deadline = self.timer.now() + timeout;
        let mut interval = self.bus.config.timeouts.poll_interval;
        let max_interval = interval * 8;

        loop {
            let stat = self.bus.status()?;
            if stat & mask == 0 {
                return Ok(());
            }
            let now = self.timer.now();
            if now >= deadline {
                self.bus.log(|l| {
                    l.debug(format_args!(
                        "status {:#04x}, bits {:#04x} did not clear",
                        stat, mask
                    ));
                });
                return Err(Error::Timeout);
            }
            self.sleep(interval.min(deadline - now));
            interval = (interval * 2).min(max_interval);
        }
    }

    /// Aborts the running transfer after a missed deadline, or collects it
    /// if it finished and `force` is not set.
    fn expire(&mut self, force: bool) -> Result<Transaction, Error> {
        if !self.bus.expire(force) {
            return self.finish();
        }
        self.sleep(ABORT_SETTLE);
        Err(self.release(Error::Timeout))
    }

    fn finish(&mut self) -> Result<Transaction, Error> {
        self.active = false;
        self.bus.finish()
    }

    /// Drops this handle's transaction and its claim on the bus.
    fn release(&mut self, error: Error) -> Error {
        self.active = false;
        self.bus.discard(error);
        error
    }

    fn sleep(&mut self, duration: Duration) {
        let micros = u32::try_from(duration.to_micros()).unwrap_or(u32::MAX);
        self.timer.delay_us(micros);
    }
}

impl<IO, T, L> I2cHardwareCore for OcoresI2c<'_, IO, T, L>
where
    IO: RegisterIo,
    T: Clock + DelayNs,
    L: Logger,
{
    type Error = Error;

    fn init(&mut self) -> Result<ClockSetup, Error> {
        self.bus.init()
    }

    fn shutdown(&mut self) -> Result<(), Error> {
        self.bus.shutdown()
    }

    fn handle_interrupt(&mut self) -> IrqReturn {
        self.bus.handle_interrupt()
    }

    fn recover_bus(&mut self) -> Result<(), Error> {
        self.recover()
    }

    fn functionality(&self) -> Functionality {
        OcoresI2c::functionality(self)
    }
}

impl<IO, T, L> I2cMaster for OcoresI2c<'_, IO, T, L>
where
    IO: RegisterIo,
    T: Clock + DelayNs,
    L: Logger,
{
    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Error> {
        self.transaction_slice(addr, &mut [Operation::Write(bytes)])
    }

    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Error> {
        self.transaction_slice(addr, &mut [Operation::Read(buffer)])
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Error> {
        self.transaction_slice(addr, &mut [Operation::Write(bytes), Operation::Read(buffer)])
    }

    fn transaction_slice(
        &mut self,
        addr: SevenBitAddress,
        ops_slice: &mut [Operation<'_>],
    ) -> Result<(), Error> {
        let msgs = self.submit(build_transaction(addr, ops_slice)?)?;
        scatter_reads(&msgs, ops_slice)
    }
}

/// Turns embedded-hal operations into messages. Adjacent operations of the
/// same kind share one message, so no START goes out between them.
fn build_transaction(address: u8, ops: &[Operation<'_>]) -> Result<Transaction, Error> {
    let mut msgs = Transaction::new();
    let mut last_read = None;

    for op in ops {
        let is_read = matches!(op, Operation::Read(_));
        if last_read == Some(is_read) {
            let msg = msgs.last_mut().ok_or(Error::Parameter)?;
            match op {
                Operation::Write(bytes) => msg.append(bytes)?,
                Operation::Read(buffer) => msg.grow(buffer.len())?,
            }
        } else {
            let msg = match op {
                Operation::Write(bytes) => Message::write(address, bytes)?,
                Operation::Read(buffer) => Message::read(address, buffer.len())?,
            };
            msgs.push(msg).map_err(|_| Error::Parameter)?;
        }
        last_read = Some(is_read);
    }
    Ok(msgs)
}

/// Copies received bytes back into the read operations they were merged from.
fn scatter_reads(msgs: &[Message], ops: &mut [Operation<'_>]) -> Result<(), Error> {
    let mut index = 0;
    let mut offset = 0;
    let mut last_read = None;

    for op in ops.iter_mut() {
        let is_read = matches!(op, Operation::Read(_));
        if last_read.is_some_and(|last| last != is_read) {
            index += 1;
            offset = 0;
        }
        last_read = Some(is_read);

        let msg = msgs.get(index).ok_or(Error::Parameter)?;
        match op {
            Operation::Read(buffer) => {
                let end = offset + buffer.len();
                let data = msg.data().get(offset..end).ok_or(Error::Parameter)?;
                buffer.copy_from_slice(data);
                offset = end;
            }
            Operation::Write(bytes) => offset += bytes.len(),
        }
    }
    Ok(())
}
