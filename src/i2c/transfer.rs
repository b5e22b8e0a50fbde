// Licensed under the Apache-2.0 license

//! Transaction state machine.
//!
//! [`Transfer::step`] consumes one controller event (the status byte read
//! after a command finished) and issues the next command. It is shared by the
//! interrupt handler and the polling loop; neither adapter contains protocol
//! logic of its own.
//!
//! A transfer moves through these states:
//!
//! ```text
//!            START ──ack──> WRITE ──...──> (next message) ──> START / READ / WRITE
//!              │              │                                    │
//!              └──ack──> READ ┴──── last byte of last message ──> DONE
//!
//!   NACK, arbitration loss, bad block length, transport failure ──> ERROR
//! ```
//!
//! DONE and ERROR are entered together with a STOP command; the step after
//! that only acknowledges the interrupt.

use core::fmt;

use crate::common::Logger;
use crate::i2c::error::Error;
use crate::i2c::message::{Direction, Message, MessageFlags, Transaction, SMBUS_BLOCK_MAX};
use crate::i2c::registers::{cmd, status, Reg, RegisterIo, Registers};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Done = 0,
    Start = 1,
    Write = 2,
    Read = 3,
    Error = 4,
}

impl State {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            State::Done => "STATE_DONE",
            State::Start => "STATE_START",
            State::Write => "STATE_WRITE",
            State::Read => "STATE_READ",
            State::Error => "STATE_ERROR",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, State::Done | State::Error)
    }

    const fn for_direction(direction: Direction) -> Self {
        match direction {
            Direction::Read => State::Read,
            Direction::Write => State::Write,
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Context of the transaction currently on the bus.
#[derive(Debug)]
pub struct Transfer {
    msgs: Transaction,
    /// Index of the message being transferred.
    cursor: usize,
    /// Byte position inside the current message.
    pos: usize,
    state: State,
    error: Option<Error>,
}

impl Default for Transfer {
    fn default() -> Self {
        Self::idle()
    }
}

impl Transfer {
    /// Context with nothing to do, as left behind by a finished transaction.
    #[must_use]
    pub fn idle() -> Self {
        Self {
            msgs: Transaction::new(),
            cursor: 0,
            pos: 0,
            state: State::Done,
            error: None,
        }
    }

    /// Context for a freshly armed transaction: START and the first address
    /// byte are on their way.
    #[must_use]
    pub fn armed(msgs: Transaction) -> Self {
        Self {
            msgs,
            cursor: 0,
            pos: 0,
            state: State::Start,
            error: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    #[must_use]
    pub const fn error(&self) -> Option<Error> {
        self.error
    }

    /// Messages not yet completed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.msgs.len().saturating_sub(self.cursor)
    }

    #[must_use]
    pub const fn position(&self) -> usize {
        self.pos
    }

    /// Hands the messages back and leaves the context idle.
    pub fn finish(&mut self) -> Result<Transaction, Error> {
        let done = core::mem::take(self);
        match done.state {
            State::Done => Ok(done.msgs),
            _ => Err(done.error.unwrap_or(Error::Timeout)),
        }
    }

    /// Enters ERROR with `error` and puts STOP on the bus.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if the STOP command cannot be written.
    pub fn fail<IO: RegisterIo, L: Logger>(
        &mut self,
        regs: &mut Registers<IO>,
        logger: &mut L,
        error: Error,
    ) -> Result<(), Error> {
        self.state = State::Error;
        self.error = Some(error);
        logger.debug(format_args!(
            "{}, set state to {} and issue STOP",
            error, self.state
        ));
        regs.command(cmd::STOP)
    }

    /// Processes one controller event described by `stat`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] if a register access fails; the context is
    /// then left in whatever state it had reached and the caller is expected
    /// to abort it.
    pub fn step<IO: RegisterIo, L: Logger>(
        &mut self,
        regs: &mut Registers<IO>,
        logger: &mut L,
        stat: u8,
    ) -> Result<(), Error> {
        logger.debug(format_args!(
            "step: state {}, status {:#04x}, remaining {}",
            self.state,
            stat,
            self.remaining()
        ));

        if self.state.is_terminal() {
            // STOP went out in the previous step
            return regs.command(cmd::IACK);
        }

        if stat & status::ARBLOST != 0 {
            return self.fail(regs, logger, Error::ArbitrationLost);
        }

        let cursor = self.cursor;
        let Some(msg) = self.msgs.get_mut(cursor) else {
            return self.fail(regs, logger, Error::Parameter);
        };

        if matches!(self.state, State::Start | State::Write) {
            if stat & status::NACK != 0 {
                return self.fail(regs, logger, Error::Nack);
            }
            self.state = State::for_direction(msg.direction());
        } else {
            let value = regs.get8(Reg::Data)?;
            if !msg.store(self.pos, value) {
                return self.fail(regs, logger, Error::Parameter);
            }
            self.pos += 1;

            if self.pos == 1 && msg.flags().contains(MessageFlags::RECV_LEN) {
                if value == 0 || value > SMBUS_BLOCK_MAX {
                    return self.fail(regs, logger, Error::BlockLength(value));
                }
                if !msg.extend_len(value) {
                    return self.fail(regs, logger, Error::BlockLength(value));
                }
                logger.debug(format_args!(
                    "block read length {}, message length now {}",
                    value,
                    msg.len()
                ));
            }
        }

        if self.pos == msg.len() {
            self.cursor += 1;
            self.pos = 0;
            match self.msgs.get(self.cursor) {
                None => {
                    self.state = State::Done;
                    logger.debug(format_args!("all messages done, issue STOP"));
                    return regs.command(cmd::STOP);
                }
                Some(next) if !next.flags().contains(MessageFlags::NO_START) => {
                    self.state = State::Start;
                    logger.debug(format_args!(
                        "next message, address byte {:#04x} with START",
                        next.address_byte()
                    ));
                    regs.set(Reg::Data, u32::from(next.address_byte()))?;
                    return regs.command(cmd::START);
                }
                Some(next) => {
                    self.state = State::for_direction(next.direction());
                }
            }
        }

        let Some(msg) = self.msgs.get(self.cursor) else {
            return self.fail(regs, logger, Error::Parameter);
        };
        if self.state == State::Read {
            regs.command(read_command(msg, self.pos))
        } else {
            let Some(byte) = msg.byte(self.pos) else {
                return self.fail(regs, logger, Error::Parameter);
            };
            self.pos += 1;
            regs.set(Reg::Data, u32::from(byte))?;
            regs.command(cmd::WRITE)
        }
    }
}

/// ACK every byte but the last one of a fixed-length read; the length byte of
/// a block read is always acknowledged since more bytes follow.
fn read_command(msg: &Message, pos: usize) -> u8 {
    if pos == 0 && msg.flags().contains(MessageFlags::RECV_LEN) {
        cmd::READ_ACK
    } else if pos + 1 == msg.len() {
        cmd::READ_NACK
    } else {
        cmd::READ_ACK
    }
}
