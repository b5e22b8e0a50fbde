// Licensed under the Apache-2.0 license

//! I2C messages and pre-arm validation.
//!
//! A transaction is an ordered list of [`Message`]s sharing one bus
//! ownership: the bus is released with STOP only after the last one. Each
//! message owns its buffer so the interrupt path can fill it while the
//! submitter is waiting.

use core::ops::BitOr;

use crate::i2c::error::Error;

/// Largest payload of a single message.
pub const MAX_MSG_LEN: usize = 256;
/// Largest number of messages in one transaction.
pub const MAX_MSGS: usize = 8;
/// Largest length a length-prefixed read may announce.
pub const SMBUS_BLOCK_MAX: u8 = 32;
/// Highest 7-bit address.
pub const MAX_ADDRESS: u8 = 0x7f;

/// Ordered message list submitted as one transaction.
pub type Transaction = heapless::Vec<Message, MAX_MSGS>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Write,
    Read,
}

/// Per-message protocol modifiers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageFlags(u8);

impl MessageFlags {
    /// Continue the previous message's addressed transfer: no repeated START,
    /// no address byte.
    pub const NO_START: Self = Self(0x01);
    /// The first byte read announces how many more bytes follow.
    pub const RECV_LEN: Self = Self(0x02);

    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MessageFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// One addressed read or write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    address: u8,
    direction: Direction,
    flags: MessageFlags,
    buf: heapless::Vec<u8, MAX_MSG_LEN>,
}

impl Message {
    /// Message writing `data` to `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parameter`] if `data` is longer than [`MAX_MSG_LEN`].
    pub fn write(address: u8, data: &[u8]) -> Result<Self, Error> {
        Ok(Self {
            address,
            direction: Direction::Write,
            flags: MessageFlags::empty(),
            buf: heapless::Vec::from_slice(data).map_err(|()| Error::Parameter)?,
        })
    }

    /// Message reading `len` bytes from `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parameter`] if `len` is larger than [`MAX_MSG_LEN`].
    pub fn read(address: u8, len: usize) -> Result<Self, Error> {
        let mut buf = heapless::Vec::new();
        buf.resize(len, 0).map_err(|()| Error::Parameter)?;
        Ok(Self {
            address,
            direction: Direction::Read,
            flags: MessageFlags::empty(),
            buf,
        })
    }

    /// SMBus block read: one length byte, then as many bytes as it announces.
    #[must_use]
    pub fn block_read(address: u8) -> Self {
        let mut buf = heapless::Vec::new();
        // capacity is far above one byte
        let _ = buf.push(0);
        Self {
            address,
            direction: Direction::Read,
            flags: MessageFlags::RECV_LEN,
            buf,
        }
    }

    #[must_use]
    pub fn with_flags(mut self, flags: MessageFlags) -> Self {
        self.flags = self.flags | flags;
        self
    }

    #[must_use]
    pub fn no_start(self) -> Self {
        self.with_flags(MessageFlags::NO_START)
    }

    #[must_use]
    pub const fn address(&self) -> u8 {
        self.address
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    #[must_use]
    pub const fn flags(&self) -> MessageFlags {
        self.flags
    }

    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(self.direction, Direction::Read)
    }

    /// Address byte as it goes on the wire, R/W bit included.
    #[must_use]
    pub const fn address_byte(&self) -> u8 {
        (self.address << 1) | self.is_read() as u8
    }

    /// Declared length; for a length-prefixed read it grows once the first
    /// byte has arrived.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Payload: the bytes to send, or the bytes received.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.buf
    }

    pub(crate) fn byte(&self, pos: usize) -> Option<u8> {
        self.buf.get(pos).copied()
    }

    pub(crate) fn store(&mut self, pos: usize, value: u8) -> bool {
        match self.buf.get_mut(pos) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Grows a length-prefixed read by the announced count.
    pub(crate) fn extend_len(&mut self, extra: u8) -> bool {
        self.grow(usize::from(extra)).is_ok()
    }

    /// Appends zeroed room for `extra` more bytes to a read.
    pub(crate) fn grow(&mut self, extra: usize) -> Result<(), Error> {
        let len = self.buf.len() + extra;
        self.buf.resize(len, 0).map_err(|()| Error::Parameter)
    }

    /// Appends bytes to a write.
    pub(crate) fn append(&mut self, data: &[u8]) -> Result<(), Error> {
        self.buf.extend_from_slice(data).map_err(|()| Error::Parameter)
    }
}

/// Rejects message lists the state machine cannot run.
///
/// # Errors
///
/// Returns [`Error::Parameter`] if the list is empty, an address does not fit
/// in 7 bits, the first message asks to skip START, a length-prefixed
/// message is a write or has no room for a full block, or a continuation
/// message is empty.
pub fn validate(msgs: &[Message]) -> Result<(), Error> {
    let Some(first) = msgs.first() else {
        return Err(Error::Parameter);
    };
    if first.flags.contains(MessageFlags::NO_START) {
        return Err(Error::Parameter);
    }

    for msg in msgs {
        if msg.address > MAX_ADDRESS {
            return Err(Error::Parameter);
        }
        if msg.flags.contains(MessageFlags::RECV_LEN)
            && (!msg.is_read()
                || msg.is_empty()
                || msg.len() + usize::from(SMBUS_BLOCK_MAX) > MAX_MSG_LEN)
        {
            return Err(Error::Parameter);
        }
        if msg.flags.contains(MessageFlags::NO_START) && msg.is_empty() {
            return Err(Error::Parameter);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_byte() {
        assert_eq!(Message::write(0x50, &[0]).unwrap().address_byte(), 0xa0);
        assert_eq!(Message::read(0x50, 1).unwrap().address_byte(), 0xa1);
    }

    #[test]
    fn test_oversized_messages_rejected() {
        let data = [0u8; MAX_MSG_LEN + 1];
        assert_eq!(Message::write(0x10, &data), Err(Error::Parameter));
        assert_eq!(Message::read(0x10, MAX_MSG_LEN + 1), Err(Error::Parameter));
    }

    #[test]
    fn test_block_read_shape() {
        let msg = Message::block_read(0x0b);

        assert!(msg.is_read());
        assert_eq!(msg.len(), 1);
        assert!(msg.flags().contains(MessageFlags::RECV_LEN));
        assert!(!msg.flags().contains(MessageFlags::NO_START));
    }

    #[test]
    fn test_extend_len_once() {
        let mut msg = Message::block_read(0x0b);
        assert!(msg.store(0, 4));
        assert!(msg.extend_len(4));

        assert_eq!(msg.len(), 5);
        assert_eq!(msg.data(), &[4, 0, 0, 0, 0]);
    }

    #[test]
    fn test_validate_accepts_write_then_read() {
        let msgs = [
            Message::write(0x50, &[0x00, 0x10]).unwrap(),
            Message::read(0x50, 3).unwrap(),
        ];
        assert_eq!(validate(&msgs), Ok(()));
    }

    #[test]
    fn test_validate_rejections() {
        assert_eq!(validate(&[]), Err(Error::Parameter));

        let bad_address = [Message::write(0x80, &[1]).unwrap()];
        assert_eq!(validate(&bad_address), Err(Error::Parameter));

        let leading_no_start = [Message::write(0x50, &[1]).unwrap().no_start()];
        assert_eq!(validate(&leading_no_start), Err(Error::Parameter));

        let recv_len_write = [Message::write(0x50, &[1])
            .unwrap()
            .with_flags(MessageFlags::RECV_LEN)];
        assert_eq!(validate(&recv_len_write), Err(Error::Parameter));

        let no_room = [Message::read(0x50, MAX_MSG_LEN - 8)
            .unwrap()
            .with_flags(MessageFlags::RECV_LEN)];
        assert_eq!(validate(&no_room), Err(Error::Parameter));

        // the length byte itself has to be read
        let no_length_byte = [Message::read(0x50, 0)
            .unwrap()
            .with_flags(MessageFlags::RECV_LEN)];
        assert_eq!(validate(&no_length_byte), Err(Error::Parameter));

        let empty_continuation = [
            Message::write(0x50, &[1]).unwrap(),
            Message::write(0x50, &[]).unwrap().no_start(),
        ];
        assert_eq!(validate(&empty_continuation), Err(Error::Parameter));
    }

    #[test]
    fn test_validate_allows_quick_command() {
        let quick = [Message::write(0x50, &[]).unwrap()];
        assert_eq!(validate(&quick), Ok(()));
    }
}
