// Licensed under the Apache-2.0 license

//! OpenCores I2C master driver.
//!
//! The driver is split along the controller's own layers:
//!
//! - [`registers`]: register map and width/endianness-aware access over an
//!   injected [`RegisterIo`] transport ([`mmio::Mmio`] for memory-mapped
//!   controllers)
//! - [`clock`]: prescaler computation and bring-up
//! - [`transfer`]: the per-event transaction state machine
//! - [`ocores_i2c`]: the shared bus ([`OcoresBus`]), its interrupt entry
//!   point and the submitting side ([`OcoresI2c`]) with polling, recovery and
//!   timeouts
//! - [`registry`]: adapter-number lookup and shared interrupt dispatch
//! - [`traits`] and [`i2c_controller`]: embedded-hal integration

pub mod clock;
pub mod common;
pub mod error;
pub mod i2c_controller;
pub mod message;
pub mod mmio;
pub mod ocores_i2c;
pub mod registers;
pub mod registry;
pub mod transfer;
pub mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use clock::ClockSetup;
pub use common::{
    Endianness, Functionality, I2cXferMode, OcoresConfig, OcoresConfigBuilder, RegWidth,
    TimeoutConfig,
};
pub use error::Error;
pub use i2c_controller::I2cController;
pub use message::{Direction, Message, MessageFlags, Transaction};
pub use ocores_i2c::{IrqReturn, OcoresBus, OcoresI2c, Progress};
pub use registers::RegisterIo;
pub use registry::{BusRegistry, RegistryError};
pub use traits::{I2cHardwareCore, I2cMaster};
