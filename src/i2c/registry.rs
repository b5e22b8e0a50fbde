// Licensed under the Apache-2.0 license

//! # Bus registry
//!
//! Platforms usually carry several OpenCores controllers, each identified by
//! an adapter number and often sharing one interrupt line. [`BusRegistry`]
//! keeps references to the statically allocated buses so that:
//!
//! - submitting code can look a bus up by number, and
//! - the interrupt handler can dispatch to one bus or to every bus on a
//!   shared line without knowing how many there are.
//!
//! ```rust,ignore
//! static BUS0: OcoresBus<Mmio> = /* ... */;
//! static BUS1: OcoresBus<Mmio> = /* ... */;
//!
//! let mut registry: BusRegistry<'static, Mmio, NoOpLogger, 4> = BusRegistry::new();
//! registry.register(0, &BUS0)?;
//! registry.register(1, &BUS1)?;
//!
//! // shared interrupt line
//! registry.handle_shared_irq();
//! ```
//!
//! The registry is a `heapless::LinearMap`: no allocation, and lookups are a
//! linear scan over at most `N` entries.

use core::fmt;

use heapless::LinearMap;

use crate::common::Logger;
use crate::i2c::ocores_i2c::{IrqReturn, OcoresBus};
use crate::i2c::registers::RegisterIo;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// All `N` slots are taken.
    Full,
    /// The adapter number is already registered.
    Duplicate,
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Full => write!(f, "bus registry is full"),
            RegistryError::Duplicate => write!(f, "adapter number already registered"),
        }
    }
}

pub struct BusRegistry<'a, IO, L, const N: usize> {
    buses: LinearMap<u32, &'a OcoresBus<IO, L>, N>,
}

impl<IO, L, const N: usize> Default for BusRegistry<'_, IO, L, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a, IO, L, const N: usize> BusRegistry<'a, IO, L, N> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            buses: LinearMap::new(),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buses.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    /// Adds `bus` under adapter number `nr`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if `nr` is taken or
    /// [`RegistryError::Full`] if no slot is left.
    pub fn register(&mut self, nr: u32, bus: &'a OcoresBus<IO, L>) -> Result<(), RegistryError> {
        if self.buses.contains_key(&nr) {
            return Err(RegistryError::Duplicate);
        }
        self.buses
            .insert(nr, bus)
            .map(|_| ())
            .map_err(|_| RegistryError::Full)
    }

    /// Removes adapter `nr`, returning its bus if it was registered.
    pub fn unregister(&mut self, nr: u32) -> Option<&'a OcoresBus<IO, L>> {
        self.buses.remove(&nr)
    }

    #[must_use]
    pub fn get(&self, nr: u32) -> Option<&'a OcoresBus<IO, L>> {
        self.buses.get(&nr).copied()
    }

    /// Adapter numbers in registration order.
    pub fn adapters(&self) -> impl Iterator<Item = u32> + '_ {
        self.buses.keys().copied()
    }
}

impl<IO: RegisterIo, L: Logger, const N: usize> BusRegistry<'_, IO, L, N> {
    /// Dispatches a dedicated interrupt to adapter `nr`.
    pub fn handle_irq(&self, nr: u32) -> IrqReturn {
        self.get(nr)
            .map_or(IrqReturn::NotMine, OcoresBus::handle_interrupt)
    }

    /// Dispatches a shared interrupt to every registered bus.
    ///
    /// Every bus gets a chance to service its controller, so two controllers
    /// raising the line at once are both handled in one call.
    pub fn handle_shared_irq(&self) -> IrqReturn {
        self.buses
            .values()
            .fold(IrqReturn::NotMine, |acc, bus| match bus.handle_interrupt() {
                IrqReturn::Handled => IrqReturn::Handled,
                IrqReturn::NotMine => acc,
            })
    }
}
