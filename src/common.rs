// Licensed under the Apache-2.0 license

//! Crate-wide support types shared by the driver modules.
//!
//! - [`Logger`]: sink for driver diagnostics, with [`NoOpLogger`] as the
//!   zero-cost default.
//! - [`Clock`]: monotonic time source used to bound every wait.

use core::fmt;

/// Monotonic instant with microsecond resolution.
pub type Instant = fugit::TimerInstantU64<1_000_000>;

/// Duration with microsecond resolution, matching [`Instant`].
pub type Duration = fugit::MicrosDurationU64;

/// Diagnostic sink used by the driver.
///
/// The driver formats its messages lazily through [`fmt::Arguments`], so an
/// implementation that discards a level pays nothing for it.
pub trait Logger {
    fn debug(&mut self, args: fmt::Arguments<'_>);
    fn warn(&mut self, args: fmt::Arguments<'_>);
    fn error(&mut self, args: fmt::Arguments<'_>);
}

/// Logger that drops every message.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    #[inline]
    fn debug(&mut self, _args: fmt::Arguments<'_>) {}

    #[inline]
    fn warn(&mut self, _args: fmt::Arguments<'_>) {}

    #[inline]
    fn error(&mut self, _args: fmt::Arguments<'_>) {}
}

/// Monotonic time source.
///
/// Waits in the driver compare [`Clock::now`] against a deadline and sleep
/// through [`embedded_hal::delay::DelayNs`] between checks, so the two are
/// usually implemented by the same timer peripheral.
pub trait Clock {
    fn now(&mut self) -> Instant;
}

/// Host clock backed by `std::time::Instant`.
#[cfg(any(test, feature = "std"))]
#[derive(Clone, Copy, Debug)]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(any(test, feature = "std"))]
impl StdClock {
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(any(test, feature = "std"))]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "std"))]
impl Clock for StdClock {
    fn now(&mut self) -> Instant {
        let micros = u64::try_from(self.origin.elapsed().as_micros()).unwrap_or(u64::MAX);
        Instant::from_ticks(micros)
    }
}

#[cfg(any(test, feature = "std"))]
impl embedded_hal::delay::DelayNs for StdClock {
    fn delay_ns(&mut self, ns: u32) {
        std::thread::sleep(std::time::Duration::from_nanos(u64::from(ns)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::delay::DelayNs;

    #[test]
    fn test_std_clock_is_monotonic() {
        let mut clock = StdClock::new();
        let first = clock.now();
        clock.delay_us(200);
        let second = clock.now();

        assert!(second > first);
        assert!((second - first) >= Duration::micros(200));
    }

    #[test]
    fn test_noop_logger_accepts_everything() {
        let mut logger = NoOpLogger;
        logger.debug(format_args!("state {}", 1));
        logger.warn(format_args!("warn"));
        logger.error(format_args!("error {:#04x}", 0x20));
    }
}
