// Licensed under the Apache-2.0 license

//! Prescaler computation and controller bring-up.
//!
//! The OpenCores core divides its IP clock by `5 * (prescale + 1)` to obtain
//! SCL. The divisor is 16 bits wide and written through PRELOW/PREHIGH while
//! the core is disabled.

use crate::i2c::common::OcoresConfig;
use crate::i2c::error::Error;
use crate::i2c::registers::{cmd, ctrl, Reg, RegisterIo, Registers};

/// Result of a successful prescaler computation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClockSetup {
    pub prescale: u16,
    /// SCL frequency the programmed divisor actually produces, in kHz.
    pub achieved_khz: u32,
}

/// Derives the prescaler for `bus_khz` from `ip_khz`.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if the bus clock is zero or the closest
/// achievable frequency deviates from it by more than 10%.
pub fn compute_prescale(ip_khz: u32, bus_khz: u32) -> Result<ClockSetup, Error> {
    if bus_khz == 0 {
        return Err(Error::Configuration);
    }

    let divisor = 5 * u64::from(bus_khz);
    let raw = (u64::from(ip_khz) / divisor).saturating_sub(1);
    let prescale = u16::try_from(raw).unwrap_or(u16::MAX);

    let achieved = u64::from(ip_khz) / (5 * (u64::from(prescale) + 1));
    let target = u64::from(bus_khz);
    if achieved.abs_diff(target) > target / 10 {
        return Err(Error::Configuration);
    }

    Ok(ClockSetup {
        prescale,
        achieved_khz: u32::try_from(achieved).map_err(|_| Error::Configuration)?,
    })
}

/// Programs the prescaler and enables the core.
///
/// The core is disabled first, then the divisor is written, any pending
/// interrupt acknowledged and the core enabled with interrupts still off.
///
/// # Errors
///
/// Returns [`Error::Configuration`] for an unattainable bus clock, in which
/// case the core is left disabled, or [`Error::Transport`] if a register
/// access fails.
pub fn configure<IO: RegisterIo>(
    regs: &mut Registers<IO>,
    config: &OcoresConfig,
) -> Result<ClockSetup, Error> {
    let control = regs.get8(Reg::Control)? & !(ctrl::EN | ctrl::IEN);
    regs.set(Reg::Control, u32::from(control))?;

    let setup = compute_prescale(config.ip_clock_khz, config.bus_clock_khz)?;
    let [low, high] = setup.prescale.to_le_bytes();
    regs.set(Reg::PreLow, u32::from(low))?;
    regs.set(Reg::PreHigh, u32::from(high))?;

    regs.command(cmd::IACK)?;
    regs.set(Reg::Control, u32::from(control | ctrl::EN))?;

    Ok(setup)
}

/// Disables the core and its interrupt.
///
/// # Errors
///
/// Returns [`Error::Transport`] if a register access fails.
pub fn shutdown<IO: RegisterIo>(regs: &mut Registers<IO>) -> Result<(), Error> {
    let control = regs.get8(Reg::Control)? & !(ctrl::EN | ctrl::IEN);
    regs.set(Reg::Control, u32::from(control))
}
