// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Typed interface to the I/O expander ports the cartridge bus is wired to.
//!
//! A reader has three of these:
//! - a 16-bit address port, driving A0-A15
//! - an 8-bit bank port, driving BA0-BA7
//! - an 8-bit data port, reading D0-D7
//!
//! See [`crate::mcp230xx`] for implementations over I2C and [`crate::sim`]
//! for a simulated cartridge.

use crate::error::PortError;

/// Direction mask with every pin an output
pub const ALL_OUTPUTS: u8 = 0x00;

/// Direction mask with every pin an input
pub const ALL_INPUTS: u8 = 0xFF;

/// Interrupt-on-change configuration of a port.  The data port is set up to
/// compare against 0xFF (the pulled-up idle state of the bus).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InterruptConfig {
    /// Value pins are compared against (DEFVAL)
    pub default_value: u8,

    /// Pins with interrupt-on-change enabled (GPINTEN)
    pub enable: u8,

    /// Pins compared against `default_value` rather than their previous
    /// value (INTCON)
    pub control: u8,
}

impl InterruptConfig {
    /// Configuration applied to the data port at power up
    pub const DATA_BUS: InterruptConfig = InterruptConfig {
        default_value: 0xFF,
        enable: 0x89,
        control: 0xFF,
    };

    /// Everything off
    pub const DISABLED: InterruptConfig = InterruptConfig {
        default_value: 0x00,
        enable: 0x00,
        control: 0x00,
    };
}

/// An 8-bit I/O port.  A set bit in a direction mask makes that pin an input.
pub trait PortDevice {
    fn set_direction(&mut self, mask: u8) -> Result<(), PortError>;

    fn set_pullups(&mut self, mask: u8) -> Result<(), PortError>;

    /// Only meaningful for the data port, so does nothing by default
    fn set_interrupts(&mut self, _config: InterruptConfig) -> Result<(), PortError> {
        Ok(())
    }

    fn write_output(&mut self, value: u8) -> Result<(), PortError>;

    fn read_input(&mut self) -> Result<u8, PortError>;
}

/// A 16-bit I/O port whose two halves can also be written separately.
pub trait WidePortDevice {
    fn set_direction(&mut self, mask: u16) -> Result<(), PortError>;

    /// Writes both halves in one transaction
    fn write_output(&mut self, value: u16) -> Result<(), PortError>;

    /// Writes A0-A7
    fn write_lower(&mut self, value: u8) -> Result<(), PortError>;

    /// Writes A8-A15
    fn write_upper(&mut self, value: u8) -> Result<(), PortError>;

    fn read_input(&mut self) -> Result<u16, PortError>;
}

impl<T: PortDevice + ?Sized> PortDevice for &mut T {
    fn set_direction(&mut self, mask: u8) -> Result<(), PortError> {
        (**self).set_direction(mask)
    }

    fn set_pullups(&mut self, mask: u8) -> Result<(), PortError> {
        (**self).set_pullups(mask)
    }

    fn set_interrupts(&mut self, config: InterruptConfig) -> Result<(), PortError> {
        (**self).set_interrupts(config)
    }

    fn write_output(&mut self, value: u8) -> Result<(), PortError> {
        (**self).write_output(value)
    }

    fn read_input(&mut self) -> Result<u8, PortError> {
        (**self).read_input()
    }
}

impl<T: WidePortDevice + ?Sized> WidePortDevice for &mut T {
    fn set_direction(&mut self, mask: u16) -> Result<(), PortError> {
        (**self).set_direction(mask)
    }

    fn write_output(&mut self, value: u16) -> Result<(), PortError> {
        (**self).write_output(value)
    }

    fn write_lower(&mut self, value: u8) -> Result<(), PortError> {
        (**self).write_lower(value)
    }

    fn write_upper(&mut self, value: u8) -> Result<(), PortError> {
        (**self).write_upper(value)
    }

    fn read_input(&mut self) -> Result<u16, PortError> {
        (**self).read_input()
    }
}
