// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! MCP23008 and MCP23017 I/O expander drivers.
//!
//! The reader uses an MCP23017 for the 16-bit address bus and two MCP23008s
//! for the bank and data buses, all on one I2C bus.  Each driver only needs
//! an [`embedded_hal::i2c::I2c`] implementation, so several drivers can share
//! a bus through whatever bus sharing the platform provides.
//!
//! The MCP23017 is assumed to be in its power-on register layout
//! (IOCON.BANK = 0) with sequential addressing enabled, so a 16-bit write to
//! port A is followed by port B in the same transaction.

use embedded_hal::i2c::{Error as _, I2c};
use log::debug;

use crate::error::{PortError, PortId};
use crate::port::{InterruptConfig, PortDevice, WidePortDevice};

// MCP23008 registers
const MCP23008_IODIR: u8 = 0x00;
const MCP23008_GPINTEN: u8 = 0x02;
const MCP23008_DEFVAL: u8 = 0x03;
const MCP23008_INTCON: u8 = 0x04;
const MCP23008_GPPU: u8 = 0x06;
const MCP23008_GPIO: u8 = 0x09;

// MCP23017 registers, IOCON.BANK = 0
const MCP23017_IODIRA: u8 = 0x00;
const MCP23017_GPIOA: u8 = 0x12;
const MCP23017_GPIOB: u8 = 0x13;

fn port_error<E: embedded_hal::i2c::Error>(port: PortId, i2c_addr: u8, e: E) -> PortError {
    PortError::new(
        port,
        format!("I2C device 0x{:02X}: {:?}", i2c_addr, e.kind()),
    )
}

/// 8-bit expander
pub struct Mcp23008<I2C> {
    i2c: I2C,
    address: u8,
    port: PortId,
}

impl<I2C: I2c> Mcp23008<I2C> {
    /// `address` is the 7-bit I2C address, 0x20-0x27.  `port` is only used
    /// to label errors.
    pub fn new(i2c: I2C, address: u8, port: PortId) -> Self {
        Self { i2c, address, port }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), PortError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| port_error(self.port, self.address, e))
    }

    fn read_register(&mut self, register: u8) -> Result<u8, PortError> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(self.address, &[register], &mut buf)
            .map_err(|e| port_error(self.port, self.address, e))?;
        Ok(buf[0])
    }
}

impl<I2C: I2c> PortDevice for Mcp23008<I2C> {
    fn set_direction(&mut self, mask: u8) -> Result<(), PortError> {
        debug!("{} port: IODIR 0x{:02X}", self.port, mask);
        self.write_register(MCP23008_IODIR, mask)
    }

    fn set_pullups(&mut self, mask: u8) -> Result<(), PortError> {
        debug!("{} port: GPPU 0x{:02X}", self.port, mask);
        self.write_register(MCP23008_GPPU, mask)
    }

    fn set_interrupts(&mut self, config: InterruptConfig) -> Result<(), PortError> {
        // Disable first, so a changed DEFVAL can't raise a spurious interrupt
        self.write_register(MCP23008_GPINTEN, 0x00)?;
        self.write_register(MCP23008_DEFVAL, config.default_value)?;
        self.write_register(MCP23008_INTCON, config.control)?;
        self.write_register(MCP23008_GPINTEN, config.enable)
    }

    fn write_output(&mut self, value: u8) -> Result<(), PortError> {
        self.write_register(MCP23008_GPIO, value)
    }

    fn read_input(&mut self) -> Result<u8, PortError> {
        self.read_register(MCP23008_GPIO)
    }
}

/// 16-bit expander.  Port A carries the lower byte, port B the upper.
pub struct Mcp23017<I2C> {
    i2c: I2C,
    address: u8,
    port: PortId,
}

impl<I2C: I2c> Mcp23017<I2C> {
    pub fn new(i2c: I2C, address: u8, port: PortId) -> Self {
        Self { i2c, address, port }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    fn write_pair(&mut self, register: u8, value: u16) -> Result<(), PortError> {
        let [lower, upper] = value.to_le_bytes();
        self.i2c
            .write(self.address, &[register, lower, upper])
            .map_err(|e| port_error(self.port, self.address, e))
    }

    fn write_register(&mut self, register: u8, value: u8) -> Result<(), PortError> {
        self.i2c
            .write(self.address, &[register, value])
            .map_err(|e| port_error(self.port, self.address, e))
    }
}

impl<I2C: I2c> WidePortDevice for Mcp23017<I2C> {
    fn set_direction(&mut self, mask: u16) -> Result<(), PortError> {
        debug!("{} port: IODIRA/B 0x{:04X}", self.port, mask);
        self.write_pair(MCP23017_IODIRA, mask)
    }

    fn write_output(&mut self, value: u16) -> Result<(), PortError> {
        self.write_pair(MCP23017_GPIOA, value)
    }

    fn write_lower(&mut self, value: u8) -> Result<(), PortError> {
        self.write_register(MCP23017_GPIOA, value)
    }

    fn write_upper(&mut self, value: u8) -> Result<(), PortError> {
        self.write_register(MCP23017_GPIOB, value)
    }

    fn read_input(&mut self) -> Result<u16, PortError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[MCP23017_GPIOA], &mut buf)
            .map_err(|e| port_error(self.port, self.address, e))?;
        Ok(u16::from_le_bytes(buf))
    }
}
