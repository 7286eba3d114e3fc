// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Capcom CX4 ROM-size register.
//!
//! CX4 cartridges have a register telling the coprocessor how much ROM is
//! fitted.  It must read 0x00 for ROMs over 8 Mbit and 0x01 otherwise, or the
//! upper part of the ROM can't be read.

use embedded_hal::digital::OutputPin;
use log::{debug, info};

use crate::control::ControlWord;
use crate::error::Result;
use crate::map::Layout;
use crate::port::{ALL_INPUTS, ALL_OUTPUTS, PortDevice, WidePortDevice};
use crate::session::CartridgeSession;

/// Bus address of the ROM-size register, in bank 0
pub const CX4_REGISTER_ADDR: u16 = 0x7F52;

/// Largest ROM, in megabits, that uses the small ROM register setting
const SMALL_ROM_MBITS: u32 = 8;

/// Register value required for a ROM of `rom_size_mbits`
pub fn cx4_register_value(rom_size_mbits: u32) -> u8 {
    if rom_size_mbits > SMALL_ROM_MBITS {
        0x00
    } else {
        0x01
    }
}

impl<A, B, D, P> CartridgeSession<A, B, D, P>
where
    A: WidePortDevice,
    B: PortDevice,
    D: PortDevice,
    P: OutputPin,
{
    /// Reads the CX4 ROM-size register and rewrites it if it doesn't match
    /// `rom_size_mbits`.  Returns whether a write was made.
    ///
    /// The control lines and data port direction are always put back for ROM
    /// reads, even if the write fails.
    pub fn configure_cx4(&mut self, rom_size_mbits: u32) -> Result<bool> {
        let current = self.read_offset_as(CX4_REGISTER_ADDR as u32, Layout::HighRom)?;
        let wanted = cx4_register_value(rom_size_mbits);
        debug!(
            "CX4 ROM size register 0x{:02X}, want 0x{:02X} for {} Mbit",
            current, wanted, rom_size_mbits
        );
        if current == wanted {
            return Ok(false);
        }

        let result = self.write_register(wanted);
        let restore_control = self.apply_control(ControlWord::READ_ROM);
        let restore_direction = self.data.set_direction(ALL_INPUTS);
        result?;
        restore_control?;
        restore_direction?;

        info!("Set CX4 ROM size register to 0x{:02X}", wanted);
        Ok(true)
    }

    fn write_register(&mut self, value: u8) -> Result<()> {
        self.data.set_direction(ALL_OUTPUTS)?;
        self.apply_control(ControlWord::WRITE_REGISTER)?;
        self.data.write_output(value)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimCartridge, build_cx4_image};

    fn cart(rom_size_code: u8, initial: u8) -> SimCartridge {
        let rom = build_cx4_image("CX4 TEST", rom_size_code).unwrap();
        SimCartridge::new(Layout::LowRom, rom, Vec::new()).with_cx4(initial)
    }

    #[test]
    fn test_register_value() {
        assert_eq!(cx4_register_value(8), 0x01);
        assert_eq!(cx4_register_value(4), 0x01);
        assert_eq!(cx4_register_value(16), 0x00);
    }

    #[test]
    fn test_large_rom_clears_register() {
        let cart = cart(0x0B, 0x01);
        let mut session = CartridgeSession::open(cart.ports()).unwrap();
        let header = session.detect_header().unwrap();
        assert!(header.has_cx4());
        assert!(session.configure_cx4(header.rom_size_mbits().unwrap()).unwrap());
        assert_eq!(cart.cx4_register(), Some(0x00));

        let snap = cart.snapshot();
        assert_eq!(snap.lines, ControlWord::READ_ROM.bits());
        assert_eq!(snap.data_dir, ALL_INPUTS);
    }

    #[test]
    fn test_small_rom_sets_register() {
        let cart = cart(0x0A, 0x00);
        let mut session = CartridgeSession::open(cart.ports()).unwrap();
        assert!(session.configure_cx4(8).unwrap());
        assert_eq!(cart.cx4_register(), Some(0x01));
    }

    #[test]
    fn test_correct_register_not_written() {
        let cart = cart(0x0B, 0x00);
        let mut session = CartridgeSession::open(cart.ports()).unwrap();
        assert!(!session.configure_cx4(16).unwrap());
        assert_eq!(cart.stats().register_writes, 0);
    }
}
