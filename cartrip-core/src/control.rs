// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! The five directly driven cartridge control lines.
//!
//! A control word packs the lines as:
//!
//! ```text
//! bit 7   6   5   4     3     2     1      0
//!     irq x   x   pwr   /cs   /wr   /rst   /rd
//! ```
//!
//! Power is active high, the others are active low on the cartridge, so a set
//! bit drives the line high and leaves that function inactive.

use bitflags::bitflags;
use embedded_hal::digital::{Error as _, OutputPin, PinState};

use crate::error::{PortError, PortId};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ControlWord: u8 {
        const READ = 0x01;
        const RESET = 0x02;
        const WRITE = 0x04;
        const CHIP_SELECT = 0x08;
        const POWER = 0x10;
        const IRQ = 0x80;
    }
}

impl ControlWord {
    /// /RD, /CS and /RST low, /WR high
    pub const READ_ROM: ControlWord = ControlWord::POWER.union(ControlWord::WRITE);

    /// LowROM SRAM read: /CS and /RD low.  Also the idle word left on the
    /// lines after an SRAM pass.
    pub const READ_SRAM_LOW: ControlWord = ControlWord::POWER
        .union(ControlWord::RESET)
        .union(ControlWord::WRITE);

    /// HighROM SRAM read: only /RD low, the SRAM is decoded from the address
    pub const READ_SRAM_HIGH: ControlWord =
        ControlWord::READ_SRAM_LOW.union(ControlWord::CHIP_SELECT);

    /// /CS and /WR low, used to write a coprocessor register
    pub const WRITE_REGISTER: ControlWord = ControlWord::POWER
        .union(ControlWord::RESET)
        .union(ControlWord::READ);

    /// Decodes a raw word.  The two unused bits are dropped.
    pub fn from_raw(word: u8) -> Self {
        ControlWord::from_bits_truncate(word)
    }
}

/// Owns the five output pins.  Each is an independent wire, so unlike the
/// expander ports there is no write debouncing and [`ControlLines::apply`]
/// can be called redundantly.
pub struct ControlLines<P> {
    power: P,
    chip_select: P,
    write: P,
    reset: P,
    read: P,
    current: Option<ControlWord>,
}

impl<P: OutputPin> ControlLines<P> {
    pub fn new(power: P, chip_select: P, write: P, reset: P, read: P) -> Self {
        Self {
            power,
            chip_select,
            write,
            reset,
            read,
            current: None,
        }
    }

    /// Drives every line to the state in `word`.
    pub fn apply(&mut self, word: ControlWord) -> Result<(), PortError> {
        set_line(&mut self.power, "power", word.contains(ControlWord::POWER))?;
        set_line(
            &mut self.chip_select,
            "/cs",
            word.contains(ControlWord::CHIP_SELECT),
        )?;
        set_line(&mut self.write, "/wr", word.contains(ControlWord::WRITE))?;
        set_line(&mut self.reset, "/rst", word.contains(ControlWord::RESET))?;
        set_line(&mut self.read, "/rd", word.contains(ControlWord::READ))?;
        self.current = Some(word);
        Ok(())
    }

    /// Cuts cartridge power, leaving the other lines alone
    pub fn power_off(&mut self) -> Result<(), PortError> {
        set_line(&mut self.power, "power", false)?;
        if let Some(word) = self.current.as_mut() {
            word.remove(ControlWord::POWER);
        }
        Ok(())
    }

    /// Last word applied, if any
    pub fn current(&self) -> Option<ControlWord> {
        self.current
    }

    pub fn release(self) -> (P, P, P, P, P) {
        (self.power, self.chip_select, self.write, self.reset, self.read)
    }
}

fn set_line<P: OutputPin>(pin: &mut P, name: &str, high: bool) -> Result<(), PortError> {
    pin.set_state(PinState::from(high))
        .map_err(|e| PortError::new(PortId::Control, format!("{} line: {:?}", name, e.kind())))
}
