// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! A simulated cartridge, for bench verification without hardware.
//!
//! [`SimCartridge`] holds a ROM image, an SRAM image and a layout, and hands
//! out port devices and control pins that all share its state.  Reading the
//! data port decodes the current bank, address and control lines the same
//! way a real cartridge would:
//!
//! - Power off or /RD high - the bus floats, reading 0xFF
//! - LowROM ROM - /CS low, A15 high, `(bank & 0x7F) * 0x8000 + (addr & 0x7FFF)`
//! - LowROM SRAM - /CS low, banks 0x70-0x7F, A15 low
//! - HighROM ROM - /CS low, banks 0xC0-0xFF, 0x40-0x7D, or 0x00-0x3F with A15
//!   high
//! - HighROM SRAM - /CS high, banks 0x30-0x3F, addresses 0x6000-0x7FFF
//!
//! ROM images mirror when an offset runs past their end.

use core::convert::Infallible;
use std::cell::RefCell;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::checksum::RunningChecksum;
use crate::control::{ControlLines, ControlWord};
use crate::cx4::CX4_REGISTER_ADDR;
use crate::error::{Error, PortError, PortId, Result};
use crate::header::{CART_TYPE_CX4, HEADER_SIZE, decode_rom_size};
use crate::map::Layout;
use crate::port::{ALL_OUTPUTS, InterruptConfig, PortDevice, WidePortDevice};
use crate::session::BusPorts;

/// Counts of physical bus transactions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    /// Writes to either half of the address port
    pub address_writes: usize,
    pub bank_writes: usize,
    pub data_reads: usize,

    /// Writes that landed in the CX4 register
    pub register_writes: usize,
}

/// Line and port state at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimSnapshot {
    /// Raw address port value, including any forced A15
    pub address: u16,
    pub bank: u8,
    pub address_dir: u16,
    pub bank_dir: u8,
    pub data_dir: u8,
    pub data_pullups: u8,
    pub interrupts: InterruptConfig,

    /// Control line levels, packed as a control word
    pub lines: u8,
}

struct SimState {
    layout: Layout,
    rom: Vec<u8>,
    sram: Vec<u8>,
    address: u16,
    address_dir: u16,
    bank: u8,
    bank_dir: u8,
    data_dir: u8,
    data_pullups: u8,
    interrupts: InterruptConfig,
    lines: u8,
    cx4_register: Option<u8>,
    fail_reads_after: Option<usize>,
    stats: SimStats,
}

impl SimState {
    fn word(&self) -> ControlWord {
        ControlWord::from_raw(self.lines)
    }

    fn rom_at(&self, offset: usize) -> u8 {
        if self.rom.is_empty() {
            0xFF
        } else {
            self.rom[offset % self.rom.len()]
        }
    }

    fn sram_at(&self, offset: usize) -> u8 {
        if self.sram.is_empty() {
            0xFF
        } else {
            self.sram[offset % self.sram.len()]
        }
    }

    fn at_cx4_register(&self) -> bool {
        self.cx4_register.is_some() && self.bank == 0 && self.address == CX4_REGISTER_ADDR
    }

    // What the cartridge drives onto the data bus right now
    fn decode(&self) -> u8 {
        let word = self.word();
        if !word.contains(ControlWord::POWER) || word.contains(ControlWord::READ) {
            return 0xFF;
        }
        let cs_low = !word.contains(ControlWord::CHIP_SELECT);
        if cs_low && self.at_cx4_register() {
            return self.cx4_register.unwrap_or(0xFF);
        }

        let bank = self.bank as usize;
        let addr = self.address as usize;
        let a15 = self.address & 0x8000 != 0;
        match self.layout {
            Layout::LowRom => {
                if !cs_low {
                    0xFF
                } else if a15 {
                    self.rom_at((bank & 0x7F) * 0x8000 + (addr & 0x7FFF))
                } else if (0x70..=0x7F).contains(&bank) {
                    self.sram_at((bank - 0x70) * 0x8000 + addr)
                } else {
                    0xFF
                }
            }
            Layout::HighRom => {
                if cs_low {
                    match bank {
                        0xC0..=0xFF => self.rom_at((bank - 0xC0) * 0x10000 + addr),
                        0x40..=0x7D => self.rom_at(0x400000 + (bank - 0x40) * 0x10000 + addr),
                        0x00..=0x3F if a15 => self.rom_at(bank * 0x10000 + addr),
                        _ => 0xFF,
                    }
                } else if (0x30..=0x3F).contains(&bank) && (0x6000..=0x7FFF).contains(&addr) {
                    self.sram_at((bank - 0x30) * 0x2000 + (addr - 0x6000))
                } else {
                    0xFF
                }
            }
        }
    }
}

type Shared = Rc<RefCell<SimState>>;

/// A cartridge living entirely in memory
#[derive(Clone)]
pub struct SimCartridge {
    state: Shared,
}

impl SimCartridge {
    pub fn new(layout: Layout, rom: Vec<u8>, sram: Vec<u8>) -> Self {
        let state = SimState {
            layout,
            rom,
            sram,
            address: 0,
            address_dir: 0xFFFF,
            bank: 0,
            bank_dir: 0xFF,
            data_dir: 0xFF,
            data_pullups: 0,
            interrupts: InterruptConfig::DISABLED,
            lines: 0,
            cx4_register: None,
            fail_reads_after: None,
            stats: SimStats::default(),
        };
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    /// Adds a CX4 ROM-size register holding `initial`
    pub fn with_cx4(self, initial: u8) -> Self {
        self.state.borrow_mut().cx4_register = Some(initial);
        self
    }

    /// Makes every data read after the first `count` fail, as if the I2C
    /// bus had gone away
    pub fn fail_data_reads_after(&self, count: usize) {
        self.state.borrow_mut().fail_reads_after = Some(count);
    }

    /// Hands out a full set of ports and control lines wired to this
    /// cartridge
    pub fn ports(&self) -> BusPorts<SimAddressPort, SimBankPort, SimDataPort, SimPin> {
        let pin = |word: ControlWord| SimPin {
            state: self.state.clone(),
            bit: word.bits(),
        };
        BusPorts {
            address: SimAddressPort {
                state: self.state.clone(),
            },
            bank: SimBankPort {
                state: self.state.clone(),
            },
            data: SimDataPort {
                state: self.state.clone(),
            },
            control: ControlLines::new(
                pin(ControlWord::POWER),
                pin(ControlWord::CHIP_SELECT),
                pin(ControlWord::WRITE),
                pin(ControlWord::RESET),
                pin(ControlWord::READ),
            ),
        }
    }

    pub fn layout(&self) -> Layout {
        self.state.borrow().layout
    }

    pub fn stats(&self) -> SimStats {
        self.state.borrow().stats
    }

    pub fn reset_stats(&self) {
        self.state.borrow_mut().stats = SimStats::default();
    }

    pub fn cx4_register(&self) -> Option<u8> {
        self.state.borrow().cx4_register
    }

    pub fn snapshot(&self) -> SimSnapshot {
        let state = self.state.borrow();
        SimSnapshot {
            address: state.address,
            bank: state.bank,
            address_dir: state.address_dir,
            bank_dir: state.bank_dir,
            data_dir: state.data_dir,
            data_pullups: state.data_pullups,
            interrupts: state.interrupts,
            lines: state.lines,
        }
    }
}

pub struct SimAddressPort {
    state: Shared,
}

impl WidePortDevice for SimAddressPort {
    fn set_direction(&mut self, mask: u16) -> core::result::Result<(), PortError> {
        self.state.borrow_mut().address_dir = mask;
        Ok(())
    }

    fn write_output(&mut self, value: u16) -> core::result::Result<(), PortError> {
        let mut state = self.state.borrow_mut();
        state.address = value;
        state.stats.address_writes += 1;
        Ok(())
    }

    fn write_lower(&mut self, value: u8) -> core::result::Result<(), PortError> {
        let mut state = self.state.borrow_mut();
        state.address = (state.address & 0xFF00) | value as u16;
        state.stats.address_writes += 1;
        Ok(())
    }

    fn write_upper(&mut self, value: u8) -> core::result::Result<(), PortError> {
        let mut state = self.state.borrow_mut();
        state.address = (state.address & 0x00FF) | ((value as u16) << 8);
        state.stats.address_writes += 1;
        Ok(())
    }

    fn read_input(&mut self) -> core::result::Result<u16, PortError> {
        Ok(self.state.borrow().address)
    }
}

pub struct SimBankPort {
    state: Shared,
}

impl PortDevice for SimBankPort {
    fn set_direction(&mut self, mask: u8) -> core::result::Result<(), PortError> {
        self.state.borrow_mut().bank_dir = mask;
        Ok(())
    }

    fn set_pullups(&mut self, _mask: u8) -> core::result::Result<(), PortError> {
        Ok(())
    }

    fn write_output(&mut self, value: u8) -> core::result::Result<(), PortError> {
        let mut state = self.state.borrow_mut();
        state.bank = value;
        state.stats.bank_writes += 1;
        Ok(())
    }

    fn read_input(&mut self) -> core::result::Result<u8, PortError> {
        Ok(self.state.borrow().bank)
    }
}

pub struct SimDataPort {
    state: Shared,
}

impl PortDevice for SimDataPort {
    fn set_direction(&mut self, mask: u8) -> core::result::Result<(), PortError> {
        self.state.borrow_mut().data_dir = mask;
        Ok(())
    }

    fn set_pullups(&mut self, mask: u8) -> core::result::Result<(), PortError> {
        self.state.borrow_mut().data_pullups = mask;
        Ok(())
    }

    fn set_interrupts(&mut self, config: InterruptConfig) -> core::result::Result<(), PortError> {
        self.state.borrow_mut().interrupts = config;
        Ok(())
    }

    fn write_output(&mut self, value: u8) -> core::result::Result<(), PortError> {
        let mut state = self.state.borrow_mut();
        let word = state.word();
        let writing = state.data_dir == ALL_OUTPUTS
            && word.contains(ControlWord::POWER)
            && !word.contains(ControlWord::WRITE);
        if writing && state.at_cx4_register() {
            state.cx4_register = Some(value);
            state.stats.register_writes += 1;
        }
        Ok(())
    }

    fn read_input(&mut self) -> core::result::Result<u8, PortError> {
        let mut state = self.state.borrow_mut();
        if let Some(limit) = state.fail_reads_after {
            if state.stats.data_reads >= limit {
                return Err(PortError::new(PortId::Data, "simulated I2C failure"));
            }
        }
        state.stats.data_reads += 1;
        Ok(state.decode())
    }
}

/// One control line of a [`SimCartridge`]
pub struct SimPin {
    state: Shared,
    bit: u8,
}

impl ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> core::result::Result<(), Self::Error> {
        self.state.borrow_mut().lines &= !self.bit;
        Ok(())
    }

    fn set_high(&mut self) -> core::result::Result<(), Self::Error> {
        self.state.borrow_mut().lines |= self.bit;
        Ok(())
    }
}

/// Sets the header checksum pair of `image` to the sum of its bytes and
/// returns the checksum.
///
/// The checksum and its inverse always sum to 0x1FE between them, so the
/// stored value doesn't change the total it describes.
pub fn stamp_checksum(image: &mut [u8], layout: Layout) -> Result<u16> {
    let offset = layout.header_offset() as usize;
    if image.len() < offset + HEADER_SIZE {
        return Err(Error::HeaderDecode(format!(
            "image too small for a {} header: {} bytes",
            layout,
            image.len()
        )));
    }
    image[offset + 28..offset + 32].copy_from_slice(&[0xFF, 0xFF, 0x00, 0x00]);
    let mut sum = RunningChecksum::new();
    sum.add_slice(image);
    sum.finish();
    let checksum = sum.masked();
    image[offset + 28..offset + 30].copy_from_slice(&(!checksum).to_le_bytes());
    image[offset + 30..offset + 32].copy_from_slice(&checksum.to_le_bytes());
    Ok(checksum)
}

/// Builds a synthetic ROM image with a valid header and checksum.  The body
/// is a deterministic pattern, so every page differs.
pub fn build_image(
    layout: Layout,
    title: &str,
    rom_size_code: u8,
    sram_size_code: u8,
    cart_type: u8,
) -> Result<Vec<u8>> {
    let size = decode_rom_size(rom_size_code)? as usize * 0x20000;
    let mut image: Vec<u8> = (0..size)
        .map(|ii| (ii ^ (ii >> 8) ^ (ii >> 16)) as u8)
        .collect();

    let offset = layout.header_offset() as usize;
    let header = &mut image[offset..offset + HEADER_SIZE];
    header[..21].fill(b' ');
    let title = title.as_bytes();
    let len = title.len().min(20);
    header[..len].copy_from_slice(&title[..len]);
    header[21] = 0x20
        | match layout {
            Layout::LowRom => 0x0,
            Layout::HighRom => 0x1,
        };
    header[22] = cart_type;
    header[23] = rom_size_code;
    header[24] = sram_size_code;
    header[25] = 0x01;
    header[26] = 0x33;
    header[27] = 0x00;
    header[32..34].copy_from_slice(&0x8000u16.to_le_bytes());
    header[34..36].copy_from_slice(&0x8000u16.to_le_bytes());

    stamp_checksum(&mut image, layout)?;
    Ok(image)
}

/// As [`build_image`], for a CX4 cartridge
pub fn build_cx4_image(title: &str, rom_size_code: u8) -> Result<Vec<u8>> {
    build_image(Layout::LowRom, title, rom_size_code, 0, CART_TYPE_CX4)
}
