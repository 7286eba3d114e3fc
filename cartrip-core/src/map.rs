// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Mapping between linear cartridge offsets and (bank, address) pairs.
//!
//! Cartridges in this family use one of two address layouts:
//! - LowROM - 32KB pages, each occupying the upper half (A15 high) of a bank
//! - HighROM - 64KB pages, each occupying a whole bank
//!
//! Everything in here is pure, with no I/O.

use serde::Serialize;
use strum::{Display, EnumString};

use crate::error::{Error, Result};

/// Page size of a LowROM cartridge
pub const LOW_ROM_PAGE: u32 = 0x8000;

/// Page size of a HighROM cartridge
pub const HIGH_ROM_PAGE: u32 = 0x10000;

/// Header offset when the cartridge is LowROM (32704)
pub const LOW_ROM_HEADER: u32 = 0x7FC0;

/// Header offset when the cartridge is HighROM (65472)
pub const HIGH_ROM_HEADER: u32 = 0xFFC0;

/// First bank of a LowROM image
pub const LOW_ROM_ORIGIN: u8 = 0x00;

/// Bank the first [`HIGH_ROM_SPLIT_PAGES`] pages of a HighROM image are read
/// from
pub const HIGH_ROM_ORIGIN: u8 = 0xC0;

/// Bank the remaining pages of a large HighROM image are read from
pub const HIGH_ROM_UPPER_ORIGIN: u8 = 0x40;

/// Number of HighROM pages reachable from [`HIGH_ROM_ORIGIN`] before the bank
/// numbering wraps
pub const HIGH_ROM_SPLIT_PAGES: u32 = 64;

/// Highest address of an SRAM window within a bank
pub const SRAM_BANK_CEILING: u16 = 0x7FFF;

/// Number of banks selectable by the bank register
pub const BANK_COUNT: u32 = 0x100;

/// Address layout of a cartridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    #[strum(serialize = "lowrom", to_string = "LowROM")]
    LowRom,

    #[strum(serialize = "highrom", serialize = "hirom", to_string = "HighROM")]
    HighRom,
}

/// Where a region's dump starts on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SramOrigin {
    pub bank: u8,
    pub addr: u16,
}

impl Layout {
    /// Decodes the bank size (low) nibble of the header makeup byte
    pub fn from_bank_size(nibble: u8) -> Result<Self> {
        match nibble {
            0 => Ok(Layout::LowRom),
            1 => Ok(Layout::HighRom),
            other => Err(Error::UnknownLayoutField(other)),
        }
    }

    /// Returns the size of a single page (and bank window) in bytes
    pub fn page_size(&self) -> u32 {
        match self {
            Layout::LowRom => LOW_ROM_PAGE,
            Layout::HighRom => HIGH_ROM_PAGE,
        }
    }

    /// Returns the candidate header offset for this layout
    pub fn header_offset(&self) -> u32 {
        match self {
            Layout::LowRom => LOW_ROM_HEADER,
            Layout::HighRom => HIGH_ROM_HEADER,
        }
    }

    /// Returns the bank and address the SRAM window starts at
    pub fn sram_origin(&self) -> SramOrigin {
        match self {
            Layout::LowRom => SramOrigin {
                bank: 0x70,
                addr: 0x0000,
            },
            Layout::HighRom => SramOrigin {
                bank: 0x30,
                addr: 0x6000,
            },
        }
    }

    /// Whether A15 is forced high on every ROM access
    pub fn forces_a15(&self) -> bool {
        matches!(self, Layout::LowRom)
    }

    /// Largest offset (exclusive) that can be expressed with an 8-bit bank
    pub fn offset_limit(&self) -> u32 {
        BANK_COUNT * self.page_size()
    }

    /// Splits `offset` into the bank and address it lives at.
    pub fn offset_to_bank_address(&self, offset: u32) -> Result<(u8, u16)> {
        if offset >= self.offset_limit() {
            return Err(Error::OffsetOutOfRange {
                offset,
                layout: *self,
            });
        }
        let page = self.page_size();
        Ok(((offset / page) as u8, (offset % page) as u16))
    }

    /// Inverse of [`Self::offset_to_bank_address`].  For LowROM the forced
    /// A15 bit is ignored.
    pub fn address_to_offset(&self, bank: u8, addr: u16) -> u32 {
        let addr = match self {
            Layout::LowRom => addr as u32 & (LOW_ROM_PAGE - 1),
            Layout::HighRom => addr as u32,
        };
        bank as u32 * self.page_size() + addr
    }

    /// Number of pages to dump for a ROM of `rom_size_mbits` megabits
    pub fn page_count(&self, rom_size_mbits: u32) -> u32 {
        let pages = rom_size_mbits * 2;
        match self {
            Layout::LowRom => pages * 2,
            Layout::HighRom => pages,
        }
    }

    /// Splits a ROM dump into the (start bank, page count) passes needed to
    /// read it.
    pub fn rom_passes(&self, page_count: u32) -> Vec<(u8, u32)> {
        match self {
            Layout::LowRom => vec![(LOW_ROM_ORIGIN, page_count)],
            Layout::HighRom => {
                if page_count > HIGH_ROM_SPLIT_PAGES {
                    vec![
                        (HIGH_ROM_ORIGIN, HIGH_ROM_SPLIT_PAGES),
                        (HIGH_ROM_UPPER_ORIGIN, page_count - HIGH_ROM_SPLIT_PAGES),
                    ]
                } else {
                    vec![(HIGH_ROM_ORIGIN, page_count)]
                }
            }
        }
    }
}

/// Splits a 16-bit address into the (upper, lower) bytes driven onto the
/// address expander, forcing A15 for LowROM.
pub fn split_address(addr: u16, layout: Layout) -> (u8, u8) {
    let mut upper = (addr >> 8) as u8;
    let lower = (addr & 0xFF) as u8;
    if layout.forces_a15() {
        upper |= 0x80;
    }
    (upper, lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_to_bank_address() {
        assert_eq!(
            Layout::HighRom.offset_to_bank_address(0x12345).unwrap(),
            (0x01, 0x2345)
        );
        assert_eq!(
            Layout::LowRom.offset_to_bank_address(0x12345).unwrap(),
            (0x02, 0x2345)
        );
        assert_eq!(
            Layout::LowRom.offset_to_bank_address(LOW_ROM_HEADER).unwrap(),
            (0x00, 0x7FC0)
        );
        assert_eq!(
            Layout::HighRom.offset_to_bank_address(HIGH_ROM_HEADER).unwrap(),
            (0x00, 0xFFC0)
        );
    }

    #[test]
    fn test_offset_round_trip() {
        for layout in [Layout::LowRom, Layout::HighRom] {
            let mut offset = 0u32;
            while offset < layout.offset_limit() {
                let (bank, addr) = layout.offset_to_bank_address(offset).unwrap();
                assert_eq!(layout.address_to_offset(bank, addr), offset);
                offset += 0x1F3;
            }
            let last = layout.offset_limit() - 1;
            let (bank, addr) = layout.offset_to_bank_address(last).unwrap();
            assert_eq!(bank, 0xFF);
            assert_eq!(layout.address_to_offset(bank, addr), last);
        }
    }

    #[test]
    fn test_low_rom_offset_ignores_a15() {
        assert_eq!(Layout::LowRom.address_to_offset(0x01, 0x8010), 0x8010);
        assert_eq!(Layout::LowRom.address_to_offset(0x01, 0x0010), 0x8010);
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(matches!(
            Layout::HighRom.offset_to_bank_address(0x1000000),
            Err(Error::OffsetOutOfRange { .. })
        ));
        assert!(matches!(
            Layout::LowRom.offset_to_bank_address(0x800000),
            Err(Error::OffsetOutOfRange { .. })
        ));
    }

    #[test]
    fn test_split_address() {
        for addr in 0..=0xFFFFu16 {
            let (upper, lower) = split_address(addr, Layout::LowRom);
            assert_eq!(upper, ((addr >> 8) as u8) | 0x80);
            assert_eq!(lower, (addr & 0xFF) as u8);

            let (upper, lower) = split_address(addr, Layout::HighRom);
            assert_eq!(upper, (addr >> 8) as u8);
            assert_eq!(lower, (addr & 0xFF) as u8);
        }
    }

    #[test]
    fn test_page_count() {
        assert_eq!(Layout::HighRom.page_count(8), 16);
        assert_eq!(Layout::LowRom.page_count(8), 32);
        assert_eq!(Layout::HighRom.page_count(4), 8);
    }

    #[test]
    fn test_rom_passes() {
        assert_eq!(Layout::LowRom.rom_passes(32), vec![(0x00, 32)]);
        assert_eq!(Layout::HighRom.rom_passes(16), vec![(0xC0, 16)]);
        assert_eq!(Layout::HighRom.rom_passes(64), vec![(0xC0, 64)]);
        assert_eq!(
            Layout::HighRom.rom_passes(96),
            vec![(0xC0, 64), (0x40, 32)]
        );
    }

    #[test]
    fn test_from_bank_size() {
        assert_eq!(Layout::from_bank_size(0).unwrap(), Layout::LowRom);
        assert_eq!(Layout::from_bank_size(1).unwrap(), Layout::HighRom);
        assert!(matches!(
            Layout::from_bank_size(5),
            Err(Error::UnknownLayoutField(5))
        ));
    }

    #[test]
    fn test_layout_strings() {
        assert_eq!(Layout::LowRom.to_string(), "LowROM");
        assert_eq!(Layout::HighRom.to_string(), "HighROM");
        assert_eq!("lowrom".parse::<Layout>().unwrap(), Layout::LowRom);
        assert_eq!("HiRom".parse::<Layout>().unwrap(), Layout::HighRom);
        assert!("exhirom".parse::<Layout>().is_err());
    }
}
