// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Cartridge header detection and decoding.
//!
//! The header is a 36 byte block at 0x7FC0 (LowROM) or 0xFFC0 (HighROM):
//!
//! | Offset | Size | Field                              |
//! |--------|------|------------------------------------|
//! | 0      | 20   | Title                              |
//! | 21     | 1    | Makeup: speed (high) / layout (low) |
//! | 22     | 1    | Cartridge type                     |
//! | 23     | 1    | ROM size code                      |
//! | 24     | 1    | SRAM size code                     |
//! | 25     | 1    | Country                            |
//! | 26     | 1    | Licence                            |
//! | 27     | 1    | Version                            |
//! | 28     | 2    | Inverse checksum (LE)              |
//! | 30     | 2    | Checksum (LE)                      |
//! | 32     | 2    | NMI/VBlank vector (LE)             |
//! | 34     | 2    | Reset vector (LE)                  |
//!
//! Detection always probes the LowROM location first.  A HighROM cartridge
//! mirrors its header there, so the probe validates either way and its layout
//! nibble says where the real header lives.

use deku::prelude::*;
use log::{debug, info};
use serde::Serialize;
use static_assertions::const_assert_eq;

use crate::checksum;
use crate::error::{Error, Result};
use crate::map::Layout;

/// Size of the header block in bytes
pub const HEADER_SIZE: usize = 36;

const TITLE_SIZE: usize = 20;
const RESET_VECTOR_OFFSET: usize = 34;
const_assert_eq!(HEADER_SIZE, RESET_VECTOR_OFFSET + 2);

/// Cartridge type of a Capcom CX4 cartridge
pub const CART_TYPE_CX4: u8 = 0xF3;

/// Smallest valid ROM size code, 1 Mbit
const MIN_ROM_SIZE_CODE: u8 = 7;

// Raw header block, exactly as stored on the cartridge.
//
// Only used internally, converted to [`HeaderInfo`] once the checksum pair
// has been validated.
#[derive(Debug, DekuRead)]
#[deku(endian = "little")]
struct RawHeader {
    pub title: [u8; TITLE_SIZE],
    #[deku(pad_bytes_before = "1")]
    pub makeup: u8,
    pub cart_type: u8,
    pub rom_size: u8,
    pub sram_size: u8,
    pub country: u8,
    pub license: u8,
    pub version: u8,
    pub inverse_checksum: u16,
    pub checksum: u16,
    pub nmi_vector: u16,
    pub reset_vector: u16,
}

impl RawHeader {
    fn parse(block: &[u8]) -> Result<Self> {
        if block.len() < HEADER_SIZE {
            return Err(Error::HeaderDecode(format!(
                "block too small: {} bytes",
                block.len()
            )));
        }
        RawHeader::from_bytes((&block[..HEADER_SIZE], 0))
            .map_err(|e| Error::HeaderDecode(e.to_string()))
            .map(|(_, header)| header)
    }

    fn checksum_valid(&self) -> bool {
        checksum::validate(self.checksum, self.inverse_checksum)
    }
}

/// Information decoded from a validated cartridge header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderInfo {
    /// Title, with trailing padding removed
    pub title: String,

    /// ROM speed, high nibble of the makeup byte
    pub speed: u8,

    /// Bank size/layout, low nibble of the makeup byte
    pub map_mode: u8,

    pub cart_type: u8,

    /// ROM size as log2(size in KB)
    pub rom_size_code: u8,

    /// SRAM size as log2(size in KB), 0 if there is no SRAM
    pub sram_size_code: u8,

    pub country: u8,
    pub license: u8,

    /// Minor version, so 3 means v1.3
    pub version: u8,

    pub inverse_checksum: u16,
    pub checksum: u16,
    pub nmi_vector: u16,
    pub reset_vector: u16,

    /// Layout confirmed by detection
    pub layout: Layout,

    /// Offset the header was read from
    pub header_offset: u32,
}

impl HeaderInfo {
    /// Decodes and validates a header block read from `layout`'s header
    /// offset.
    pub fn from_block(block: &[u8], layout: Layout) -> Result<Self> {
        let raw = RawHeader::parse(block)?;
        if !raw.checksum_valid() {
            return Err(Error::HeaderChecksumMismatch {
                offset: layout.header_offset(),
                checksum: raw.checksum,
                inverse: raw.inverse_checksum,
            });
        }
        Ok(Self::from_raw(raw, layout))
    }

    fn from_raw(raw: RawHeader, layout: Layout) -> Self {
        HeaderInfo {
            title: decode_title(&raw.title),
            speed: raw.makeup >> 4,
            map_mode: raw.makeup & 0x0F,
            cart_type: raw.cart_type,
            rom_size_code: raw.rom_size,
            sram_size_code: raw.sram_size,
            country: raw.country,
            license: raw.license,
            version: raw.version,
            inverse_checksum: raw.inverse_checksum,
            checksum: raw.checksum,
            nmi_vector: raw.nmi_vector,
            reset_vector: raw.reset_vector,
            layout,
            header_offset: layout.header_offset(),
        }
    }

    /// ROM size in megabits
    pub fn rom_size_mbits(&self) -> Result<u32> {
        decode_rom_size(self.rom_size_code)
    }

    /// Number of pages a ROM dump covers
    pub fn page_count(&self) -> Result<u32> {
        Ok(self.layout.page_count(self.rom_size_mbits()?))
    }

    /// Expected ROM image size in bytes
    pub fn rom_bytes(&self) -> Result<usize> {
        Ok(self.page_count()? as usize * self.layout.page_size() as usize)
    }

    /// SRAM size in kilobits, 0 if the cartridge has none
    pub fn sram_kbits(&self) -> u32 {
        decode_sram_kbits(self.sram_size_code)
    }

    /// SRAM size in bytes
    pub fn sram_bytes(&self) -> usize {
        sram_bytes(self.sram_kbits())
    }

    pub fn has_cx4(&self) -> bool {
        self.cart_type == CART_TYPE_CX4
    }
}

/// Decodes a ROM size code to megabits.  Code 7 is 1 Mbit, each code above
/// doubles it.
pub fn decode_rom_size(code: u8) -> Result<u32> {
    if code < MIN_ROM_SIZE_CODE {
        return Err(Error::InvalidRomSizeCode(code));
    }
    1u32.checked_shl((code - MIN_ROM_SIZE_CODE) as u32)
        .filter(|&mbits| mbits <= 0x8000)
        .ok_or(Error::InvalidRomSizeCode(code))
}

/// Decodes an SRAM size code to kilobits.  Codes outside 1-12 mean no SRAM.
pub fn decode_sram_kbits(code: u8) -> u32 {
    if (1..=12).contains(&code) {
        1 << (code as u32 + 3)
    } else {
        0
    }
}

/// Number of bytes in `kbits` kilobits of SRAM
pub fn sram_bytes(kbits: u32) -> usize {
    (kbits as usize / 8) * 1024
}

fn decode_title(bytes: &[u8]) -> String {
    let title: String = bytes
        .iter()
        .map(|&b| {
            if (0x20..0x7F).contains(&b) {
                b as char
            } else {
                '?'
            }
        })
        .collect();
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |pos| pos + 1);
    title[..end].to_string()
}

/// Anything header blocks can be read from
pub trait HeaderSource {
    /// Reads `buf.len()` bytes starting at `offset`, addressed as `layout`
    fn read_block(&mut self, offset: u32, layout: Layout, buf: &mut [u8]) -> Result<()>;
}

fn read_candidate<S: HeaderSource + ?Sized>(source: &mut S, layout: Layout) -> Result<RawHeader> {
    let offset = layout.header_offset();
    let mut block = [0u8; HEADER_SIZE];
    source.read_block(offset, layout, &mut block)?;
    let raw = RawHeader::parse(&block)?;
    debug!(
        "{} candidate at 0x{:06X}: checksum 0x{:04X}, inverse 0x{:04X}",
        layout, offset, raw.checksum, raw.inverse_checksum
    );
    if !raw.checksum_valid() {
        return Err(Error::HeaderChecksumMismatch {
            offset,
            checksum: raw.checksum,
            inverse: raw.inverse_checksum,
        });
    }
    Ok(raw)
}

/// Finds, validates and decodes the cartridge header.
///
/// The LowROM candidate is read and validated first.  Its layout nibble then
/// decides: 0 confirms LowROM, 1 means the header is re-read (and validated
/// again) from the HighROM location.  Nothing is retried.
pub fn detect<S: HeaderSource + ?Sized>(source: &mut S) -> Result<HeaderInfo> {
    let probe = read_candidate(source, Layout::LowRom)?;
    let layout = Layout::from_bank_size(probe.makeup & 0x0F)?;

    let raw = match layout {
        Layout::LowRom => probe,
        Layout::HighRom => read_candidate(source, Layout::HighRom)?,
    };
    let header = HeaderInfo::from_raw(raw, layout);
    info!(
        "Detected {} cartridge \"{}\" at 0x{:06X}",
        layout, header.title, header.header_offset
    );
    Ok(header)
}
