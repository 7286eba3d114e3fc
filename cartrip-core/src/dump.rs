// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ROM and SRAM dumping.
//!
//! ROM is read a bank at a time.  Within a bank the offset is advanced one
//! byte at a time and re-resolved, and the bank ends when the resolved bank
//! changes.  Every byte read is added to the session's running checksum.
//!
//! SRAM is read from the layout's SRAM origin, wrapping back to the origin
//! address in the next bank whenever the address reaches 0x7FFF.

use std::time::{Duration, Instant};

use embedded_hal::digital::OutputPin;
use log::{debug, info, warn};
use serde::Serialize;

use crate::control::ControlWord;
use crate::error::{Error, Result};
use crate::header::{HeaderInfo, sram_bytes};
use crate::map::{BANK_COUNT, Layout, SRAM_BANK_CEILING, SramOrigin};
use crate::port::{PortDevice, WidePortDevice};
use crate::session::CartridgeSession;

/// Bytes read from a single dump, with the checksum computed as they were
/// read
#[derive(Debug, Clone)]
pub struct DumpResult {
    pub data: Vec<u8>,

    /// Running checksum masked to 16 bits
    pub checksum: u16,

    /// Number of page sub-totals folded into the checksum
    pub folds: u32,

    pub elapsed: Duration,
}

impl DumpResult {
    /// Whether the computed checksum matches the one in `header`
    pub fn checksum_matches(&self, header: &HeaderInfo) -> bool {
        self.checksum == header.checksum
    }

    /// Reports the dump without its data.  `expected` is the checksum to
    /// judge against, if there is one.
    pub fn summary(&self, expected: Option<u16>) -> DumpSummary {
        DumpSummary {
            bytes: self.data.len(),
            checksum: self.checksum,
            elapsed_ms: self.elapsed.as_millis() as u64,
            checksum_ok: expected.map(|expected| expected == self.checksum),
        }
    }
}

/// Serializable summary of a [`DumpResult`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DumpSummary {
    pub bytes: usize,
    pub checksum: u16,
    pub elapsed_ms: u64,

    /// Only present for ROM dumps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum_ok: Option<bool>,
}

impl<A, B, D, P> CartridgeSession<A, B, D, P>
where
    A: WidePortDevice,
    B: PortDevice,
    D: PortDevice,
    P: OutputPin,
{
    /// Dumps `page_count` pages starting at `start_bank`, using the session
    /// layout.  The checksum covers just these pages.
    pub fn dump_rom(&mut self, start_bank: u8, page_count: u32) -> Result<DumpResult> {
        let layout = self.require_layout()?;
        let start = Instant::now();
        self.checksum.reset();

        let mut data = Vec::new();
        self.read_pages(start_bank, page_count, layout, &mut data)?;
        Ok(self.finish_rom(data, start))
    }

    /// Dumps the whole ROM described by `header`.  Large HighROM images are
    /// read in two passes, the second from bank 0x40, with one checksum
    /// across both.  A checksum that doesn't match the header is logged but
    /// is not an error.
    pub fn dump_cartridge_rom(&mut self, header: &HeaderInfo) -> Result<DumpResult> {
        self.set_layout(header.layout)?;
        let layout = header.layout;
        let passes = layout.rom_passes(header.page_count()?);
        for &(start_bank, pages) in &passes {
            check_page_range(start_bank, pages)?;
        }

        let start = Instant::now();
        self.checksum.reset();
        let mut data = Vec::with_capacity(header.rom_bytes()?);
        for (start_bank, pages) in passes {
            debug!("ROM pass: {} page(s) from bank 0x{:02X}", pages, start_bank);
            self.read_pages(start_bank, pages, layout, &mut data)?;
        }

        let result = self.finish_rom(data, start);
        if result.checksum_matches(header) {
            info!("ROM checksum 0x{:04X} matches header", result.checksum);
        } else {
            warn!(
                "ROM checksum 0x{:04X} does not match header checksum 0x{:04X}",
                result.checksum, header.checksum
            );
        }
        Ok(result)
    }

    fn finish_rom(&mut self, data: Vec<u8>, start: Instant) -> DumpResult {
        self.checksum.finish();
        let result = DumpResult {
            data,
            checksum: self.checksum.masked(),
            folds: self.checksum.folds(),
            elapsed: start.elapsed(),
        };
        info!(
            "Read {} ROM bytes in {:.1}s",
            result.data.len(),
            result.elapsed.as_secs_f32()
        );
        result
    }

    fn read_pages(
        &mut self,
        start_bank: u8,
        page_count: u32,
        layout: Layout,
        data: &mut Vec<u8>,
    ) -> Result<()> {
        check_page_range(start_bank, page_count)?;
        let end_bank = start_bank as u32 + page_count;

        let page_size = layout.page_size();
        data.reserve((page_count * page_size) as usize);
        let mut offset = start_bank as u32 * page_size;

        for bank in start_bank as u32..end_bank {
            debug!("Reading bank 0x{:02X}", bank);
            self.goto_offset_as(offset, layout)?;
            loop {
                let byte = self.read_data()?;
                data.push(byte);
                self.checksum.add(byte);
                offset += 1;
                if offset / page_size != bank {
                    break;
                }
                self.goto_offset_as(offset, layout)?;
            }
            self.checksum.end_bank(bank + 1, layout);
        }
        Ok(())
    }

    /// Dumps `sram_kbits` kilobits of SRAM.  `rom_size_code` is only used for
    /// logging.
    ///
    /// The control lines are left on the LowROM SRAM word afterwards, whether
    /// or not the dump succeeded.
    pub fn dump_sram(&mut self, sram_kbits: u32, rom_size_code: u8) -> Result<DumpResult> {
        let layout = self.require_layout()?;
        let total = sram_bytes(sram_kbits);
        let origin = layout.sram_origin();
        debug!(
            "Reading {} bytes of {} SRAM from bank 0x{:02X} address 0x{:04X} (ROM size code {})",
            total, layout, origin.bank, origin.addr, rom_size_code
        );

        let word = match layout {
            Layout::LowRom => ControlWord::READ_SRAM_LOW,
            Layout::HighRom => ControlWord::READ_SRAM_HIGH,
        };
        let start = Instant::now();
        self.checksum.reset();

        let result = self
            .apply_control(word)
            .and_then(|_| self.read_sram(origin, total));
        let restore = self.apply_control(ControlWord::READ_SRAM_LOW);
        let data = result?;
        restore?;

        self.checksum.finish();
        let result = DumpResult {
            data,
            checksum: self.checksum.masked(),
            folds: self.checksum.folds(),
            elapsed: start.elapsed(),
        };
        info!(
            "Read {} SRAM bytes in {:.1}s",
            result.data.len(),
            result.elapsed.as_secs_f32()
        );
        Ok(result)
    }

    fn read_sram(&mut self, origin: SramOrigin, total: usize) -> Result<Vec<u8>> {
        // SRAM is never A15 forced
        let addressing = Layout::HighRom;
        let mut data = Vec::with_capacity(total);
        if total == 0 {
            return Ok(data);
        }

        self.goto_bank(origin.bank)?;
        self.goto_address_as(origin.addr as u32, addressing)?;
        loop {
            let byte = self.read_data()?;
            data.push(byte);
            self.checksum.add(byte);
            if data.len() == total {
                break;
            }

            if self.address() >= SRAM_BANK_CEILING {
                let next = self
                    .bank()
                    .checked_add(1)
                    .ok_or(Error::PageRangeOverflow {
                        start_bank: origin.bank,
                        pages: (total / 0x8000) as u32,
                    })?;
                debug!("SRAM continues in bank 0x{:02X}", next);
                self.goto_bank(next)?;
                self.goto_address_as(origin.addr as u32, addressing)?;
            } else {
                let next = self.address() as u32 + 1;
                self.goto_address_as(next, addressing)?;
            }
        }
        Ok(data)
    }
}

/// Rejects a page range that would run past the last bank
fn check_page_range(start_bank: u8, page_count: u32) -> Result<()> {
    if start_bank as u32 + page_count > BANK_COUNT {
        return Err(Error::PageRangeOverflow {
            start_bank,
            pages: page_count,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::tests::build_rom;
    use crate::sim::{SimCartridge, build_image, stamp_checksum};

    fn open(cart: &SimCartridge) -> CartridgeSession<
        crate::sim::SimAddressPort,
        crate::sim::SimBankPort,
        crate::sim::SimDataPort,
        crate::sim::SimPin,
    > {
        CartridgeSession::open(cart.ports()).unwrap()
    }

    #[test]
    fn test_high_rom_end_to_end() {
        // 4 Mbit HighROM
        let rom = build_rom(Layout::HighRom, "HIGH 4MBIT", 0x09, 0x00);
        let cart = SimCartridge::new(Layout::HighRom, rom.clone(), Vec::new());
        let mut session = open(&cart);

        let header = session.detect_header().unwrap();
        assert_eq!(header.rom_size_mbits().unwrap(), 4);
        assert_eq!(header.page_count().unwrap(), 8);

        let result = session.dump_cartridge_rom(&header).unwrap();
        assert_eq!(result.data.len(), 524288);
        assert_eq!(result.data, rom);
        assert!(result.checksum_matches(&header));
        assert_eq!(result.folds, 8);
        session.close().unwrap();
    }

    #[test]
    fn test_low_rom_end_to_end() {
        let rom = build_rom(Layout::LowRom, "LOW 4MBIT", 0x09, 0x00);
        let cart = SimCartridge::new(Layout::LowRom, rom.clone(), Vec::new());
        let mut session = open(&cart);

        let header = session.detect_header().unwrap();
        assert_eq!(header.page_count().unwrap(), 16);
        let result = session.dump_cartridge_rom(&header).unwrap();
        assert_eq!(result.data, rom);
        assert!(result.checksum_matches(&header));
        // One fold per pair of banks
        assert_eq!(result.folds, 8);
    }

    #[test]
    fn test_low_rom_two_banks_fold_once() {
        let rom: Vec<u8> = (0..0x10000).map(|ii| (ii & 0x03) as u8).collect();
        let cart = SimCartridge::new(Layout::LowRom, rom, Vec::new());
        let mut session = open(&cart);
        session.set_layout(Layout::LowRom).unwrap();

        let result = session.dump_rom(0x00, 2).unwrap();
        assert_eq!(result.data.len(), 0x10000);
        assert_eq!(result.folds, 1);
        // 0+1+2+3 per 4 bytes
        assert_eq!(result.checksum, ((0x10000 / 4 * 6) & 0xFFFF) as u16);
    }

    #[test]
    fn test_low_rom_odd_banks_fold_leftover() {
        let cart = SimCartridge::new(Layout::LowRom, vec![0x01; 0x18000], Vec::new());
        let mut session = open(&cart);
        session.set_layout(Layout::LowRom).unwrap();

        let result = session.dump_rom(0x00, 3).unwrap();
        assert_eq!(result.folds, 2);
        assert_eq!(result.checksum, 0x8000);
    }

    #[test]
    fn test_dump_requires_layout() {
        let cart = SimCartridge::new(Layout::LowRom, vec![0; 0x8000], Vec::new());
        let mut session = open(&cart);
        assert!(matches!(
            session.dump_rom(0, 1),
            Err(Error::LayoutNotDetermined)
        ));
        assert!(matches!(
            session.dump_sram(64, 0x09),
            Err(Error::LayoutNotDetermined)
        ));
    }

    #[test]
    fn test_page_range_overflow() {
        let cart = SimCartridge::new(Layout::HighRom, vec![0; 0x10000], Vec::new());
        let mut session = open(&cart);
        session.set_layout(Layout::HighRom).unwrap();
        assert!(matches!(
            session.dump_rom(0xC0, 65),
            Err(Error::PageRangeOverflow {
                start_bank: 0xC0,
                pages: 65
            })
        ));
        // Exactly reaching the last bank is fine
        assert_eq!(session.dump_rom(0xFF, 1).unwrap().data.len(), 0x10000);
    }

    #[test]
    fn test_high_rom_split_passes() {
        // 48 Mbit, 96 pages: 64 from bank 0xC0 then 32 from bank 0x40
        let rom = build_image(Layout::HighRom, "BIG HIGH", 0x0D, 0x00, 0x02)
            .map(|mut image| {
                image.truncate(96 * 0x10000);
                image
            })
            .unwrap();
        let cart = SimCartridge::new(Layout::HighRom, rom.clone(), Vec::new());
        let mut session = open(&cart);
        session.set_layout(Layout::HighRom).unwrap();

        let mut data = Vec::new();
        for (bank, pages) in Layout::HighRom.rom_passes(96) {
            data.extend(session.dump_rom(bank, pages).unwrap().data);
        }
        assert_eq!(data.len(), 96 * 0x10000);
        assert_eq!(data, rom);
    }

    #[test]
    fn test_high_rom_two_passes_end_to_end() {
        // 64 Mbit, 128 pages: 64 from bank 0xC0 then 64 from bank 0x40
        let rom = build_rom(Layout::HighRom, "HIGH 64MBIT", 0x0D, 0x00);
        let cart = SimCartridge::new(Layout::HighRom, rom.clone(), Vec::new());
        let mut session = open(&cart);

        let header = session.detect_header().unwrap();
        assert_eq!(header.page_count().unwrap(), 128);
        let result = session.dump_cartridge_rom(&header).unwrap();
        assert_eq!(result.data.len(), header.rom_bytes().unwrap());
        assert_eq!(result.data, rom);
        assert!(result.checksum_matches(&header));
        assert_eq!(result.folds, 128);
    }

    #[test]
    fn test_oversized_rom_rejected_before_reading() {
        // Valid checksum, but 256 Mbit can't fit behind the bank register
        let mut rom = build_rom(Layout::HighRom, "TOO BIG", 0x09, 0x00);
        rom[0xFFC0 + 23] = 0x0F;
        stamp_checksum(&mut rom, Layout::HighRom).unwrap();
        let cart = SimCartridge::new(Layout::HighRom, rom, Vec::new());
        let mut session = open(&cart);

        let header = session.detect_header().unwrap();
        assert_eq!(header.page_count().unwrap(), 512);
        cart.reset_stats();
        assert!(matches!(
            session.dump_cartridge_rom(&header),
            Err(Error::PageRangeOverflow {
                start_bank: 0x40,
                pages: 448
            })
        ));
        assert_eq!(cart.stats().data_reads, 0);
    }

    #[test]
    fn test_sram_low_rom() {
        let rom = build_rom(Layout::LowRom, "SAVE LOW", 0x09, 0x03);
        let sram: Vec<u8> = (0..0x2000).map(|ii| (ii * 3) as u8).collect();
        let cart = SimCartridge::new(Layout::LowRom, rom, sram.clone());
        let mut session = open(&cart);

        let header = session.detect_header().unwrap();
        assert_eq!(header.sram_kbits(), 64);
        let result = session
            .dump_sram(header.sram_kbits(), header.rom_size_code)
            .unwrap();
        assert_eq!(result.data, sram);
        assert_eq!(cart.snapshot().lines, ControlWord::READ_SRAM_LOW.bits());
    }

    #[test]
    fn test_sram_high_rom_wraps_banks() {
        // 256 Kbit is 32KB, four 8KB windows from bank 0x30
        let rom = build_rom(Layout::HighRom, "SAVE HIGH", 0x09, 0x05);
        let sram: Vec<u8> = (0..0x8000).map(|ii| (ii >> 8) as u8 ^ ii as u8).collect();
        let cart = SimCartridge::new(Layout::HighRom, rom, sram.clone());
        let mut session = open(&cart);

        let header = session.detect_header().unwrap();
        assert_eq!(header.sram_bytes(), 0x8000);
        let result = session
            .dump_sram(header.sram_kbits(), header.rom_size_code)
            .unwrap();
        assert_eq!(result.data, sram);
        assert_eq!(session.bank(), 0x33);
        assert_eq!(session.address(), 0x7FFF);
        // Restored to the idle SRAM word
        assert_eq!(cart.snapshot().lines, ControlWord::READ_SRAM_LOW.bits());
    }

    #[test]
    fn test_sram_failure_restores_control() {
        let rom = build_rom(Layout::HighRom, "SAVE FAIL", 0x09, 0x03);
        let cart = SimCartridge::new(Layout::HighRom, rom, vec![0; 0x2000]);
        let mut session = open(&cart);
        session.detect_header().unwrap();
        cart.fail_data_reads_after(cart.stats().data_reads + 10);

        assert!(matches!(
            session.dump_sram(64, 0x09),
            Err(Error::PortTransactionFailure(_))
        ));
        assert_eq!(cart.snapshot().lines, ControlWord::READ_SRAM_LOW.bits());
    }

    #[test]
    fn test_no_sram() {
        let rom = build_rom(Layout::LowRom, "NO SAVE", 0x09, 0x00);
        let cart = SimCartridge::new(Layout::LowRom, rom, Vec::new());
        let mut session = open(&cart);
        let header = session.detect_header().unwrap();
        let result = session.dump_sram(header.sram_kbits(), 0x09).unwrap();
        assert!(result.data.is_empty());
        assert_eq!(result.checksum, 0);
    }

    #[test]
    fn test_checksum_mismatch_not_fatal() {
        let mut rom = build_rom(Layout::HighRom, "CORRUPT", 0x09, 0x00);
        rom[0x20000] = rom[0x20000].wrapping_add(1);
        let cart = SimCartridge::new(Layout::HighRom, rom, Vec::new());
        let mut session = open(&cart);
        let header = session.detect_header().unwrap();
        let result = session.dump_cartridge_rom(&header).unwrap();
        assert!(!result.checksum_matches(&header));
        assert_eq!(result.checksum, header.checksum.wrapping_add(1));

        let summary = result.summary(Some(header.checksum));
        assert_eq!(summary.checksum_ok, Some(false));
        assert_eq!(summary.bytes, 0x80000);
    }

    #[test]
    fn test_bus_writes_are_debounced() {
        let cart = SimCartridge::new(Layout::HighRom, vec![0; 0x10000], Vec::new());
        let mut session = open(&cart);
        session.set_layout(Layout::HighRom).unwrap();
        cart.reset_stats();
        session.dump_rom(0xC0, 1).unwrap();

        let stats = cart.stats();
        assert_eq!(stats.data_reads, 0x10000);
        assert_eq!(stats.bank_writes, 1);
        // One lower byte write per address, one upper byte write per 256
        assert_eq!(stats.address_writes, 0x10000 + 0x100);
    }

    #[test]
    fn test_summary_serializes() {
        let result = DumpResult {
            data: vec![1, 2, 3],
            checksum: 6,
            folds: 1,
            elapsed: Duration::from_millis(1500),
        };
        let summary = result.summary(None);
        assert_eq!(summary.elapsed_ms, 1500);
        assert_eq!(summary.checksum_ok, None);
    }
}
