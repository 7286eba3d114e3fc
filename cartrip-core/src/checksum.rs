// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Header checksum validation and the running checksum kept during a dump.

use log::debug;

use crate::map::Layout;

/// Checks the header checksum pair.  This is the only test of header validity
/// and must pass before any other header field is trusted.
pub fn validate(checksum: u16, inverse_checksum: u16) -> bool {
    checksum ^ inverse_checksum == 0xFFFF
}

/// Sums every byte read during a dump.
///
/// Bytes are first accumulated into a page sub-total, which is folded into the
/// total once a whole logical page has been read.  For HighROM that is every
/// bank, for LowROM every second bank, as two 32KB banks make up one logical
/// page.
#[derive(Debug, Clone, Default)]
pub struct RunningChecksum {
    total: u32,
    page: u32,
    pending_banks: u32,
    folds: u32,
}

impl RunningChecksum {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards everything accumulated so far
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn add(&mut self, byte: u8) {
        self.page = self.page.wrapping_add(byte as u32);
    }

    pub fn add_slice(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.add(b);
        }
    }

    /// Called when the bus has finished a bank and moved into `next_bank`.
    /// Returns whether the page sub-total was folded into the total.
    pub fn end_bank(&mut self, next_bank: u32, layout: Layout) -> bool {
        self.pending_banks += 1;
        let whole_page = match layout {
            Layout::HighRom => true,
            Layout::LowRom => next_bank % 2 == 0,
        };
        if whole_page {
            debug!("Page checksum: 0x{:X}", self.page);
            self.fold();
        }
        whole_page
    }

    /// Folds any sub-total left over from banks that didn't complete a
    /// logical page.  Returns whether anything was pending.
    pub fn finish(&mut self) -> bool {
        if self.pending_banks > 0 || self.page != 0 {
            self.fold();
            true
        } else {
            false
        }
    }

    fn fold(&mut self) {
        self.total = self.total.wrapping_add(self.page);
        self.page = 0;
        self.pending_banks = 0;
        self.folds += 1;
    }

    /// Folded total, all 32 bits
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Folded total masked to 16 bits, as stored in a cartridge header
    pub fn masked(&self) -> u16 {
        (self.total & 0xFFFF) as u16
    }

    /// Number of times a page sub-total has been folded into the total
    pub fn folds(&self) -> u32 {
        self.folds
    }
}
