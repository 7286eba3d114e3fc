// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Address and bank bus, with write debouncing.
//!
//! Every register access is an I2C transaction, so the bus remembers the last
//! value written to each address half and to the bank register and skips
//! writes that wouldn't change anything.  The cache starts out empty, so the
//! first access always writes.

use crate::error::PortError;
use crate::map::{Layout, split_address};
use crate::port::{PortDevice, WidePortDevice};

pub struct AddressBus<A, B> {
    address_port: A,
    bank_port: B,
    address: u16,
    bank: u8,
    cached_upper: Option<u8>,
    cached_lower: Option<u8>,
    cached_bank: Option<u8>,
}

impl<A: WidePortDevice, B: PortDevice> AddressBus<A, B> {
    pub fn new(address_port: A, bank_port: B) -> Self {
        Self {
            address_port,
            bank_port,
            address: 0,
            bank: 0,
            cached_upper: None,
            cached_lower: None,
            cached_bank: None,
        }
    }

    /// Current address, without any forced A15
    pub fn address(&self) -> u16 {
        self.address
    }

    pub fn bank(&self) -> u8 {
        self.bank
    }

    /// Drives `addr` onto A0-A15, forcing A15 high for LowROM.
    ///
    /// An `addr` past 0xFFFF is not an error: the whole address port is
    /// zeroed, the address reset to 0 and the cache forgotten.
    pub fn goto_address(&mut self, addr: u32, layout: Layout) -> Result<(), PortError> {
        let Ok(addr) = u16::try_from(addr) else {
            self.address_port.write_output(0x0000)?;
            self.address = 0;
            self.cached_upper = None;
            self.cached_lower = None;
            return Ok(());
        };

        let (upper, lower) = split_address(addr, layout);
        self.address = addr;
        if self.cached_upper != Some(upper) {
            self.address_port.write_upper(upper)?;
            self.cached_upper = Some(upper);
        }
        if self.cached_lower != Some(lower) {
            self.address_port.write_lower(lower)?;
            self.cached_lower = Some(lower);
        }
        Ok(())
    }

    pub fn goto_bank(&mut self, bank: u8) -> Result<(), PortError> {
        if self.cached_bank != Some(bank) {
            self.bank_port.write_output(bank)?;
            self.cached_bank = Some(bank);
        }
        self.bank = bank;
        Ok(())
    }

    /// Forgets what was last written, so the next access writes again
    pub fn invalidate(&mut self) {
        self.cached_upper = None;
        self.cached_lower = None;
        self.cached_bank = None;
    }

    pub(crate) fn address_port(&mut self) -> &mut A {
        &mut self.address_port
    }

    pub(crate) fn bank_port(&mut self) -> &mut B {
        &mut self.bank_port
    }

    pub fn release(self) -> (A, B) {
        (self.address_port, self.bank_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingWidePort {
        upper: Vec<u8>,
        lower: Vec<u8>,
        whole: Vec<u16>,
    }

    impl WidePortDevice for RecordingWidePort {
        fn set_direction(&mut self, _mask: u16) -> Result<(), PortError> {
            Ok(())
        }

        fn write_output(&mut self, value: u16) -> Result<(), PortError> {
            self.whole.push(value);
            Ok(())
        }

        fn write_lower(&mut self, value: u8) -> Result<(), PortError> {
            self.lower.push(value);
            Ok(())
        }

        fn write_upper(&mut self, value: u8) -> Result<(), PortError> {
            self.upper.push(value);
            Ok(())
        }

        fn read_input(&mut self) -> Result<u16, PortError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct RecordingPort {
        writes: Vec<u8>,
    }

    impl PortDevice for RecordingPort {
        fn set_direction(&mut self, _mask: u8) -> Result<(), PortError> {
            Ok(())
        }

        fn set_pullups(&mut self, _mask: u8) -> Result<(), PortError> {
            Ok(())
        }

        fn write_output(&mut self, value: u8) -> Result<(), PortError> {
            self.writes.push(value);
            Ok(())
        }

        fn read_input(&mut self) -> Result<u8, PortError> {
            Ok(0xFF)
        }
    }

    #[test]
    fn test_goto_address_forces_a15_for_low_rom() {
        let mut addr_port = RecordingWidePort::default();
        let mut bank_port = RecordingPort::default();
        let mut bus = AddressBus::new(&mut addr_port, &mut bank_port);

        bus.goto_address(0x7FC0, Layout::LowRom).unwrap();
        assert_eq!(bus.address(), 0x7FC0);
        bus.goto_address(0x1234, Layout::HighRom).unwrap();
        assert_eq!(bus.address(), 0x1234);
        drop(bus);

        assert_eq!(addr_port.upper, vec![0xFF, 0x12]);
        assert_eq!(addr_port.lower, vec![0xC0, 0x34]);
    }

    #[test]
    fn test_goto_address_debounces_each_half() {
        let mut addr_port = RecordingWidePort::default();
        let mut bank_port = RecordingPort::default();
        let mut bus = AddressBus::new(&mut addr_port, &mut bank_port);

        for addr in 0x0100..0x0200 {
            bus.goto_address(addr, Layout::HighRom).unwrap();
        }
        bus.goto_address(0x01FF, Layout::HighRom).unwrap();
        drop(bus);

        // Upper byte only written once, lower byte once per address
        assert_eq!(addr_port.upper, vec![0x01]);
        assert_eq!(addr_port.lower.len(), 0x100);
    }

    #[test]
    fn test_goto_bank_debounces() {
        let mut addr_port = RecordingWidePort::default();
        let mut bank_port = RecordingPort::default();
        let mut bus = AddressBus::new(&mut addr_port, &mut bank_port);

        bus.goto_bank(0xC0).unwrap();
        bus.goto_bank(0xC0).unwrap();
        bus.goto_bank(0xC1).unwrap();
        assert_eq!(bus.bank(), 0xC1);
        bus.invalidate();
        bus.goto_bank(0xC1).unwrap();
        drop(bus);

        assert_eq!(bank_port.writes, vec![0xC0, 0xC1, 0xC1]);
    }

    #[test]
    fn test_first_access_always_writes() {
        let mut addr_port = RecordingWidePort::default();
        let mut bank_port = RecordingPort::default();
        let mut bus = AddressBus::new(&mut addr_port, &mut bank_port);

        // 0 is also the initial value of the address/bank fields
        bus.goto_bank(0).unwrap();
        bus.goto_address(0, Layout::HighRom).unwrap();
        drop(bus);

        assert_eq!(bank_port.writes, vec![0]);
        assert_eq!(addr_port.upper, vec![0]);
        assert_eq!(addr_port.lower, vec![0]);
    }

    #[test]
    fn test_overflow_address_resets() {
        let mut addr_port = RecordingWidePort::default();
        let mut bank_port = RecordingPort::default();
        let mut bus = AddressBus::new(&mut addr_port, &mut bank_port);

        bus.goto_address(0x1234, Layout::HighRom).unwrap();
        bus.goto_address(0x10000, Layout::HighRom).unwrap();
        assert_eq!(bus.address(), 0);

        // Cache was cleared, so the same address as before writes again
        bus.goto_address(0x1234, Layout::HighRom).unwrap();
        drop(bus);

        assert_eq!(addr_port.whole, vec![0x0000]);
        assert_eq!(addr_port.upper, vec![0x12, 0x12]);
        assert_eq!(addr_port.lower, vec![0x34, 0x34]);
    }
}
