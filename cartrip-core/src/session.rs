// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! A single powered-up session with a cartridge.
//!
//! [`CartridgeSession`] exclusively owns the three expander ports and the
//! control lines for as long as it exists.  Opening a session runs the power
//! up sequence.  Closing it, explicitly with [`CartridgeSession::close`] or
//! implicitly when it's dropped, quiesces the bus: address and bank zeroed,
//! pull-ups and interrupts off, every port back to an input and cartridge
//! power off.  This happens on every exit path, including errors part way
//! through a dump.

use embedded_hal::digital::OutputPin;
use log::{debug, warn};

use crate::bus::AddressBus;
use crate::checksum::RunningChecksum;
use crate::control::{ControlLines, ControlWord};
use crate::error::{Error, Result};
use crate::header::{self, HeaderInfo, HeaderSource};
use crate::map::Layout;
use crate::port::{ALL_INPUTS, ALL_OUTPUTS, InterruptConfig, PortDevice, WidePortDevice};

/// Everything physically wired to the cartridge connector
pub struct BusPorts<A, B, D, P> {
    pub address: A,
    pub bank: B,
    pub data: D,
    pub control: ControlLines<P>,
}

pub struct CartridgeSession<A, B, D, P>
where
    A: WidePortDevice,
    B: PortDevice,
    D: PortDevice,
    P: OutputPin,
{
    pub(crate) bus: AddressBus<A, B>,
    pub(crate) data: D,
    pub(crate) control: ControlLines<P>,
    layout: Option<Layout>,
    current_offset: u32,
    pub(crate) checksum: RunningChecksum,
    closed: bool,
}

impl<A, B, D, P> CartridgeSession<A, B, D, P>
where
    A: WidePortDevice,
    B: PortDevice,
    D: PortDevice,
    P: OutputPin,
{
    /// Takes ownership of the ports and powers the cartridge up.  If power up
    /// fails the bus is quiesced again before the error is returned.
    pub fn open(ports: BusPorts<A, B, D, P>) -> Result<Self> {
        let mut session = Self {
            bus: AddressBus::new(ports.address, ports.bank),
            data: ports.data,
            control: ports.control,
            layout: None,
            current_offset: 0,
            checksum: RunningChecksum::new(),
            closed: false,
        };
        session.power_up()?;
        Ok(session)
    }

    fn power_up(&mut self) -> Result<()> {
        debug!("Powering up cartridge bus");
        self.bus.address_port().set_direction(0x0000)?;
        self.bus.bank_port().set_direction(ALL_OUTPUTS)?;
        self.data.set_direction(ALL_INPUTS)?;
        self.data.set_pullups(0xFF)?;
        self.data.set_interrupts(InterruptConfig::DATA_BUS)?;
        self.control.apply(ControlWord::READ_ROM)?;
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Layout, once confirmed by header detection
    pub fn layout(&self) -> Option<Layout> {
        self.layout
    }

    /// Fixes the layout for the rest of the session.  Setting the same
    /// layout again is allowed, changing it is not.
    pub fn set_layout(&mut self, layout: Layout) -> Result<()> {
        match self.layout {
            Some(current) if current != layout => Err(Error::LayoutAlreadySet {
                current,
                requested: layout,
            }),
            _ => {
                self.layout = Some(layout);
                Ok(())
            }
        }
    }

    pub(crate) fn require_layout(&self) -> Result<Layout> {
        self.layout.ok_or(Error::LayoutNotDetermined)
    }

    pub fn address(&self) -> u16 {
        self.bus.address()
    }

    pub fn bank(&self) -> u8 {
        self.bus.bank()
    }

    /// Offset of the last offset based access
    pub fn current_offset(&self) -> u32 {
        self.current_offset
    }

    pub fn apply_control(&mut self, word: ControlWord) -> Result<()> {
        self.ensure_open()?;
        self.control.apply(word)?;
        Ok(())
    }

    /// Moves to `addr` within the current bank, using the session layout
    pub fn goto_address(&mut self, addr: u32) -> Result<()> {
        let layout = self.require_layout()?;
        self.goto_address_as(addr, layout)
    }

    /// As [`Self::goto_address`], with an explicit layout
    pub fn goto_address_as(&mut self, addr: u32, layout: Layout) -> Result<()> {
        self.ensure_open()?;
        self.bus.goto_address(addr, layout)?;
        Ok(())
    }

    pub fn goto_bank(&mut self, bank: u8) -> Result<()> {
        self.ensure_open()?;
        self.bus.goto_bank(bank)?;
        Ok(())
    }

    /// Moves to the bank and address holding `offset`
    pub fn goto_offset(&mut self, offset: u32) -> Result<()> {
        let layout = self.require_layout()?;
        self.goto_offset_as(offset, layout)
    }

    /// As [`Self::goto_offset`], with an explicit layout
    pub fn goto_offset_as(&mut self, offset: u32, layout: Layout) -> Result<()> {
        let (bank, addr) = layout.offset_to_bank_address(offset)?;
        self.goto_bank(bank)?;
        self.goto_address_as(addr as u32, layout)?;
        self.current_offset = offset;
        Ok(())
    }

    /// Reads the data bus at the current bank and address
    pub fn read_data(&mut self) -> Result<u8> {
        self.ensure_open()?;
        Ok(self.data.read_input()?)
    }

    pub fn read_offset(&mut self, offset: u32) -> Result<u8> {
        self.goto_offset(offset)?;
        self.read_data()
    }

    pub fn read_offset_as(&mut self, offset: u32, layout: Layout) -> Result<u8> {
        self.goto_offset_as(offset, layout)?;
        self.read_data()
    }

    /// Reads a little-endian 16-bit value from `offset`
    pub fn read_u16(&mut self, offset: u32) -> Result<u16> {
        let lower = self.read_offset(offset)?;
        let upper = self.read_offset(offset + 1)?;
        Ok(u16::from_le_bytes([lower, upper]))
    }

    /// Detects and validates the cartridge header, then fixes the session
    /// layout to the one it declares.
    pub fn detect_header(&mut self) -> Result<HeaderInfo> {
        self.ensure_open()?;
        let header = header::detect(self)?;
        self.set_layout(header.layout)?;
        Ok(header)
    }

    /// Whether the session has been quiesced
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Returns every line to its idle state.  All steps are attempted even if
    /// one fails, and the first failure is returned.  Safe to call more than
    /// once.
    pub fn quiesce(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        debug!("Quiescing cartridge bus");

        let steps = [
            self.bus.goto_address(0, Layout::HighRom),
            self.bus.goto_bank(0),
            self.data.set_pullups(0x00),
            self.data.set_interrupts(InterruptConfig::DISABLED),
            self.bus.address_port().set_direction(0xFFFF),
            self.bus.bank_port().set_direction(ALL_INPUTS),
            self.data.set_direction(ALL_INPUTS),
            self.control.power_off(),
        ];
        self.closed = true;

        match steps.into_iter().find_map(|step| step.err()) {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    /// Quiesces the bus and ends the session, reporting any failure
    pub fn close(mut self) -> Result<()> {
        self.quiesce()
    }
}

impl<A, B, D, P> HeaderSource for CartridgeSession<A, B, D, P>
where
    A: WidePortDevice,
    B: PortDevice,
    D: PortDevice,
    P: OutputPin,
{
    fn read_block(&mut self, offset: u32, layout: Layout, buf: &mut [u8]) -> Result<()> {
        for (ii, byte) in buf.iter_mut().enumerate() {
            *byte = self.read_offset_as(offset + ii as u32, layout)?;
        }
        Ok(())
    }
}

impl<A, B, D, P> Drop for CartridgeSession<A, B, D, P>
where
    A: WidePortDevice,
    B: PortDevice,
    D: PortDevice,
    P: OutputPin,
{
    fn drop(&mut self) {
        if let Err(e) = self.quiesce() {
            warn!("Failed to quiesce cartridge bus: {}", e);
        }
    }
}
