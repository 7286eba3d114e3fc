// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! cartrip-core
//!
//! Reads ROM and save RAM from SNES-family cartridges wired to a host through
//! I2C port expanders (address, bank and data) and five GPIO control lines.
//!
//! The entry point is [`CartridgeSession`], which owns the bus for the
//! duration of one cartridge access:
//!
//! ```ignore
//! let mut session = CartridgeSession::open(ports)?;
//! let header = session.detect_header()?;
//! let rom = session.dump_cartridge_rom(&header)?;
//! let sram = session.dump_sram(header.sram_kbits(), header.rom_size_code)?;
//! session.close()?;
//! ```
//!
//! Port access goes through the [`PortDevice`] and [`WidePortDevice`]
//! traits, implemented for MCP23008/MCP23017 expanders in [`mcp230xx`] and by
//! a simulated cartridge in [`sim`].

pub mod bus;
pub mod checksum;
pub mod control;
pub mod cx4;
pub mod dump;
pub mod error;
pub mod header;
pub mod map;
pub mod mcp230xx;
pub mod port;
pub mod session;
pub mod sim;

pub use control::{ControlLines, ControlWord};
pub use dump::{DumpResult, DumpSummary};
pub use error::{Error, PortError, PortId, Result};
pub use header::HeaderInfo;
pub use map::Layout;
pub use port::{PortDevice, WidePortDevice};
pub use session::{BusPorts, CartridgeSession};
