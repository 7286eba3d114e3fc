// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Error types for cartrip-core

use core::fmt;
use thiserror::Error;

use crate::map::Layout;

/// Identifies which physical device a failed transaction was addressed to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortId {
    /// 16-bit address expander
    Address,

    /// 8-bit bank expander
    Bank,

    /// 8-bit data expander
    Data,

    /// One of the five directly driven control lines
    Control,
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortId::Address => write!(f, "address"),
            PortId::Bank => write!(f, "bank"),
            PortId::Data => write!(f, "data"),
            PortId::Control => write!(f, "control"),
        }
    }
}

/// A register access on a port device, or a control line write, failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{port} port transaction failed: {reason}")]
pub struct PortError {
    pub port: PortId,
    pub reason: String,
}

impl PortError {
    pub fn new(port: PortId, reason: impl Into<String>) -> Self {
        Self {
            port,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// The header checksum and inverse checksum do not XOR to 0xFFFF
    #[error(
        "header checksum mismatch at offset 0x{offset:06X}: checksum 0x{checksum:04X}, inverse 0x{inverse:04X}"
    )]
    HeaderChecksumMismatch {
        offset: u32,
        checksum: u16,
        inverse: u16,
    },

    /// Bank size nibble of the makeup byte is neither LowROM nor HighROM
    #[error("unknown layout field 0x{0:X} in header makeup byte")]
    UnknownLayoutField(u8),

    /// Declared ROM size code is too small to describe a dumpable ROM
    #[error("invalid ROM size code {0}, must be 7 or greater")]
    InvalidRomSizeCode(u8),

    /// A port device or control line reported a hardware access error
    #[error(transparent)]
    PortTransactionFailure(#[from] PortError),

    /// An offset based access was attempted before the layout was known
    #[error("cartridge layout has not been determined yet")]
    LayoutNotDetermined,

    /// The layout is fixed for the session once confirmed
    #[error("cartridge layout already set to {current}, cannot change to {requested}")]
    LayoutAlreadySet { current: Layout, requested: Layout },

    /// Offset resolves to a bank that doesn't fit in the bank register
    #[error("offset 0x{offset:X} is out of range for {layout}")]
    OffsetOutOfRange { offset: u32, layout: Layout },

    /// Page range runs past the last bank
    #[error("{pages} page(s) from bank 0x{start_bank:02X} run past bank 0xFF")]
    PageRangeOverflow { start_bank: u8, pages: u32 },

    /// The session has been quiesced and its lines released
    #[error("cartridge session has been closed")]
    SessionClosed,

    /// The raw header block could not be decoded
    #[error("failed to decode header block: {0}")]
    HeaderDecode(String),
}

pub type Result<T> = core::result::Result<T, Error>;
