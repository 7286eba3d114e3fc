// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};

use cartrip_common::args::{parse_board, parse_layout};
use cartrip_common::config::DEFAULT_BOARD;
use cartrip_core::Layout;

use crate::backend::Backend;

#[derive(Parser)]
#[command(name = "cartrip")]
#[command(about = "Dumps SNES cartridge ROM and save RAM through MCP230xx I/O expanders")]
#[command(version)]
#[command(after_help = "Use 'help <subcommand>' for detailed options (e.g., 'help dump')")]
pub struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Powers up the cartridge, then detects, validates and prints its
    /// header
    Info {
        #[command(flatten)]
        backend: BackendArgs,

        /// Output the header as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detects the cartridge header, then dumps ROM and/or SRAM to
    /// <title>.smc and <title>.srm.
    ///
    /// An existing ROM image is not dumped again unless --overwrite is given.
    /// A ROM checksum that doesn't match the header is reported, but the
    /// image is still written.
    Dump {
        #[command(flatten)]
        backend: BackendArgs,

        #[command(flatten)]
        dump: DumpArgs,
    },

    /// Lists the available board configurations
    Boards,
}

/// Selects what the cartridge bus is connected to
#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    /// ROM image to simulate a cartridge from, instead of using hardware
    #[arg(long, requires = "layout", conflicts_with = "board")]
    pub image: Option<PathBuf>,

    /// Layout of the simulated cartridge (lowrom, highrom)
    #[arg(long, value_parser = parse_layout, requires = "image")]
    pub layout: Option<Layout>,

    /// SRAM image for the simulated cartridge
    #[arg(long, requires = "image")]
    pub sram: Option<PathBuf>,

    /// Board configuration to use for hardware (default: built in default)
    #[arg(long)]
    pub board: Option<String>,
}

impl BackendArgs {
    pub fn backend(&self) -> Result<Backend> {
        if let Some(image) = &self.image {
            let Some(layout) = self.layout else {
                bail!("--image requires --layout");
            };
            return Ok(Backend::Sim {
                image: image.clone(),
                layout,
                sram: self.sram.clone(),
            });
        }

        let name = self.board.as_deref().unwrap_or(DEFAULT_BOARD);
        let config = parse_board(name).map_err(anyhow::Error::msg)?;
        Ok(Backend::Board(config))
    }
}

#[derive(Args, Debug, Clone)]
pub struct DumpArgs {
    /// Directory images are written to
    #[arg(short, long, default_value = "output")]
    pub output: PathBuf,

    /// Don't dump the ROM
    #[arg(long)]
    pub no_rom: bool,

    /// Don't dump SRAM
    #[arg(long)]
    pub no_sram: bool,

    /// Dump the ROM even if an image for this title already exists
    #[arg(long)]
    pub overwrite: bool,

    /// File to write the detected title to, or NULL if the header is invalid
    #[arg(long)]
    pub status_file: Option<PathBuf>,

    /// Also write a <title>.json report
    #[arg(long)]
    pub report: bool,
}
