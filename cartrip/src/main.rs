// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! cartrip
//!
//! Dumps ROM and save RAM from SNES cartridges connected through an MCP23017
//! (address bus) and two MCP23008s (bank and data buses) on an I2C bus, plus
//! five GPIO control lines.
//!
//! It works by:
//! - Powering the cartridge up and configuring the expanders
//! - Reading the header from the LowROM location, which decides whether the
//!   cartridge is LowROM or HighROM (the latter re-reads the real header)
//! - Reading the ROM a page at a time, checksumming as it goes, then the SRAM
//! - Always powering the cartridge down and releasing the bus afterwards
//!
//! Without hardware, --image simulates a cartridge from a ROM image.

use anyhow::{Context, Result};
use clap::Parser;

mod args;
use args::{Cli, Commands};
mod backend;
mod jobs;
use jobs::{DumpJob, InfoJob};
mod output;
mod print;
use print::{print_boards, print_header};

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Info { backend, json } => {
            let header = backend.backend()?.run(InfoJob)?;
            if json {
                let json =
                    serde_json::to_string_pretty(&header).context("Failed to serialize header")?;
                println!("{}", json);
            } else {
                print_header(&header);
            }
        }
        Commands::Dump { backend, dump } => {
            println!("cartrip - Cartridge Dump");
            println!("========================");
            let outcome = backend.backend()?.run(DumpJob { args: &dump })?;
            println!();
            println!(
                "Finished {}: ROM {}, SRAM {}",
                outcome.header.title,
                if outcome.rom_skipped {
                    "skipped"
                } else if outcome.rom.is_some() {
                    "dumped"
                } else {
                    "not dumped"
                },
                if outcome.sram.is_some() {
                    "dumped"
                } else {
                    "not dumped"
                }
            );
            if outcome.rom.as_ref().and_then(|rom| rom.checksum_ok) == Some(false) {
                println!("ROM checksum did not match the header - the image may be bad");
            }
        }
        Commands::Boards => {
            let boards = cartrip_common::list_boards()?;
            print_boards(&boards);
        }
    }

    Ok(())
}
