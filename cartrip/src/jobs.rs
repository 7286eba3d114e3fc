// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! The work done by the info and dump commands once a session is open.

use anyhow::{Context, Result};
use embedded_hal::digital::OutputPin;
use log::info;

use cartrip_core::{CartridgeSession, DumpSummary, HeaderInfo, PortDevice, WidePortDevice};

use crate::args::DumpArgs;
use crate::backend::SessionJob;
use crate::output::{OutputFiles, Report, write_status};
use crate::print::{print_header, print_rom_result, print_sram_result};

/// Detects and validates the header
pub struct InfoJob;

impl SessionJob for InfoJob {
    type Output = HeaderInfo;

    fn run<A, B, D, P>(self, session: &mut CartridgeSession<A, B, D, P>) -> Result<HeaderInfo>
    where
        A: WidePortDevice,
        B: PortDevice,
        D: PortDevice,
        P: OutputPin,
    {
        session
            .detect_header()
            .context("Failed to read cartridge header")
    }
}

/// What a dump did
#[derive(Debug)]
pub struct DumpOutcome {
    pub header: HeaderInfo,
    pub rom: Option<DumpSummary>,
    pub sram: Option<DumpSummary>,

    /// The ROM image already existed and was left alone
    pub rom_skipped: bool,
}

pub struct DumpJob<'a> {
    pub args: &'a DumpArgs,
}

impl DumpJob<'_> {
    fn detect<A, B, D, P>(&self, session: &mut CartridgeSession<A, B, D, P>) -> Result<HeaderInfo>
    where
        A: WidePortDevice,
        B: PortDevice,
        D: PortDevice,
        P: OutputPin,
    {
        let header = session.detect_header();
        if let Some(path) = &self.args.status_file {
            let title = header.as_ref().ok().map(|header| header.title.as_str());
            write_status(path, title)?;
        }
        header.context("Failed to read cartridge header")
    }
}

impl SessionJob for DumpJob<'_> {
    type Output = DumpOutcome;

    fn run<A, B, D, P>(self, session: &mut CartridgeSession<A, B, D, P>) -> Result<DumpOutcome>
    where
        A: WidePortDevice,
        B: PortDevice,
        D: PortDevice,
        P: OutputPin,
    {
        let header = self.detect(session)?;
        print_header(&header);
        println!();

        let files = OutputFiles::new(&self.args.output, &header.title);
        files.create_dir()?;
        let mut rom = None;
        let mut sram = None;
        let mut rom_skipped = false;

        if !self.args.no_rom {
            let path = files.rom();
            if path.exists() && !self.args.overwrite {
                println!(
                    "ROM image {} exists, not dumping again (use --overwrite)",
                    path.display()
                );
                rom_skipped = true;
            } else {
                if header.has_cx4() {
                    session.configure_cx4(header.rom_size_mbits()?)?;
                }
                let result = session.dump_cartridge_rom(&header)?;
                print_rom_result(&result, &header);
                files.write(&path, &result.data)?;
                info!("Wrote {}", path.display());
                rom = Some(result.summary(Some(header.checksum)));
            }
        }

        if !self.args.no_sram {
            if header.sram_kbits() == 0 {
                println!("SRAM: none");
            } else {
                let result = session.dump_sram(header.sram_kbits(), header.rom_size_code)?;
                print_sram_result(&result);
                let path = files.sram();
                files.write(&path, &result.data)?;
                info!("Wrote {}", path.display());
                sram = Some(result.summary(None));
            }
        }

        if self.args.report {
            let mut report = Report::new(&header);
            report.rom = rom.clone();
            report.sram = sram.clone();
            let path = files.report();
            report.write(&path)?;
            info!("Wrote {}", path.display());
        }

        Ok(DumpOutcome {
            header,
            rom,
            sram,
            rom_skipped,
        })
    }
}
