// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Builds a cartridge session on whichever backend was selected, runs a job
//! against it and closes it again.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use embedded_hal::digital::OutputPin;
use log::{debug, info};

use cartrip_common::BoardConfig;
use cartrip_core::header::HeaderInfo;
use cartrip_core::sim::SimCartridge;
use cartrip_core::{BusPorts, CartridgeSession, Layout, PortDevice, WidePortDevice};

/// Initial value of a simulated CX4 ROM-size register
const SIM_CX4_REGISTER: u8 = 0x01;

#[derive(Debug, Clone)]
pub enum Backend {
    /// Simulated cartridge built from image files
    Sim {
        image: PathBuf,
        layout: Layout,
        sram: Option<PathBuf>,
    },

    /// Real hardware
    Board(BoardConfig),
}

/// Work done with an open session.  Generic over the port types, so the same
/// job runs on any backend.
pub trait SessionJob {
    type Output;

    fn run<A, B, D, P>(self, session: &mut CartridgeSession<A, B, D, P>) -> Result<Self::Output>
    where
        A: WidePortDevice,
        B: PortDevice,
        D: PortDevice,
        P: OutputPin;
}

impl Backend {
    /// Opens a session, runs `job`, then closes the session whether or not
    /// the job succeeded
    pub fn run<J: SessionJob>(&self, job: J) -> Result<J::Output> {
        match self {
            Backend::Sim {
                image,
                layout,
                sram,
            } => {
                let cart = load_sim(image, *layout, sram.as_deref())?;
                run_session(cart.ports(), 0, job)
            }
            Backend::Board(config) => run_board(config, job),
        }
    }
}

fn load_sim(image: &Path, layout: Layout, sram: Option<&Path>) -> Result<SimCartridge> {
    let rom = fs::read(image)
        .with_context(|| format!("Failed to read ROM image {}", image.display()))?;
    let sram = match sram {
        Some(path) => fs::read(path)
            .with_context(|| format!("Failed to read SRAM image {}", path.display()))?,
        None => Vec::new(),
    };
    info!(
        "Simulating {} cartridge from {} ({} bytes ROM, {} bytes SRAM)",
        layout,
        image.display(),
        rom.len(),
        sram.len()
    );

    let offset = layout.header_offset() as usize;
    let has_cx4 = rom
        .get(offset..)
        .and_then(|block| HeaderInfo::from_block(block, layout).ok())
        .is_some_and(|header| header.has_cx4());

    let cart = SimCartridge::new(layout, rom, sram);
    Ok(if has_cx4 {
        debug!("Image is a CX4 cartridge");
        cart.with_cx4(SIM_CX4_REGISTER)
    } else {
        cart
    })
}

fn run_session<J, A, B, D, P>(
    ports: BusPorts<A, B, D, P>,
    power_up_delay_ms: u64,
    job: J,
) -> Result<J::Output>
where
    J: SessionJob,
    A: WidePortDevice,
    B: PortDevice,
    D: PortDevice,
    P: OutputPin,
{
    let mut session = CartridgeSession::open(ports).context("Failed to power up cartridge")?;
    if power_up_delay_ms > 0 {
        debug!("Waiting {}ms for cartridge to power up", power_up_delay_ms);
        thread::sleep(Duration::from_millis(power_up_delay_ms));
    }

    let result = job.run(&mut session);
    let closed = session.close().context("Failed to quiesce cartridge bus");
    let output = result?;
    closed?;
    Ok(output)
}

#[cfg(feature = "linux")]
fn run_board<J: SessionJob>(config: &BoardConfig, job: J) -> Result<J::Output> {
    use cartrip_core::ControlLines;
    use cartrip_core::PortId;
    use cartrip_core::mcp230xx::{Mcp23008, Mcp23017};
    use gpio_cdev::{Chip, LineRequestFlags};
    use linux_embedded_hal::{CdevPin, I2cdev};

    const CONSUMER: &str = "cartrip";

    info!("Using board {}: {}", config.name, config.description);
    debug!(
        "I2C bus {} (baud rate {} is set by the bus driver)",
        config.i2c.device, config.i2c.baud_rate
    );

    // Each expander gets its own handle on the bus device
    let i2c = || {
        I2cdev::new(&config.i2c.device)
            .with_context(|| format!("Failed to open I2C bus {}", config.i2c.device))
    };
    let address = Mcp23017::new(i2c()?, config.expanders.address, PortId::Address);
    let bank = Mcp23008::new(i2c()?, config.expanders.bank, PortId::Bank);
    let data = Mcp23008::new(i2c()?, config.expanders.data, PortId::Data);

    let mut chip = Chip::new(&config.control.chip)
        .with_context(|| format!("Failed to open GPIO chip {}", config.control.chip))?;
    let mut pin = |name: &str, offset: u32| -> Result<CdevPin> {
        let handle = chip
            .get_line(offset)
            .and_then(|line| line.request(LineRequestFlags::OUTPUT, 0, CONSUMER))
            .with_context(|| format!("Failed to request GPIO line {} for {}", offset, name))?;
        CdevPin::new(handle).with_context(|| format!("Failed to set up {} line", name))
    };
    let control = ControlLines::new(
        pin("power", config.control.power)?,
        pin("chip_select", config.control.chip_select)?,
        pin("write", config.control.write)?,
        pin("reset", config.control.reset)?,
        pin("read", config.control.read)?,
    );

    let ports = BusPorts {
        address,
        bank,
        data,
        control,
    };
    run_session(ports, config.power_up_delay_ms, job)
}

#[cfg(not(feature = "linux"))]
fn run_board<J: SessionJob>(config: &BoardConfig, _job: J) -> Result<J::Output> {
    anyhow::bail!(
        "{}: hardware access needs cartrip built with the linux feature, or use --image to simulate a cartridge",
        config.name
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use cartrip_core::sim::{build_cx4_image, build_image};

    struct Title;

    impl SessionJob for Title {
        type Output = String;

        fn run<A, B, D, P>(self, session: &mut CartridgeSession<A, B, D, P>) -> Result<String>
        where
            A: WidePortDevice,
            B: PortDevice,
            D: PortDevice,
            P: OutputPin,
        {
            Ok(session.detect_header()?.title)
        }
    }

    struct Cx4;

    impl SessionJob for Cx4 {
        type Output = bool;

        fn run<A, B, D, P>(self, session: &mut CartridgeSession<A, B, D, P>) -> Result<bool>
        where
            A: WidePortDevice,
            B: PortDevice,
            D: PortDevice,
            P: OutputPin,
        {
            Ok(session.configure_cx4(16)?)
        }
    }

    #[test]
    fn test_sim_backend() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("game.sfc");
        fs::write(
            &image,
            build_image(Layout::HighRom, "SIM BACKEND", 0x09, 0x00, 0x02).unwrap(),
        )
        .unwrap();

        let backend = Backend::Sim {
            image,
            layout: Layout::HighRom,
            sram: None,
        };
        assert_eq!(backend.run(Title).unwrap(), "SIM BACKEND");
    }

    #[test]
    fn test_sim_backend_cx4() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("cx4.sfc");
        fs::write(&image, build_cx4_image("CX4 GAME", 0x0B).unwrap()).unwrap();

        let backend = Backend::Sim {
            image,
            layout: Layout::LowRom,
            sram: None,
        };
        // Register starts at 0x01, so a 16 Mbit ROM needs a write
        assert!(backend.run(Cx4).unwrap());
    }

    #[test]
    fn test_missing_image() {
        let backend = Backend::Sim {
            image: PathBuf::from("/nonexistent/cartrip/game.sfc"),
            layout: Layout::LowRom,
            sram: None,
        };
        let err = backend.run(Title).unwrap_err();
        assert!(err.to_string().starts_with("Failed to read ROM image"));
    }

    #[test]
    fn test_job_error_still_closes() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("blank.sfc");
        fs::write(&image, vec![0u8; 0x10000]).unwrap();

        let backend = Backend::Sim {
            image,
            layout: Layout::LowRom,
            sram: None,
        };
        let err = backend.run(Title).unwrap_err();
        assert!(err.to_string().contains("header checksum mismatch"));
    }
}
