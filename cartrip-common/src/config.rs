// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Handles loading board configuration files, which describe how a reader's
//! expanders and control lines are wired to the host.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use serde::{Deserialize, Serialize};

/// Top level directories searched for board configuration files.  The first
/// that exists is used.
pub const BOARD_CONFIG_DIRS: [&str; 2] = ["boards", "../boards"];

/// Subdirectories within the board configuration directory also searched for
/// board configuration files.
pub const BOARD_CONFIG_SUB_DIRS: [&str; 1] = ["user"];

/// Name of the built-in configuration
pub const DEFAULT_BOARD: &str = "default";

/// Range of 7-bit I2C addresses an MCP230xx can be strapped to
const MCP230XX_ADDR_MIN: u8 = 0x20;
const MCP230XX_ADDR_MAX: u8 = 0x27;

/// Longest power up delay accepted, in milliseconds
const MAX_POWER_UP_DELAY_MS: u64 = 10_000;

fn default_power_up_delay_ms() -> u64 {
    250
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct I2cConfig {
    /// I2C bus device, for example `/dev/i2c-1`
    pub device: String,
    pub baud_rate: u32,
}

/// 7-bit I2C addresses of the three expanders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpanderConfig {
    /// MCP23017 driving A0-A15
    pub address: u8,

    /// MCP23008 driving the bank register
    pub bank: u8,

    /// MCP23008 on the data bus
    pub data: u8,
}

/// GPIO chip and line offsets of the control lines
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// GPIO character device, for example `/dev/gpiochip0`
    pub chip: String,
    pub power: u32,
    pub chip_select: u32,
    pub write: u32,
    pub reset: u32,
    pub read: u32,
}

impl ControlConfig {
    /// Line offsets with their names, in power, /CS, /WR, /RST, /RD order
    pub fn lines(&self) -> [(&'static str, u32); 5] {
        [
            ("power", self.power),
            ("chip_select", self.chip_select),
            ("write", self.write),
            ("reset", self.reset),
            ("read", self.read),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardConfig {
    #[serde(skip)]
    pub name: String,
    pub description: String,
    pub i2c: I2cConfig,
    pub expanders: ExpanderConfig,
    pub control: ControlConfig,

    /// How long to let the cartridge settle after power up
    #[serde(default = "default_power_up_delay_ms")]
    pub power_up_delay_ms: u64,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_BOARD.to_string(),
            description: "Built-in default: expanders at 0x20/0x21/0x22 on /dev/i2c-1".to_string(),
            i2c: I2cConfig {
                device: "/dev/i2c-1".to_string(),
                baud_rate: 100_000,
            },
            expanders: ExpanderConfig {
                address: 0x20,
                bank: 0x21,
                data: 0x22,
            },
            control: ControlConfig {
                chip: "/dev/gpiochip0".to_string(),
                power: 12,
                chip_select: 8,
                write: 7,
                reset: 6,
                read: 5,
            },
            power_up_delay_ms: default_power_up_delay_ms(),
        }
    }
}

impl BoardConfig {
    /// Parses and validates a board configuration
    pub fn from_json(name: &str, json: &str) -> Result<Self> {
        let mut config: BoardConfig = serde_json::from_str(json)
            .with_context(|| format!("{}: failed to parse board configuration", name))?;
        config.name = name.to_string();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let name = &self.name;

        if self.i2c.device.is_empty() {
            bail!("{}: i2c.device must be set", name);
        }
        if self.i2c.baud_rate == 0 {
            bail!("{}: i2c.baud_rate must be non-zero", name);
        }

        let expanders = [
            ("address", self.expanders.address),
            ("bank", self.expanders.bank),
            ("data", self.expanders.data),
        ];
        let mut seen = HashMap::new();
        for (expander, addr) in expanders {
            if !(MCP230XX_ADDR_MIN..=MCP230XX_ADDR_MAX).contains(&addr) {
                bail!(
                    "{}: invalid I2C address 0x{:02X} for {} expander, must be 0x{:02X}-0x{:02X}",
                    name,
                    addr,
                    expander,
                    MCP230XX_ADDR_MIN,
                    MCP230XX_ADDR_MAX
                );
            }
            if let Some(other) = seen.insert(addr, expander) {
                bail!(
                    "{}: {} and {} expanders both at I2C address 0x{:02X}",
                    name,
                    other,
                    expander,
                    addr
                );
            }
        }

        if self.control.chip.is_empty() {
            bail!("{}: control.chip must be set", name);
        }
        let mut seen = HashSet::new();
        for (line, offset) in self.control.lines() {
            if !seen.insert(offset) {
                bail!("{}: duplicate GPIO line {} for {}", name, offset, line);
            }
        }

        if self.power_up_delay_ms > MAX_POWER_UP_DELAY_MS {
            bail!(
                "{}: power_up_delay_ms {} too long, maximum is {}",
                name,
                self.power_up_delay_ms,
                MAX_POWER_UP_DELAY_MS
            );
        }

        Ok(())
    }
}

fn normalize_name(name: &str) -> String {
    name.to_lowercase().replace("_", "-")
}

fn find_config_root() -> Result<PathBuf> {
    BOARD_CONFIG_DIRS
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .map(Path::to_path_buf)
        .ok_or_else(|| {
            anyhow!(
                "No board configuration directories found. Searched: {:?}",
                BOARD_CONFIG_DIRS
            )
        })
}

fn config_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![root.to_path_buf()];
    for subdir in BOARD_CONFIG_SUB_DIRS.iter() {
        let subdir_path = root.join(subdir);
        if subdir_path.exists() {
            dirs.push(subdir_path);
        } else {
            debug!("Board subdirectory not found: {}", subdir_path.display());
        }
    }
    dirs
}

/// Lists the boards under the first board configuration directory found, as
/// (name, description) pairs sorted by name.
pub fn list_boards() -> Result<Vec<(String, String)>> {
    list_boards_in(&find_config_root()?)
}

/// As [`list_boards`], searching `root` and its subdirectories
pub fn list_boards_in(root: &Path) -> Result<Vec<(String, String)>> {
    let boards = scan_boards(root)?;
    if boards.is_empty() {
        bail!("No board configurations found in {}", root.display());
    }
    Ok(boards)
}

// Parses every board under `root`, checking names and duplicates
fn scan_boards(root: &Path) -> Result<Vec<(String, String)>> {
    let mut boards = Vec::new();
    let mut seen_names: HashMap<String, PathBuf> = HashMap::new();

    for config_dir in config_dirs(root) {
        for entry in fs::read_dir(&config_dir)
            .with_context(|| format!("Failed to read {}", config_dir.display()))?
        {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }

            let filename = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| anyhow!("Invalid filename: {}", path.display()))?;
            let normalized = normalize_name(filename);
            if normalized != filename {
                bail!(
                    "Invalid board name '{}', must be lower-case with dashes, not underscores",
                    path.display()
                );
            }

            if let Some(first_path) = seen_names.get(&normalized) {
                bail!(
                    "Duplicate board '{}' found in {} and {}",
                    filename,
                    first_path.display(),
                    path.display()
                );
            }
            seen_names.insert(normalized.clone(), path.clone());

            let content = fs::read_to_string(&path)?;
            let config = BoardConfig::from_json(&normalized, &content)?;
            boards.push((normalized, config.description));
        }
    }

    boards.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(boards)
}

/// Loads the named board.  `default` is built in, and is only looked for on
/// disk if a configuration directory exists.
pub fn get_board(name: &str) -> Result<BoardConfig> {
    match find_config_root() {
        Ok(root) => get_board_in(&root, name),
        Err(_) if normalize_name(name) == DEFAULT_BOARD => Ok(BoardConfig::default()),
        Err(e) => Err(e),
    }
}

/// As [`get_board`], searching `root` and its subdirectories
pub fn get_board_in(root: &Path, name: &str) -> Result<BoardConfig> {
    let normalized = normalize_name(name);

    // Enumerate everything first, so duplicates and invalid files are caught
    // whichever board is asked for
    scan_boards(root)?;

    for config_dir in config_dirs(root) {
        let config_path = config_dir.join(format!("{}.json", normalized));
        match fs::read_to_string(&config_path) {
            Ok(content) => {
                debug!("Loading board from {}", config_path.display());
                return BoardConfig::from_json(&normalized, &content);
            }
            Err(_) => continue,
        }
    }

    if normalized == DEFAULT_BOARD {
        return Ok(BoardConfig::default());
    }
    bail!("Board config '{}' not found", normalized);
}
