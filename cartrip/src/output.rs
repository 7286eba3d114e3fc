// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Files written by a dump: images, the status file and the JSON report.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use cartrip_core::{DumpSummary, HeaderInfo};

/// Written to the status file when no valid header was found
pub const STATUS_NO_CARTRIDGE: &str = "NULL";

pub const ROM_EXTENSION: &str = "smc";
pub const SRAM_EXTENSION: &str = "srm";
pub const REPORT_EXTENSION: &str = "json";

/// Turns a cartridge title into something usable as a file stem
pub fn file_stem(title: &str) -> String {
    let stem: String = title
        .trim()
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | ' ' | '-' | '_' | '.' | '\'' | '!' | '&' => c,
            _ => '_',
        })
        .collect();
    let stem = stem.trim_matches('.').to_string();
    if stem.is_empty() {
        "untitled".to_string()
    } else {
        stem
    }
}

/// Where a dump's files go
pub struct OutputFiles {
    dir: PathBuf,
    stem: String,
}

impl OutputFiles {
    pub fn new(dir: &Path, title: &str) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: file_stem(title),
        }
    }

    fn path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, extension))
    }

    pub fn rom(&self) -> PathBuf {
        self.path(ROM_EXTENSION)
    }

    pub fn sram(&self) -> PathBuf {
        self.path(SRAM_EXTENSION)
    }

    pub fn report(&self) -> PathBuf {
        self.path(REPORT_EXTENSION)
    }

    pub fn create_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create output directory {}", self.dir.display()))
    }

    pub fn write(&self, path: &Path, data: &[u8]) -> Result<()> {
        fs::write(path, data).with_context(|| format!("Failed to write {}", path.display()))
    }
}

/// Records which cartridge is in the reader, or [`STATUS_NO_CARTRIDGE`]
pub fn write_status(path: &Path, title: Option<&str>) -> Result<()> {
    let content = title.unwrap_or(STATUS_NO_CARTRIDGE);
    fs::write(path, content)
        .with_context(|| format!("Failed to write status file {}", path.display()))
}

#[derive(Debug, Serialize)]
pub struct Report<'a> {
    /// RFC 3339, local time
    pub timestamp: String,
    pub header: &'a HeaderInfo,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rom: Option<DumpSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sram: Option<DumpSummary>,
}

impl<'a> Report<'a> {
    pub fn new(header: &'a HeaderInfo) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            header,
            rom: None,
            sram: None,
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize report")?;
        fs::write(path, json).with_context(|| format!("Failed to write report {}", path.display()))
    }
}
