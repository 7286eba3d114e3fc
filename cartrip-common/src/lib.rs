// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Code shared by the cartrip tools: board configuration and command line
//! value parsing.

pub mod args;
pub mod config;

pub use config::{BoardConfig, get_board, list_boards};
