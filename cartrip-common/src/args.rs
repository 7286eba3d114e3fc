// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Value parsers for command line arguments.  Each returns a `String` error,
//! for use as a clap `value_parser`.

use cartrip_core::Layout;

use crate::config::{BoardConfig, get_board};

pub fn parse_layout(s: &str) -> Result<Layout, String> {
    s.parse::<Layout>().map_err(|_| {
        format!(
            "Invalid layout: {}. Valid values are: lowrom, highrom (or hirom)",
            s
        )
    })
}

pub fn parse_board(name: &str) -> Result<BoardConfig, String> {
    get_board(name).map_err(|e| {
        format!(
            "Failed to get board config: {} - use the boards command for options",
            e
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_layout() {
        assert_eq!(parse_layout("lowrom").unwrap(), Layout::LowRom);
        assert_eq!(parse_layout("HighROM").unwrap(), Layout::HighRom);
        assert_eq!(parse_layout("hirom").unwrap(), Layout::HighRom);
        assert!(parse_layout("sa1").is_err());
    }
}
