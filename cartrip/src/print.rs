// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use cartrip_core::{DumpResult, HeaderInfo};

fn size_or_invalid(header: &HeaderInfo) -> String {
    match header.rom_size_mbits() {
        Ok(mbits) => format!("{} Mbit ({} pages)", mbits, header.layout.page_count(mbits)),
        Err(_) => format!("<invalid code 0x{:02X}>", header.rom_size_code),
    }
}

pub fn print_header(header: &HeaderInfo) {
    println!();
    println!("Cartridge Header");
    println!("----------------");
    println!("Title:         {}", header.title);
    println!(
        "Layout:        {} (header at 0x{:06X})",
        header.layout, header.header_offset
    );
    println!("Speed:         0x{:X}", header.speed);
    println!("Cart type:     0x{:02X}{}", header.cart_type, if header.has_cx4() {
        " (CX4)"
    } else {
        ""
    });
    println!("ROM size:      {}", size_or_invalid(header));
    let sram = header.sram_kbits();
    if sram > 0 {
        println!("SRAM size:     {} Kbit ({} bytes)", sram, header.sram_bytes());
    } else {
        println!("SRAM size:     none");
    }
    println!("Country:       0x{:02X}", header.country);
    println!("Licence:       0x{:02X}", header.license);
    println!("Version:       1.{}", header.version);
    println!(
        "Checksum:      0x{:04X} (inverse 0x{:04X})",
        header.checksum, header.inverse_checksum
    );
    println!("NMI vector:    0x{:04X}", header.nmi_vector);
    println!("Reset vector:  0x{:04X}", header.reset_vector);
}

pub fn print_rom_result(result: &DumpResult, header: &HeaderInfo) {
    let verdict = if result.checksum_matches(header) {
        "checksum ok"
    } else {
        "checksum bad"
    };
    println!(
        "ROM:  {} bytes in {:.1}s, checksum 0x{:04X} - {}",
        result.data.len(),
        result.elapsed.as_secs_f32(),
        result.checksum,
        verdict
    );
}

pub fn print_sram_result(result: &DumpResult) {
    println!(
        "SRAM: {} bytes in {:.1}s",
        result.data.len(),
        result.elapsed.as_secs_f32()
    );
}

pub fn print_boards(boards: &[(String, String)]) {
    println!("Available boards:");
    for (name, description) in boards {
        println!("  {:<16} {}", name, description);
    }
}
