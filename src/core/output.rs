// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Intel hex and raw binary output for the assembled image.

use std::io::{self, Write};

const HEX_RECORD_LIMIT: usize = 32;

/// Write the image as Intel HEX records starting at `start_address`.
/// `go_addr` adds a Start Segment Address record before the terminator.
pub fn write_hex_file<W: Write>(
    mut out: W,
    start_address: u16,
    bytes: &[u8],
    go_addr: Option<u16>,
) -> io::Result<()> {
    for (index, chunk) in bytes.chunks(HEX_RECORD_LIMIT).enumerate() {
        let addr = start_address.wrapping_add((index * HEX_RECORD_LIMIT) as u16);
        let mut checksum: u8 = chunk.len() as u8;
        checksum = checksum.wrapping_add((addr >> 8) as u8);
        checksum = checksum.wrapping_add((addr & 0xFF) as u8);
        let mut data = String::new();
        for byte in chunk {
            data.push_str(&format!("{byte:02X}"));
            checksum = checksum.wrapping_add(*byte);
        }
        let checksum = (!checksum).wrapping_add(1);
        writeln!(out, ":{:02X}{:04X}00{}{:02X}", chunk.len(), addr, data, checksum)?;
    }

    if let Some(addr) = go_addr {
        let mut checksum: u8 = 4;
        checksum = checksum.wrapping_add(3);
        checksum = checksum.wrapping_add((addr >> 8) as u8);
        checksum = checksum.wrapping_add((addr & 0xFF) as u8);
        let checksum = (!checksum).wrapping_add(1);
        writeln!(out, ":040000030000{addr:04X}{checksum:02X}")?;
    }

    writeln!(out, ":00000001FF")?;
    Ok(())
}

/// Write the image as raw bytes.
pub fn write_bin_file<W: Write>(mut out: W, bytes: &[u8]) -> io::Result<()> {
    out.write_all(bytes)
}
